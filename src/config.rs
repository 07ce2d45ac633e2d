use serde::{Deserialize, Serialize};
use tracing::warn;

/// Top-level configuration for PEM client-certificate authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientCertAuthConfig {
    pub cert_info: CertInfoConfig,
    pub failure_policy: FailurePolicy,
}

/// Settings for the daily client certificate expiry check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertInfoConfig {
    /// Enable/disable log messages for certificate expiration
    pub enabled: bool,
    /// Log a warning once a day (09:00) if the client cert is valid for fewer than this many days
    pub warn_in_days: i64,
    /// Log an error once a day (09:00) if the client cert is valid for fewer than this many days
    pub error_in_days: i64,
}

/// What to do when a credential store cannot be built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Omit the failing store, log the reason and keep configuring
    #[default]
    Degrade,
    /// Abort the whole configuration pass
    FailFast,
}

impl Default for CertInfoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warn_in_days: 30,
            error_in_days: 7,
        }
    }
}

impl ClientCertAuthConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: ClientCertAuthConfig = toml::from_str(content)
            .map_err(|e| crate::error::AuthError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.cert_info.validate()
    }
}

impl CertInfoConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.warn_in_days < 0 {
            return Err(crate::error::AuthError::InvalidConfig(
                "cert_info.warn_in_days must not be negative".to_string(),
            ));
        }

        if self.error_in_days < 0 {
            return Err(crate::error::AuthError::InvalidConfig(
                "cert_info.error_in_days must not be negative".to_string(),
            ));
        }

        // Allowed: the error level simply takes over below error_in_days.
        if self.error_in_days > self.warn_in_days {
            warn!(
                warn_in_days = self.warn_in_days,
                error_in_days = self.error_in_days,
                "cert_info.error_in_days exceeds warn_in_days, warnings will never be logged"
            );
        }

        Ok(())
    }
}
