//! Client certificate configuration pass.
//!
//! [`ClientCertConfigurer::build_authenticated_config`] takes the client
//! properties as loaded by the host and the raw string properties they came
//! from, and, when the client-certificate authentication scheme is selected,
//! installs an in-memory key store and trust store built from the PEM
//! properties. The key store and trust store are handled independently: a
//! failure on one path never prevents the other.

use crate::config::{ClientCertAuthConfig, FailurePolicy};
use crate::error::{AuthError, Result};
use crate::properties::{
    ClientProperties, AUTHENTICATION_SCHEME, AUTHENTICATION_SCHEME_CLIENT_CERTIFICATE, SSL_CLIENT_CERT,
    SSL_IN_MEMORY_KEY_STORE, SSL_IN_MEMORY_TRUST_STORE, SSL_PRIVATE_KEY, SSL_TRUST_CERT,
};
use crate::security::expiry::{ExpiryMonitor, TaskScheduler};
use crate::security::store::KeyStoreFactory;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub struct ClientCertConfigurer {
    key_store_factory: KeyStoreFactory,
    config: ClientCertAuthConfig,
    expiry_monitor: ExpiryMonitor,
}

impl ClientCertConfigurer {
    pub fn new(key_store_factory: KeyStoreFactory, config: ClientCertAuthConfig, expiry_monitor: ExpiryMonitor) -> Self {
        Self {
            key_store_factory,
            config,
            expiry_monitor,
        }
    }

    /// Default factory, with expiry checks on `scheduler` when one is available.
    pub fn with_scheduler(config: ClientCertAuthConfig, scheduler: Option<Arc<dyn TaskScheduler>>) -> Self {
        Self::new(KeyStoreFactory::default(), config, ExpiryMonitor::new(scheduler))
    }

    pub fn config(&self) -> &ClientCertAuthConfig {
        &self.config
    }

    pub fn expiry_monitor(&self) -> &ExpiryMonitor {
        &self.expiry_monitor
    }

    /// Enrich `client` with credential stores built from `properties`.
    ///
    /// Nothing is changed unless `AUTHENTICATION_SCHEME` selects client
    /// certificates. Store failures follow the configured [`FailurePolicy`].
    pub fn build_authenticated_config(
        &self,
        mut client: ClientProperties,
        properties: &HashMap<String, String>,
    ) -> Result<ClientProperties> {
        if property(properties, AUTHENTICATION_SCHEME) != Some(AUTHENTICATION_SCHEME_CLIENT_CERTIFICATE) {
            debug!(
                "{} is not {}, skipping client certificate configuration",
                AUTHENTICATION_SCHEME, AUTHENTICATION_SCHEME_CLIENT_CERTIFICATE
            );
            self.expiry_monitor.cancel();
            return Ok(client);
        }

        self.configure_key_store(&mut client, properties)?;
        self.configure_trust_store(&mut client, properties)?;

        Ok(client)
    }

    /// Any pass that does not install a key store also drops the expiry watch
    /// of the previously installed certificate.
    fn configure_key_store(&self, client: &mut ClientProperties, properties: &HashMap<String, String>) -> Result<()> {
        let Some(private_key) = non_blank(properties, SSL_PRIVATE_KEY) else {
            warn!("No {} present, skipping key store", SSL_PRIVATE_KEY);
            self.expiry_monitor.cancel();
            return Ok(());
        };
        let Some(client_cert) = non_blank(properties, SSL_CLIENT_CERT) else {
            warn!("No {} present, skipping key store", SSL_CLIENT_CERT);
            self.expiry_monitor.cancel();
            return Ok(());
        };

        let store = match self.key_store_factory.create_client_key_store(private_key, client_cert) {
            Ok(store) => store,
            Err(e) => {
                self.expiry_monitor.cancel();
                return self.on_store_failure(e, SSL_IN_MEMORY_KEY_STORE);
            }
        };

        let not_after = self.key_store_factory.valid_to(client_cert);
        self.expiry_monitor
            .schedule_expiry_check(not_after, &self.config.cert_info);

        client.set_in_memory_key_store(store, self.key_store_factory.client_key_store_password());
        client.reset_blank_key_store();
        info!("Configured {}", SSL_IN_MEMORY_KEY_STORE);
        Ok(())
    }

    fn configure_trust_store(&self, client: &mut ClientProperties, properties: &HashMap<String, String>) -> Result<()> {
        let Some(trust_cert) = non_blank(properties, SSL_TRUST_CERT) else {
            debug!("No {} present, not adding {}", SSL_TRUST_CERT, SSL_IN_MEMORY_TRUST_STORE);
            return Ok(());
        };

        let store = match self.key_store_factory.create_trust_store(trust_cert) {
            Ok(store) => store,
            Err(e) => return self.on_store_failure(e, SSL_IN_MEMORY_TRUST_STORE),
        };

        client.set_in_memory_trust_store(store);
        client.reset_blank_trust_store();
        info!("Configured {}", SSL_IN_MEMORY_TRUST_STORE);
        Ok(())
    }

    fn on_store_failure(&self, err: AuthError, property: &str) -> Result<()> {
        match self.config.failure_policy {
            FailurePolicy::Degrade => {
                warn!(category = err.category(), "{} not configured: {}", property, err);
                Ok(())
            }
            FailurePolicy::FailFast => {
                error!(category = err.category(), "Could not configure {}: {}", property, err);
                Err(err.in_property(property))
            }
        }
    }
}

/// One-shot configuration pass with the default key store factory.
pub fn build_authenticated_config(
    client: ClientProperties,
    properties: &HashMap<String, String>,
    config: &ClientCertAuthConfig,
    scheduler: Option<Arc<dyn TaskScheduler>>,
) -> Result<ClientProperties> {
    ClientCertConfigurer::with_scheduler(config.clone(), scheduler).build_authenticated_config(client, properties)
}

fn property<'a>(properties: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    properties.get(key).map(String::as_str)
}

fn non_blank<'a>(properties: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    property(properties, key).filter(|value| !value.trim().is_empty())
}
