pub mod config;
pub mod configurer;
pub mod error;
pub mod properties;
pub mod security;

pub use config::{CertInfoConfig, ClientCertAuthConfig, FailurePolicy};
pub use configurer::{build_authenticated_config, ClientCertConfigurer};
pub use error::{AuthError, Result};
pub use properties::{ClientProperties, PropertyValue};
