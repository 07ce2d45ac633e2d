//! RustMQ client certificate security
//!
//! Turns PEM text supplied through client properties into the in-memory
//! credential stores a TLS client consumes, and watches the client
//! certificate for approaching expiry.
//!
//! ## Key Components
//!
//! - **PEM parsing**: tolerant certificate normalization and strict private key decoding
//! - **Key pair check**: sign/verify round trip for RSA, DSA and EC keys
//! - **Credential stores**: client key store (`pk`) and trust store (`ts0`, `ts1`, ...)
//! - **Expiry monitoring**: daily check at 09:00 local time with warn/error thresholds

pub mod certificate;
pub mod expiry;
pub mod key_pair;
pub mod keys;
pub mod pem;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use certificate::Certificate;
pub use expiry::{
    ExpiryAlert, ExpiryLevel, ExpiryMonitor, ScheduledTask, TaskScheduler, TokioScheduler, WatchStatus,
};
pub use key_pair::{is_key_pair, KeyPairValidator, SignatureKeyPairValidator};
pub use keys::{KeyAlgorithm, KeyError, PrivateKey, PublicKey};
pub use pem::{normalize_certificates, parse_certificates, parse_private_key};
pub use store::{CredentialStore, KeyStoreFactory, StoreEntry, CLIENT_KEY_ALIAS, INTERNAL_PASSWORD};
