//! Messaging client configuration properties.
//!
//! [`ClientProperties`] is the property map handed to the messaging client.
//! Besides plain string values it carries the in-memory credential stores
//! built from PEM input, and it exposes the few targeted mutations the
//! client-certificate configurer needs: removing stale overrides and
//! clearing the "trust store configured" flag.

use crate::security::store::{CredentialStore, INTERNAL_PASSWORD};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const AUTHENTICATION_SCHEME: &str = "AUTHENTICATION_SCHEME";
pub const AUTHENTICATION_SCHEME_BASIC: &str = "AUTHENTICATION_SCHEME_BASIC";
pub const AUTHENTICATION_SCHEME_CLIENT_CERTIFICATE: &str = "AUTHENTICATION_SCHEME_CLIENT_CERTIFICATE";

/// PEM encoded PKCS#8 private key
pub const SSL_PRIVATE_KEY: &str = "SSL_PRIVATE_KEY";
/// PEM encoded client certificate chain, leaf first
pub const SSL_CLIENT_CERT: &str = "SSL_CLIENT_CERT";
/// PEM encoded trust anchors
pub const SSL_TRUST_CERT: &str = "SSL_TRUST_CERT";

pub const SSL_KEY_STORE: &str = "SSL_KEY_STORE";
pub const SSL_KEY_STORE_PASSWORD: &str = "SSL_KEY_STORE_PASSWORD";
pub const SSL_PRIVATE_KEY_PASSWORD: &str = "SSL_PRIVATE_KEY_PASSWORD";
pub const SSL_PRIVATE_KEY_ALIAS: &str = "SSL_PRIVATE_KEY_ALIAS";
pub const SSL_TRUST_STORE: &str = "SSL_TRUST_STORE";
pub const SSL_TRUST_STORE_PASSWORD: &str = "SSL_TRUST_STORE_PASSWORD";

pub const SSL_IN_MEMORY_KEY_STORE: &str = "SSL_IN_MEMORY_KEY_STORE";
pub const SSL_IN_MEMORY_TRUST_STORE: &str = "SSL_IN_MEMORY_TRUST_STORE";

#[derive(Clone)]
pub enum PropertyValue {
    Text(String),
    Store(Arc<CredentialStore>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(value) => Some(value),
            PropertyValue::Store(_) => None,
        }
    }

    pub fn as_store(&self) -> Option<&Arc<CredentialStore>> {
        match self {
            PropertyValue::Store(store) => Some(store),
            PropertyValue::Text(_) => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<CredentialStore> for PropertyValue {
    fn from(store: CredentialStore) -> Self {
        PropertyValue::Store(Arc::new(store))
    }
}

// Values may hold PEM secrets or passwords.
impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Text(_) => f.write_str("Text(..)"),
            PropertyValue::Store(store) => write!(f, "Store({} entries)", store.len()),
        }
    }
}

/// Property map consumed by the messaging client.
#[derive(Clone, Default)]
pub struct ClientProperties {
    properties: HashMap<String, PropertyValue>,
    trust_store_configured: bool,
}

impl ClientProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed client properties from plain API properties.
    pub fn from_api_properties(api_properties: &HashMap<String, String>) -> Self {
        let mut properties = Self::new();
        for (key, value) in api_properties {
            properties.set_property(key, value.as_str());
        }
        properties
    }

    /// Set a property. Setting [`SSL_TRUST_STORE`] marks the trust store as configured.
    pub fn set_property(&mut self, key: &str, value: impl Into<PropertyValue>) {
        if key == SSL_TRUST_STORE {
            self.trust_store_configured = true;
        }
        self.properties.insert(key.to_string(), value.into());
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// The value of a string property. Store-valued properties yield `None`.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn set_in_memory_key_store(&mut self, store: CredentialStore, password: &str) {
        self.set_property(SSL_IN_MEMORY_KEY_STORE, store);
        self.set_property(SSL_KEY_STORE_PASSWORD, password);
    }

    pub fn set_in_memory_trust_store(&mut self, store: CredentialStore) {
        self.set_property(SSL_IN_MEMORY_TRUST_STORE, store);
    }

    pub fn in_memory_key_store(&self) -> Option<&Arc<CredentialStore>> {
        self.get_property(SSL_IN_MEMORY_KEY_STORE)
            .and_then(PropertyValue::as_store)
    }

    pub fn in_memory_trust_store(&self) -> Option<&Arc<CredentialStore>> {
        self.get_property(SSL_IN_MEMORY_TRUST_STORE)
            .and_then(PropertyValue::as_store)
    }

    /// Whether a file-backed trust store has been set on these properties.
    pub fn is_trust_store_configured(&self) -> bool {
        self.trust_store_configured
    }

    pub fn set_trust_store_configured(&mut self, configured: bool) {
        self.trust_store_configured = configured;
    }

    /// True when `key` holds a string that is empty or whitespace only.
    pub fn has_blank_string(&self, key: &str) -> bool {
        self.get_string(key).is_some_and(|value| value.trim().is_empty())
    }

    /// A blank [`SSL_KEY_STORE`] would be opened as a file with an empty path.
    /// Replace it with an explicit empty value, point the key store password at
    /// the in-memory store and drop overrides that only apply to file stores.
    pub fn reset_blank_key_store(&mut self) -> bool {
        if !self.has_blank_string(SSL_KEY_STORE) {
            return false;
        }

        self.set_property(SSL_KEY_STORE, "");
        self.set_property(SSL_KEY_STORE_PASSWORD, INTERNAL_PASSWORD);
        self.remove_property(SSL_PRIVATE_KEY_PASSWORD);
        self.remove_property(SSL_PRIVATE_KEY_ALIAS);
        debug!("Reset blank {}", SSL_KEY_STORE);
        true
    }

    /// Same as [`reset_blank_key_store`](Self::reset_blank_key_store) for
    /// [`SSL_TRUST_STORE`]; also clears the trust-store-configured flag.
    pub fn reset_blank_trust_store(&mut self) -> bool {
        if !self.has_blank_string(SSL_TRUST_STORE) {
            return false;
        }

        self.set_property(SSL_TRUST_STORE, "");
        self.remove_property(SSL_TRUST_STORE_PASSWORD);
        self.set_trust_store_configured(false);
        debug!("Reset blank {}", SSL_TRUST_STORE);
        true
    }
}

impl fmt::Debug for ClientProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("ClientProperties")
            .field("keys", &keys)
            .field("trust_store_configured", &self.trust_store_configured)
            .finish()
    }
}
