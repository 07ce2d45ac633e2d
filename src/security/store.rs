//! In-memory key and trust stores built from PEM material.

use crate::error::{AuthError, Result};
use crate::security::certificate::Certificate;
use crate::security::key_pair::{KeyPairValidator, SignatureKeyPairValidator};
use crate::security::keys::PrivateKey;
use crate::security::pem;
use chrono::{DateTime, Utc};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::RootCertStore;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};
use zeroize::Zeroizing;

/// Alias of the single private key entry in a client key store.
pub const CLIENT_KEY_ALIAS: &str = "pk";

/// Trust store aliases are this prefix followed by the position in the chain.
pub const TRUST_ALIAS_PREFIX: &str = "ts";

/// Password protecting generated key stores. Only meaningful in-process.
pub const INTERNAL_PASSWORD: &str = "internalPassword";

const CLIENT_CERT_LABEL: &str = "SSL_CLIENT_CERT";
const TRUST_CERT_LABEL: &str = "SSL_TRUST_CERT";

#[derive(Clone)]
pub enum StoreEntry {
    PrivateKey {
        key: PrivateKey,
        chain: Vec<Certificate>,
        password: Zeroizing<String>,
    },
    TrustedCertificate(Certificate),
}

impl fmt::Debug for StoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreEntry::PrivateKey { key, chain, .. } => f
                .debug_struct("PrivateKey")
                .field("algorithm", &key.algorithm())
                .field("chain", chain)
                .finish_non_exhaustive(),
            StoreEntry::TrustedCertificate(cert) => f.debug_tuple("TrustedCertificate").field(cert).finish(),
        }
    }
}

/// Alias-addressed container of key and certificate entries, kept in
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: Vec<(String, StoreEntry)>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, alias: &str) -> Option<&StoreEntry> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == alias)
            .map(|(_, entry)| entry)
    }

    /// Replace the entry under `alias` in place, or append it.
    fn insert(&mut self, alias: &str, entry: StoreEntry) {
        match self.entries.iter_mut().find(|(existing, _)| existing == alias) {
            Some((_, slot)) => *slot = entry,
            None => self.entries.push((alias.to_string(), entry)),
        }
    }

    /// Store a private key together with its certificate chain, replacing any
    /// entry under `alias`.
    pub fn set_key_entry(
        &mut self,
        alias: &str,
        key: PrivateKey,
        password: &str,
        chain: Vec<Certificate>,
    ) -> Result<()> {
        if chain.is_empty() {
            return Err(AuthError::StoreConstruction(format!(
                "key entry '{}' requires at least one certificate",
                alias
            )));
        }

        self.insert(
            alias,
            StoreEntry::PrivateKey {
                key,
                chain,
                password: Zeroizing::new(password.to_string()),
            },
        );
        Ok(())
    }

    /// Store a trusted certificate. Key entries are never overwritten.
    pub fn set_certificate_entry(&mut self, alias: &str, certificate: Certificate) -> Result<()> {
        if self.is_key_entry(alias) {
            return Err(AuthError::StoreConstruction(format!(
                "alias '{}' already holds a key entry",
                alias
            )));
        }

        self.insert(alias, StoreEntry::TrustedCertificate(certificate));
        Ok(())
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(alias, _)| alias.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entry(alias).is_some()
    }

    pub fn is_key_entry(&self, alias: &str) -> bool {
        matches!(self.entry(alias), Some(StoreEntry::PrivateKey { .. }))
    }

    pub fn is_certificate_entry(&self, alias: &str) -> bool {
        matches!(self.entry(alias), Some(StoreEntry::TrustedCertificate(_)))
    }

    /// The trusted certificate, or the first certificate of a key entry's chain.
    pub fn certificate(&self, alias: &str) -> Option<&Certificate> {
        match self.entry(alias)? {
            StoreEntry::PrivateKey { chain, .. } => chain.first(),
            StoreEntry::TrustedCertificate(cert) => Some(cert),
        }
    }

    pub fn certificate_chain(&self, alias: &str) -> Option<&[Certificate]> {
        match self.entry(alias)? {
            StoreEntry::PrivateKey { chain, .. } => Some(chain),
            StoreEntry::TrustedCertificate(_) => None,
        }
    }

    /// Recover a private key. The password must match the one it was stored with.
    pub fn private_key(&self, alias: &str, password: &str) -> Result<&PrivateKey> {
        match self.entry(alias) {
            Some(StoreEntry::PrivateKey {
                key,
                password: stored,
                ..
            }) => {
                if stored.as_str() != password {
                    return Err(AuthError::StoreConstruction(format!(
                        "wrong password for key entry '{}'",
                        alias
                    )));
                }
                Ok(key)
            }
            _ => Err(AuthError::StoreConstruction(format!(
                "no key entry under alias '{}'",
                alias
            ))),
        }
    }

    /// Certificate chain and PKCS#8 key in the form a rustls client config expects.
    pub fn client_auth_material(
        &self,
        alias: &str,
        password: &str,
    ) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
        let key = self.private_key(alias, password)?;
        let chain = self
            .certificate_chain(alias)
            .unwrap_or_default()
            .iter()
            .map(|cert| cert.der().clone())
            .collect();

        let der = key
            .to_pkcs8_der()
            .map_err(|e| AuthError::StoreConstruction(format!("failed to encode private key: {}", e)))?;

        Ok((chain, PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(der.to_vec()))))
    }

    /// Trust anchors from every trusted certificate entry.
    pub fn root_cert_store(&self) -> Result<RootCertStore> {
        let mut roots = RootCertStore::empty();
        for (alias, entry) in &self.entries {
            if let StoreEntry::TrustedCertificate(cert) = entry {
                roots.add(cert.der().clone()).map_err(|e| {
                    AuthError::StoreConstruction(format!("certificate '{}' is not a usable trust anchor: {}", alias, e))
                })?;
            }
        }
        Ok(roots)
    }
}

/// Builds client key stores and trust stores from PEM properties.
#[derive(Clone)]
pub struct KeyStoreFactory {
    validator: Option<Arc<dyn KeyPairValidator>>,
}

impl Default for KeyStoreFactory {
    fn default() -> Self {
        Self::new(Some(Arc::new(SignatureKeyPairValidator)))
    }
}

impl fmt::Debug for KeyStoreFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStoreFactory")
            .field("key_pair_check", &self.validator.is_some())
            .finish()
    }
}

impl KeyStoreFactory {
    pub fn new(validator: Option<Arc<dyn KeyPairValidator>>) -> Self {
        Self { validator }
    }

    /// A factory that stores any key with any chain.
    pub fn without_key_pair_check() -> Self {
        Self::new(None)
    }

    /// Build a key store holding the private key and the full client chain
    /// under [`CLIENT_KEY_ALIAS`].
    ///
    /// With a validator wired in, at least one certificate of the chain must
    /// carry the public half of the key.
    pub fn create_client_key_store(&self, private_key_pem: &str, client_cert_pem: &str) -> Result<CredentialStore> {
        let key = pem::parse_private_key(private_key_pem)?;
        let chain = pem::parse_certificates(client_cert_pem, CLIENT_CERT_LABEL)?;

        if let Some(validator) = &self.validator {
            let matched = chain.iter().any(|cert| match cert.public_key() {
                Ok(public_key) => validator.is_key_pair(Some(&key), Some(&public_key)),
                Err(e) => {
                    debug!(subject = cert.subject(), "Skipping certificate with unreadable public key: {}", e);
                    false
                }
            });

            if !matched {
                error!(
                    certificates = chain.len(),
                    "SSL_PRIVATE_KEY does not match any certificate in SSL_CLIENT_CERT"
                );
                return Err(AuthError::KeyPairMismatch {
                    certificates: chain.len(),
                });
            }
        }

        if let Some(leaf) = chain.first() {
            info!(
                subject = leaf.subject(),
                fingerprint = %leaf.fingerprint(),
                chain_length = chain.len(),
                "Created client key store"
            );
        }

        let mut store = CredentialStore::new();
        store.set_key_entry(CLIENT_KEY_ALIAS, key, INTERNAL_PASSWORD, chain)?;
        Ok(store)
    }

    /// Build a trust store with one entry per certificate, aliased `ts0`, `ts1`, ...
    pub fn create_trust_store(&self, trust_cert_pem: &str) -> Result<CredentialStore> {
        let certificates = pem::parse_certificates(trust_cert_pem, TRUST_CERT_LABEL)?;

        let mut store = CredentialStore::new();
        for (i, cert) in certificates.into_iter().enumerate() {
            store.set_certificate_entry(&format!("{}{}", TRUST_ALIAS_PREFIX, i), cert)?;
        }

        info!(certificates = store.len(), "Created trust store");
        Ok(store)
    }

    pub fn client_key_store_password(&self) -> &'static str {
        INTERNAL_PASSWORD
    }

    /// "Not valid after" of the first client certificate.
    pub fn valid_to(&self, client_cert_pem: &str) -> Option<DateTime<Utc>> {
        match pem::parse_certificates(client_cert_pem, CLIENT_CERT_LABEL) {
            Ok(chain) => chain.first().map(Certificate::not_after),
            Err(e) => {
                error!("Could not read client certificate expiry: {}", e);
                None
            }
        }
    }
}
