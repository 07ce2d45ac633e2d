//! Typed private and public keys decoded from PKCS#8 / SPKI DER.
//!
//! Only the algorithm families the key-pair check understands are modelled:
//! RSA, DSA and EC (NIST P-256 and P-384).

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, ObjectIdentifier, PrivateKeyInfo, SubjectPublicKeyInfoRef};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const ID_DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");
const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("malformed key: {0}")]
    Malformed(String),

    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Asymmetric key family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Rsa,
    Dsa,
    Ec,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Rsa => write!(f, "RSA"),
            KeyAlgorithm::Dsa => write!(f, "DSA"),
            KeyAlgorithm::Ec => write!(f, "EC"),
        }
    }
}

/// A decoded private key.
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(RsaPrivateKey),
    Dsa(dsa::SigningKey),
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

/// A decoded public key, typically taken from a certificate.
#[derive(Clone, Debug)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Dsa(dsa::VerifyingKey),
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
}

impl PrivateKey {
    /// Decode a PKCS#8 `PrivateKeyInfo` structure.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, KeyError> {
        let info = PrivateKeyInfo::try_from(der).map_err(|e| KeyError::Malformed(e.to_string()))?;
        let oid = info.algorithm.oid;

        let key = if oid == RSA_ENCRYPTION {
            PrivateKey::Rsa(RsaPrivateKey::from_pkcs8_der(der).map_err(malformed)?)
        } else if oid == ID_DSA {
            PrivateKey::Dsa(dsa::SigningKey::from_pkcs8_der(der).map_err(malformed)?)
        } else if oid == ID_EC_PUBLIC_KEY {
            let curve = info
                .algorithm
                .parameters_oid()
                .map_err(|e| KeyError::Malformed(e.to_string()))?;
            if curve == SECP256R1 {
                PrivateKey::P256(p256::ecdsa::SigningKey::from_pkcs8_der(der).map_err(malformed)?)
            } else if curve == SECP384R1 {
                PrivateKey::P384(p384::ecdsa::SigningKey::from_pkcs8_der(der).map_err(malformed)?)
            } else {
                return Err(KeyError::UnsupportedAlgorithm(format!("EC curve {}", curve)));
            }
        } else {
            return Err(KeyError::UnsupportedAlgorithm(oid.to_string()));
        };

        Ok(key)
    }

    /// Re-encode as PKCS#8 DER. The buffer is wiped when dropped.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let document = match self {
            PrivateKey::Rsa(key) => key.to_pkcs8_der(),
            PrivateKey::Dsa(key) => key.to_pkcs8_der(),
            PrivateKey::P256(key) => key.to_pkcs8_der(),
            PrivateKey::P384(key) => key.to_pkcs8_der(),
        }
        .map_err(malformed)?;

        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PrivateKey::Rsa(_) => KeyAlgorithm::Rsa,
            PrivateKey::Dsa(_) => KeyAlgorithm::Dsa,
            PrivateKey::P256(_) | PrivateKey::P384(_) => KeyAlgorithm::Ec,
        }
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Rsa(key) => PublicKey::Rsa(RsaPublicKey::from(key)),
            PrivateKey::Dsa(key) => PublicKey::Dsa(key.verifying_key().clone()),
            PrivateKey::P256(key) => PublicKey::P256(key.verifying_key().clone()),
            PrivateKey::P384(key) => PublicKey::P384(key.verifying_key().clone()),
        }
    }
}

// Never print key material.
impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

impl PublicKey {
    /// Decode a `SubjectPublicKeyInfo` structure.
    pub fn from_spki_der(der: &[u8]) -> Result<Self, KeyError> {
        let spki = SubjectPublicKeyInfoRef::try_from(der).map_err(|e| KeyError::Malformed(e.to_string()))?;
        let oid = spki.algorithm.oid;

        let key = if oid == RSA_ENCRYPTION {
            PublicKey::Rsa(RsaPublicKey::from_public_key_der(der).map_err(malformed)?)
        } else if oid == ID_DSA {
            PublicKey::Dsa(dsa::VerifyingKey::from_public_key_der(der).map_err(malformed)?)
        } else if oid == ID_EC_PUBLIC_KEY {
            let curve = spki
                .algorithm
                .parameters_oid()
                .map_err(|e| KeyError::Malformed(e.to_string()))?;
            if curve == SECP256R1 {
                PublicKey::P256(p256::ecdsa::VerifyingKey::from_public_key_der(der).map_err(malformed)?)
            } else if curve == SECP384R1 {
                PublicKey::P384(p384::ecdsa::VerifyingKey::from_public_key_der(der).map_err(malformed)?)
            } else {
                return Err(KeyError::UnsupportedAlgorithm(format!("EC curve {}", curve)));
            }
        } else {
            return Err(KeyError::UnsupportedAlgorithm(oid.to_string()));
        };

        Ok(key)
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::Rsa(_) => KeyAlgorithm::Rsa,
            PublicKey::Dsa(_) => KeyAlgorithm::Dsa,
            PublicKey::P256(_) | PublicKey::P384(_) => KeyAlgorithm::Ec,
        }
    }
}

fn malformed(err: impl fmt::Display) -> KeyError {
    KeyError::Malformed(err.to_string())
}
