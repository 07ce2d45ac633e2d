//! Private/public key correspondence check.
//!
//! A key pair is considered matching when a signature produced with the
//! private key verifies under the public key. The signature scheme is fixed
//! per algorithm family:
//!
//! | family | scheme                 |
//! |--------|------------------------|
//! | RSA    | SHA-256 with RSA (PKCS#1 v1.5) |
//! | DSA    | SHA-256 with DSA       |
//! | EC     | SHA-256 with ECDSA     |

use crate::security::keys::{PrivateKey, PublicKey};
use rsa::pkcs1v15;
use rsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rsa::signature::{self, DigestSigner, DigestVerifier, Signer, Verifier};
use sha2::{Digest, Sha256};
use tracing::debug;

const PAYLOAD: &[u8] = b"rustmq key pair consistency check";

/// Decides whether a private key and a public key form one key pair.
pub trait KeyPairValidator: Send + Sync {
    /// Returns `false` when either key is absent, the families differ, or any
    /// cryptographic step fails.
    fn is_key_pair(&self, private_key: Option<&PrivateKey>, public_key: Option<&PublicKey>) -> bool;
}

/// Sign/verify round trip over a fixed payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureKeyPairValidator;

impl KeyPairValidator for SignatureKeyPairValidator {
    fn is_key_pair(&self, private_key: Option<&PrivateKey>, public_key: Option<&PublicKey>) -> bool {
        is_key_pair(private_key, public_key)
    }
}

/// See [`KeyPairValidator::is_key_pair`].
pub fn is_key_pair(private_key: Option<&PrivateKey>, public_key: Option<&PublicKey>) -> bool {
    let (Some(private_key), Some(public_key)) = (private_key, public_key) else {
        return false;
    };

    if private_key.algorithm() != public_key.algorithm() {
        debug!(
            private = %private_key.algorithm(),
            public = %public_key.algorithm(),
            "Key algorithms differ"
        );
        return false;
    }

    match round_trip(private_key, public_key) {
        Ok(verified) => verified,
        Err(e) => {
            debug!("Key pair check failed: {}", e);
            false
        }
    }
}

fn round_trip(private_key: &PrivateKey, public_key: &PublicKey) -> Result<bool, signature::Error> {
    let verified = match (private_key, public_key) {
        (PrivateKey::Rsa(private), PublicKey::Rsa(public)) => {
            let signer = pkcs1v15::SigningKey::<Sha256>::new(private.clone());
            let signature = signer.try_sign(PAYLOAD)?;
            pkcs1v15::VerifyingKey::<Sha256>::new(public.clone())
                .verify(PAYLOAD, &signature)
                .is_ok()
        }
        (PrivateKey::Dsa(private), PublicKey::Dsa(public)) => {
            let signature: dsa::Signature = private.try_sign_digest(Sha256::new_with_prefix(PAYLOAD))?;
            public
                .verify_digest(Sha256::new_with_prefix(PAYLOAD), &signature)
                .is_ok()
        }
        (PrivateKey::P256(private), PublicKey::P256(public)) => {
            let prehash = Sha256::digest(PAYLOAD);
            let signature: p256::ecdsa::Signature = private.sign_prehash(&prehash)?;
            public.verify_prehash(&prehash, &signature).is_ok()
        }
        (PrivateKey::P384(private), PublicKey::P384(public)) => {
            let prehash = Sha256::digest(PAYLOAD);
            let signature: p384::ecdsa::Signature = private.sign_prehash(&prehash)?;
            public.verify_prehash(&prehash, &signature).is_ok()
        }
        // Same family, different curve
        _ => false,
    };

    Ok(verified)
}
