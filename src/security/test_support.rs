//! Shared key and certificate fixtures for unit tests.

use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rcgen::{CertificateParams, KeyPair};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;

/// PEM encoded RSA key and a self-signed certificate for it.
pub struct Identity {
    pub key_pem: String,
    pub cert_pem: String,
}

/// `not_after` of every fixture certificate.
pub const NOT_AFTER: (i32, u8, u8) = (2030, 1, 15);

pub fn rsa_identity(name: &str) -> Identity {
    // ring refuses RSA keys below 2048 bits
    let key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let key_pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();

    let key_pair = KeyPair::from_pem(&key_pem).unwrap();
    let mut params = CertificateParams::new(vec![name.to_string()]).unwrap();
    params.not_after = rcgen::date_time_ymd(NOT_AFTER.0, NOT_AFTER.1, NOT_AFTER.2);
    let cert_pem = params.self_signed(&key_pair).unwrap().pem();

    Identity { key_pem, cert_pem }
}

/// Self-signed certificate with a throwaway EC key.
pub fn cert_pem(name: &str) -> String {
    let key_pair = KeyPair::generate().unwrap();
    CertificateParams::new(vec![name.to_string()])
        .unwrap()
        .self_signed(&key_pair)
        .unwrap()
        .pem()
}

pub static CLIENT: Lazy<Identity> = Lazy::new(|| rsa_identity("client.example.com"));
pub static OTHER: Lazy<Identity> = Lazy::new(|| rsa_identity("other.example.com"));
