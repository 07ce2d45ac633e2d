//! Decoded X.509 certificates.

use crate::security::keys::{KeyError, PublicKey};
use chrono::{DateTime, Utc};
use rustls::pki_types::CertificateDer;
use sha2::{Digest, Sha256};
use std::fmt;
use x509_parser::prelude::{FromDer, X509Certificate};

/// An X.509 certificate that decoded successfully, plus the fields this crate reads from it.
///
/// Decoding is purely syntactic: signatures, chains and revocation are not checked.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: CertificateDer<'static>,
    subject: String,
    issuer: String,
    serial_number: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    public_key_der: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: CertificateDer<'static>) -> Result<Self, String> {
        let (subject, issuer, serial_number, not_before, not_after, public_key_der) = {
            let (_, cert) = X509Certificate::from_der(der.as_ref())
                .map_err(|e| format!("Failed to parse certificate: {}", e))?;

            let validity = cert.validity();
            (
                cert.subject().to_string(),
                cert.issuer().to_string(),
                cert.serial.to_str_radix(16),
                timestamp(validity.not_before.timestamp())?,
                timestamp(validity.not_after.timestamp())?,
                cert.public_key().raw.to_vec(),
            )
        };

        Ok(Self {
            der,
            subject,
            issuer,
            serial_number,
            not_before,
            not_after,
            public_key_der,
        })
    }

    pub fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// The "not valid after" instant.
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Decode the subject public key.
    pub fn public_key(&self) -> Result<PublicKey, KeyError> {
        PublicKey::from_spki_der(&self.public_key_der)
    }

    /// SHA-256 fingerprint of the DER encoding, hex encoded.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.der.as_ref()))
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial_number", &self.serial_number)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, String> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| format!("Certificate validity timestamp out of range: {}", secs))
}
