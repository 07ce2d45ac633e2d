//! Lenient PEM handling for operator-supplied key material.
//!
//! Certificates pasted into environment variables or YAML frequently lose
//! their line structure: CRLF line breaks, tabs, runs of spaces or no breaks
//! at all. [`normalize_certificates`] rebuilds canonical blocks before the
//! text reaches the strict PEM reader. Private keys are held to a stricter
//! shape and are only ever reported by a short prefix.

use crate::error::{AuthError, Result};
use crate::security::certificate::Certificate;
use crate::security::keys::{KeyAlgorithm, PrivateKey};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use zeroize::Zeroizing;

pub const BEGIN_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";
pub const END_CERTIFICATE: &str = "-----END CERTIFICATE-----";

/// Base64 column width of a canonical PEM body.
pub const LINE_WIDTH: usize = 64;

/// Property name used when reporting private key parse failures.
pub const PRIVATE_KEY_LABEL: &str = "SSL_PRIVATE_KEY";

static PRIVATE_KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*-----BEGIN (RSA PRIVATE KEY|PRIVATE KEY)-----\s*((?:[0-9a-zA-Z+/=]{64}\s*)*(?:[0-9a-zA-Z+/=]{1,63}\s*)?)-----END (RSA PRIVATE KEY|PRIVATE KEY)-----\s*$",
    )
    .expect("private key pattern is valid")
});

// MIME style: padding is optional, whitespace is stripped beforehand.
const MIME_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Rewrite one or more concatenated certificate blocks into canonical form.
///
/// Every block is emitted as the BEGIN marker, the base64 payload wrapped at
/// [`LINE_WIDTH`] columns and the END marker, each followed by `\n`. Fragments
/// that are empty once whitespace is removed are dropped. Applying the
/// function to its own output returns the same text.
pub fn normalize_certificates(pem: &str) -> String {
    let mut normalized = String::with_capacity(pem.len() + pem.len() / LINE_WIDTH + 1);

    for fragment in pem.split(BEGIN_CERTIFICATE) {
        let payload: Vec<char> = fragment
            .replace(END_CERTIFICATE, "")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        if payload.is_empty() {
            continue;
        }

        normalized.push_str(BEGIN_CERTIFICATE);
        normalized.push('\n');
        for line in payload.chunks(LINE_WIDTH) {
            normalized.extend(line);
            normalized.push('\n');
        }
        normalized.push_str(END_CERTIFICATE);
        normalized.push('\n');
    }

    normalized
}

/// Parse a certificate chain from loosely formatted PEM text.
///
/// Order is preserved. `label` names the source property in errors.
pub fn parse_certificates(pem: &str, label: &str) -> Result<Vec<Certificate>> {
    let cleaned = normalize_certificates(pem);

    let ders = rustls_pemfile::certs(&mut cleaned.as_bytes())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| AuthError::pem_parse(label, pem, format!("invalid PEM encoding: {}", e)))?;

    if ders.is_empty() {
        return Err(AuthError::pem_parse(label, pem, "no certificate found"));
    }

    let certificates = ders
        .into_iter()
        .map(Certificate::from_der)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|reason| AuthError::pem_parse(label, pem, reason))?;

    debug!(label, count = certificates.len(), "Parsed certificate chain");
    Ok(certificates)
}

/// Parse an unencrypted PKCS#8 RSA private key.
///
/// The whole input must be a single `PRIVATE KEY` or `RSA PRIVATE KEY` block
/// with matching markers. Body lines are 64 base64 characters, except for an
/// optional shorter last line.
pub fn parse_private_key(pem: &str) -> Result<PrivateKey> {
    let captures = PRIVATE_KEY_PATTERN
        .captures(pem)
        .ok_or_else(|| AuthError::pem_parse(PRIVATE_KEY_LABEL, pem, "not a PEM encoded private key"))?;

    let begin_label = captures.get(1).map(|m| m.as_str());
    let end_label = captures.get(3).map(|m| m.as_str());
    if begin_label != end_label {
        return Err(AuthError::pem_parse(
            PRIVATE_KEY_LABEL,
            pem,
            "BEGIN and END labels do not match",
        ));
    }

    let body = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
    let compact: Zeroizing<String> = Zeroizing::new(body.chars().filter(|c| !c.is_whitespace()).collect());

    let der = MIME_BASE64
        .decode(compact.as_bytes())
        .map(Zeroizing::new)
        .map_err(|e| AuthError::pem_parse(PRIVATE_KEY_LABEL, pem, format!("invalid base64 body: {}", e)))?;

    let key = PrivateKey::from_pkcs8_der(&der)
        .map_err(|e| AuthError::pem_parse(PRIVATE_KEY_LABEL, pem, e.to_string()))?;

    if key.algorithm() != KeyAlgorithm::Rsa {
        return Err(AuthError::pem_parse(
            PRIVATE_KEY_LABEL,
            pem,
            format!("expected an RSA key, found {}", key.algorithm()),
        ));
    }

    Ok(key)
}
