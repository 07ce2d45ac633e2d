//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use chrono::{Datelike, NaiveDate};
use rand::rngs::OsRng;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use std::collections::HashMap;

pub struct Identity {
    pub key_pem: String,
    pub cert_pem: String,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// RSA 2048 key and a self-signed certificate valid until midnight UTC of `not_after`.
pub fn rsa_identity(common_name: &str, not_after: NaiveDate) -> Identity {
    let key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let key_pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();

    let key_pair = KeyPair::from_pem(&key_pem).unwrap();
    let cert_pem = certificate_params(common_name, not_after)
        .self_signed(&key_pair)
        .unwrap()
        .pem();

    Identity { key_pem, cert_pem }
}

/// Self-signed trust anchor with its own EC key.
pub fn ca_cert_pem(common_name: &str) -> String {
    let key_pair = KeyPair::generate().unwrap();
    let mut params = certificate_params(common_name, NaiveDate::from_ymd_opt(2035, 1, 1).unwrap());
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    params.self_signed(&key_pair).unwrap().pem()
}

fn certificate_params(common_name: &str, not_after: NaiveDate) -> CertificateParams {
    let mut params = CertificateParams::new(vec![format!("{}.example.com", common_name)]).unwrap();
    let mut subject = DistinguishedName::new();
    subject.push(DnType::CommonName, common_name);
    params.distinguished_name = subject;
    params.not_after = rcgen::date_time_ymd(not_after.year(), not_after.month() as u8, not_after.day() as u8);
    params
}

pub fn properties(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
