//! End-to-end client certificate configuration passes.

mod common;

use chrono::{NaiveDate, Utc};
use common::{ca_cert_pem, init_tracing, properties, rsa_identity, Identity};
use once_cell::sync::Lazy;
use rustmq_pem_auth::properties::*;
use rustmq_pem_auth::security::expiry::{ExpiryLevel, ExpiryMonitor, TaskScheduler, TokioScheduler};
use rustmq_pem_auth::security::store::KeyStoreFactory;
use rustmq_pem_auth::security::{CLIENT_KEY_ALIAS, INTERNAL_PASSWORD};
use rustmq_pem_auth::{
    build_authenticated_config, AuthError, ClientCertAuthConfig, ClientCertConfigurer, ClientProperties,
    FailurePolicy,
};
use std::sync::Arc;
use tokio::sync::mpsc;

static CLIENT: Lazy<Identity> =
    Lazy::new(|| rsa_identity("orders-service", NaiveDate::from_ymd_opt(2031, 3, 1).unwrap()));
static STRANGER: Lazy<Identity> =
    Lazy::new(|| rsa_identity("someone-else", NaiveDate::from_ymd_opt(2031, 3, 1).unwrap()));
static TRUST_BUNDLE: Lazy<String> = Lazy::new(|| format!("{}{}", ca_cert_pem("root-ca-1"), ca_cert_pem("root-ca-2")));

fn client_cert_properties(key: &str, cert: &str) -> std::collections::HashMap<String, String> {
    properties(&[
        (AUTHENTICATION_SCHEME, AUTHENTICATION_SCHEME_CLIENT_CERTIFICATE),
        (SSL_PRIVATE_KEY, key),
        (SSL_CLIENT_CERT, cert),
        (SSL_TRUST_CERT, TRUST_BUNDLE.as_str()),
        ("HOST", "tcps://broker.example.com:55443"),
    ])
}

fn policy(failure_policy: FailurePolicy) -> ClientCertAuthConfig {
    ClientCertAuthConfig {
        failure_policy,
        ..ClientCertAuthConfig::default()
    }
}

#[test]
fn test_matching_key_and_two_trust_anchors() {
    init_tracing();
    let api = client_cert_properties(&CLIENT.key_pem, &CLIENT.cert_pem);

    let client = build_authenticated_config(
        ClientProperties::from_api_properties(&api),
        &api,
        &ClientCertAuthConfig::default(),
        None,
    )
    .unwrap();

    let key_store = client.in_memory_key_store().unwrap();
    assert_eq!(key_store.aliases().collect::<Vec<_>>(), vec![CLIENT_KEY_ALIAS]);
    let password = client.get_string(SSL_KEY_STORE_PASSWORD).unwrap();
    assert_eq!(password, INTERNAL_PASSWORD);
    assert!(key_store.private_key(CLIENT_KEY_ALIAS, password).is_ok());

    let (chain, _key) = key_store.client_auth_material(CLIENT_KEY_ALIAS, password).unwrap();
    assert_eq!(chain.len(), 1);

    let trust_store = client.in_memory_trust_store().unwrap();
    assert_eq!(trust_store.aliases().collect::<Vec<_>>(), vec!["ts0", "ts1"]);
    assert!(trust_store.certificate("ts0").unwrap().subject().contains("root-ca-1"));
    assert!(trust_store.certificate("ts1").unwrap().subject().contains("root-ca-2"));
    assert_eq!(trust_store.root_cert_store().unwrap().len(), 2);

    // Unrelated properties pass through untouched
    assert_eq!(client.get_string("HOST"), Some("tcps://broker.example.com:55443"));
}

#[test]
fn test_mismatched_certificate_degrades_to_trust_store_only() {
    init_tracing();
    let api = client_cert_properties(&CLIENT.key_pem, &STRANGER.cert_pem);

    let client = ClientCertConfigurer::with_scheduler(policy(FailurePolicy::Degrade), None)
        .build_authenticated_config(ClientProperties::from_api_properties(&api), &api)
        .unwrap();

    assert!(client.in_memory_key_store().is_none());
    assert!(client.get_string(SSL_KEY_STORE_PASSWORD).is_none());
    assert_eq!(client.in_memory_trust_store().unwrap().len(), 2);
}

#[test]
fn test_mismatched_certificate_fails_fast() {
    init_tracing();
    let api = client_cert_properties(&CLIENT.key_pem, &STRANGER.cert_pem);

    let err = ClientCertConfigurer::with_scheduler(policy(FailurePolicy::FailFast), None)
        .build_authenticated_config(ClientProperties::new(), &api)
        .unwrap_err();

    assert_eq!(err.category(), "key_pair_mismatch");
    assert!(err.to_string().contains(SSL_IN_MEMORY_KEY_STORE));
    assert!(matches!(err, AuthError::Configuration { .. }));
}

#[test]
fn test_non_client_certificate_scheme_produces_nothing() {
    let mut api = client_cert_properties(&CLIENT.key_pem, &CLIENT.cert_pem);
    api.insert(AUTHENTICATION_SCHEME.to_string(), AUTHENTICATION_SCHEME_BASIC.to_string());

    let raw = ClientProperties::from_api_properties(&api);
    let client = ClientCertConfigurer::with_scheduler(policy(FailurePolicy::FailFast), None)
        .build_authenticated_config(raw, &api)
        .unwrap();

    assert!(client.in_memory_key_store().is_none());
    assert!(client.in_memory_trust_store().is_none());
    assert!(!client.contains(SSL_KEY_STORE_PASSWORD));

    api.remove(AUTHENTICATION_SCHEME);
    let client = build_authenticated_config(ClientProperties::new(), &api, &ClientCertAuthConfig::default(), None)
        .unwrap();
    assert!(client.in_memory_key_store().is_none());
}

#[test]
fn test_crlf_and_single_line_pem_properties() {
    let crlf_key = CLIENT.key_pem.replace('\n', "\r\n");
    let flattened_cert = CLIENT.cert_pem.replace('\n', " ");
    let api = client_cert_properties(&crlf_key, &flattened_cert);

    let client = ClientCertConfigurer::with_scheduler(policy(FailurePolicy::FailFast), None)
        .build_authenticated_config(ClientProperties::new(), &api)
        .unwrap();
    assert!(client.in_memory_key_store().is_some());
}

#[test]
fn test_blank_file_stores_are_reconciled() {
    let api = client_cert_properties(&CLIENT.key_pem, &CLIENT.cert_pem);
    let mut raw = ClientProperties::from_api_properties(&api);
    raw.set_property(SSL_KEY_STORE, "");
    raw.set_property(SSL_KEY_STORE_PASSWORD, "changeit");
    raw.set_property(SSL_PRIVATE_KEY_PASSWORD, "changeit");
    raw.set_property(SSL_PRIVATE_KEY_ALIAS, "client");
    raw.set_property(SSL_TRUST_STORE, "   ");
    raw.set_property(SSL_TRUST_STORE_PASSWORD, "changeit");
    assert!(raw.is_trust_store_configured());

    let client = ClientCertConfigurer::with_scheduler(policy(FailurePolicy::FailFast), None)
        .build_authenticated_config(raw, &api)
        .unwrap();

    assert_eq!(client.get_string(SSL_KEY_STORE), Some(""));
    assert_eq!(client.get_string(SSL_KEY_STORE_PASSWORD), Some(INTERNAL_PASSWORD));
    assert!(!client.contains(SSL_PRIVATE_KEY_PASSWORD));
    assert!(!client.contains(SSL_PRIVATE_KEY_ALIAS));

    assert_eq!(client.get_string(SSL_TRUST_STORE), Some(""));
    assert!(!client.contains(SSL_TRUST_STORE_PASSWORD));
    assert!(!client.is_trust_store_configured());
}

#[test]
fn test_key_store_without_key_pair_check() {
    let api = client_cert_properties(&CLIENT.key_pem, &STRANGER.cert_pem);
    let configurer = ClientCertConfigurer::new(
        KeyStoreFactory::without_key_pair_check(),
        policy(FailurePolicy::FailFast),
        ExpiryMonitor::new(None),
    );

    let client = configurer
        .build_authenticated_config(ClientProperties::new(), &api)
        .unwrap();
    assert!(client.in_memory_key_store().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_expiring_certificate_raises_error_at_next_check() {
    init_tracing();
    let expires = (Utc::now() + chrono::Duration::days(6)).date_naive();
    let identity = rsa_identity("short-lived", expires);
    let api = client_cert_properties(&identity.key_pem, &identity.cert_pem);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler: Arc<dyn TaskScheduler> = Arc::new(TokioScheduler::try_current().unwrap());
    let configurer = ClientCertConfigurer::new(
        KeyStoreFactory::default(),
        ClientCertAuthConfig::default(),
        ExpiryMonitor::new(Some(scheduler)).with_alert_sink(tx),
    );

    let client = configurer
        .build_authenticated_config(ClientProperties::new(), &api)
        .unwrap();
    assert!(client.in_memory_key_store().is_some());

    let alert = rx.recv().await.unwrap();
    assert_eq!(alert.level, ExpiryLevel::Error);
    assert_eq!(alert.days_remaining, 5);
}
