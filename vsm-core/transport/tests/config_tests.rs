//! 传输层配置测试

use std::time::Duration;
use vsm_transport::*;

#[test]
fn test_default_transport_config() {
    let config = TransportConfig::default();

    assert_eq!(config.trust_policy, TrustPolicy::AcceptInvalidCerts);
    assert_eq!(config.request_timeout, 120);
    assert_eq!(config.connect_timeout, 30);
    assert_eq!(config.health_handshake_timeout, 30);
    assert_eq!(config.vim_version, "6.7");
    assert!(config.negotiate_version);
}

#[test]
fn test_transport_config_durations() {
    let config = TransportConfig {
        request_timeout: 60,
        connect_timeout: 5,
        health_handshake_timeout: 45,
        ..Default::default()
    };

    assert_eq!(config.request_timeout(), Duration::from_secs(60));
    assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    assert_eq!(config.health_handshake_timeout(), Duration::from_secs(45));
}

#[test]
fn test_trust_policy() {
    assert!(TrustPolicy::AcceptInvalidCerts.accept_invalid_certs());
    assert!(!TrustPolicy::Verify.accept_invalid_certs());

    let config = TransportConfig::default().with_trust_policy(TrustPolicy::Verify);
    assert_eq!(config.trust_policy, TrustPolicy::Verify);
}

#[test]
fn test_deserialize_with_defaults() {
    let config: TransportConfig = serde_json::from_str(r#"{"trust_policy": "verify"}"#).unwrap();

    assert_eq!(config.trust_policy, TrustPolicy::Verify);
    assert_eq!(config.request_timeout, 120);
    assert_eq!(config.vim_version, "6.7");
    assert!(config.negotiate_version);
}

#[test]
fn test_deserialize_full_config() {
    let json = r#"{
        "trust_policy": "accept_invalid_certs",
        "request_timeout": 300,
        "connect_timeout": 10,
        "health_handshake_timeout": 60,
        "vim_version": "8.0.2.0",
        "negotiate_version": false
    }"#;
    let config: TransportConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.trust_policy, TrustPolicy::AcceptInvalidCerts);
    assert_eq!(config.request_timeout(), Duration::from_secs(300));
    assert_eq!(config.vim_version, "8.0.2.0");
    assert!(!config.negotiate_version);
}

#[test]
fn test_unknown_trust_policy_rejected() {
    let result: std::result::Result<TransportConfig, _> = serde_json::from_str(r#"{"trust_policy": "maybe"}"#);
    assert!(result.is_err());
}
