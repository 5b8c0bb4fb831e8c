//! Unit tests for engine configuration

use crate::common::TestFixture;
use histdiff::config::{load_config, EngineConfig, CHANNEL_CAPACITY_ENV, POLL_INTERVAL_ENV};
use histdiff::{HistDiffError, DEFAULT_CHANNEL_CAPACITY, DEFAULT_POLL_INTERVAL_MS};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| vars.get(name).cloned()
}

#[test]
fn test_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    assert_eq!(config.poll_interval(), Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_file_keeps_defaults() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture
        .create_json("engine.json", &json!({ "channel_capacity": 16 }))
        .unwrap();

    let config = EngineConfig::from_file(&path).unwrap();
    assert_eq!(config.channel_capacity, 16);
    assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
}

#[test]
fn test_malformed_file_is_an_error() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture.create_raw("engine.json", "{ channel_capacity: ").unwrap();
    assert!(matches!(EngineConfig::from_file(&path), Err(HistDiffError::Json(_))));
}

#[test]
fn test_missing_file_is_a_config_error() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture.root().join("absent.json");
    assert!(matches!(EngineConfig::from_file(&path), Err(HistDiffError::Config { .. })));
}

#[test]
fn test_overrides_take_precedence() {
    let config = EngineConfig::default()
        .with_overrides_from(lookup(&[(CHANNEL_CAPACITY_ENV, " 8 "), (POLL_INTERVAL_ENV, "20")]))
        .unwrap();
    assert_eq!(config.channel_capacity, 8);
    assert_eq!(config.poll_interval_ms, 20);
}

#[test]
fn test_invalid_override_is_rejected() {
    let result = EngineConfig::default().with_overrides_from(lookup(&[(CHANNEL_CAPACITY_ENV, "many")]));
    match result {
        Err(HistDiffError::Config { message }) => assert!(message.contains(CHANNEL_CAPACITY_ENV)),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_zero_values_fail_validation() {
    let zero_capacity = EngineConfig {
        channel_capacity: 0,
        ..EngineConfig::default()
    };
    assert!(zero_capacity.validate().is_err());

    let zero_poll = EngineConfig {
        poll_interval_ms: 0,
        ..EngineConfig::default()
    };
    assert!(zero_poll.validate().is_err());
}

#[test]
fn test_load_config_validates_file() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture
        .create_json("engine.json", &json!({ "channel_capacity": 0 }))
        .unwrap();
    assert!(matches!(load_config(Some(path.as_path())), Err(HistDiffError::Config { .. })));
}
