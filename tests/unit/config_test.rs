//! Tests for configuration loading and validation

use std::fs;

use queuectl::config::{QueueConfig, QueuePaths};

#[test]
fn test_default_config_validation() {
    let cfg = QueueConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.max_retries, 3);
    assert_eq!(cfg.job_timeout_secs, 30);
}

#[test]
fn test_invalid_backoff_base() {
    let cfg = QueueConfig {
        backoff_base: 0.0,
        ..QueueConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_poll_interval() {
    let cfg = QueueConfig {
        poll_interval_ms: 0,
        ..QueueConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_log_level() {
    let cfg = QueueConfig {
        log_level: "loud".into(),
        ..QueueConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "max_retries": 5,
        "backoff_base": 3.0,
        "job_timeout_secs": 0
    }"#;
    let cfg = QueueConfig::from_json_str(json).expect("parse config");
    assert_eq!(cfg.max_retries, 5);
    assert_eq!(cfg.job_timeout(), None);
    assert_eq!(cfg.stop_grace_secs, 10);
}

#[test]
fn test_missing_file_is_created_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let paths = QueuePaths::new(dir.path().join("home"));
    let cfg = QueueConfig::load_or_create(&paths.config()).unwrap();
    assert_eq!(cfg, QueueConfig::default());
    assert!(paths.config().exists());

    let reloaded = QueueConfig::load_or_create(&paths.config()).unwrap();
    assert_eq!(reloaded, cfg);
}

#[test]
fn test_corrupt_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ definitely not json").unwrap();
    let cfg = QueueConfig::load_or_create(&path).unwrap();
    assert_eq!(cfg, QueueConfig::default());
}

#[test]
fn test_set_and_save_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let mut cfg = QueueConfig::load_or_create(&path).unwrap();
    cfg.set("max_retries", "8").unwrap();
    cfg.save(&path).unwrap();

    let reloaded = QueueConfig::load_or_create(&path).unwrap();
    assert_eq!(reloaded.get("max_retries").as_deref(), Some("8"));
    assert!(reloaded.get("unknown").is_none());
}
