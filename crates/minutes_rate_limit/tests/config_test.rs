//! Tests for configuration loading and validation.

use minutes_rate_limit::{MinutesConfig, RetryConfig};
use std::io::Write;
use tempfile::Builder;

#[test]
fn test_bundled_defaults() {
    let config = MinutesConfig::bundled().unwrap();
    assert_eq!(config.retry, RetryConfig::default());
    assert_eq!(config.queue.max_size, 1000);
    assert_eq!(config.queue.claim_timeout_secs, 300);
    assert_eq!(config.worker.batch_size, 10);
}

#[test]
fn test_default_retry_config_is_valid() {
    let config = RetryConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.max_attempts(), 6);
    assert!(config.defers_quota());
}

#[test]
fn test_validation_rejects_out_of_range_fields() {
    let cases = [
        RetryConfig {
            max_retries: 21,
            ..Default::default()
        },
        RetryConfig {
            base_delay: 0.0,
            ..Default::default()
        },
        RetryConfig {
            base_delay: 5.0,
            max_delay: 2.0,
            ..Default::default()
        },
        RetryConfig {
            exponential_base: 1.0,
            ..Default::default()
        },
        RetryConfig {
            jitter_max: 1.5,
            ..Default::default()
        },
        RetryConfig {
            rate_limit_delay: 0.5,
            ..Default::default()
        },
        RetryConfig {
            quota_exceeded_delay: 30.0,
            ..Default::default()
        },
        RetryConfig {
            base_delay: f64::NAN,
            ..Default::default()
        },
    ];
    for config in cases {
        assert!(config.validate().is_err(), "{config:?} should be rejected");
    }
}

#[test]
fn test_validation_names_the_offending_key() {
    let err = RetryConfig {
        base_delay: 5.0,
        max_delay: 2.0,
        ..Default::default()
    }
    .validate()
    .unwrap_err();
    assert_eq!(err.key.as_deref(), Some("max_delay"));

    let err = RetryConfig {
        jitter_max: 1.5,
        ..Default::default()
    }
    .validate()
    .unwrap_err();
    assert_eq!(err.key.as_deref(), Some("jitter_max"));
    assert!(err.message.contains("1.5"));
}

#[test]
fn test_defers_quota_threshold() {
    let short_quota = RetryConfig {
        quota_exceeded_delay: 60.0,
        rate_limit_delay: 120.0,
        ..Default::default()
    };
    assert!(!short_quota.defers_quota());

    let equal = RetryConfig {
        quota_exceeded_delay: 120.0,
        rate_limit_delay: 120.0,
        ..Default::default()
    };
    assert!(equal.defers_quota());
}

#[test]
fn test_config_from_file_merges_with_defaults() {
    let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        temp_file,
        r#"
[retry]
max_retries = 3
base_delay = 0.5

[queue]
database_url = "/tmp/queue.db"
"#
    )
    .unwrap();

    let config = MinutesConfig::from_file(temp_file.path()).unwrap();
    assert_eq!(config.retry.max_retries, 3);
    assert_eq!(config.retry.base_delay, 0.5);
    assert_eq!(config.retry.max_delay, 60.0);
    assert_eq!(config.queue.database_url, "/tmp/queue.db");
    assert_eq!(config.queue.max_size, 1000);
    assert_eq!(config.worker.interval_secs, 30);
}

#[test]
fn test_config_from_file_rejects_invalid_retry() {
    let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(temp_file, "[retry]\nmax_retries = 50").unwrap();
    assert!(MinutesConfig::from_file(temp_file.path()).is_err());
}

#[test]
fn test_save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("minutes.toml");

    let mut config = MinutesConfig::default();
    config.retry.max_retries = 2;
    config.retry.jitter = false;
    config.worker.batch_size = 4;
    config.save(&path).unwrap();

    let loaded = MinutesConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
}
