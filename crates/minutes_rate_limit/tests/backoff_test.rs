//! Tests for backoff delay computation.

use minutes_rate_limit::{ErrorKind, RetryConfig, add_jitter, base_delay_for, next_delay};
use std::time::Duration;

fn no_jitter() -> RetryConfig {
    RetryConfig {
        jitter: false,
        ..Default::default()
    }
}

#[test]
fn test_exponential_schedule_caps_at_max_delay() {
    let config = no_jitter();
    let delays: Vec<u64> = (1..=7)
        .map(|attempt| {
            next_delay(ErrorKind::ServerError, attempt, None, &config)
                .unwrap()
                .as_secs()
        })
        .collect();
    assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60]);
}

#[test]
fn test_connection_and_unknown_use_exponential_schedule() {
    let config = no_jitter();
    for kind in [ErrorKind::ConnectionError, ErrorKind::Unknown] {
        assert_eq!(
            base_delay_for(kind, 4, None, &config),
            Some(Duration::from_secs(8))
        );
    }
}

#[test]
fn test_flat_delays_for_rate_limit_and_quota() {
    let config = no_jitter();
    for attempt in [1, 3, 6] {
        assert_eq!(
            base_delay_for(ErrorKind::RateLimited, attempt, None, &config),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            base_delay_for(ErrorKind::QuotaExceeded, attempt, None, &config),
            Some(Duration::from_secs(3600))
        );
    }
}

#[test]
fn test_retry_after_raises_rate_limit_delay() {
    let config = no_jitter();
    assert_eq!(
        base_delay_for(ErrorKind::RateLimited, 1, Some(90.0), &config),
        Some(Duration::from_secs(90))
    );
    // A shorter hint never lowers the configured floor.
    assert_eq!(
        base_delay_for(ErrorKind::RateLimited, 1, Some(5.0), &config),
        Some(Duration::from_secs(60))
    );
}

#[test]
fn test_client_error_has_no_delay() {
    assert_eq!(next_delay(ErrorKind::ClientError, 1, None, &RetryConfig::default()), None);
}

#[test]
fn test_jitter_stays_within_spread() {
    let config = RetryConfig::default();
    for attempt in 1..=7 {
        let base = base_delay_for(ErrorKind::ServerError, attempt, None, &config).unwrap();
        for _ in 0..200 {
            let delay = next_delay(ErrorKind::ServerError, attempt, None, &config).unwrap();
            assert!(delay >= base);
            assert!(delay.as_secs_f64() <= base.as_secs_f64() * (1.0 + config.jitter_max) + 1e-6);
        }
    }
}

#[test]
fn test_jitter_never_undercuts_rate_limit_delay() {
    let config = RetryConfig::default();
    for _ in 0..200 {
        let delay = next_delay(ErrorKind::RateLimited, 1, None, &config).unwrap();
        assert!(delay >= Duration::from_secs_f64(config.rate_limit_delay));
    }
}

#[test]
fn test_jitter_disabled_is_identity() {
    let config = no_jitter();
    let delay = Duration::from_secs(10);
    assert_eq!(add_jitter(delay, &config, &mut rand::thread_rng()), delay);
}

#[test]
fn test_unbounded_retry_after_never_shortens_the_wait() {
    let config = no_jitter();
    assert_eq!(
        base_delay_for(ErrorKind::RateLimited, 1, Some(f64::INFINITY), &config),
        Some(Duration::from_secs(60))
    );
    assert_eq!(
        base_delay_for(ErrorKind::RateLimited, 1, Some(f64::NAN), &config),
        Some(Duration::from_secs(60))
    );
    // Finite but absurd hints saturate at one day instead of wrapping to zero.
    assert_eq!(
        base_delay_for(ErrorKind::RateLimited, 1, Some(1e300), &config),
        Some(Duration::from_secs(86_400))
    );
    let jittered = next_delay(ErrorKind::RateLimited, 1, Some(1e300), &RetryConfig::default()).unwrap();
    assert!(jittered >= Duration::from_secs(86_400));
}
