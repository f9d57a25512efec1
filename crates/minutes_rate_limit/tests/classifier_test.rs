//! Tests for provider error classification.

use minutes_error::ProviderError;
use minutes_rate_limit::{ErrorKind, classify, classify_error};

#[test]
fn test_status_code_takes_priority_over_message() {
    for message in ["", "invalid request", "quota exceeded", "connection reset"] {
        assert_eq!(classify(Some(429), message), ErrorKind::RateLimited);
        for code in [500, 502, 503, 504] {
            assert_eq!(classify(Some(code), message), ErrorKind::ServerError);
        }
    }
    for code in [400, 401, 403, 404] {
        assert_eq!(classify(Some(code), "rate limit exceeded"), ErrorKind::ClientError);
        assert_eq!(classify(Some(code), "insufficient_quota"), ErrorKind::ClientError);
    }
}

#[test]
fn test_message_only_quota_detection() {
    assert_eq!(classify(None, "Quota Exceeded"), ErrorKind::QuotaExceeded);
    assert_eq!(classify(None, "QUOTA EXCEEDED for project"), ErrorKind::QuotaExceeded);
    assert_eq!(
        classify(None, "You exceeded your current quota (insufficient_quota)"),
        ErrorKind::QuotaExceeded
    );
    assert_eq!(classify(None, "Check your billing details"), ErrorKind::QuotaExceeded);
}

#[test]
fn test_message_rules_apply_in_order() {
    // Rate limit markers win over quota markers.
    assert_eq!(
        classify(None, "rate limit reached, quota exceeded"),
        ErrorKind::RateLimited
    );
    assert_eq!(classify(None, "Too Many Requests"), ErrorKind::RateLimited);
    assert_eq!(classify(None, "HTTP 429"), ErrorKind::RateLimited);
    assert_eq!(classify(None, "Internal Server Error"), ErrorKind::ServerError);
    assert_eq!(classify(None, "502 Bad Gateway"), ErrorKind::ServerError);
    assert_eq!(classify(None, "Service Unavailable"), ErrorKind::ServerError);
    assert_eq!(classify(None, "connection refused"), ErrorKind::ConnectionError);
    assert_eq!(classify(None, "request timeout"), ErrorKind::ConnectionError);
    assert_eq!(classify(None, "Invalid API key"), ErrorKind::ClientError);
    assert_eq!(classify(None, "Unauthorized"), ErrorKind::ClientError);
    assert_eq!(classify(None, "the model went for a walk"), ErrorKind::Unknown);
}

#[test]
fn test_unrecognised_status_falls_back_to_message() {
    assert_eq!(classify(Some(418), "teapot"), ErrorKind::Unknown);
    assert_eq!(classify(Some(529), "overloaded: service unavailable"), ErrorKind::ServerError);
}

#[test]
fn test_only_client_errors_are_permanent() {
    assert!(ErrorKind::ClientError.is_permanent());
    assert!(!ErrorKind::ClientError.is_retryable());
    for kind in [
        ErrorKind::RateLimited,
        ErrorKind::QuotaExceeded,
        ErrorKind::ServerError,
        ErrorKind::ConnectionError,
        ErrorKind::Unknown,
    ] {
        assert!(kind.is_retryable(), "{kind} should be retryable");
    }
}

#[test]
fn test_classify_provider_error() {
    let err = ProviderError::with_status(503, "upstream down");
    assert_eq!(classify_error(&err), ErrorKind::ServerError);
    let err = ProviderError::new("network unreachable");
    assert_eq!(classify_error(&err), ErrorKind::ConnectionError);
}
