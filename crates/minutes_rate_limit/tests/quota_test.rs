//! Tests for quota tracking and header parsing.

use chrono::{Duration, Utc};
use minutes_core::Provider;
use minutes_rate_limit::{AlertLevel, QuotaTracker, RemainingFraction};
use reqwest::header::{HeaderMap, HeaderValue};

fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(*name, HeaderValue::from_str(value).unwrap());
    }
    map
}

fn openai_requests(remaining: u64, limit: u64) -> HeaderMap {
    headers(&[
        ("x-ratelimit-limit-requests", &limit.to_string()),
        ("x-ratelimit-remaining-requests", &remaining.to_string()),
    ])
}

#[tokio::test]
async fn test_openai_headers_populate_state() {
    let tracker = QuotaTracker::new();
    let before = Utc::now();
    let state = tracker
        .record_headers(
            Provider::OpenAi,
            &headers(&[
                ("x-ratelimit-limit-requests", "500"),
                ("x-ratelimit-remaining-requests", "499"),
                ("x-ratelimit-reset-requests", "120ms"),
                ("x-ratelimit-limit-tokens", "200000"),
                ("x-ratelimit-remaining-tokens", "150000"),
                ("x-ratelimit-reset-tokens", "6m0s"),
            ]),
        )
        .await;

    assert_eq!(state.requests_limit, Some(500));
    assert_eq!(state.requests_remaining, Some(499));
    assert_eq!(state.tokens_limit, Some(200_000));
    assert_eq!(state.tokens_remaining, Some(150_000));
    let tokens_reset = state.tokens_reset_at.unwrap();
    assert!(tokens_reset >= before + Duration::seconds(360));
    assert!(tokens_reset <= Utc::now() + Duration::seconds(360));
    assert!(state.requests_reset_at.is_some());
}

#[tokio::test]
async fn test_anthropic_headers_populate_state() {
    let tracker = QuotaTracker::new();
    let state = tracker
        .record_headers(
            Provider::Anthropic,
            &headers(&[
                ("anthropic-ratelimit-requests-limit", "50"),
                ("anthropic-ratelimit-requests-remaining", "20"),
                ("anthropic-ratelimit-requests-reset", "2026-10-16T12:00:00Z"),
                ("anthropic-ratelimit-tokens-limit", "40000"),
                ("anthropic-ratelimit-tokens-remaining", "39000"),
                ("retry-after", "17"),
            ]),
        )
        .await;

    assert_eq!(state.requests_limit, Some(50));
    assert_eq!(state.requests_remaining, Some(20));
    assert_eq!(
        state.requests_reset_at.map(|t| t.to_rfc3339()),
        Some(String::from("2026-10-16T12:00:00+00:00"))
    );
    assert_eq!(state.tokens_limit, Some(40_000));
    assert_eq!(state.retry_after, Some(17.0));
}

#[tokio::test]
async fn test_malformed_headers_leave_fields_untouched() {
    let tracker = QuotaTracker::new();
    tracker
        .record_headers(Provider::OpenAi, &openai_requests(80, 100))
        .await;

    let state = tracker
        .record_headers(
            Provider::OpenAi,
            &headers(&[
                ("x-ratelimit-limit-requests", "lots"),
                ("x-ratelimit-remaining-requests", "-4"),
                ("x-ratelimit-remaining-tokens", "1000"),
            ]),
        )
        .await;

    assert_eq!(state.requests_limit, Some(100));
    assert_eq!(state.requests_remaining, Some(80));
    assert_eq!(state.tokens_remaining, Some(1000));
}

#[tokio::test]
async fn test_other_provider_headers_are_ignored() {
    let tracker = QuotaTracker::new();
    let state = tracker
        .record_headers(Provider::Anthropic, &openai_requests(1, 10))
        .await;
    assert_eq!(state.requests_limit, None);
    assert_eq!(state.updated_at, None);
}

#[tokio::test]
async fn test_remaining_fraction_banding() {
    let tracker = QuotaTracker::new();
    let cases = [
        (97, AlertLevel::Nominal),
        (35, AlertLevel::Warning),
        (10, AlertLevel::Critical),
    ];
    for (remaining, expected) in cases {
        tracker
            .record_headers(Provider::OpenAi, &openai_requests(remaining, 100))
            .await;
        let fraction = tracker.remaining_fraction(Provider::OpenAi).await;
        assert_eq!(fraction.requests, Some(remaining as f64 / 100.0));
        assert_eq!(fraction.tokens, None);
        assert_eq!(tracker.alert_level(Provider::OpenAi).await, Some(expected));
    }
}

#[test]
fn test_band_boundaries() {
    assert_eq!(AlertLevel::from_fraction(0.51), AlertLevel::Nominal);
    assert_eq!(AlertLevel::from_fraction(0.5), AlertLevel::Warning);
    assert_eq!(AlertLevel::from_fraction(0.2), AlertLevel::Warning);
    assert_eq!(AlertLevel::from_fraction(0.1999), AlertLevel::Critical);
    assert_eq!(AlertLevel::from_fraction(0.0), AlertLevel::Critical);
}

#[test]
fn test_worst_band_wins() {
    let fraction = RemainingFraction {
        requests: Some(0.9),
        tokens: Some(0.1),
    };
    assert_eq!(fraction.alert_level(), Some(AlertLevel::Critical));
    assert_eq!(RemainingFraction::default().alert_level(), None);
}

#[tokio::test]
async fn test_backoff_set_and_clear() {
    let tracker = QuotaTracker::new();
    assert!(!tracker.is_backed_off(Provider::OpenAi).await);

    let until = Utc::now() + Duration::seconds(600);
    tracker.set_backoff(Provider::OpenAi, until).await;
    assert!(tracker.is_backed_off(Provider::OpenAi).await);
    assert!(!tracker.is_backed_off(Provider::Anthropic).await);
    assert_eq!(tracker.backoff_until(Provider::OpenAi).await, Some(until));

    tracker.clear_backoff(Provider::OpenAi).await;
    assert!(!tracker.is_backed_off(Provider::OpenAi).await);
    assert_eq!(tracker.backoff_until(Provider::OpenAi).await, None);
}

#[tokio::test]
async fn test_expired_backoff_is_not_active() {
    let tracker = QuotaTracker::new();
    tracker
        .set_backoff(Provider::Anthropic, Utc::now() - Duration::seconds(1))
        .await;
    assert!(!tracker.is_backed_off(Provider::Anthropic).await);
}

#[tokio::test]
async fn test_record_request_counts_last_minute() {
    let tracker = QuotaTracker::new();
    for _ in 0..3 {
        tracker.record_request(Provider::OpenAi).await;
    }
    let state = tracker.status(Provider::OpenAi).await;
    assert_eq!(state.requests_last_minute(Utc::now()), 3);
    assert_eq!(
        tracker.status(Provider::Anthropic).await.recent_requests.len(),
        0
    );
}

#[tokio::test]
async fn test_snapshot_covers_every_provider() {
    let tracker = QuotaTracker::new();
    let snapshot = tracker.snapshot_all().await;
    assert_eq!(
        snapshot.keys().copied().collect::<Vec<_>>(),
        Provider::all()
    );
}
