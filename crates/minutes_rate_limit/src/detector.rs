//! Quota updates parsed from provider response headers.
//!
//! Each provider reports its limits differently:
//!
//! OpenAI:
//! - `x-ratelimit-limit-requests` / `x-ratelimit-limit-tokens`
//! - `x-ratelimit-remaining-requests` / `x-ratelimit-remaining-tokens`
//! - `x-ratelimit-reset-requests` / `x-ratelimit-reset-tokens`, as
//!   durations such as `6m0s`, `20ms` or `1.5s`
//!
//! Anthropic:
//! - `anthropic-ratelimit-{requests,tokens}-{limit,remaining}`
//! - `anthropic-ratelimit-{requests,tokens}-reset`, an RFC 3339 timestamp
//! - `retry-after`, in seconds
//!
//! Missing or malformed headers are skipped. Parsing never fails.

use chrono::{DateTime, Utc};
use minutes_core::{Provider, QuotaUpdate};
use reqwest::header::HeaderMap;
use tracing::{debug, instrument};

/// Parses provider rate-limit headers into [`QuotaUpdate`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderRateLimitDetector;

impl HeaderRateLimitDetector {
    /// Parse the headers of a response from `provider`.
    #[instrument(skip(headers), fields(header_count = headers.len()))]
    pub fn detect(provider: Provider, headers: &HeaderMap, now: DateTime<Utc>) -> QuotaUpdate {
        let update = match provider {
            Provider::OpenAi => Self::detect_openai(headers, now),
            Provider::Anthropic => Self::detect_anthropic(headers, now),
        };
        debug!(?update, "Parsed rate limit headers");
        update
    }

    /// Parse OpenAI `x-ratelimit-*` headers.
    pub fn detect_openai(headers: &HeaderMap, now: DateTime<Utc>) -> QuotaUpdate {
        QuotaUpdate {
            requests_limit: parse_header_u64(headers, "x-ratelimit-limit-requests"),
            requests_remaining: parse_header_u64(headers, "x-ratelimit-remaining-requests"),
            requests_reset_at: header_str(headers, "x-ratelimit-reset-requests")
                .and_then(|v| parse_reset(v, now)),
            tokens_limit: parse_header_u64(headers, "x-ratelimit-limit-tokens"),
            tokens_remaining: parse_header_u64(headers, "x-ratelimit-remaining-tokens"),
            tokens_reset_at: header_str(headers, "x-ratelimit-reset-tokens")
                .and_then(|v| parse_reset(v, now)),
            retry_after: parse_retry_after(headers),
        }
    }

    /// Parse Anthropic `anthropic-ratelimit-*` and `retry-after` headers.
    pub fn detect_anthropic(headers: &HeaderMap, now: DateTime<Utc>) -> QuotaUpdate {
        QuotaUpdate {
            requests_limit: parse_header_u64(headers, "anthropic-ratelimit-requests-limit"),
            requests_remaining: parse_header_u64(headers, "anthropic-ratelimit-requests-remaining"),
            requests_reset_at: header_str(headers, "anthropic-ratelimit-requests-reset")
                .and_then(|v| parse_reset(v, now)),
            tokens_limit: parse_header_u64(headers, "anthropic-ratelimit-tokens-limit"),
            tokens_remaining: parse_header_u64(headers, "anthropic-ratelimit-tokens-remaining"),
            tokens_reset_at: header_str(headers, "anthropic-ratelimit-tokens-reset")
                .and_then(|v| parse_reset(v, now)),
            retry_after: parse_retry_after(headers),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, key: &str) -> Option<&'a str> {
    headers.get(key)?.to_str().ok().map(str::trim)
}

fn parse_header_u64(headers: &HeaderMap, key: &str) -> Option<u64> {
    header_str(headers, key)?.parse().ok()
}

fn parse_retry_after(headers: &HeaderMap) -> Option<f64> {
    header_str(headers, "retry-after")?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Longest relative reset we accept, in seconds (about ten years).
const MAX_RESET_SECS: f64 = 315_360_000.0;

/// Interpret a reset header as an absolute instant.
///
/// Accepts RFC 3339 timestamps, bare seconds (`"12"`, `"0.5"`) and
/// Go-style durations (`"6m0s"`, `"1h2m3.5s"`, `"20ms"`). Values that would
/// land more than about ten years past `now` are treated as malformed.
pub fn parse_reset(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    let seconds = match value.parse::<f64>() {
        Ok(v) => v,
        Err(_) => parse_go_duration(value)?,
    };
    if !seconds.is_finite() || !(0.0..=MAX_RESET_SECS).contains(&seconds) {
        return None;
    }
    let millis = (seconds * 1000.0).round() as i64;
    now.checked_add_signed(chrono::Duration::try_milliseconds(millis)?)
}

/// Parse a Go `time.Duration` string into seconds.
///
/// Supported units: `h`, `m`, `s`, `ms`, `us`/`µs`, `ns`.
pub fn parse_go_duration(value: &str) -> Option<f64> {
    let mut rest = value.trim();
    if rest.is_empty() {
        return None;
    }
    let mut total = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let number: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let factor = match &rest[..unit_len] {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 1e-3,
            "us" | "µs" => 1e-6,
            "ns" => 1e-9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += number * factor;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_durations() {
        assert_eq!(parse_go_duration("6m0s"), Some(360.0));
        assert_eq!(parse_go_duration("1h2m3s"), Some(3723.0));
        assert_eq!(parse_go_duration("1.5s"), Some(1.5));
        let ms = parse_go_duration("20ms").unwrap();
        assert!((ms - 0.02).abs() < 1e-9);
        assert_eq!(parse_go_duration(""), None);
        assert_eq!(parse_go_duration("5x"), None);
        assert_eq!(parse_go_duration("s"), None);
    }

    #[test]
    fn reset_accepts_seconds_and_timestamps() {
        let now = Utc::now();
        assert_eq!(
            parse_reset("12", now),
            Some(now + chrono::Duration::seconds(12))
        );
        let stamp = "2026-01-01T00:00:00Z";
        assert_eq!(
            parse_reset(stamp, now).map(|t| t.to_rfc3339()),
            Some(String::from("2026-01-01T00:00:00+00:00"))
        );
        assert_eq!(parse_reset("soon", now), None);
        assert_eq!(parse_reset("-3", now), None);
    }

    #[test]
    fn reset_rejects_out_of_range_values() {
        let now = Utc::now();
        assert_eq!(parse_reset("1e15", now), None);
        assert_eq!(parse_reset("99999999999999h", now), None);
        assert_eq!(parse_reset("inf", now), None);
        assert_eq!(parse_reset("NaN", now), None);
        assert!(parse_reset("86400", now).is_some());
    }

    #[test]
    fn huge_reset_headers_are_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-reset-requests", "99999999999999h".parse().unwrap());
        headers.insert("x-ratelimit-reset-tokens", "1e15".parse().unwrap());
        headers.insert("x-ratelimit-remaining-requests", "7".parse().unwrap());

        let update = HeaderRateLimitDetector::detect(Provider::OpenAi, &headers, Utc::now());
        assert_eq!(update.requests_reset_at, None);
        assert_eq!(update.tokens_reset_at, None);
        assert_eq!(update.requests_remaining, Some(7));
    }
}
