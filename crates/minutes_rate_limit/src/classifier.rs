//! Classification of provider failures.
//!
//! Providers report failures in many shapes: HTTP statuses, SDK exceptions,
//! bare transport errors. Every failure is reduced to an [`ErrorKind`] from its
//! status code (when there is one) and its message text.

use minutes_error::ProviderError;
use serde::{Deserialize, Serialize};

/// Normalised failure category driving retry decisions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Too many requests in the current window
    #[display("rate_limited")]
    RateLimited,
    /// Account quota or billing limit reached
    #[display("quota_exceeded")]
    QuotaExceeded,
    /// Provider-side failure (5xx)
    #[display("server_error")]
    ServerError,
    /// Network, DNS or timeout failure
    #[display("connection_error")]
    ConnectionError,
    /// The request itself is wrong; retrying cannot help
    #[display("client_error")]
    ClientError,
    /// Anything unrecognised, treated as transient
    #[display("unknown")]
    Unknown,
}

impl ErrorKind {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        !self.is_permanent()
    }

    /// Whether the failure is final.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ErrorKind::ClientError)
    }
}

const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "too many requests", "429"];
const QUOTA_MARKERS: &[&str] = &["quota exceeded", "insufficient_quota", "billing"];
const SERVER_MARKERS: &[&str] = &[
    "500",
    "502",
    "503",
    "504",
    "internal server",
    "bad gateway",
    "service unavailable",
];
const CONNECTION_MARKERS: &[&str] = &["connection", "timeout", "network"];
const CLIENT_MARKERS: &[&str] = &[
    "400",
    "401",
    "403",
    "404",
    "invalid",
    "unauthorized",
    "forbidden",
];

/// Classify a failure from its status code and message.
///
/// A recognised status code always wins over message text. Without one,
/// message substrings are matched case-insensitively in a fixed order:
/// rate limit, quota, server, connection, client.
///
/// # Examples
///
/// ```
/// use minutes_rate_limit::{classify, ErrorKind};
///
/// assert_eq!(classify(Some(429), "whatever"), ErrorKind::RateLimited);
/// assert_eq!(classify(Some(400), "rate limit reached"), ErrorKind::ClientError);
/// assert_eq!(classify(None, "You exceeded your current quota: Quota Exceeded"), ErrorKind::QuotaExceeded);
/// assert_eq!(classify(None, "something odd"), ErrorKind::Unknown);
/// ```
pub fn classify(status_code: Option<u16>, message: &str) -> ErrorKind {
    match status_code {
        Some(429) => return ErrorKind::RateLimited,
        Some(500 | 502 | 503 | 504) => return ErrorKind::ServerError,
        Some(400 | 401 | 403 | 404) => return ErrorKind::ClientError,
        _ => {}
    }

    let message = message.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| message.contains(m));

    if contains_any(RATE_LIMIT_MARKERS) {
        ErrorKind::RateLimited
    } else if contains_any(QUOTA_MARKERS) {
        ErrorKind::QuotaExceeded
    } else if contains_any(SERVER_MARKERS) {
        ErrorKind::ServerError
    } else if contains_any(CONNECTION_MARKERS) {
        ErrorKind::ConnectionError
    } else if contains_any(CLIENT_MARKERS) {
        ErrorKind::ClientError
    } else {
        ErrorKind::Unknown
    }
}

/// Classify a [`ProviderError`].
pub fn classify_error(error: &ProviderError) -> ErrorKind {
    classify(error.status_code, &error.message)
}
