//! Rate limiter error types.

use crate::{ProviderError, QueueError};

/// Rate limiter error conditions.
///
/// Transient provider failures never show up here while retries remain; only
/// permanent failures, exhausted retries, queue failures and rejected
/// configuration reach the caller.
#[derive(Debug, Clone, derive_more::Display)]
pub enum RateLimitErrorKind {
    /// The provider rejected the request permanently (bad request, auth, not found)
    #[display("{} request failed permanently: {}", provider, error)]
    Permanent {
        /// Provider name
        provider: String,
        /// The provider's error, message intact
        error: ProviderError,
    },
    /// Every allowed attempt failed with a transient error
    #[display("{} request failed after {} attempts: {}", provider, attempts, error)]
    RetriesExhausted {
        /// Provider name
        provider: String,
        /// Attempts made, including the first
        attempts: u32,
        /// The last error observed
        error: ProviderError,
    },
    /// The request queue failed while deferring or draining
    #[display("{}", _0)]
    Queue(QueueError),
    /// A retry configuration failed validation
    #[display("Invalid retry configuration: {}", _0)]
    InvalidConfig(String),
}

impl RateLimitErrorKind {
    /// The provider error behind this failure, if there is one.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            RateLimitErrorKind::Permanent { error, .. }
            | RateLimitErrorKind::RetriesExhausted { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Rate limiter error with source location tracking.
///
/// # Examples
///
/// ```
/// use minutes_error::{ProviderError, RateLimitError, RateLimitErrorKind};
///
/// let err = RateLimitError::new(RateLimitErrorKind::Permanent {
///     provider: "openai".to_string(),
///     error: ProviderError::with_status(401, "Incorrect API key provided"),
/// });
/// assert!(format!("{}", err).contains("Incorrect API key"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Rate Limit Error: {} at line {} in {}", kind, line, file)]
pub struct RateLimitError {
    /// The kind of error that occurred
    pub kind: RateLimitErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl RateLimitError {
    /// Create a new RateLimitError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RateLimitErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl From<QueueError> for RateLimitError {
    #[track_caller]
    fn from(err: QueueError) -> Self {
        RateLimitError::new(RateLimitErrorKind::Queue(err))
    }
}
