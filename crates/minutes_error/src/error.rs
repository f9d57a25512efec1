//! Top-level error wrapper types.

use crate::{ConfigError, IoError, JsonError, ProviderError, QueueError, RateLimitError};

/// Every error condition the Minutes crates can report.
///
/// # Examples
///
/// ```
/// use minutes_error::{MinutesError, ConfigError};
///
/// let err: MinutesError = ConfigError::new("base_delay must be positive").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum MinutesErrorKind {
    /// Provider call failed
    #[from(ProviderError)]
    Provider(ProviderError),
    /// Request queue failed
    #[from(QueueError)]
    Queue(QueueError),
    /// Rate limiter gave up or rejected input
    #[from(RateLimitError)]
    RateLimit(RateLimitError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
    /// Filesystem error
    #[from(IoError)]
    Io(IoError),
}

/// Minutes error with kind discrimination.
///
/// # Examples
///
/// ```
/// use minutes_error::{MinutesResult, QueueError, QueueErrorKind};
///
/// fn enqueue() -> MinutesResult<()> {
///     Err(QueueError::new(QueueErrorKind::Full(1000)))?
/// }
///
/// assert!(enqueue().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Minutes Error: {}", _0)]
pub struct MinutesError(Box<MinutesErrorKind>);

impl MinutesError {
    /// Create a new error from a kind.
    pub fn new(kind: MinutesErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &MinutesErrorKind {
        &self.0
    }
}

impl<T> From<T> for MinutesError
where
    T: Into<MinutesErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Minutes operations.
pub type MinutesResult<T> = std::result::Result<T, MinutesError>;
