//! Errors returned by LLM provider calls.

/// A failed call to an LLM provider.
///
/// Providers are characterised only by what they send back: an optional
/// HTTP status code, a message, and an optional `retry-after` hint. The rate
/// limiter classifies the failure from these fields alone.
///
/// # Examples
///
/// ```
/// use minutes_error::ProviderError;
///
/// let err = ProviderError::with_status(429, "Too Many Requests").retry_after(12.0);
/// assert_eq!(err.status_code, Some(429));
/// assert_eq!(err.retry_after_secs, Some(12.0));
/// ```
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
#[display("Provider Error: {} at line {} in {}", message, line, file)]
pub struct ProviderError {
    /// HTTP status code, when the failure came from an HTTP response
    pub status_code: Option<u16>,
    /// Error message as reported by the provider or transport
    pub message: String,
    /// Seconds the provider asked us to wait before retrying
    pub retry_after_secs: Option<f64>,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ProviderError {
    /// Create an error without a status code (transport or SDK failure).
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            status_code: None,
            message: message.into(),
            retry_after_secs: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Create an error carrying an HTTP status code.
    #[track_caller]
    pub fn with_status(status_code: u16, message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            status_code: Some(status_code),
            message: message.into(),
            retry_after_secs: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Attach a `retry-after` hint in seconds.
    pub fn retry_after(mut self, secs: f64) -> Self {
        if secs.is_finite() && secs >= 0.0 {
            self.retry_after_secs = Some(secs);
        }
        self
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ProviderError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ProviderError::with_status(status.as_u16(), err.to_string()),
            None => ProviderError::new(err.to_string()),
        }
    }
}
