//! Configuration error types.

use std::fmt;

/// A configuration file, environment override or setting that was rejected.
///
/// `key` names the offending setting when one can be singled out, such as
/// `max_delay` or `RATE_LIMIT_BASE_DELAY`.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error)]
pub struct ConfigError {
    /// What was wrong
    pub message: String,
    /// Setting the error is about, if any
    pub key: Option<String>,
    /// Line number where the error was raised
    pub line: u32,
    /// File where the error was raised
    pub file: &'static str,
}

impl ConfigError {
    /// An error not tied to a single setting.
    ///
    /// # Examples
    ///
    /// ```
    /// use minutes_error::ConfigError;
    ///
    /// let err = ConfigError::new("failed to read minutes.toml");
    /// assert!(err.key.is_none());
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            key: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// An error about one setting.
    ///
    /// # Examples
    ///
    /// ```
    /// use minutes_error::ConfigError;
    ///
    /// let err = ConfigError::for_key("max_delay", "must be >= base_delay");
    /// assert_eq!(err.key.as_deref(), Some("max_delay"));
    /// assert!(err.to_string().starts_with("Configuration Error: max_delay: must be"));
    /// ```
    #[track_caller]
    pub fn for_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new(message);
        err.key = Some(key.into());
        err
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration Error: ")?;
        if let Some(key) = &self.key {
            write!(f, "{}: ", key)?;
        }
        write!(f, "{} at line {} in {}", self.message, self.line, self.file)
    }
}
