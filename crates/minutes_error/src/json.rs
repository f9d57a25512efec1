//! JSON error types.

use std::fmt;

/// A status report, payload or quota record that could not be encoded or
/// decoded as JSON.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error)]
pub struct JsonError {
    /// What went wrong
    pub message: String,
    /// Line and column in the input, for decode errors
    pub position: Option<(usize, usize)>,
    /// Line number where the error was raised
    pub line: u32,
    /// File where the error was raised
    pub file: &'static str,
}

impl JsonError {
    /// Create a JsonError at the caller's location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            position: None,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON Error: {}", self.message)?;
        if let Some((line, column)) = self.position {
            write!(f, " (input line {}, column {})", line, column)?;
        }
        write!(f, " at line {} in {}", self.line, self.file)
    }
}

impl From<serde_json::Error> for JsonError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        let mut json = JsonError::new(err.to_string());
        if !err.is_io() && err.line() > 0 {
            json.position = Some((err.line(), err.column()));
        }
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_keep_their_position() {
        let err = serde_json::from_str::<serde_json::Value>("{\n  \"a\": ]").unwrap_err();
        let json = JsonError::from(err);
        assert_eq!(json.position.map(|(line, _)| line), Some(2));
        assert!(json.to_string().contains("(input line 2"));
    }
}
