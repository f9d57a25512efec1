//! Request queue error types.

/// Request queue error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum QueueErrorKind {
    /// Connection to the backing store failed
    #[display("Queue connection error: {}", _0)]
    Connection(String),
    /// Query execution failed
    #[display("Queue query error: {}", _0)]
    Query(String),
    /// Payload or quota state could not be (de)serialized
    #[display("Serialization error: {}", _0)]
    Serialization(String),
    /// Schema migration failed
    #[display("Migration error: {}", _0)]
    Migration(String),
    /// No queued request with the given id
    #[display("Queued request '{}' not found", _0)]
    NotFound(String),
    /// The caller's lease was taken over, or the request was cleared
    #[display("Lease on queued request '{}' is no longer held", _0)]
    LeaseLost(String),
    /// Queue reached its configured capacity
    #[display("Queue is full ({} requests)", _0)]
    Full(usize),
}

/// Request queue error with source location tracking.
///
/// # Examples
///
/// ```
/// use minutes_error::{QueueError, QueueErrorKind};
///
/// let err = QueueError::new(QueueErrorKind::Full(1000));
/// assert!(format!("{}", err).contains("full"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Queue Error: {} at line {} in {}", kind, line, file)]
pub struct QueueError {
    /// The kind of error that occurred
    pub kind: QueueErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl QueueError {
    /// Create a new QueueError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: QueueErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

#[cfg(feature = "database")]
impl From<diesel::result::Error> for QueueError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => {
                QueueError::new(QueueErrorKind::NotFound(String::from("<unknown>")))
            }
            _ => QueueError::new(QueueErrorKind::Query(err.to_string())),
        }
    }
}

#[cfg(feature = "database")]
impl From<diesel::ConnectionError> for QueueError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        QueueError::new(QueueErrorKind::Connection(err.to_string()))
    }
}

impl From<serde_json::Error> for QueueError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        QueueError::new(QueueErrorKind::Serialization(err.to_string()))
    }
}
