//! Error types for the Minutes rate-limit and request-queue layer.
//!
//! Every error follows the `ErrorKind` + located wrapper pattern:
//! - `*ErrorKind` enum names the specific condition
//! - `*Error` struct wraps the kind and records where it was created
//! - constructors use `#[track_caller]` so the location is the caller's
//!
//! # Examples
//!
//! ```
//! use minutes_error::{MinutesResult, ProviderError};
//!
//! fn call_provider() -> MinutesResult<String> {
//!     Err(ProviderError::with_status(503, "Service Unavailable"))?
//! }
//!
//! assert!(call_provider().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod io;
mod json;
mod provider;
mod queue;
mod rate_limit;

pub use config::ConfigError;
pub use error::{MinutesError, MinutesErrorKind, MinutesResult};
pub use io::IoError;
pub use json::JsonError;
pub use provider::ProviderError;
pub use queue::{QueueError, QueueErrorKind};
pub use rate_limit::{RateLimitError, RateLimitErrorKind};
