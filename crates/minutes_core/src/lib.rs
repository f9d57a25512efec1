//! Core data types for the Minutes rate-limit and request-queue layer.
//!
//! These types are shared by the rate limiter, the queue backends and the
//! command-line tool.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod provider;
mod quota;
mod replay;
mod request;

pub use provider::{Provider, UnknownProvider};
pub use quota::{QuotaChange, QuotaState, QuotaUpdate, REQUEST_WINDOW_SECS};
pub use replay::ReplayRequest;
pub use request::{NewQueuedRequest, QueuedRequest};
