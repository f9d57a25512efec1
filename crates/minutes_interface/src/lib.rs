//! Trait definitions for the Minutes rate-limit and request-queue layer.
//!
//! The rate limiter talks to storage and to providers only through these
//! traits, so queues and quota stores can be swapped between in-memory and
//! durable backends.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod queue;
mod replay;
mod store;

pub use queue::RequestQueue;
pub use replay::{ProviderResponse, ReplayHandler};
pub use store::{QuotaStore, StoredQuota};
