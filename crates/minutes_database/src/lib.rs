//! Durable storage for Minutes.
//!
//! SQLite-backed implementations of the
//! [`RequestQueue`](minutes_interface::RequestQueue) and
//! [`QuotaStore`](minutes_interface::QuotaStore) traits. Several processes
//! (the command-line tool, the pipeline and the drain worker) can open the
//! same database file; claims run inside `BEGIN IMMEDIATE` transactions so a
//! request is leased to one drain at a time.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod models;
mod queue;
#[allow(missing_docs)]
pub mod schema;
mod store;

pub use connection::{QueueDatabase, resolve_database_url};
pub use models::{NewQueuedRequestRow, QueuedRequestRow, QuotaStateRow};
pub use queue::SqliteRequestQueue;
pub use store::SqliteQuotaStore;

/// Result type for storage operations.
pub type DatabaseResult<T> = Result<T, minutes_error::QueueError>;
