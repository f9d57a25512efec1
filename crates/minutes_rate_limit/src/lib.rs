//! Rate limiting, retry and request deferral for LLM provider calls.
//!
//! Calls go through [`RateLimiter::execute`]. Failures are classified
//! ([`classify`]), retried with backoff ([`next_delay`]) up to the configured
//! ceiling, and deferred to a [`RequestQueue`](minutes_interface::RequestQueue)
//! when the provider is out of quota. Provider-reported limits are kept per
//! provider by a [`QuotaTracker`]. Deferred requests are replayed later by
//! [`RateLimiter::process_queue`], usually from a [`DrainWorker`].
//!
//! # Example
//!
//! ```no_run
//! use minutes_core::Provider;
//! use minutes_error::ProviderError;
//! use minutes_interface::ProviderResponse;
//! use minutes_rate_limit::{InMemoryRequestQueue, Outcome, QuotaTracker, RateLimiter, RetryConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = RateLimiter::new(
//!     RetryConfig::default(),
//!     QuotaTracker::new(),
//!     Arc::new(InMemoryRequestQueue::default()),
//! )?;
//!
//! let outcome = limiter
//!     .execute(Provider::OpenAi, json!({"prompt": "summarise"}), || async {
//!         Ok::<_, ProviderError>(ProviderResponse::without_headers("summary"))
//!     })
//!     .await?;
//!
//! match outcome {
//!     Outcome::Completed(text) => println!("{}", text),
//!     Outcome::Queued(ticket) => println!("queued as {}", ticket.id),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backoff;
mod classifier;
mod config;
mod detector;
mod limiter;
mod memory;
mod quota;
mod retry;
mod status;
mod worker;

pub use backoff::{add_jitter, base_delay_for, next_delay, retry_schedule};
pub use classifier::{ErrorKind, classify, classify_error};
pub use config::{MinutesConfig, QueueSettings, RetryConfig, WorkerSettings};
pub use detector::{HeaderRateLimitDetector, parse_go_duration, parse_reset};
pub use minutes_core::QuotaUpdate;
pub use limiter::{DrainReport, Outcome, QueuedTicket, RateLimiter};
pub use memory::InMemoryRequestQueue;
pub use quota::{AlertLevel, QuotaTracker, RemainingFraction};
pub use retry::{Attempted, RetryExecutor, SharedConfig};
pub use status::{ProviderStatus, StatusReport};
pub use worker::{DrainHandle, DrainMessage, DrainWorker};
