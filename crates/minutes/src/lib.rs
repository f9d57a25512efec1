//! Minutes - rate limiting and request queueing for LLM provider calls
//!
//! Every call the meeting pipeline makes to an LLM provider (transcription,
//! summarisation, action-item extraction) goes through a [`RateLimiter`]. It
//! retries transient failures with exponential backoff and jitter, tracks the
//! limits each provider reports in its response headers, and parks requests
//! in a durable queue when a provider's quota is exhausted. A background
//! [`DrainWorker`] replays parked requests once the provider recovers.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use minutes::{HttpReplayHandler, MinutesConfig, Outcome, Provider, ReplayRequest, open_limiter};
//! use minutes::{ProviderError, ProviderResponse};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MinutesConfig::load()?;
//! let limiter = open_limiter(&config).await?;
//!
//! let request = ReplayRequest::post(
//!     "https://api.openai.com/v1/chat/completions",
//!     json!({"model": "gpt-4o-mini", "messages": [{"role": "user", "content": "Summarise"}]}),
//! );
//!
//! let outcome = limiter
//!     .execute(Provider::OpenAi, request.to_payload()?, || async {
//!         // Issue the real call here and return its body and headers.
//!         Ok::<_, ProviderError>(ProviderResponse::without_headers(json!({"ok": true})))
//!     })
//!     .await?;
//!
//! if let Outcome::Queued(ticket) = outcome {
//!     println!("deferred as {}", ticket.id);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `minutes_error` - Error types
//! - `minutes_core` - Providers, quota state, queued requests
//! - `minutes_interface` - `RequestQueue`, `QuotaStore` and `ReplayHandler` traits
//! - `minutes_rate_limit` - Classifier, backoff, quota tracker, retry executor, facade, drain worker
//! - `minutes_database` - SQLite queue and quota store
//!
//! This crate re-exports everything and adds the HTTP replay handler and the
//! `minutes` operator binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod display;
mod http;
mod observability;
mod overrides;
mod runtime;

pub use display::{render_config, render_drain, render_status};
pub use http::HttpReplayHandler;
pub use observability::{ObservabilityConfig, init_observability};
pub use overrides::RetryOverrides;
pub use runtime::open_limiter;

pub use minutes_core::*;
pub use minutes_database::*;
pub use minutes_error::*;
pub use minutes_interface::*;
pub use minutes_rate_limit::*;
