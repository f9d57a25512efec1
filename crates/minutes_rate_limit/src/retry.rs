//! Retry executor.
//!
//! Drives one logical request through the attempt state machine:
//!
//! ```text
//! Idle -> Attempting -> Succeeded
//!                    -> Backoff -> Attempting
//!                    -> Deferred (handed to the queue by the caller)
//!                    -> PermanentFailure
//! ```
//!
//! At most `max_retries + 1` attempts are made. The executor sleeps while in
//! `Backoff` but holds no lock while doing so.

use crate::{ErrorKind, QuotaTracker, RetryConfig, classify_error, next_delay, retry_schedule};
use chrono::{DateTime, Utc};
use minutes_core::Provider;
use minutes_error::{ProviderError, RateLimitError, RateLimitErrorKind};
use minutes_interface::ProviderResponse;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, info, instrument, warn};

/// Handle to the active retry configuration.
///
/// Readers take a snapshot (`Arc<RetryConfig>`); `configure` swaps the whole
/// value. A delay already computed from an old snapshot is not affected.
pub type SharedConfig = Arc<RwLock<Arc<RetryConfig>>>;

/// How an execution ended, when it did not fail.
#[derive(Debug)]
pub enum Attempted<T> {
    /// The call succeeded
    Succeeded(T),
    /// The call should be parked in the queue and replayed later
    Deferred {
        /// Attempts made in this execution
        attempts: u32,
        /// Failure that caused the deferral
        error: ProviderError,
    },
}

/// Runs provider calls with classification, backoff and deferral.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    tracker: QuotaTracker,
    config: SharedConfig,
}

impl RetryExecutor {
    /// Create an executor over a tracker and a shared configuration.
    pub fn new(tracker: QuotaTracker, config: SharedConfig) -> Self {
        Self { tracker, config }
    }

    /// Snapshot of the active configuration.
    pub fn config(&self) -> Arc<RetryConfig> {
        Arc::clone(&self.config.read())
    }

    /// The quota tracker this executor reports to.
    pub fn tracker(&self) -> &QuotaTracker {
        &self.tracker
    }

    /// Run `call` until it succeeds, fails permanently, or must be deferred.
    ///
    /// `call` is invoked once per attempt and must produce a fresh future
    /// each time. Attempts are driven by `tokio_retry2`: the exponential
    /// schedule from [`retry_schedule`] bounds the number of retries, and
    /// each failure supplies its own wait as the `retry_after` of a
    /// transient error. The configuration is snapshotted once per run.
    ///
    /// # Errors
    ///
    /// - `RateLimitErrorKind::Permanent` on a client error, after one attempt
    /// - `RateLimitErrorKind::RetriesExhausted` when every attempt failed
    ///   transiently and the last failure was not a quota failure
    #[instrument(skip(self, call))]
    pub async fn run<T, F, Fut>(
        &self,
        provider: Provider,
        mut call: F,
    ) -> Result<Attempted<T>, RateLimitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ProviderResponse<T>, ProviderError>>,
    {
        let config = self.config();
        let attempts = AtomicU32::new(0);

        let outcome = Retry::spawn(retry_schedule(&config), || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let pending = call();
            let config = Arc::clone(&config);
            async move { self.attempt(provider, attempt, pending, &config).await }
        })
        .await;

        let attempts = attempts.into_inner();
        match outcome {
            Ok(value) => Ok(Attempted::Succeeded(value)),
            Err(Halt::Deferred(error)) => Ok(Attempted::Deferred { attempts, error }),
            Err(Halt::Permanent(error)) => {
                Err(RateLimitError::new(RateLimitErrorKind::Permanent {
                    provider: provider.to_string(),
                    error,
                }))
            }
            Err(Halt::Exhausted(error)) => {
                warn!(
                    attempts,
                    "{} request failed after {} attempts: {}",
                    provider,
                    attempts,
                    error.message
                );
                Err(RateLimitError::new(RateLimitErrorKind::RetriesExhausted {
                    provider: provider.to_string(),
                    attempts,
                    error,
                }))
            }
        }
    }

    /// One attempt: issue the call, record it, and decide what happens next.
    async fn attempt<T, Fut>(
        &self,
        provider: Provider,
        attempt: u32,
        pending: Fut,
        config: &RetryConfig,
    ) -> Result<T, RetryError<Halt>>
    where
        Fut: Future<Output = Result<ProviderResponse<T>, ProviderError>>,
    {
        debug!(attempt, "Attempting request");
        self.tracker.record_request(provider).await;

        let error = match pending.await {
            Ok(response) => {
                self.tracker.record_headers(provider, &response.headers).await;
                self.tracker.clear_backoff(provider).await;
                debug!(attempt, "Request succeeded");
                return Ok(response.body);
            }
            Err(error) => error,
        };

        let kind = classify_error(&error);
        debug!(attempt, %kind, error = %error.message, "Request failed");

        if kind.is_permanent() {
            warn!(%kind, error = %error.message, "{} request failed permanently", provider);
            return Err(RetryError::Permanent(Halt::Permanent(error)));
        }

        let exhausted = attempt > config.max_retries;
        if kind == ErrorKind::QuotaExceeded && (exhausted || config.defers_quota()) {
            let until = deadline(config.quota_wait());
            self.tracker.set_backoff(provider, until).await;
            info!(
                attempt,
                backoff_until = %until,
                "{} quota exceeded, deferring request",
                provider
            );
            return Err(RetryError::Permanent(Halt::Deferred(error)));
        }

        if exhausted {
            return Err(RetryError::Permanent(Halt::Exhausted(error)));
        }

        let Some(delay) = next_delay(kind, attempt, error.retry_after_secs, config) else {
            return Err(RetryError::Permanent(Halt::Permanent(error)));
        };

        if matches!(kind, ErrorKind::RateLimited | ErrorKind::ServerError) {
            self.tracker.set_backoff(provider, deadline(delay)).await;
        }

        info!(
            attempt,
            max_attempts = config.max_attempts(),
            delay_secs = delay.as_secs_f64(),
            %kind,
            "{} request failed (attempt {}/{}): {}. Retrying in {:.1}s",
            provider,
            attempt,
            config.max_attempts(),
            error.message,
            delay.as_secs_f64()
        );

        Err(RetryError::Transient {
            err: Halt::Exhausted(error),
            retry_after: Some(delay),
        })
    }
}

/// Why a run stopped without a value.
///
/// A transient failure carries `Exhausted`, which is what the retry loop
/// hands back if the schedule runs out before the run ends on its own.
#[derive(Debug)]
enum Halt {
    Permanent(ProviderError),
    Deferred(ProviderError),
    Exhausted(ProviderError),
}

/// Wall-clock instant `delay` from now, saturating at the latest representable time.
pub(crate) fn deadline(delay: std::time::Duration) -> DateTime<Utc> {
    let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
    Utc::now()
        .checked_add_signed(delay)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
