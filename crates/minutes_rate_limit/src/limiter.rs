//! Rate limiter facade.
//!
//! `RateLimiter` is the one entry point for provider calls. It owns the quota
//! tracker, the active retry configuration and a handle to the request queue,
//! and exposes the operator surface used by the CLI and the drain worker.

use crate::{
    Attempted, ProviderStatus, QuotaTracker, RetryConfig, RetryExecutor, SharedConfig,
    StatusReport,
};
use chrono::Utc;
use minutes_core::{NewQueuedRequest, Provider, QueuedRequest};
use minutes_error::{ProviderError, QueueErrorKind, RateLimitError, RateLimitErrorKind};
use minutes_interface::{ProviderResponse, ReplayHandler, RequestQueue};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Shortest interval between lease renewals during a replay.
const MIN_LEASE_RENEWAL: Duration = Duration::from_millis(10);

/// Receipt for a request parked in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedTicket {
    /// Id of the queued request
    pub id: Uuid,
    /// Provider it targets
    pub provider: Provider,
    /// Queue size for that provider right after enqueueing
    pub queue_size: usize,
}

/// Result of [`RateLimiter::execute`]: either the call's value or a promise
/// that it will be replayed later. Deferral is not a failure.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The call succeeded
    Completed(T),
    /// The call was deferred to the queue
    Queued(QueuedTicket),
}

impl<T> Outcome<T> {
    /// Whether the call was deferred.
    pub fn is_queued(&self) -> bool {
        matches!(self, Outcome::Queued(_))
    }

    /// The value, if the call completed.
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Queued(_) => None,
        }
    }
}

/// Counts from one pass over the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Requests taken from the queue
    pub processed: usize,
    /// Replays that succeeded and were removed
    pub succeeded: usize,
    /// Replays that failed permanently and were removed
    pub failed: usize,
    /// Replays deferred again, left in place
    pub requeued: usize,
    /// Replays stopped because the request was cleared or taken by another drain
    #[serde(default)]
    pub abandoned: usize,
    /// Requests still queued afterwards
    pub remaining: usize,
}

/// Entry point for rate-limited provider calls.
///
/// Cloning is cheap; clones share the tracker, configuration and queue.
#[derive(Clone)]
pub struct RateLimiter {
    executor: RetryExecutor,
    tracker: QuotaTracker,
    config: SharedConfig,
    queue: Arc<dyn RequestQueue>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config())
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn new(
        config: RetryConfig,
        tracker: QuotaTracker,
        queue: Arc<dyn RequestQueue>,
    ) -> Result<Self, RateLimitError> {
        validate(&config)?;
        let config: SharedConfig = Arc::new(RwLock::new(Arc::new(config)));
        Ok(Self {
            executor: RetryExecutor::new(tracker.clone(), Arc::clone(&config)),
            tracker,
            config,
            queue,
        })
    }

    /// Active configuration snapshot.
    pub fn config(&self) -> Arc<RetryConfig> {
        self.executor.config()
    }

    /// The shared quota tracker.
    pub fn tracker(&self) -> &QuotaTracker {
        &self.tracker
    }

    /// The request queue.
    pub fn queue(&self) -> &Arc<dyn RequestQueue> {
        &self.queue
    }

    /// Replace the retry configuration.
    ///
    /// The new value is validated first; on success it is swapped in as a
    /// whole. Executions already sleeping keep the delay they computed.
    #[instrument(skip(self))]
    pub fn configure(&self, config: RetryConfig) -> Result<Arc<RetryConfig>, RateLimitError> {
        validate(&config)?;
        let config = Arc::new(config);
        *self.config.write() = Arc::clone(&config);
        info!(?config, "Retry configuration updated");
        Ok(config)
    }

    /// Run a provider call with retries, deferring it when the provider is
    /// out of quota or backed off.
    ///
    /// `payload` describes the call well enough for a [`ReplayHandler`] to
    /// issue it again; it is stored only if the call is deferred.
    ///
    /// # Errors
    ///
    /// - `Permanent` for client errors, surfaced after one attempt
    /// - `RetriesExhausted` when transient failures used up every attempt
    /// - `Queue` when deferral was needed but the queue rejected the request
    #[instrument(skip(self, payload, call))]
    pub async fn execute<T, F, Fut>(
        &self,
        provider: Provider,
        payload: serde_json::Value,
        call: F,
    ) -> Result<Outcome<T>, RateLimitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ProviderResponse<T>, ProviderError>>,
    {
        self.refresh().await;

        if let Some(until) = self.tracker.backoff_until(provider).await
            && until > Utc::now()
        {
            debug!(%until, "Provider backed off, deferring without calling");
            let ticket = self.enqueue(provider, payload, 0).await?;
            return Ok(Outcome::Queued(ticket));
        }

        match self.executor.run(provider, call).await? {
            Attempted::Succeeded(value) => Ok(Outcome::Completed(value)),
            Attempted::Deferred { attempts, .. } => {
                let ticket = self.enqueue(provider, payload, attempts).await?;
                Ok(Outcome::Queued(ticket))
            }
        }
    }

    async fn enqueue(
        &self,
        provider: Provider,
        payload: serde_json::Value,
        attempts: u32,
    ) -> Result<QueuedTicket, RateLimitError> {
        let queued = self
            .queue
            .enqueue(NewQueuedRequest::new(provider, payload, attempts))
            .await?;
        let queue_size = self.queue.size(Some(provider)).await?;
        info!(
            id = %queued.id(),
            queue_size,
            "{} request queued for later processing (queue size: {})",
            provider,
            queue_size
        );
        Ok(QueuedTicket {
            id: *queued.id(),
            provider,
            queue_size,
        })
    }

    /// Replay up to `max_requests` queued requests through the retry executor.
    ///
    /// Requests are taken oldest first, skipping providers that are backed
    /// off. A success or permanent failure removes the request; a request
    /// that has to be deferred again is released back to its original
    /// position. Requests beyond `max_requests` keep their order.
    ///
    /// The drain renews its lease while a replay runs, so a replay that
    /// sleeps through long backoffs is never handed to a second drain. If the
    /// lease is lost anyway (the request was cleared, or renewal failed for
    /// longer than the lease), the replay is abandoned and counted as such.
    ///
    /// # Errors
    ///
    /// Only failures to claim or count requests are returned; replay
    /// failures are counted.
    #[instrument(skip(self, handler))]
    pub async fn process_queue(
        &self,
        max_requests: usize,
        handler: &dyn ReplayHandler,
    ) -> Result<DrainReport, RateLimitError> {
        self.refresh().await;
        let mut report = DrainReport::default();

        while report.processed < max_requests {
            let mut ready = Vec::new();
            for provider in Provider::all() {
                if !self.tracker.is_backed_off(provider).await {
                    ready.push(provider);
                }
            }
            if ready.is_empty() {
                debug!("Every provider is backed off");
                break;
            }

            let Some(item) = self.queue.claim_next(&ready).await? else {
                break;
            };
            report.processed += 1;
            self.replay_one(item, handler, &mut report).await;
        }

        report.remaining = self.queue.size(None).await?;
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            requeued = report.requeued,
            remaining = report.remaining,
            "Processed {} queued requests: {} succeeded, {} failed, {} requeued",
            report.processed,
            report.succeeded,
            report.failed,
            report.requeued
        );
        Ok(report)
    }

    async fn replay_one(
        &self,
        item: QueuedRequest,
        handler: &dyn ReplayHandler,
        report: &mut DrainReport,
    ) {
        let provider = *item.provider();
        let Some((lease, result)) = self.replay_holding_lease(item, handler).await else {
            report.abandoned += 1;
            return;
        };

        let settled = match result {
            Ok(Attempted::Succeeded(_)) => {
                report.succeeded += 1;
                debug!(id = %lease.id(), "Queued request replayed");
                self.queue.complete(&lease).await
            }
            Ok(Attempted::Deferred { attempts, .. }) => {
                let total = lease.attempt_count().saturating_add(attempts);
                report.requeued += 1;
                debug!(id = %lease.id(), attempts = total, "Queued request deferred again");
                self.queue.release(&lease, total).await
            }
            Err(e) => {
                report.failed += 1;
                warn!(id = %lease.id(), %provider, error = %e, "Dropping queued request after failure");
                self.queue.complete(&lease).await
            }
        };

        if let Err(e) = settled {
            match e.kind {
                QueueErrorKind::NotFound(_) | QueueErrorKind::LeaseLost(_) => {
                    debug!(id = %lease.id(), error = %e, "Queued request already handled elsewhere");
                }
                _ => warn!(id = %lease.id(), error = %e, "Failed to settle queued request"),
            }
        }
    }

    /// Replay `item`, renewing its lease until the replay finishes.
    ///
    /// Returns the latest lease with the result, or `None` when the lease was
    /// lost (the request was cleared or another drain took it over). The
    /// replay is abandoned in that case.
    async fn replay_holding_lease(
        &self,
        item: QueuedRequest,
        handler: &dyn ReplayHandler,
    ) -> Option<(QueuedRequest, Result<Attempted<serde_json::Value>, RateLimitError>)> {
        let provider = *item.provider();
        let replayed = item.clone();
        let replay = self.executor.run(provider, || handler.replay(&replayed));
        tokio::pin!(replay);

        let period = (self.queue.lease_duration() / 3).max(MIN_LEASE_RENEWAL);
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut lease = item;
        loop {
            tokio::select! {
                result = &mut replay => return Some((lease, result)),
                _ = heartbeat.tick() => match self.queue.renew(&lease).await {
                    Ok(renewed) => lease = renewed,
                    Err(e) if matches!(e.kind, QueueErrorKind::NotFound(_) | QueueErrorKind::LeaseLost(_)) => {
                        info!(id = %lease.id(), error = %e, "Lost lease on queued request, abandoning replay");
                        return None;
                    }
                    Err(e) => warn!(id = %lease.id(), error = %e, "Failed to renew lease"),
                },
            }
        }
    }

    /// Status of one provider.
    pub async fn status(&self, provider: Provider) -> Result<ProviderStatus, RateLimitError> {
        self.refresh().await;
        let quota = self.tracker.status(provider).await;
        let queue_size = self.queue.size(Some(provider)).await?;
        Ok(ProviderStatus::new(provider, quota, queue_size, Utc::now()))
    }

    /// Status of every provider.
    pub async fn status_all(&self) -> Result<Vec<ProviderStatus>, RateLimitError> {
        self.refresh().await;
        let now = Utc::now();
        let mut statuses = Vec::new();
        for (provider, quota) in self.tracker.snapshot_all().await {
            let queue_size = self.queue.size(Some(provider)).await?;
            statuses.push(ProviderStatus::new(provider, quota, queue_size, now));
        }
        Ok(statuses)
    }

    /// Lift the backoff on one provider, or on all of them.
    #[instrument(skip(self))]
    pub async fn clear_backoff(&self, provider: Option<Provider>) {
        self.refresh().await;
        let providers = provider.map(|p| vec![p]).unwrap_or_else(Provider::all);
        for provider in providers {
            self.tracker.clear_backoff(provider).await;
        }
    }

    /// Drop queued requests for one provider, or all of them.
    ///
    /// Irreversible. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn clear_queue(&self, provider: Option<Provider>) -> Result<usize, RateLimitError> {
        let removed = self.queue.clear(provider).await?;
        info!(removed, "Cleared request queue");
        Ok(removed)
    }

    /// Snapshot of every provider for export.
    pub async fn export_status(&self) -> Result<StatusReport, RateLimitError> {
        Ok(StatusReport::new(self.status_all().await?))
    }

    /// Restore quota state from an exported report.
    ///
    /// Queue contents are not part of a report and are left as they are.
    #[instrument(skip(self, report), fields(timestamp = %report.timestamp))]
    pub async fn import_status(&self, report: &StatusReport) {
        self.tracker.restore(report.quota_states()).await;
        info!(
            providers = report.rate_limits.len(),
            "Imported rate limit status"
        );
    }

    async fn refresh(&self) {
        if let Err(e) = self.tracker.refresh().await {
            warn!(error = %e, "Failed to refresh quota state");
        }
    }
}

fn validate(config: &RetryConfig) -> Result<(), RateLimitError> {
    config
        .validate()
        .map_err(|e| {
            let reason = match e.key {
                Some(key) => format!("{}: {}", key, e.message),
                None => e.message,
            };
            RateLimitError::new(RateLimitErrorKind::InvalidConfig(reason))
        })
}
