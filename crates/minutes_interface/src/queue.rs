//! Request queue trait.

use async_trait::async_trait;
use minutes_core::{NewQueuedRequest, Provider, QueuedRequest};
use minutes_error::QueueError;
use std::time::Duration;

/// FIFO store for requests that could not run when they were issued.
///
/// Items are ordered by `sequence`. A drain leases one item at a time with
/// [`claim_next`](RequestQueue::claim_next); a leased item is invisible to
/// other drains until it is completed, released, or its lease goes stale.
/// A drain that works on an item for longer than [`lease_duration`]
/// must [`renew`](RequestQueue::renew) it.
///
/// The `claimed_at` of the copy returned by `claim_next` (or `renew`) is the
/// lease token. `complete`, `release` and `renew` fail with
/// `QueueErrorKind::LeaseLost` when the stored lease differs, and with
/// `QueueErrorKind::NotFound` when the request is gone.
///
/// [`lease_duration`]: RequestQueue::lease_duration
#[async_trait]
pub trait RequestQueue: Send + Sync {
    /// Append a request, returning it with its assigned sequence.
    ///
    /// Fails with `QueueErrorKind::Full` when the queue is at capacity.
    async fn enqueue(&self, request: NewQueuedRequest) -> Result<QueuedRequest, QueueError>;

    /// Lease the oldest available request among `providers`.
    ///
    /// Returns `None` when nothing is available for those providers.
    async fn claim_next(&self, providers: &[Provider]) -> Result<Option<QueuedRequest>, QueueError>;

    /// Extend the lease on a claimed request, returning the renewed copy.
    async fn renew(&self, claimed: &QueuedRequest) -> Result<QueuedRequest, QueueError>;

    /// Remove a request after it was handled (successfully or permanently failed).
    async fn complete(&self, claimed: &QueuedRequest) -> Result<(), QueueError>;

    /// Put a leased request back at its original position.
    async fn release(&self, claimed: &QueuedRequest, attempt_count: u32)
    -> Result<(), QueueError>;

    /// How long a lease lasts before another drain may take the request.
    fn lease_duration(&self) -> Duration;

    /// Peek at up to `limit` requests in queue order without leasing them.
    async fn list(
        &self,
        provider: Option<Provider>,
        limit: usize,
    ) -> Result<Vec<QueuedRequest>, QueueError>;

    /// Number of queued requests, including leased ones.
    async fn size(&self, provider: Option<Provider>) -> Result<usize, QueueError>;

    /// Remove every request (or every request for one provider).
    ///
    /// Returns how many were removed.
    async fn clear(&self, provider: Option<Provider>) -> Result<usize, QueueError>;
}
