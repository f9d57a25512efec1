//! Deferred requests held by the request queue.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Provider;

/// A request handed to the queue, before the store assigns its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct NewQueuedRequest {
    /// Unique id (UUID v4)
    id: Uuid,
    /// Provider the request targets
    provider: Provider,
    /// Opaque payload, replayed later by a `ReplayHandler`
    payload: serde_json::Value,
    /// When the request was deferred
    enqueued_at: DateTime<Utc>,
    /// Attempts already made before deferral
    attempt_count: u32,
}

impl NewQueuedRequest {
    /// Create a request with a fresh id, stamped now.
    pub fn new(provider: Provider, payload: serde_json::Value, attempt_count: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            payload,
            enqueued_at: Utc::now(),
            attempt_count,
        }
    }

    /// Attach the store-assigned sequence number.
    pub fn into_queued(self, sequence: i64) -> QueuedRequest {
        QueuedRequest {
            id: self.id,
            provider: self.provider,
            payload: self.payload,
            enqueued_at: self.enqueued_at,
            attempt_count: self.attempt_count,
            sequence,
            claimed_at: None,
        }
    }
}

/// A request waiting in (or leased from) the queue.
///
/// `sequence` orders the queue: lower values were enqueued earlier and are
/// drained first. A request keeps its sequence when a drain releases it, so
/// per-provider FIFO order survives re-deferral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct QueuedRequest {
    /// Unique id (UUID v4)
    id: Uuid,
    /// Provider the request targets
    provider: Provider,
    /// Opaque payload
    payload: serde_json::Value,
    /// When the request was first deferred
    enqueued_at: DateTime<Utc>,
    /// Attempts made so far
    attempt_count: u32,
    /// Queue position assigned by the store
    sequence: i64,
    /// Set while a drain holds the request
    claimed_at: Option<DateTime<Utc>>,
}

impl QueuedRequest {
    /// Reassemble a request read back from storage.
    pub fn from_parts(
        id: Uuid,
        provider: Provider,
        payload: serde_json::Value,
        enqueued_at: DateTime<Utc>,
        attempt_count: u32,
        sequence: i64,
        claimed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            provider,
            payload,
            enqueued_at,
            attempt_count,
            sequence,
            claimed_at,
        }
    }

    /// Mark the request as leased at `at`, kept to microsecond precision.
    ///
    /// The lease timestamp doubles as the holder's token: `complete`,
    /// `release` and `renew` only succeed for the caller whose copy carries
    /// the stored `claimed_at`. Each new lease is strictly later than the
    /// previous one, so two holders never share a token.
    pub fn claim(&mut self, at: DateTime<Utc>) {
        let at = at.trunc_subsecs(6);
        self.claimed_at = Some(match self.claimed_at {
            Some(previous) if at <= previous => previous + Duration::microseconds(1),
            _ => at,
        });
    }

    /// Whether `other` carries the same lease as this copy.
    pub fn same_lease(&self, other: &QueuedRequest) -> bool {
        self.claimed_at == other.claimed_at
    }

    /// Return the request to the queue with an updated attempt count.
    pub fn release(&mut self, attempt_count: u32) {
        self.claimed_at = None;
        self.attempt_count = attempt_count;
    }

    /// Whether a drain currently holds a lease that has not expired.
    pub fn is_claimed(&self, now: DateTime<Utc>, claim_timeout: Duration) -> bool {
        match self.claimed_at {
            Some(at) => now - at < claim_timeout,
            None => false,
        }
    }

    /// How long the request has been waiting.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.enqueued_at
    }
}
