//! In-memory request queue.

use async_trait::async_trait;
use chrono::Utc;
use minutes_core::{NewQueuedRequest, Provider, QueuedRequest};
use minutes_error::{QueueError, QueueErrorKind};
use minutes_interface::RequestQueue;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

#[derive(Debug, Default)]
struct Inner {
    items: BTreeMap<i64, QueuedRequest>,
    next_sequence: i64,
}

impl Inner {
    /// Sequence of the stored copy of `claimed`, if its lease is still held.
    fn held(&self, claimed: &QueuedRequest) -> Result<i64, QueueError> {
        let (sequence, stored) = self
            .items
            .iter()
            .find(|(_, item)| item.id() == claimed.id())
            .ok_or_else(|| not_found(claimed))?;
        if !stored.same_lease(claimed) {
            return Err(QueueError::new(QueueErrorKind::LeaseLost(
                claimed.id().to_string(),
            )));
        }
        Ok(*sequence)
    }
}

fn not_found(claimed: &QueuedRequest) -> QueueError {
    QueueError::new(QueueErrorKind::NotFound(claimed.id().to_string()))
}

/// Request queue held in process memory.
///
/// Suitable for tests and short-lived tools; everything is lost when the
/// process exits. Every operation runs under one async mutex.
#[derive(Debug)]
pub struct InMemoryRequestQueue {
    inner: Mutex<Inner>,
    max_size: usize,
    claim_timeout: chrono::Duration,
}

impl InMemoryRequestQueue {
    /// Create a queue holding at most `max_size` requests.
    pub fn new(max_size: usize, claim_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_size,
            claim_timeout: chrono::Duration::from_std(claim_timeout)
                .unwrap_or(chrono::Duration::MAX),
        }
    }
}

impl Default for InMemoryRequestQueue {
    fn default() -> Self {
        Self::new(1000, Duration::from_secs(300))
    }
}

#[async_trait]
impl RequestQueue for InMemoryRequestQueue {
    #[instrument(skip(self, request), fields(provider = %request.provider()))]
    async fn enqueue(&self, request: NewQueuedRequest) -> Result<QueuedRequest, QueueError> {
        let mut inner = self.inner.lock().await;
        if inner.items.len() >= self.max_size {
            return Err(QueueError::new(QueueErrorKind::Full(self.max_size)));
        }
        inner.next_sequence += 1;
        let sequence = inner.next_sequence;
        let queued = request.into_queued(sequence);
        inner.items.insert(sequence, queued.clone());
        debug!(sequence, size = inner.items.len(), "Request enqueued");
        Ok(queued)
    }

    #[instrument(skip(self))]
    async fn claim_next(&self, providers: &[Provider]) -> Result<Option<QueuedRequest>, QueueError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        let claimed = inner
            .items
            .values_mut()
            .find(|item| {
                providers.contains(item.provider()) && !item.is_claimed(now, self.claim_timeout)
            })
            .map(|item| {
                item.claim(now);
                item.clone()
            });
        Ok(claimed)
    }

    #[instrument(skip(self, claimed), fields(id = %claimed.id()))]
    async fn renew(&self, claimed: &QueuedRequest) -> Result<QueuedRequest, QueueError> {
        let mut inner = self.inner.lock().await;
        let sequence = inner.held(claimed)?;
        let item = inner
            .items
            .get_mut(&sequence)
            .ok_or_else(|| not_found(claimed))?;
        item.claim(Utc::now());
        Ok(item.clone())
    }

    #[instrument(skip(self, claimed), fields(id = %claimed.id()))]
    async fn complete(&self, claimed: &QueuedRequest) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        let sequence = inner.held(claimed)?;
        inner.items.remove(&sequence);
        Ok(())
    }

    #[instrument(skip(self, claimed), fields(id = %claimed.id()))]
    async fn release(&self, claimed: &QueuedRequest, attempt_count: u32) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        let sequence = inner.held(claimed)?;
        if let Some(item) = inner.items.get_mut(&sequence) {
            item.release(attempt_count);
        }
        Ok(())
    }

    fn lease_duration(&self) -> Duration {
        self.claim_timeout.to_std().unwrap_or(Duration::MAX)
    }

    async fn list(
        &self,
        provider: Option<Provider>,
        limit: usize,
    ) -> Result<Vec<QueuedRequest>, QueueError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .items
            .values()
            .filter(|item| provider.is_none_or(|p| *item.provider() == p))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn size(&self, provider: Option<Provider>) -> Result<usize, QueueError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .items
            .values()
            .filter(|item| provider.is_none_or(|p| *item.provider() == p))
            .count())
    }

    #[instrument(skip(self))]
    async fn clear(&self, provider: Option<Provider>) -> Result<usize, QueueError> {
        let mut inner = self.inner.lock().await;
        let before = inner.items.len();
        match provider {
            Some(p) => inner.items.retain(|_, item| *item.provider() != p),
            None => inner.items.clear(),
        }
        Ok(before - inner.items.len())
    }
}
