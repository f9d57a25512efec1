//! Quota state persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use minutes_core::{Provider, QuotaChange, QuotaState};
use minutes_error::QueueError;

/// Quota state as it was last written for a provider.
#[derive(Debug, Clone, PartialEq, derive_getters::Getters)]
pub struct StoredQuota {
    /// Provider the state belongs to
    provider: Provider,
    /// The state itself
    state: QuotaState,
    /// When it was written
    updated_at: DateTime<Utc>,
}

impl StoredQuota {
    /// Create a new stored quota record.
    pub fn new(provider: Provider, state: QuotaState, updated_at: DateTime<Utc>) -> Self {
        Self {
            provider,
            state,
            updated_at,
        }
    }

    /// Split into provider and state.
    pub fn into_parts(self) -> (Provider, QuotaState) {
        (self.provider, self.state)
    }
}

/// Shared storage for quota state.
///
/// The command-line tool, the pipeline and the background worker run as
/// separate processes; writing quota state through a store lets them see the
/// same backoff windows.
///
/// Day-to-day updates go through [`apply`](QuotaStore::apply), which merges
/// one [`QuotaChange`] into the stored state atomically, so the last write
/// wins per field rather than per provider. [`save`](QuotaStore::save)
/// replaces the whole state and is meant for imports.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Merge `change` into the stored state for `provider` and return the result.
    async fn apply(&self, provider: Provider, change: &QuotaChange)
    -> Result<QuotaState, QueueError>;

    /// Persist the state for one provider, replacing what was there.
    async fn save(&self, provider: Provider, state: &QuotaState) -> Result<(), QueueError>;

    /// Load every stored provider state.
    async fn load_all(&self) -> Result<Vec<StoredQuota>, QueueError>;
}
