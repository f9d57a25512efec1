//! Per-provider quota tracking.

use crate::HeaderRateLimitDetector;
use chrono::{DateTime, Utc};
use minutes_core::{Provider, QuotaChange, QuotaState};
use minutes_error::QueueError;
use minutes_interface::QuotaStore;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Alert band for the share of quota left.
///
/// Ordered from best to worst, so the worse of two levels is their `max`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// More than half the quota left
    #[display("nominal")]
    Nominal,
    /// Between 20% and 50% left
    #[display("warning")]
    Warning,
    /// Less than 20% left
    #[display("critical")]
    Critical,
}

impl AlertLevel {
    /// Band a remaining fraction: `> 0.5` nominal, `0.2..=0.5` warning, `< 0.2` critical.
    ///
    /// # Examples
    ///
    /// ```
    /// use minutes_rate_limit::AlertLevel;
    ///
    /// assert_eq!(AlertLevel::from_fraction(0.97), AlertLevel::Nominal);
    /// assert_eq!(AlertLevel::from_fraction(0.5), AlertLevel::Warning);
    /// assert_eq!(AlertLevel::from_fraction(0.2), AlertLevel::Warning);
    /// assert_eq!(AlertLevel::from_fraction(0.19), AlertLevel::Critical);
    /// ```
    pub fn from_fraction(fraction: f64) -> Self {
        if fraction > 0.5 {
            AlertLevel::Nominal
        } else if fraction >= 0.2 {
            AlertLevel::Warning
        } else {
            AlertLevel::Critical
        }
    }
}

/// Share of requests and tokens left, each in `[0, 1]` when known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RemainingFraction {
    /// Requests remaining / request limit
    pub requests: Option<f64>,
    /// Tokens remaining / token limit
    pub tokens: Option<f64>,
}

impl RemainingFraction {
    /// Compute from the provider-reported counters in `state`.
    pub fn from_state(state: &QuotaState) -> Self {
        Self {
            requests: fraction(state.requests_remaining, state.requests_limit),
            tokens: fraction(state.tokens_remaining, state.tokens_limit),
        }
    }

    /// The worse of the request and token bands, if either is known.
    pub fn alert_level(&self) -> Option<AlertLevel> {
        let requests = self.requests.map(AlertLevel::from_fraction);
        let tokens = self.tokens.map(AlertLevel::from_fraction);
        match (requests, tokens) {
            (Some(r), Some(t)) => Some(r.max(t)),
            (r, t) => r.or(t),
        }
    }
}

fn fraction(remaining: Option<u64>, limit: Option<u64>) -> Option<f64> {
    match (remaining, limit) {
        (Some(remaining), Some(limit)) if limit > 0 => {
            Some((remaining as f64 / limit as f64).clamp(0.0, 1.0))
        }
        _ => None,
    }
}

/// Keyed store of [`QuotaState`] per provider.
///
/// One tracker is created per process and shared by cloning (clones share the
/// same state). Readers always get a whole-state snapshot. When built with a
/// [`QuotaStore`], every change is merged into the store field by field, so
/// other processes can pick it up with [`refresh`](QuotaTracker::refresh).
#[derive(Clone, Default)]
pub struct QuotaTracker {
    states: Arc<RwLock<HashMap<Provider, QuotaState>>>,
    store: Option<Arc<dyn QuotaStore>>,
}

impl std::fmt::Debug for QuotaTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaTracker")
            .field("persistent", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl QuotaTracker {
    /// Create an in-memory tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker that writes every change through to `store`.
    pub fn with_store(store: Arc<dyn QuotaStore>) -> Self {
        Self {
            states: Arc::default(),
            store: Some(store),
        }
    }

    /// Whether changes are persisted.
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Update quota counters from a successful response's headers.
    ///
    /// Unknown or malformed headers are ignored. Returns the new state.
    #[instrument(skip(self, headers))]
    pub async fn record_headers(&self, provider: Provider, headers: &HeaderMap) -> QuotaState {
        let update = HeaderRateLimitDetector::detect(provider, headers, Utc::now());
        if update.is_empty() {
            return self.status(provider).await;
        }

        let before = self.alert_level(provider).await;
        let after = self.change(provider, QuotaChange::Headers(update)).await;

        let remaining = RemainingFraction::from_state(&after);
        if let Some(level) = remaining.alert_level()
            && level != AlertLevel::Nominal
            && Some(level) != before
        {
            warn!(
                %provider,
                %level,
                requests_remaining = ?after.requests_remaining,
                requests_limit = ?after.requests_limit,
                tokens_remaining = ?after.tokens_remaining,
                tokens_limit = ?after.tokens_limit,
                "{} quota running low",
                provider
            );
        }
        after
    }

    /// Note that a request to `provider` is being issued now.
    #[instrument(skip(self))]
    pub async fn record_request(&self, provider: Provider) {
        self.change(provider, QuotaChange::Request(Utc::now())).await;
    }

    /// Snapshot of one provider's state.
    pub async fn status(&self, provider: Provider) -> QuotaState {
        let states = self.states.read().await;
        let mut state = states.get(&provider).cloned().unwrap_or_default();
        state.trim_window(Utc::now());
        state
    }

    /// Share of requests and tokens left for `provider`.
    pub async fn remaining_fraction(&self, provider: Provider) -> RemainingFraction {
        RemainingFraction::from_state(&self.status(provider).await)
    }

    /// Alert band for `provider`, if its limits are known.
    pub async fn alert_level(&self, provider: Provider) -> Option<AlertLevel> {
        self.remaining_fraction(provider).await.alert_level()
    }

    /// Defer calls to `provider` until `until`.
    #[instrument(skip(self))]
    pub async fn set_backoff(&self, provider: Provider, until: DateTime<Utc>) {
        self.change(provider, QuotaChange::SetBackoff(until)).await;
        debug!(%provider, %until, "Backoff set");
    }

    /// Lift any backoff on `provider`.
    #[instrument(skip(self))]
    pub async fn clear_backoff(&self, provider: Provider) {
        // Another process may have set a backoff this one has not seen, so a
        // persistent tracker always goes to the store.
        if self.store.is_none() && self.backoff_until(provider).await.is_none() {
            return;
        }
        self.change(provider, QuotaChange::ClearBackoff).await;
        info!(%provider, "Backoff cleared");
    }

    /// When the current backoff on `provider` ends, if one is set.
    pub async fn backoff_until(&self, provider: Provider) -> Option<DateTime<Utc>> {
        self.states
            .read()
            .await
            .get(&provider)
            .and_then(|s| s.backoff_until)
    }

    /// Whether `provider` is backed off right now.
    pub async fn is_backed_off(&self, provider: Provider) -> bool {
        self.backoff_until(provider)
            .await
            .is_some_and(|until| until > Utc::now())
    }

    /// Snapshot of every provider, including ones never seen.
    pub async fn snapshot_all(&self) -> BTreeMap<Provider, QuotaState> {
        let now = Utc::now();
        let states = self.states.read().await;
        Provider::all()
            .into_iter()
            .map(|provider| {
                let mut state = states.get(&provider).cloned().unwrap_or_default();
                state.trim_window(now);
                (provider, state)
            })
            .collect()
    }

    /// Replace the state of every provider in `states`.
    #[instrument(skip(self, states), fields(count = states.len()))]
    pub async fn restore(&self, states: BTreeMap<Provider, QuotaState>) {
        {
            let mut current = self.states.write().await;
            for (provider, state) in &states {
                current.insert(*provider, state.clone());
            }
        }
        for (provider, state) in &states {
            self.persist(*provider, state).await;
        }
    }

    /// Pull newer state written by other processes from the store.
    ///
    /// A stored state replaces the local one when it is at least as recent.
    /// Returns how many providers were updated. Without a store this is a no-op.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<usize, QueueError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let stored = store.load_all().await?;

        let mut states = self.states.write().await;
        let mut updated = 0;
        for record in stored {
            let written_at = *record.updated_at();
            let (provider, state) = record.into_parts();
            let local_at = states.get(&provider).and_then(|s| s.updated_at);
            if local_at.is_none_or(|local| written_at >= local) {
                states.insert(provider, state);
                updated += 1;
            }
        }
        debug!(updated, "Refreshed quota state from store");
        Ok(updated)
    }

    /// Apply one change, merging it through the store when there is one.
    ///
    /// The store merges per field, so a change never rolls back fields other
    /// processes wrote since this tracker last refreshed. The merged state
    /// replaces the local copy. If the store fails, the change is applied
    /// locally only.
    async fn change(&self, provider: Provider, change: QuotaChange) -> QuotaState {
        if let Some(store) = &self.store {
            match store.apply(provider, &change).await {
                Ok(merged) => {
                    self.states.write().await.insert(provider, merged.clone());
                    return merged;
                }
                Err(e) => warn!(%provider, error = %e, "Failed to persist quota change"),
            }
        }
        let mut states = self.states.write().await;
        let state = states.entry(provider).or_default();
        change.apply(state, Utc::now());
        state.clone()
    }

    async fn persist(&self, provider: Provider, state: &QuotaState) {
        if let Some(store) = &self.store
            && let Err(e) = store.save(provider, state).await
        {
            warn!(%provider, error = %e, "Failed to persist quota state");
        }
    }
}
