//! Per-provider quota state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Width of the sliding window of recent request timestamps.
pub const REQUEST_WINDOW_SECS: i64 = 60;

/// What we currently know about one provider's limits.
///
/// Fields are only ever filled from response headers, backoff decisions and
/// recorded requests. Nothing is decremented speculatively, so a field stays
/// `None` until the provider reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaState {
    /// Request ceiling for the current window
    pub requests_limit: Option<u64>,
    /// Requests left in the current window
    pub requests_remaining: Option<u64>,
    /// When the request window resets
    pub requests_reset_at: Option<DateTime<Utc>>,
    /// Token ceiling for the current window
    pub tokens_limit: Option<u64>,
    /// Tokens left in the current window
    pub tokens_remaining: Option<u64>,
    /// When the token window resets
    pub tokens_reset_at: Option<DateTime<Utc>>,
    /// Last `retry-after` the provider sent, in seconds
    pub retry_after: Option<f64>,
    /// Requests issued in the last minute
    #[serde(default)]
    pub recent_requests: VecDeque<DateTime<Utc>>,
    /// Calls to this provider are deferred until this instant
    pub backoff_until: Option<DateTime<Utc>>,
    /// Last time any field changed
    pub updated_at: Option<DateTime<Utc>>,
}

impl QuotaState {
    /// Record one request issued at `now`, trimming the window.
    pub fn push_request(&mut self, now: DateTime<Utc>) {
        self.recent_requests.push_back(now);
        self.trim_window(now);
        self.updated_at = Some(now);
    }

    /// Drop timestamps older than the sliding window.
    pub fn trim_window(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(REQUEST_WINDOW_SECS);
        while self
            .recent_requests
            .front()
            .is_some_and(|ts| *ts <= cutoff)
        {
            self.recent_requests.pop_front();
        }
    }

    /// Requests issued in the last minute as of `now`.
    pub fn requests_last_minute(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::seconds(REQUEST_WINDOW_SECS);
        self.recent_requests.iter().filter(|ts| **ts > cutoff).count()
    }

    /// Whether a backoff is in force at `now`.
    pub fn is_backed_off(&self, now: DateTime<Utc>) -> bool {
        self.backoff_until.is_some_and(|until| until > now)
    }

    /// Time left on the backoff, if any.
    pub fn backoff_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.backoff_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }
}

/// Fields found in one response's headers.
///
/// Every field is optional; applying an update only touches the fields the
/// provider actually sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuotaUpdate {
    /// Request ceiling
    pub requests_limit: Option<u64>,
    /// Requests left
    pub requests_remaining: Option<u64>,
    /// Request window reset
    pub requests_reset_at: Option<DateTime<Utc>>,
    /// Token ceiling
    pub tokens_limit: Option<u64>,
    /// Tokens left
    pub tokens_remaining: Option<u64>,
    /// Token window reset
    pub tokens_reset_at: Option<DateTime<Utc>>,
    /// Provider-mandated wait, in seconds
    pub retry_after: Option<f64>,
}

impl QuotaUpdate {
    /// Whether the headers carried anything we understood.
    pub fn is_empty(&self) -> bool {
        *self == QuotaUpdate::default()
    }

    /// Copy every present field onto `state`.
    pub fn apply(&self, state: &mut QuotaState, now: DateTime<Utc>) {
        if self.is_empty() {
            return;
        }
        if let Some(v) = self.requests_limit {
            state.requests_limit = Some(v);
        }
        if let Some(v) = self.requests_remaining {
            state.requests_remaining = Some(v);
        }
        if let Some(v) = self.requests_reset_at {
            state.requests_reset_at = Some(v);
        }
        if let Some(v) = self.tokens_limit {
            state.tokens_limit = Some(v);
        }
        if let Some(v) = self.tokens_remaining {
            state.tokens_remaining = Some(v);
        }
        if let Some(v) = self.tokens_reset_at {
            state.tokens_reset_at = Some(v);
        }
        if let Some(v) = self.retry_after {
            state.retry_after = Some(v);
        }
        state.updated_at = Some(now);
    }
}

/// One change to a provider's quota state.
///
/// Changes touch only the fields they name, so a store can merge a change
/// from one process into state written by another without losing either.
#[derive(Debug, Clone, PartialEq)]
pub enum QuotaChange {
    /// Counters and reset times from a response's headers
    Headers(QuotaUpdate),
    /// A request was issued at this instant
    Request(DateTime<Utc>),
    /// Calls are deferred until this instant
    SetBackoff(DateTime<Utc>),
    /// Any backoff is lifted
    ClearBackoff,
}

impl QuotaChange {
    /// Apply the change to `state` as of `now`.
    pub fn apply(&self, state: &mut QuotaState, now: DateTime<Utc>) {
        match self {
            QuotaChange::Headers(update) => update.apply(state, now),
            QuotaChange::Request(at) => {
                // Other processes may have recorded later requests already.
                let position = state.recent_requests.partition_point(|ts| ts <= at);
                state.recent_requests.insert(position, *at);
                state.trim_window(now);
                state.updated_at = Some(now);
            }
            QuotaChange::SetBackoff(until) => {
                state.backoff_until = Some(*until);
                state.updated_at = Some(now);
            }
            QuotaChange::ClearBackoff => {
                if state.backoff_until.take().is_some() {
                    state.updated_at = Some(now);
                }
            }
        }
    }
}
