//! Status snapshots for operators.

use crate::{AlertLevel, RemainingFraction};
use chrono::{DateTime, Utc};
use minutes_core::{Provider, QuotaState};
use minutes_error::{IoError, JsonError, MinutesResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything known about one provider at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    /// Provider this status describes
    pub provider: Provider,
    /// Full quota state, as tracked
    pub quota: QuotaState,
    /// Requests issued in the last minute
    pub requests_last_minute: usize,
    /// Share of requests and tokens left
    pub remaining: RemainingFraction,
    /// Alert band, when limits are known
    pub alert: Option<AlertLevel>,
    /// Requests waiting in the queue
    pub queue_size: usize,
}

impl ProviderStatus {
    /// Build a status from a quota snapshot and the provider's queue size.
    pub fn new(provider: Provider, quota: QuotaState, queue_size: usize, now: DateTime<Utc>) -> Self {
        let remaining = RemainingFraction::from_state(&quota);
        Self {
            provider,
            requests_last_minute: quota.requests_last_minute(now),
            alert: remaining.alert_level(),
            remaining,
            quota,
            queue_size,
        }
    }

    /// Human-readable backoff description.
    pub fn backoff_label(&self, now: DateTime<Utc>) -> String {
        match self.quota.backoff_until {
            None => String::from("No backoff"),
            Some(until) if until <= now => String::from("Ready"),
            Some(until) => until.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }
}

/// Exported status of every provider.
///
/// # Examples
///
/// ```
/// use minutes_rate_limit::StatusReport;
///
/// let report = StatusReport::new(Vec::new());
/// let json = report.to_json().unwrap();
/// let back = StatusReport::from_json(&json).unwrap();
/// assert_eq!(back, report);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// When the report was taken
    pub timestamp: DateTime<Utc>,
    /// One entry per provider
    pub rate_limits: Vec<ProviderStatus>,
}

impl StatusReport {
    /// Stamp a report now.
    pub fn new(rate_limits: Vec<ProviderStatus>) -> Self {
        Self {
            timestamp: Utc::now(),
            rate_limits,
        }
    }

    /// Quota states keyed by provider, as needed to restore a tracker.
    pub fn quota_states(&self) -> BTreeMap<Provider, QuotaState> {
        self.rate_limits
            .iter()
            .map(|status| (status.provider, status.quota.clone()))
            .collect()
    }

    /// Status of one provider, if present.
    pub fn provider(&self, provider: Provider) -> Option<&ProviderStatus> {
        self.rate_limits.iter().find(|s| s.provider == provider)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> MinutesResult<String> {
        Ok(serde_json::to_string_pretty(self).map_err(|e| JsonError::from(e))?)
    }

    /// Parse a report from JSON.
    pub fn from_json(text: &str) -> MinutesResult<Self> {
        Ok(serde_json::from_str(text).map_err(|e| JsonError::from(e))?)
    }

    /// Write the report to `path` as JSON.
    pub fn write_to(&self, path: impl AsRef<std::path::Path>) -> MinutesResult<()> {
        let text = self.to_json()?;
        std::fs::write(path, text).map_err(IoError::from)?;
        Ok(())
    }

    /// Read a report from a JSON file.
    pub fn read_from(path: impl AsRef<std::path::Path>) -> MinutesResult<Self> {
        let text = std::fs::read_to_string(path).map_err(IoError::from)?;
        Self::from_json(&text)
    }
}
