//! Row types for the queue tables.

use crate::schema::{quota_states, queued_requests};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use minutes_core::{NewQueuedRequest, Provider, QueuedRequest, QuotaState};
use minutes_error::{QueueError, QueueErrorKind};
use minutes_interface::StoredQuota;
use uuid::Uuid;

/// A row of `queued_requests`.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = queued_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QueuedRequestRow {
    /// Queue position
    pub seq: i64,
    /// Request id
    pub id: String,
    /// Provider name
    pub provider: String,
    /// JSON payload
    pub payload: String,
    /// When the request was deferred
    pub enqueued_at: NaiveDateTime,
    /// Attempts made so far
    pub attempt_count: i32,
    /// Drain lease, if any
    pub claimed_at: Option<NaiveDateTime>,
}

impl TryFrom<QueuedRequestRow> for QueuedRequest {
    type Error = QueueError;

    fn try_from(row: QueuedRequestRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| QueueError::new(QueueErrorKind::Serialization(e.to_string())))?;
        let provider: Provider = row
            .provider
            .parse()
            .map_err(|e: minutes_core::UnknownProvider| {
                QueueError::new(QueueErrorKind::Serialization(e.to_string()))
            })?;
        let payload = serde_json::from_str(&row.payload)?;
        Ok(QueuedRequest::from_parts(
            id,
            provider,
            payload,
            row.enqueued_at.and_utc(),
            u32::try_from(row.attempt_count).unwrap_or(0),
            row.seq,
            row.claimed_at.map(|at| at.and_utc()),
        ))
    }
}

/// Insert form of `queued_requests`; the sequence is assigned by SQLite.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = queued_requests)]
pub struct NewQueuedRequestRow {
    /// Request id
    pub id: String,
    /// Provider name
    pub provider: String,
    /// JSON payload
    pub payload: String,
    /// When the request was deferred
    pub enqueued_at: NaiveDateTime,
    /// Attempts made before deferral
    pub attempt_count: i32,
}

impl TryFrom<&NewQueuedRequest> for NewQueuedRequestRow {
    type Error = QueueError;

    fn try_from(request: &NewQueuedRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            id: request.id().to_string(),
            provider: request.provider().as_str().to_string(),
            payload: serde_json::to_string(request.payload())?,
            enqueued_at: request.enqueued_at().naive_utc(),
            attempt_count: i32::try_from(*request.attempt_count()).unwrap_or(i32::MAX),
        })
    }
}

/// A row of `quota_states`.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = quota_states)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QuotaStateRow {
    /// Provider name
    pub provider: String,
    /// JSON-encoded [`QuotaState`]
    pub state: String,
    /// When the state was last changed
    pub updated_at: NaiveDateTime,
}

impl QuotaStateRow {
    /// Encode a provider's state, stamped with its own `updated_at` or `now`.
    pub fn encode(
        provider: Provider,
        state: &QuotaState,
        now: DateTime<Utc>,
    ) -> Result<Self, QueueError> {
        Ok(Self {
            provider: provider.as_str().to_string(),
            state: serde_json::to_string(state)?,
            updated_at: state.updated_at.unwrap_or(now).naive_utc(),
        })
    }
}

impl TryFrom<QuotaStateRow> for StoredQuota {
    type Error = QueueError;

    fn try_from(row: QuotaStateRow) -> Result<Self, Self::Error> {
        let provider: Provider = row
            .provider
            .parse()
            .map_err(|e: minutes_core::UnknownProvider| {
                QueueError::new(QueueErrorKind::Serialization(e.to_string()))
            })?;
        let state: QuotaState = serde_json::from_str(&row.state)?;
        Ok(StoredQuota::new(provider, state, row.updated_at.and_utc()))
    }
}
