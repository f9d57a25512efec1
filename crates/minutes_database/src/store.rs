//! SQLite implementation of QuotaStore.

use crate::{DatabaseResult, QueueDatabase};
use crate::models::QuotaStateRow;
use crate::schema::quota_states;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use minutes_core::{Provider, QuotaChange, QuotaState};
use minutes_error::QueueError;
use minutes_interface::{QuotaStore, StoredQuota};
use tracing::{instrument, trace};

/// Quota state kept in the same database as the request queue.
///
/// One row per provider holding the JSON-encoded state. [`QuotaStore::apply`]
/// reads, merges and writes the row inside one `BEGIN IMMEDIATE`
/// transaction, so concurrent processes never overwrite each other's fields.
/// [`QuotaStore::save`] upserts the whole state.
#[derive(Debug, Clone)]
pub struct SqliteQuotaStore {
    db: QueueDatabase,
}

impl SqliteQuotaStore {
    /// Create a store over an open database.
    pub fn new(db: QueueDatabase) -> Self {
        Self { db }
    }
}

fn upsert(conn: &mut SqliteConnection, row: &QuotaStateRow) -> DatabaseResult<()> {
    diesel::insert_into(quota_states::table)
        .values(row)
        .on_conflict(quota_states::provider)
        .do_update()
        .set(row)
        .execute(conn)?;
    Ok(())
}

#[async_trait]
impl QuotaStore for SqliteQuotaStore {
    #[instrument(skip(self, change))]
    async fn apply(
        &self,
        provider: Provider,
        change: &QuotaChange,
    ) -> Result<QuotaState, QueueError> {
        let change = change.clone();
        let merged = self
            .db
            .run(move |conn| {
                conn.immediate_transaction(|conn| {
                    let stored: Option<QuotaStateRow> = quota_states::table
                        .find(provider.as_str())
                        .select(QuotaStateRow::as_select())
                        .first(conn)
                        .optional()?;
                    let mut state = match stored {
                        Some(row) => StoredQuota::try_from(row)?.into_parts().1,
                        None => QuotaState::default(),
                    };
                    let now = Utc::now();
                    change.apply(&mut state, now);
                    upsert(conn, &QuotaStateRow::encode(provider, &state, now)?)?;
                    Ok(state)
                })
            })
            .await?;
        trace!("Quota change merged");
        Ok(merged)
    }

    #[instrument(skip(self, state))]
    async fn save(&self, provider: Provider, state: &QuotaState) -> Result<(), QueueError> {
        let row = QuotaStateRow::encode(provider, state, Utc::now())?;
        self.db.run(move |conn| upsert(conn, &row)).await?;
        trace!("Quota state saved");
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<StoredQuota>, QueueError> {
        self.db
            .run(|conn| {
                let rows: Vec<QuotaStateRow> = quota_states::table
                    .select(QuotaStateRow::as_select())
                    .order(quota_states::provider.asc())
                    .load(conn)?;
                rows.into_iter().map(StoredQuota::try_from).collect()
            })
            .await
    }
}
