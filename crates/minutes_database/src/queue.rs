//! SQLite implementation of RequestQueue.

use crate::models::{NewQueuedRequestRow, QueuedRequestRow};
use crate::schema::queued_requests;
use crate::{DatabaseResult, QueueDatabase};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use minutes_core::{NewQueuedRequest, Provider, QueuedRequest};
use minutes_error::{QueueError, QueueErrorKind};
use minutes_interface::RequestQueue;
use std::time::Duration;
use tracing::{debug, instrument};

/// Request queue stored in a SQLite table.
///
/// Requests survive restarts and are shared by every process that opens the
/// same file. Order is the autoincrement `seq` column, which a released
/// request keeps.
///
/// # Example
/// ```no_run
/// use minutes_database::{QueueDatabase, SqliteRequestQueue};
/// use std::time::Duration;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let db = QueueDatabase::open("minutes_queue.db").await?;
/// let queue = SqliteRequestQueue::new(db, 1000, Duration::from_secs(300));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteRequestQueue {
    db: QueueDatabase,
    max_size: usize,
    claim_timeout: chrono::Duration,
}

impl SqliteRequestQueue {
    /// Create a queue holding at most `max_size` requests.
    ///
    /// A claim older than `claim_timeout` is treated as abandoned and the
    /// request becomes claimable again.
    pub fn new(db: QueueDatabase, max_size: usize, claim_timeout: Duration) -> Self {
        Self {
            db,
            max_size,
            claim_timeout: chrono::Duration::from_std(claim_timeout)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// The underlying database.
    pub fn database(&self) -> &QueueDatabase {
        &self.db
    }
}

fn provider_names(providers: &[Provider]) -> Vec<String> {
    providers.iter().map(|p| p.as_str().to_string()).collect()
}

/// Sequence of the row behind `claimed`, if the caller still holds its lease.
fn held(conn: &mut SqliteConnection, claimed: &QueuedRequest) -> DatabaseResult<i64> {
    let stored: Option<(i64, Option<NaiveDateTime>)> = queued_requests::table
        .filter(queued_requests::id.eq(claimed.id().to_string()))
        .select((queued_requests::seq, queued_requests::claimed_at))
        .first(conn)
        .optional()?;
    let Some((seq, lease)) = stored else {
        return Err(QueueError::new(QueueErrorKind::NotFound(
            claimed.id().to_string(),
        )));
    };
    if lease != claimed.claimed_at().map(|at| at.naive_utc()) {
        return Err(QueueError::new(QueueErrorKind::LeaseLost(
            claimed.id().to_string(),
        )));
    }
    Ok(seq)
}

fn count(conn: &mut SqliteConnection, provider: Option<Provider>) -> DatabaseResult<usize> {
    let mut query = queued_requests::table
        .select(diesel::dsl::count_star())
        .into_boxed();
    if let Some(provider) = provider {
        query = query.filter(queued_requests::provider.eq(provider.as_str()));
    }
    let total: i64 = query.get_result(conn)?;
    Ok(usize::try_from(total).unwrap_or(0))
}

#[async_trait]
impl RequestQueue for SqliteRequestQueue {
    #[instrument(skip(self, request), fields(provider = %request.provider()))]
    async fn enqueue(&self, request: NewQueuedRequest) -> Result<QueuedRequest, QueueError> {
        let max_size = self.max_size;
        let row = NewQueuedRequestRow::try_from(&request)?;
        let id = row.id.clone();

        let queued = self
            .db
            .run(move |conn| {
                conn.immediate_transaction(|conn| {
                    if count(conn, None)? >= max_size {
                        return Err(QueueError::new(QueueErrorKind::Full(max_size)));
                    }
                    diesel::insert_into(queued_requests::table)
                        .values(&row)
                        .execute(conn)?;
                    let stored: QueuedRequestRow = queued_requests::table
                        .filter(queued_requests::id.eq(&id))
                        .select(QueuedRequestRow::as_select())
                        .first(conn)?;
                    QueuedRequest::try_from(stored)
                })
            })
            .await?;

        debug!(sequence = queued.sequence(), "Request enqueued");
        Ok(queued)
    }

    #[instrument(skip(self))]
    async fn claim_next(&self, providers: &[Provider]) -> Result<Option<QueuedRequest>, QueueError> {
        if providers.is_empty() {
            return Ok(None);
        }
        let names = provider_names(providers);
        let now = Utc::now();
        let stale_before = now
            .checked_sub_signed(self.claim_timeout)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
            .naive_utc();

        self.db
            .run(move |conn| {
                conn.immediate_transaction(|conn| {
                    let next: Option<QueuedRequestRow> = queued_requests::table
                        .filter(queued_requests::provider.eq_any(&names))
                        .filter(
                            queued_requests::claimed_at
                                .is_null()
                                .or(queued_requests::claimed_at.le(stale_before)),
                        )
                        .order(queued_requests::seq.asc())
                        .select(QueuedRequestRow::as_select())
                        .first(conn)
                        .optional()?;

                    let Some(row) = next else {
                        return Ok(None);
                    };
                    let seq = row.seq;
                    let mut claimed = QueuedRequest::try_from(row)?;
                    claimed.claim(now);
                    diesel::update(queued_requests::table.find(seq))
                        .set(
                            queued_requests::claimed_at
                                .eq(claimed.claimed_at().map(|at| at.naive_utc())),
                        )
                        .execute(conn)?;
                    Ok(Some(claimed))
                })
            })
            .await
    }

    #[instrument(skip(self, claimed), fields(id = %claimed.id()))]
    async fn renew(&self, claimed: &QueuedRequest) -> Result<QueuedRequest, QueueError> {
        let mut renewed = claimed.clone();
        renewed.claim(Utc::now());
        let token = claimed.clone();
        let at = renewed.claimed_at().map(|at| at.naive_utc());

        self.db
            .run(move |conn| {
                conn.immediate_transaction(|conn| {
                    let seq = held(conn, &token)?;
                    diesel::update(queued_requests::table.find(seq))
                        .set(queued_requests::claimed_at.eq(at))
                        .execute(conn)?;
                    Ok(())
                })
            })
            .await?;
        Ok(renewed)
    }

    #[instrument(skip(self, claimed), fields(id = %claimed.id()))]
    async fn complete(&self, claimed: &QueuedRequest) -> Result<(), QueueError> {
        let token = claimed.clone();
        self.db
            .run(move |conn| {
                conn.immediate_transaction(|conn| {
                    let seq = held(conn, &token)?;
                    diesel::delete(queued_requests::table.find(seq)).execute(conn)?;
                    Ok(())
                })
            })
            .await
    }

    #[instrument(skip(self, claimed), fields(id = %claimed.id()))]
    async fn release(&self, claimed: &QueuedRequest, attempt_count: u32) -> Result<(), QueueError> {
        let token = claimed.clone();
        let attempts = i32::try_from(attempt_count).unwrap_or(i32::MAX);
        self.db
            .run(move |conn| {
                conn.immediate_transaction(|conn| {
                    let seq = held(conn, &token)?;
                    diesel::update(queued_requests::table.find(seq))
                        .set((
                            queued_requests::claimed_at.eq(None::<NaiveDateTime>),
                            queued_requests::attempt_count.eq(attempts),
                        ))
                        .execute(conn)?;
                    Ok(())
                })
            })
            .await
    }

    fn lease_duration(&self) -> Duration {
        self.claim_timeout.to_std().unwrap_or(Duration::MAX)
    }

    async fn list(
        &self,
        provider: Option<Provider>,
        limit: usize,
    ) -> Result<Vec<QueuedRequest>, QueueError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.db
            .run(move |conn| {
                let mut query = queued_requests::table
                    .select(QueuedRequestRow::as_select())
                    .into_boxed();
                if let Some(provider) = provider {
                    query = query.filter(queued_requests::provider.eq(provider.as_str()));
                }
                let rows: Vec<QueuedRequestRow> = query
                    .order(queued_requests::seq.asc())
                    .limit(limit)
                    .load(conn)?;
                rows.into_iter().map(QueuedRequest::try_from).collect()
            })
            .await
    }

    async fn size(&self, provider: Option<Provider>) -> Result<usize, QueueError> {
        self.db.run(move |conn| count(conn, provider)).await
    }

    #[instrument(skip(self))]
    async fn clear(&self, provider: Option<Provider>) -> Result<usize, QueueError> {
        self.db
            .run(move |conn| {
                let removed = match provider {
                    Some(p) => diesel::delete(
                        queued_requests::table.filter(queued_requests::provider.eq(p.as_str())),
                    )
                    .execute(conn)?,
                    None => diesel::delete(queued_requests::table).execute(conn)?,
                };
                Ok(removed)
            })
            .await
    }
}
