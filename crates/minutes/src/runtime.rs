//! Wiring a rate limiter to durable storage.

use minutes_database::{QueueDatabase, SqliteQuotaStore, SqliteRequestQueue, resolve_database_url};
use minutes_error::MinutesResult;
use minutes_rate_limit::{MinutesConfig, QuotaTracker, RateLimiter};
use std::sync::Arc;
use tracing::{info, instrument};

/// Build a [`RateLimiter`] backed by the SQLite queue and quota store.
///
/// The database location comes from `config.queue.database_url`, overridden
/// by `DATABASE_URL`. Every process opening the same file shares the queue
/// and the providers' backoff windows.
///
/// # Errors
///
/// Fails if the database cannot be opened or migrated, or if the retry
/// configuration is invalid.
#[instrument(skip(config))]
pub async fn open_limiter(config: &MinutesConfig) -> MinutesResult<RateLimiter> {
    let url = resolve_database_url(&config.queue.database_url);
    let db = QueueDatabase::open(&url).await?;

    let queue = SqliteRequestQueue::new(
        db.clone(),
        config.queue.max_size,
        config.queue.claim_timeout(),
    );
    let tracker = QuotaTracker::with_store(Arc::new(SqliteQuotaStore::new(db)));
    let limiter = RateLimiter::new(config.retry.clone(), tracker, Arc::new(queue))?;

    info!(database = %url, "Rate limiter ready");
    Ok(limiter)
}
