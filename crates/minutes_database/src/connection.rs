//! Database connection utilities.

use crate::DatabaseResult;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use minutes_error::{QueueError, QueueErrorKind};
use std::time::Duration;
use tracing::{info, instrument};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Resolve the queue database location.
///
/// `DATABASE_URL` wins over the configured value. A leading `sqlite:` or
/// `sqlite://` is stripped. Loading a `.env` file is left to the binary.
pub fn resolve_database_url(configured: &str) -> String {
    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| configured.to_string());
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(&url)
        .to_string()
}

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(
            "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000; PRAGMA synchronous = NORMAL;",
        )
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// A pooled SQLite database with the queue schema applied.
///
/// Cloning shares the pool. Diesel is synchronous, so every query runs on
/// tokio's blocking thread pool through [`QueueDatabase::run`].
#[derive(Clone)]
pub struct QueueDatabase {
    pool: Pool<ConnectionManager<SqliteConnection>>,
    url: String,
}

impl std::fmt::Debug for QueueDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueDatabase")
            .field("url", &self.url)
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

impl QueueDatabase {
    /// Open (creating if needed) the database at `url` and run pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if the pool cannot be built and `Migration` if
    /// the schema cannot be applied.
    #[instrument]
    pub async fn open(url: &str) -> DatabaseResult<Self> {
        let url = url.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url.clone());
        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(Duration::from_secs(10))
            .connection_customizer(Box::new(SqlitePragmas))
            .build(manager)
            .map_err(|e| QueueError::new(QueueErrorKind::Connection(e.to_string())))?;

        let db = Self { pool, url };
        db.run(|conn| {
            let applied = conn
                .run_pending_migrations(MIGRATIONS)
                .map_err(|e| QueueError::new(QueueErrorKind::Migration(e.to_string())))?;
            for migration in &applied {
                info!("Applied migration: {}", migration);
            }
            Ok(())
        })
        .await?;
        Ok(db)
    }

    /// Location of the database file.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    pub async fn run<T, F>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&mut SqliteConnection) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| QueueError::new(QueueErrorKind::Connection(e.to_string())))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            QueueError::new(QueueErrorKind::Connection(format!(
                "Database task failed: {}",
                e
            )))
        })?
    }
}
