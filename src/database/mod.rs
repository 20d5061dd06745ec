//! SQLite storage substrate shared by the id allocator, ledger store and audit log.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::LedgerError;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to a file-backed database, creating it if needed.
    pub async fn new(database_url: &str) -> Result<Self, LedgerError> {
        if is_memory_url(database_url) {
            return Self::new_in_memory().await;
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        info!("Connected to ledger database {}", database_url);
        Ok(Database { pool })
    }

    /// In-memory database for tests. Every pooled connection to `:memory:`
    /// would open its own empty database, so the pool is pinned to one.
    pub async fn new_in_memory() -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        debug!("Opened in-memory ledger database");
        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Ledger schema migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_memory_url(url: &str) -> bool {
    url == "sqlite::memory:" || url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_migrates() {
        let db = Database::new_in_memory().await.unwrap();
        db.run_migrations().await.unwrap();

        let sequences: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM id_sequences")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(sequences, 2);
    }

    #[tokio::test]
    async fn test_migrations_are_repeatable() {
        let db = Database::new_in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        db.run_migrations().await.unwrap();
    }

    #[test]
    fn test_memory_url_detection() {
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite://file:ledger?mode=memory&cache=shared"));
        assert!(!is_memory_url("sqlite://diagnostic-ledger.db"));
    }
}
