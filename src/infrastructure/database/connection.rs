//! SQLite connection pool setup: WAL mode, busy-timeout, and pool sizing
//! tuned for a handful of long-lived background tasks doing small, frequent
//! writes (goal/workflow state transitions) rather than bulk throughput.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Owns the pool and exposes it for repository adapters.
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Opens (creating if absent) the database at `path` with WAL mode and
    /// a small pool, then applies pending migrations.
    pub async fn connect(path: &str, max_connections: u32) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .context("invalid sqlite connection string")?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections.max(1))
            .idle_timeout(Duration::from_secs(30))
            .max_lifetime(Duration::from_secs(30 * 60))
            .connect_with(options)
            .await
            .context("failed to open sqlite pool")?;

        info!(path, max_connections, "database pool opened");

        let conn = Self { pool };
        conn.migrate().await?;
        Ok(conn)
    }

    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .journal_mode(SqliteJournalMode::Memory)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect_with(options)
            .await
            .context("failed to open in-memory sqlite pool")?;
        let conn = Self { pool };
        conn.migrate().await?;
        Ok(conn)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        super::migrations::run(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_pool_opens_and_migrates() {
        let conn = DatabaseConnection::in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(conn.pool())
            .await
            .unwrap();
        assert!(row.0 > 0);
    }
}
