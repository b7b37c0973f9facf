//! Versioned, idempotent schema migrations applied at startup.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "goals and workflows tables",
        sql: r#"
            CREATE TABLE IF NOT EXISTS goals (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                description TEXT NOT NULL,
                goal_type TEXT NOT NULL,
                domain TEXT NOT NULL,
                priority INTEGER NOT NULL,
                status TEXT NOT NULL,
                confidence REAL NOT NULL,
                context TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_goals_agent_status ON goals(agent_id, status);
            CREATE INDEX IF NOT EXISTS idx_goals_fingerprint ON goals(fingerprint);

            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                goal_id TEXT,
                project_id TEXT,
                status TEXT NOT NULL,
                is_ui_request INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                artifacts TEXT NOT NULL,
                error TEXT,
                steps TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_workflows_status ON workflows(status);
            CREATE INDEX IF NOT EXISTS idx_workflows_goal ON workflows(goal_id);
        "#,
    },
];

pub async fn run(pool: &SqlitePool) -> Result<()> {
    ensure_migrations_table(pool).await?;
    let current = current_version(pool).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(pool, migration).await?;
    }
    Ok(())
}

async fn ensure_migrations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL,
            description TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("failed to create schema_migrations table")?;
    Ok(())
}

async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
        .fetch_one(pool)
        .await
        .context("failed to read current schema version")?;
    Ok(row.0)
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::raw_sql(migration.sql)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("migration {} failed", migration.version))?;
    sqlx::query(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at, description) VALUES (?, datetime('now'), ?)",
    )
    .bind(migration.version)
    .bind(migration.description)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    info!(version = migration.version, description = migration.description, "applied migration");
    Ok(())
}
