//! SQLite persistence
//!
//! Accounts, copy pairs, custom symbol mappings, the webhook allowlist and
//! both trade histories live in one database. Tables are created on startup.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

mod accounts;
mod copy_pairs;
mod history;
mod symbol_mappings;
mod webhook_accounts;

pub use history::HistoryKind;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn new(database_url: &str) -> Result<Self> {
        // Every connection to `sqlite::memory:` opens its own empty database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .with_context(|| format!("Failed to open database {}", database_url))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                account TEXT PRIMARY KEY,
                nickname TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'Created',
                pid INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS copy_pairs (
                id TEXT PRIMARY KEY,
                master_account TEXT NOT NULL,
                slave_account TEXT NOT NULL,
                master_nickname TEXT NOT NULL DEFAULT '',
                slave_nickname TEXT NOT NULL DEFAULT '',
                api_key TEXT NOT NULL,
                settings TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_copy_pairs_api_key ON copy_pairs(api_key)")
            .execute(&pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS symbol_mappings (
                input TEXT PRIMARY KEY,
                target TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS webhook_accounts (
                account TEXT PRIMARY KEY,
                nickname TEXT NOT NULL DEFAULT '',
                enabled INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                status TEXT NOT NULL,
                account TEXT,
                master TEXT,
                slave TEXT,
                pair_id TEXT,
                payload TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_history_kind_time ON history(kind, timestamp)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp in database: {}", raw))?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests;
