//! Persisted history rows
//!
//! The in-memory ring buffers are the source of truth while running; rows are
//! written through so the buffers survive a restart, and pruned to the same cap.

use super::{format_timestamp, Database};
use crate::models::HistoryEntry;
use anyhow::Result;
use sqlx::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    /// Webhook deliveries (`/trades`)
    Trades,
    /// Copy-trading deliveries (`/api/copy/history`)
    CopyTrades,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Trades => "trades",
            HistoryKind::CopyTrades => "copy_trades",
        }
    }
}

impl Database {
    /// Insert an entry and drop the oldest rows beyond `cap`
    pub async fn insert_history(
        &self,
        kind: HistoryKind,
        entry: &HistoryEntry,
        cap: usize,
    ) -> Result<()> {
        let payload = serde_json::to_string(entry)?;

        sqlx::query(
            "INSERT INTO history (id, kind, timestamp, status, account, master, slave, pair_id, payload)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(kind.as_str())
        .bind(format_timestamp(&entry.timestamp))
        .bind(entry.status.as_str())
        .bind(&entry.account)
        .bind(&entry.master)
        .bind(&entry.slave)
        .bind(&entry.pair_id)
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "DELETE FROM history WHERE kind = ? AND id NOT IN (
                 SELECT id FROM history WHERE kind = ?
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?
             )",
        )
        .bind(kind.as_str())
        .bind(kind.as_str())
        .bind(cap as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest first
    pub async fn load_history(&self, kind: HistoryKind, limit: usize) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            "SELECT payload FROM history WHERE kind = ?
             ORDER BY timestamp DESC, rowid DESC LIMIT ?",
        )
        .bind(kind.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.get("payload");
            match serde_json::from_str::<HistoryEntry>(&payload) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable history row"),
            }
        }
        Ok(entries)
    }

    pub async fn clear_history(&self, kind: HistoryKind) -> Result<u64> {
        let result = sqlx::query("DELETE FROM history WHERE kind = ?")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Remove every row mentioning `account` in any role
    pub async fn delete_history_for_account(&self, kind: HistoryKind, account: &str) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM history WHERE kind = ? AND (account = ? OR master = ? OR slave = ?)",
        )
        .bind(kind.as_str())
        .bind(account)
        .bind(account)
        .bind(account)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
