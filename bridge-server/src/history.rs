//! Trade history ring buffers
//!
//! One `HistoryLog` per history kind (webhook trades, copy trades). Entries
//! are kept newest first, capped, written through to the database and pushed
//! to SSE subscribers.

use crate::db::{Database, HistoryKind};
use crate::models::{HistoryEntry, HistoryQuery, HistoryStats, HistoryStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 1000;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Payload pushed to `/events/*` subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum HistoryEvent {
    Entry(HistoryEntry),
    Cleared {
        event: &'static str,
        kind: &'static str,
        timestamp: DateTime<Utc>,
    },
}

pub struct HistoryLog {
    kind: HistoryKind,
    entries: RwLock<VecDeque<HistoryEntry>>,
    cap: usize,
    events: broadcast::Sender<HistoryEvent>,
    db: Option<Arc<Database>>,
}

impl HistoryLog {
    pub fn new(kind: HistoryKind, cap: usize) -> Self {
        let cap = cap.max(1);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            kind,
            entries: RwLock::new(VecDeque::with_capacity(cap)),
            cap,
            events,
            db: None,
        }
    }

    /// Persist entries to `db` from now on
    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn kind(&self) -> HistoryKind {
        self.kind
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Fill the buffer from the database. Returns the number of entries loaded.
    pub async fn load(&self) -> Result<usize> {
        let Some(db) = &self.db else {
            return Ok(0);
        };
        let stored = db.load_history(self.kind, self.cap).await?;
        let mut entries = self.entries.write().await;
        *entries = stored.into_iter().collect();
        Ok(entries.len())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    pub async fn record(&self, entry: HistoryEntry) {
        {
            let mut entries = self.entries.write().await;
            entries.push_front(entry.clone());
            while entries.len() > self.cap {
                entries.pop_back();
            }
        }

        if let Some(db) = &self.db {
            if let Err(e) = db.insert_history(self.kind, &entry, self.cap).await {
                tracing::error!(kind = self.kind.as_str(), error = %e, "Failed to persist history entry");
            }
        }

        tracing::debug!(
            kind = self.kind.as_str(),
            status = entry.status.as_str(),
            action = %entry.action,
            "History entry recorded"
        );

        // No subscribers is fine
        let _ = self.events.send(HistoryEvent::Entry(entry));
    }

    /// Newest first, filtered, `limit` clamped to `1..=MAX_LIST_LIMIT`
    pub async fn list(&self, query: &HistoryQuery) -> Vec<HistoryEntry> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        let status = query
            .status
            .as_deref()
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
            .map(HistoryStatus::from_str);
        let symbol = query.symbol.as_deref().filter(|s| !s.is_empty());
        let account = query.account.as_deref().filter(|s| !s.is_empty());

        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| match status {
                None => true,
                Some(Some(wanted)) => e.status == wanted,
                // An unknown status filter matches nothing
                Some(None) => false,
            })
            .filter(|e| match symbol {
                None => true,
                Some(s) => e.symbol.as_deref().is_some_and(|sym| sym.eq_ignore_ascii_case(s)),
            })
            .filter(|e| account.map_or(true, |a| e.involves(a)))
            .filter(|e| query.since.map_or(true, |since| e.timestamp >= since))
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn stats(&self) -> HistoryStats {
        let entries = self.entries.read().await;
        let total = entries.len();
        let success = entries
            .iter()
            .filter(|e| e.status == HistoryStatus::Success)
            .count();
        let success_rate = if total == 0 {
            0.0
        } else {
            (success as f64 / total as f64 * 10000.0).round() / 100.0
        };

        HistoryStats {
            total,
            success,
            error: total - success,
            success_rate,
        }
    }

    /// Empty the buffer and tell subscribers. Returns how many entries were dropped.
    pub async fn clear(&self) -> Result<usize> {
        let removed = {
            let mut entries = self.entries.write().await;
            let n = entries.len();
            entries.clear();
            n
        };

        if let Some(db) = &self.db {
            db.clear_history(self.kind).await?;
        }

        tracing::info!(kind = self.kind.as_str(), removed, "History cleared");
        let _ = self.events.send(HistoryEvent::Cleared {
            event: "history_cleared",
            kind: self.kind.as_str(),
            timestamp: Utc::now(),
        });
        Ok(removed)
    }

    /// Drop every entry that mentions `account`
    pub async fn remove_account(&self, account: &str) -> Result<usize> {
        let removed = self.retain(|e| !e.involves(account)).await;
        if let Some(db) = &self.db {
            db.delete_history_for_account(self.kind, account).await?;
        }
        Ok(removed)
    }

    async fn retain(&self, keep: impl Fn(&HistoryEntry) -> bool) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| keep(e));
        before - entries.len()
    }
}
