//! Logs endpoint handler
//!
//! Serves the newest entries of the in-memory log buffer.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::log_buffer::{LogEntry, MAX_LOG_ENTRIES};

use super::AppState;

const DEFAULT_LIMIT: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
    /// Exact level to keep (e.g. `WARN`), case-insensitive
    pub level: Option<String>,
}

/// Get server logs from the log buffer, newest first
pub async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<LogEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LOG_ENTRIES);
    let logs = state
        .log_buffer
        .recent(limit, query.level.as_deref().filter(|l| !l.is_empty()))
        .await;

    tracing::debug!(count = logs.len(), "Retrieved server logs");
    Json(logs)
}
