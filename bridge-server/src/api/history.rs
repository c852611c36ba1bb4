//! Webhook trade history (`/trades`) and copy-trade history (`/api/copy/history`)

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::history::HistoryLog;
use crate::models::{HistoryQuery, HistoryStats};

use super::error::internal;
use super::{AppState, ProblemDetails};

#[derive(Debug, Default, Deserialize)]
pub struct ClearParams {
    pub confirm: Option<String>,
}

fn parse_query(query: Result<Query<HistoryQuery>, QueryRejection>) -> Result<HistoryQuery, ProblemDetails> {
    query
        .map(|Query(q)| q)
        .map_err(|e| ProblemDetails::validation_error(format!("Invalid query: {}", e.body_text())))
}

/// `POST .../clear` only acts with `?confirm=1`
fn require_confirm(params: Result<Query<ClearParams>, QueryRejection>) -> Result<(), ProblemDetails> {
    match params {
        Ok(Query(ClearParams { confirm: Some(c) })) if c == "1" => Ok(()),
        _ => Err(ProblemDetails::validation_error("Missing confirm=1")),
    }
}

async fn clear(history: &Arc<HistoryLog>) -> Result<Json<Value>, ProblemDetails> {
    let removed = history
        .clear()
        .await
        .map_err(|e| internal("Failed to clear history", e))?;
    Ok(Json(json!({ "ok": true, "removed": removed })))
}

pub async fn list_trades(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Value>, ProblemDetails> {
    let query = parse_query(query)?;
    let trades = state.trade_history.list(&query).await;
    Ok(Json(json!({ "count": trades.len(), "trades": trades })))
}

pub async fn clear_trades(State(state): State<AppState>) -> Result<Json<Value>, ProblemDetails> {
    clear(&state.trade_history).await
}

pub async fn clear_trades_confirmed(
    State(state): State<AppState>,
    params: Result<Query<ClearParams>, QueryRejection>,
) -> Result<Json<Value>, ProblemDetails> {
    require_confirm(params)?;
    clear(&state.trade_history).await
}

pub async fn list_copy_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Value>, ProblemDetails> {
    let query = parse_query(query)?;
    let history = state.copy_history.list(&query).await;
    Ok(Json(json!({ "count": history.len(), "history": history })))
}

pub async fn clear_copy_history(State(state): State<AppState>) -> Result<Json<Value>, ProblemDetails> {
    clear(&state.copy_history).await
}

pub async fn clear_copy_history_confirmed(
    State(state): State<AppState>,
    params: Result<Query<ClearParams>, QueryRejection>,
) -> Result<Json<Value>, ProblemDetails> {
    require_confirm(params)?;
    clear(&state.copy_history).await
}

pub async fn copy_history_stats(State(state): State<AppState>) -> Json<HistoryStats> {
    Json(state.copy_history.stats().await)
}
