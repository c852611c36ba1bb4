//! Symbol mapping administration
//!
//! Custom mappings are written to the database first and then applied to the
//! shared mapper, so the next webhook or copy signal already uses them.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::domain::services::symbol_mapper::{MappingStats, MappingTestResult};

use super::error::internal;
use super::{AppState, ProblemDetails};

#[derive(Debug, Deserialize)]
pub struct MappingRequest {
    pub input: String,
    pub target: String,
}

#[derive(Debug, Deserialize)]
pub struct MappingTestRequest {
    pub symbols: Vec<String>,
    /// Map against this account's Market Watch
    #[serde(default)]
    pub account: Option<String>,
    /// Explicit candidate list; takes precedence over `account`
    #[serde(default)]
    pub available: Option<Vec<String>>,
}

pub async fn list_mappings(State(state): State<AppState>) -> Json<Value> {
    let mapper = state.mapper.read().await;
    // Sorted for stable output
    let mappings: BTreeMap<&String, &String> = mapper.custom_mappings().iter().collect();
    Json(json!({ "count": mappings.len(), "mappings": mappings }))
}

pub async fn upsert_mapping(
    State(state): State<AppState>,
    payload: Result<Json<MappingRequest>, JsonRejection>,
) -> Result<Json<Value>, ProblemDetails> {
    let Json(request) = payload.map_err(|e| {
        ProblemDetails::validation_error(format!("Invalid request body: {}", e.body_text()))
    })?;

    let input = request.input.trim();
    let target = request.target.trim();
    if input.is_empty() || target.is_empty() {
        return Err(ProblemDetails::validation_error(
            "Both input and target are required",
        ));
    }

    state
        .db
        .upsert_symbol_mapping(input, target)
        .await
        .map_err(|e| internal("Failed to save symbol mapping", e))?;
    state.mapper.write().await.set_custom(input, target);

    tracing::info!(input = %input, target = %target, "Custom symbol mapping saved");
    Ok(Json(json!({
        "ok": true,
        "input": input.to_lowercase(),
        "target": target.to_uppercase(),
    })))
}

pub async fn delete_mapping(
    State(state): State<AppState>,
    Path(input): Path<String>,
) -> Result<StatusCode, ProblemDetails> {
    let stored = state
        .db
        .delete_symbol_mapping(&input)
        .await
        .map_err(|e| internal("Failed to delete symbol mapping", e))?;
    let cached = state.mapper.write().await.remove_custom(&input);

    if !stored && !cached {
        return Err(ProblemDetails::not_found(format!("Symbol mapping {}", input))
            .with_instance(format!("/api/symbols/mappings/{}", input)));
    }
    tracing::info!(input = %input, "Custom symbol mapping removed");
    Ok(StatusCode::NO_CONTENT)
}

/// Dry-run the mapper over a batch of symbols
pub async fn test_mapping(
    State(state): State<AppState>,
    payload: Result<Json<MappingTestRequest>, JsonRejection>,
) -> Result<Json<Vec<MappingTestResult>>, ProblemDetails> {
    let Json(request) = payload.map_err(|e| {
        ProblemDetails::validation_error(format!("Invalid request body: {}", e.body_text()))
    })?;
    if request.symbols.is_empty() {
        return Err(ProblemDetails::validation_error("symbols must not be empty"));
    }

    let available = match (request.available, request.account.as_deref()) {
        (Some(list), _) => list,
        (None, Some(account)) => state.symbols.available_symbols(account).await,
        (None, None) => Vec::new(),
    };

    let mapper = state.mapper.read().await;
    Ok(Json(mapper.test_mapping(&request.symbols, &available)))
}

pub async fn mapping_stats(State(state): State<AppState>) -> Json<MappingStats> {
    Json(state.mapper.read().await.stats())
}
