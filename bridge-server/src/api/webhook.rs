//! Webhook endpoints
//!
//! `POST /webhook/:token` accepts TradingView style alerts. The token in the
//! path is the only credential; everything else about the webhook is public.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::instrument;

use crate::domain::services::validate_webhook;
use crate::models::{DispatchSummary, WebhookAction, WebhookRequest};

use super::middleware::secure_eq;
use super::{AppState, ProblemDetails};

/// Receive a trade alert and fan it out to the addressed accounts
#[instrument(skip_all)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(token): Path<String>,
    payload: Result<Json<WebhookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DispatchSummary>), ProblemDetails> {
    if !secure_eq(&token, &state.config.webhook.token) {
        tracing::warn!("Webhook called with an invalid token");
        return Err(ProblemDetails::unauthorized("Invalid webhook token", None));
    }

    let Json(request) = payload.map_err(|e| {
        tracing::warn!(error = %e, "Webhook payload is not valid JSON");
        ProblemDetails::validation_error(format!("Invalid JSON payload: {}", e.body_text()))
    })?;

    let order = validate_webhook(request).map_err(|e| {
        tracing::warn!(error = %e, "Webhook payload rejected");
        ProblemDetails::validation_error(e.to_string())
    })?;

    tracing::info!(
        action = order.action.as_str(),
        symbol = ?order.symbol,
        accounts = order.accounts.len(),
        "Webhook received"
    );

    let summary = state.webhook.dispatch(&order).await;
    let status = if summary.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(summary)))
}

pub async fn webhook_info() -> Json<Value> {
    let actions: Vec<&str> = WebhookAction::ALL.iter().map(|a| a.as_str()).collect();
    Json(json!({
        "message": "Webhook endpoint active",
        "supported_methods": ["POST"],
        "endpoint_format": "/webhook/{token}",
        "health_check": "/webhook/health",
        "supported_actions": actions,
        "timestamp": Utc::now(),
    }))
}

pub async fn webhook_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "webhook_status": "active",
        "timestamp": Utc::now(),
    }))
}

/// Full URL to configure in the signal provider
pub async fn webhook_url(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "url": state.config.webhook_url() }))
}
