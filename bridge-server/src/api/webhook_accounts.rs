//! Webhook allowlist
//!
//! While the list is empty the webhook may trade on every registered account.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::adapters::outbound::is_valid_account_id;
use crate::models::WebhookAccount;

use super::error::internal;
use super::{AppState, ProblemDetails};

pub async fn list_webhook_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<WebhookAccount>>, ProblemDetails> {
    let entries = state
        .db
        .list_webhook_accounts()
        .await
        .map_err(|e| internal("Failed to list webhook accounts", e))?;
    Ok(Json(entries))
}

/// Add an account to the allowlist, or update its nickname / enabled flag
pub async fn upsert_webhook_account(
    State(state): State<AppState>,
    payload: Result<Json<WebhookAccount>, JsonRejection>,
) -> Result<Json<Value>, ProblemDetails> {
    let Json(mut entry) = payload.map_err(|e| {
        ProblemDetails::validation_error(format!("Invalid request body: {}", e.body_text()))
    })?;

    entry.account = entry.account.trim().to_string();
    if !is_valid_account_id(&entry.account) {
        return Err(ProblemDetails::validation_error(format!(
            "Invalid account id: {}",
            entry.account
        )));
    }

    state
        .db
        .upsert_webhook_account(&entry)
        .await
        .map_err(|e| internal("Failed to save webhook account", e))?;

    tracing::info!(account = %entry.account, enabled = entry.enabled, "Webhook allowlist updated");
    Ok(Json(json!({ "ok": true, "account": entry })))
}

pub async fn delete_webhook_account(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<StatusCode, ProblemDetails> {
    let removed = state
        .db
        .delete_webhook_account(&account)
        .await
        .map_err(|e| internal("Failed to delete webhook account", e))?;

    if !removed {
        return Err(ProblemDetails::not_found(format!("Webhook account {}", account))
            .with_instance(format!("/webhook-accounts/{}", account)));
    }
    tracing::info!(account = %account, "Account removed from webhook allowlist");
    Ok(StatusCode::NO_CONTENT)
}
