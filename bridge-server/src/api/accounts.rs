//! Account and terminal instance management

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::instances::{LifecycleError, OpenOutcome, StopOutcome};
use crate::models::{Account, CreateAccountRequest};

use super::error::internal;
use super::{AppState, ProblemDetails};

impl From<LifecycleError> for ProblemDetails {
    fn from(e: LifecycleError) -> Self {
        match &e {
            LifecycleError::InvalidAccount(_) => ProblemDetails::validation_error(e.to_string()),
            LifecycleError::AlreadyExists(_) => ProblemDetails::conflict(e.to_string()),
            LifecycleError::NotFound(account) => {
                ProblemDetails::not_found(format!("Account {}", account))
            }
            LifecycleError::Spawn { .. }
            | LifecycleError::Terminate { .. }
            | LifecycleError::Internal(_) => {
                tracing::error!(error = %e, "Instance lifecycle operation failed");
                ProblemDetails::internal_error(e.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OpenResponse {
    pub ok: bool,
    pub account: String,
    #[serde(flatten)]
    pub outcome: OpenOutcome,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub ok: bool,
    pub account: String,
    pub result: StopOutcome,
}

pub async fn list_accounts(State(state): State<AppState>) -> Result<Json<Value>, ProblemDetails> {
    let accounts = state
        .supervisor
        .list()
        .await
        .map_err(|e| internal("Failed to list accounts", e))?;
    Ok(Json(json!({ "accounts": accounts })))
}

pub async fn account_stats(State(state): State<AppState>) -> Result<Json<Value>, ProblemDetails> {
    let stats = state
        .supervisor
        .stats()
        .await
        .map_err(|e| internal("Failed to count accounts", e))?;
    Ok(Json(json!({
        "ok": true,
        "total": stats.total,
        "online": stats.online,
        "offline": stats.offline,
    })))
}

/// Provision a new terminal instance and start it
#[instrument(skip_all)]
pub async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), ProblemDetails> {
    let Json(request) = payload.map_err(|e| {
        ProblemDetails::validation_error(format!("Invalid request body: {}", e.body_text()))
    })?;

    let account = request.account.trim();
    let nickname = match request.nickname.trim() {
        "" => account,
        nickname => nickname,
    };

    let created = state.supervisor.add_account(account, nickname).await?;
    tracing::info!(account = %created.account, status = %created.status, pid = ?created.pid, "Account created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state))]
pub async fn open_account(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<OpenResponse>, ProblemDetails> {
    let outcome = state.supervisor.open(&account).await?;
    Ok(Json(OpenResponse {
        ok: true,
        account,
        outcome,
    }))
}

#[instrument(skip(state))]
pub async fn stop_account(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<StopResponse>, ProblemDetails> {
    let result = state.supervisor.stop(&account).await?;
    if result == StopOutcome::NotRunning {
        tracing::info!("Stop requested for an account that is not running");
    }
    Ok(Json(StopResponse {
        ok: true,
        account,
        result,
    }))
}

#[instrument(skip(state))]
pub async fn restart_account(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<OpenResponse>, ProblemDetails> {
    let outcome = state.supervisor.restart(&account).await?;
    Ok(Json(OpenResponse {
        ok: true,
        account,
        outcome,
    }))
}

/// Irreversible: stops the terminal and removes the account, its history and
/// (when configured) its instance folder
#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<StatusCode, ProblemDetails> {
    state
        .supervisor
        .delete(&account)
        .await
        .map_err(|e| ProblemDetails::from(e).with_instance(format!("/accounts/{}", account)))?;
    Ok(StatusCode::NO_CONTENT)
}
