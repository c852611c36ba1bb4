use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Account, AccountStats, InstanceStatus};

use super::AppState;

#[derive(Debug, Serialize)]
pub struct InstanceHealth {
    pub account: String,
    pub status: InstanceStatus,
    pub nickname: String,
    pub pid: Option<u32>,
    pub created: DateTime<Utc>,
}

impl From<Account> for InstanceHealth {
    fn from(a: Account) -> Self {
        Self {
            account: a.account,
            status: a.status,
            nickname: a.nickname,
            pid: a.pid,
            created: a.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub timestamp: DateTime<Utc>,
    pub total_accounts: usize,
    pub online_accounts: usize,
    pub offline_accounts: usize,
    pub instances: Vec<InstanceHealth>,
}

/// Liveness of the server plus a summary of every terminal instance
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.supervisor.list().await {
        Ok(accounts) => {
            let stats = AccountStats::from_accounts(&accounts);
            let body = HealthResponse {
                ok: true,
                timestamp: Utc::now(),
                total_accounts: stats.total,
                online_accounts: stats.online,
                offline_accounts: stats.offline,
                instances: accounts.into_iter().map(InstanceHealth::from).collect(),
            };
            (StatusCode::OK, Json(serde_json::json!(body)))
        }
        Err(e) => {
            tracing::error!(error = %e, "Health check could not read accounts");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
            )
        }
    }
}
