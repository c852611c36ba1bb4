use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use crate::models::{CopySignalRequest, DispatchSummary};
use crate::services::CopyTradeError;

use super::{AppState, ProblemDetails};

impl From<CopyTradeError> for ProblemDetails {
    fn from(e: CopyTradeError) -> Self {
        match e {
            CopyTradeError::InvalidApiKey => ProblemDetails::unauthorized(e.to_string(), None),
            CopyTradeError::Internal(inner) => {
                tracing::error!(error = %inner, "Copy signal processing failed");
                ProblemDetails::internal_error(format!("Failed to process copy signal: {}", inner))
            }
            CopyTradeError::MissingApiKey
            | CopyTradeError::MasterMismatch
            | CopyTradeError::Inactive
            | CopyTradeError::InvalidSignal(_) => ProblemDetails::validation_error(e.to_string()),
        }
    }
}

/// Trade event from a master EA. Authenticated by the api_key in the body.
#[instrument(skip_all)]
pub async fn receive_signal(
    State(state): State<AppState>,
    payload: Result<Json<CopySignalRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DispatchSummary>), ProblemDetails> {
    let Json(request) = payload.map_err(|e| {
        ProblemDetails::validation_error(format!("Invalid JSON payload: {}", e.body_text()))
    })?;

    let summary = state.copy_trade.process_signal(&request).await.map_err(|e| {
        tracing::warn!(error = %e, account = ?request.account, "Copy signal rejected");
        ProblemDetails::from(e)
    })?;

    let status = if summary.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(summary)))
}
