//! Copy pair management
//!
//! A pair links one master account to one slave account. Several pairs of the
//! same master may share an api_key so one signal fans out to all of them; a
//! key is never shared between masters.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::instrument;

use crate::adapters::outbound::is_valid_account_id;
use crate::models::{CopyPair, CopySettings, CreateCopyPairRequest, PairStatus, UpdateCopyPairRequest};

use super::error::internal;
use super::{AppState, ProblemDetails};

fn invalid_body(e: JsonRejection) -> ProblemDetails {
    ProblemDetails::validation_error(format!("Invalid request body: {}", e.body_text()))
}

async fn load_pair(state: &AppState, id: &str) -> Result<CopyPair, ProblemDetails> {
    state
        .db
        .get_copy_pair(id)
        .await
        .map_err(|e| internal("Failed to load copy pair", e))?
        .ok_or_else(|| {
            ProblemDetails::not_found(format!("Copy pair {}", id))
                .with_instance(format!("/api/copy/pairs/{}", id))
        })
}

/// Registered nickname of `account`, empty when the account is unknown
async fn nickname_of(state: &AppState, account: &str) -> String {
    match state.db.get_account(account).await {
        Ok(Some(a)) => a.nickname,
        Ok(None) => String::new(),
        Err(e) => {
            tracing::warn!(account = %account, error = %e, "Failed to look up account nickname");
            String::new()
        }
    }
}

pub async fn list_pairs(State(state): State<AppState>) -> Result<Json<Vec<CopyPair>>, ProblemDetails> {
    let pairs = state
        .db
        .list_copy_pairs()
        .await
        .map_err(|e| internal("Failed to list copy pairs", e))?;
    tracing::debug!(count = pairs.len(), "Listed copy pairs");
    Ok(Json(pairs))
}

pub async fn get_pair(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CopyPair>, ProblemDetails> {
    load_pair(&state, &id).await.map(Json)
}

#[instrument(skip_all)]
pub async fn create_pair(
    State(state): State<AppState>,
    payload: Result<Json<CreateCopyPairRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CopyPair>), ProblemDetails> {
    let Json(request) = payload.map_err(invalid_body)?;

    let master = request.master_account.trim().to_string();
    let slave = request.slave_account.trim().to_string();
    for account in [&master, &slave] {
        if !is_valid_account_id(account) {
            return Err(ProblemDetails::validation_error(format!(
                "Invalid account id: {}",
                account
            )));
        }
    }
    if master == slave {
        return Err(ProblemDetails::validation_error(
            "Master and slave accounts must be different",
        ));
    }

    let mut settings = CopySettings::default();
    settings.apply(request.settings);
    settings.validate().map_err(ProblemDetails::validation_error)?;

    let existing = state
        .db
        .find_copy_pair(&master, &slave)
        .await
        .map_err(|e| internal("Failed to look up copy pair", e))?;
    if let Some(existing) = existing {
        return Err(ProblemDetails::conflict(format!(
            "Copy pair {} -> {} already exists ({})",
            master, slave, existing.id
        )));
    }

    let api_key = match request.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => {
            let sharing = state
                .db
                .copy_pairs_by_api_key(key)
                .await
                .map_err(|e| internal("Failed to look up api_key", e))?;
            if sharing.iter().any(|p| p.master_account != master) {
                tracing::warn!(master = %master, "api_key reuse across masters rejected");
                return Err(ProblemDetails::conflict(
                    "api_key is already used by a different master account",
                ));
            }
            key.to_string()
        }
        None => CopyPair::generate_api_key(),
    };

    let now = Utc::now();
    let pair = CopyPair {
        id: CopyPair::generate_id(),
        master_nickname: nickname_of(&state, &master).await,
        slave_nickname: nickname_of(&state, &slave).await,
        master_account: master,
        slave_account: slave,
        api_key,
        settings,
        status: PairStatus::Active,
        created_at: now,
        updated_at: now,
    };

    state
        .db
        .insert_copy_pair(&pair)
        .await
        .map_err(|e| internal("Failed to save copy pair", e))?;

    tracing::info!(
        pair_id = %pair.id,
        master = %pair.master_account,
        slave = %pair.slave_account,
        volume_mode = ?pair.settings.volume_mode,
        multiplier = pair.settings.multiplier,
        "Copy pair created"
    );
    Ok((StatusCode::CREATED, Json(pair)))
}

#[instrument(skip(state, payload))]
pub async fn update_pair(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateCopyPairRequest>, JsonRejection>,
) -> Result<Json<CopyPair>, ProblemDetails> {
    let Json(request) = payload.map_err(invalid_body)?;
    let mut pair = load_pair(&state, &id).await?;

    let mut settings = pair.settings.clone();
    settings.apply(request.settings);
    settings.validate().map_err(ProblemDetails::validation_error)?;

    pair.settings = settings;
    if let Some(status) = request.status {
        pair.status = status;
    }
    pair.updated_at = Utc::now();

    state
        .db
        .update_copy_pair(&pair)
        .await
        .map_err(|e| internal("Failed to update copy pair", e))?;

    tracing::info!(status = pair.status.as_str(), "Copy pair updated");
    Ok(Json(pair))
}

#[instrument(skip(state))]
pub async fn toggle_pair(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CopyPair>, ProblemDetails> {
    let mut pair = load_pair(&state, &id).await?;
    pair.status = pair.status.toggled();
    pair.updated_at = Utc::now();

    state
        .db
        .update_copy_pair(&pair)
        .await
        .map_err(|e| internal("Failed to update copy pair", e))?;

    tracing::info!(status = pair.status.as_str(), "Copy pair toggled");
    Ok(Json(pair))
}

/// Remove the pair; its copy history is kept
#[instrument(skip(state))]
pub async fn delete_pair(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ProblemDetails> {
    let removed = state
        .db
        .delete_copy_pair(&id)
        .await
        .map_err(|e| internal("Failed to delete copy pair", e))?;
    if !removed {
        return Err(ProblemDetails::not_found(format!("Copy pair {}", id))
            .with_instance(format!("/api/copy/pairs/{}", id)));
    }

    tracing::info!("Copy pair deleted");
    Ok(StatusCode::NO_CONTENT)
}
