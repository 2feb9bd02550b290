//! Master-key administration. Every route here sits behind
//! [`crate::api::auth::require_admin`] — rotating or decommissioning a
//! master key touches every tenant's data-encryption key.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::models::{
    CreateMasterKeyRequest, MasterKeyListResponse, MasterKeyResponse, SyncPrimaryResponse,
};
use crate::api::state::AppState;

use super::run_blocking;

pub async fn create_master_key(
    State(state): State<AppState>,
    Json(req): Json<CreateMasterKeyRequest>,
) -> Result<(StatusCode, Json<MasterKeyResponse>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::InvalidInput("name is required".into()));
    }
    let row = run_blocking(move || state.vault.register(&state.store, &req.name, &req.description)).await?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

pub async fn list_master_keys(
    State(state): State<AppState>,
) -> Result<Json<MasterKeyListResponse>, ApiError> {
    let store = state.store.clone();
    let keys = run_blocking(move || store.list_master_keys()).await?;
    Ok(Json(MasterKeyListResponse { master_keys: keys.into_iter().map(MasterKeyResponse::from).collect() }))
}

pub async fn rotate_master_key(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MasterKeyResponse>, ApiError> {
    run_blocking({
        let state = state.clone();
        let name = name.clone();
        move || state.vault.rotate_to(&state.store, &name)
    })
    .await?;

    let store = state.store.clone();
    let row = run_blocking(move || store.get_master_key_by_name(&name))
        .await?
        .ok_or_else(|| ApiError::Internal("master key vanished immediately after rotation".into()))?;
    state.metrics.master_key_rotated();
    Ok(Json(row.into()))
}

pub async fn decommission_master_key(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    run_blocking(move || state.vault.decommission(&state.store, &name)).await?;
    Ok(StatusCode::OK)
}

pub async fn sync_primary(
    State(state): State<AppState>,
) -> Result<Json<SyncPrimaryResponse>, ApiError> {
    let tenants_synced = run_blocking(move || state.vault.sync_all_tenants_to_primary(&state.store)).await?;
    Ok(Json(SyncPrimaryResponse { status: "synced", tenants_synced }))
}
