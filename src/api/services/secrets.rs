//! Tenant-scoped secret CRUD. Every handler here resolves the caller's own
//! `user_id` as the tenant — there is no cross-tenant secret access, admin
//! included, since master-key material never lets a tenant read another
//! tenant's data-encryption key.

use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use crate::secrets::{SecretStore, SecretsError};

use crate::api::auth::AuthContext;
use crate::api::error::ApiError;
use crate::api::models::{
    BatchGetSecretsRequest, BatchGetSecretsResponse, BatchSetSecretsRequest, PutSecretValueRequest,
    SecretKeysResponse, SecretPathQuery, SecretPathsResponse, SecretValueQuery, SecretValueResponse,
    SecretsInitResponse,
};
use crate::api::state::AppState;

pub async fn get_secret_value(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(q): Query<SecretValueQuery>,
) -> Result<Json<SecretValueResponse>, ApiError> {
    let state = state.clone();
    let tenant = auth.user.id;
    let (path, key) = (q.path, q.key);
    let value = tokio::task::spawn_blocking(move || {
        let secrets = SecretStore::new(&state.store, &state.vault);
        secrets.get(tenant, &path, &key)
    })
    .await
    .map_err(|_| ApiError::Internal("background task panicked".into()))??;

    let value = String::from_utf8(value)
        .map_err(|_| ApiError::Internal("stored secret is not valid utf-8".into()))?;
    Ok(Json(SecretValueResponse { value }))
}

pub async fn put_secret_value(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(q): Query<SecretValueQuery>,
    Json(req): Json<PutSecretValueRequest>,
) -> Result<StatusCode, ApiError> {
    let tenant = auth.user.id;
    let (path, key) = (q.path, q.key);
    tokio::task::spawn_blocking(move || {
        let secrets = SecretStore::new(&state.store, &state.vault);
        secrets.put(tenant, &path, &key, req.value.as_bytes())
    })
    .await
    .map_err(|_| ApiError::Internal("background task panicked".into()))??;
    Ok(StatusCode::OK)
}

pub async fn delete_secret_value(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(q): Query<SecretValueQuery>,
) -> Result<StatusCode, ApiError> {
    let tenant = auth.user.id;
    let (path, key) = (q.path.clone(), q.key.clone());
    let existed = tokio::task::spawn_blocking(move || {
        let secrets = SecretStore::new(&state.store, &state.vault);
        secrets.delete(tenant, &path, &key)
    })
    .await
    .map_err(|_| ApiError::Internal("background task panicked".into()))??;

    if !existed {
        return Err(ApiError::NotFound(format!("no secret at {}:{}", q.path, q.key)));
    }
    Ok(StatusCode::OK)
}

pub async fn list_secret_keys(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(q): Query<SecretPathQuery>,
) -> Result<Json<SecretKeysResponse>, ApiError> {
    let tenant = auth.user.id;
    let path = q.path;
    let keys = tokio::task::spawn_blocking(move || {
        let secrets = SecretStore::new(&state.store, &state.vault);
        secrets.list_keys(tenant, &path)
    })
    .await
    .map_err(|_| ApiError::Internal("background task panicked".into()))??;
    Ok(Json(SecretKeysResponse { keys }))
}

pub async fn list_secret_paths(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<SecretPathsResponse>, ApiError> {
    let store = state.store.clone();
    let tenant = auth.user.id;
    let paths = tokio::task::spawn_blocking(move || store.list_secret_paths(tenant))
        .await
        .map_err(|_| ApiError::Internal("background task panicked".into()))??;
    Ok(Json(SecretPathsResponse { paths }))
}

pub async fn batch_get_secrets(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<BatchGetSecretsRequest>,
) -> Result<Json<BatchGetSecretsResponse>, ApiError> {
    if req.refs.is_empty() {
        return Err(ApiError::InvalidInput("refs must not be empty".into()));
    }
    let tenant = auth.user.id;
    let secrets_map = tokio::task::spawn_blocking(move || {
        let secrets = SecretStore::new(&state.store, &state.vault);
        let mut out = std::collections::HashMap::new();
        for r in &req.refs {
            let value = secrets.get(tenant, &r.path, &r.key)?;
            let value = String::from_utf8(value)
                .map_err(|_| SecretsError::InvalidIdentifier("stored value is not valid utf-8".into()))?;
            out.insert(format!("{}:{}", r.path, r.key), value);
        }
        Ok::<_, SecretsError>(out)
    })
    .await
    .map_err(|_| ApiError::Internal("background task panicked".into()))??;
    Ok(Json(BatchGetSecretsResponse { secrets: secrets_map }))
}

pub async fn batch_set_secrets(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<BatchSetSecretsRequest>,
) -> Result<StatusCode, ApiError> {
    if req.secrets.is_empty() {
        return Err(ApiError::InvalidInput("secrets must not be empty".into()));
    }
    let tenant = auth.user.id;
    tokio::task::spawn_blocking(move || {
        let secrets = SecretStore::new(&state.store, &state.vault);
        for w in &req.secrets {
            secrets.put(tenant, &w.path, &w.key, w.value.as_bytes())?;
        }
        Ok::<_, SecretsError>(())
    })
    .await
    .map_err(|_| ApiError::Internal("background task panicked".into()))??;
    Ok(StatusCode::OK)
}

/// Marks the caller's tenant as initialized for secrets use. Purely a
/// bookkeeping marker — the tenant's data-encryption key is created lazily
/// on first [`SecretStore::put`] regardless — but it lets a client tell
/// "never touched secrets" apart from "touched secrets, has none yet".
pub async fn init_secrets(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<(StatusCode, Json<SecretsInitResponse>), ApiError> {
    if auth.user.secrets_initialized_at.is_some() {
        return Err(ApiError::Conflict("secrets already initialized for this tenant".into()));
    }

    let store = state.store.clone();
    let mut user = auth.user.clone();
    user.secrets_initialized_at = Some(Utc::now());
    tokio::task::spawn_blocking(move || store.update_user_direct(&user))
        .await
        .map_err(|_| ApiError::Internal("background task panicked".into()))??;

    Ok((StatusCode::CREATED, Json(SecretsInitResponse { status: "initialized", org_id: auth.user.id })))
}
