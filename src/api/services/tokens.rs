//! Admin-only API token issuance and management. Every route here sits
//! behind [`crate::api::auth::require_admin`].

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use rand::RngCore;
use uuid::Uuid;

use crate::store::ApiToken;

use crate::api::auth::hash_token;
use crate::api::error::ApiError;
use crate::api::models::{CreateTokenRequest, TokenCreatedResponse, TokenListResponse, TokenResponse};
use crate::api::state::AppState;
use crate::api::tx::SharedUnitOfWork;

use super::run_blocking;

/// 32 random bytes, URL-safe base64 encoded — same encoding the secrets
/// subsystem uses for key material, just applied to a bearer credential
/// instead of a DEK.
fn generate_plaintext_token() -> String {
    use base64::Engine;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("rcide_{}", base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

pub async fn create_token(
    State(state): State<AppState>,
    Extension(uow): Extension<SharedUnitOfWork>,
    Json(req): Json<CreateTokenRequest>,
) -> Result<(StatusCode, Json<TokenCreatedResponse>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::InvalidInput("name is required".into()));
    }
    let store = state.store.clone();
    let user_id = req.user_id;
    run_blocking(move || store.get_user(user_id))
        .await?
        .ok_or_else(|| ApiError::InvalidInput(format!("no user {user_id}")))?;

    let plaintext = generate_plaintext_token();
    let now = Utc::now();
    let token = ApiToken {
        id: Uuid::now_v7(),
        user_id: req.user_id,
        name: req.name,
        token_hash: hash_token(&plaintext),
        created_at: now,
        expires_at: req.expires_at,
        last_used_at: None,
        active: true,
    };

    {
        let mut guard = uow.lock().await;
        let uow = guard.as_mut().expect("unit of work present for the duration of the request");
        state.store.create_token(uow, &token)?;
    }

    Ok((
        StatusCode::CREATED,
        Json(TokenCreatedResponse {
            id: token.id,
            user_id: token.user_id,
            name: token.name,
            token: plaintext,
            created_at: token.created_at,
            expires_at: token.expires_at,
        }),
    ))
}

pub async fn list_tokens(State(state): State<AppState>) -> Result<Json<TokenListResponse>, ApiError> {
    let store = state.store.clone();
    let tokens = run_blocking(move || store.list_all_tokens()).await?;
    Ok(Json(TokenListResponse { tokens: tokens.into_iter().map(TokenResponse::from).collect() }))
}

pub async fn delete_token(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let store = state.store.clone();
    let deleted = run_blocking(move || store.delete_token(id)).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("no token {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
