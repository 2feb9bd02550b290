//! Bearer-token authentication and role gating.
//!
//! Shaped after the pack's per-request `axum::middleware::from_fn_with_state`
//! token-checking step (see `examples/other_examples/...ironclaw__src-
//! orchestrator-auth.rs.rs`): extract the `Authorization` header, resolve it
//! against persisted state, and stash the result in the request's
//! extensions for downstream handlers (and the role-gating layer) to read.
//! The persisted side differs from that example — tokens are looked up by
//! SHA-256 hash via [`crate::store::Store::get_token_by_hash`] rather than
//! matched against an ephemeral in-memory set.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::store::{Role, User};

use super::error::ApiError;
use super::state::AppState;

/// The authenticated caller, attached to request extensions by
/// [`require_bearer_token`] and read by handlers via `Extension<AuthContext>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub token_id: Uuid,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }

    /// True if `self` may act on resources owned by `owner_id` — either the
    /// caller owns it, or the caller is an admin.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.user.id == owner_id
    }
}

/// SHA-256 hex digest of a bearer token, matching `ApiToken::token_hash`'s
/// documented format. The plaintext token is never persisted.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolves the bearer token, populates `AuthContext` in request extensions,
/// and schedules a best-effort `last_used_at` touch. Rejects with 401 if the
/// header is missing or the token doesn't resolve to an active, unexpired row.
pub async fn require_bearer_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?
        .to_string();

    let hash = hash_token(&token);
    let record = state
        .store
        .get_token_by_hash(&hash)?
        .filter(|t| t.is_valid(Utc::now()))
        .ok_or_else(|| ApiError::Unauthorized("invalid or expired token".into()))?;

    let user = state
        .store
        .get_user(record.user_id)?
        .ok_or_else(|| ApiError::Unauthorized("invalid or expired token".into()))?;

    request.extensions_mut().insert(AuthContext { user, token_id: record.id });

    // Best-effort, write-behind — never blocks or fails the request. See
    // DESIGN.md's resolution of the `last_used_at` durability question.
    let store = state.store.clone();
    let token_id = record.id;
    tokio::spawn(async move {
        if let Err(e) = store.touch_token_last_used(token_id) {
            tracing::warn!(error = %e, %token_id, "failed to update token last_used_at");
        }
    });

    Ok(next.run(request).await)
}

/// Layered after [`require_bearer_token`]; 403s unless the resolved caller
/// is an admin. A missing `AuthContext` (auth layer not applied) is a
/// programmer error, surfaced as 401 rather than panicking.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let ctx = request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;
    if !ctx.is_admin() {
        return Err(ApiError::Forbidden("admin role required".into()));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_token_is_deterministic_hex() {
        let a = hash_token("my-token");
        let b = hash_token("my-token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_tokens_hash_differently() {
        assert_ne!(hash_token("a"), hash_token("b"));
    }
}
