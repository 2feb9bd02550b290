use axum::extract::Extension;
use axum::Json;

use crate::api::auth::AuthContext;
use crate::api::models::{HealthResponse, VerificationInfo};

/// No auth required; if a bearer token happened to resolve (the route isn't
/// gated, so this is only populated when a client sends one anyway and a
/// future caller layers auth in front of it) the verification block reflects
/// it.
pub async fn health(auth: Option<Extension<AuthContext>>) -> Json<HealthResponse> {
    let verification = match auth {
        Some(Extension(ctx)) => {
            VerificationInfo { verified: true, user_authenticated: true, user_id: Some(ctx.user.id) }
        }
        None => VerificationInfo::default(),
    };
    Json(HealthResponse { status: "OK", verification })
}
