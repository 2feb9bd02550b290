//! Per-request unit of work: begins before the handler runs, commits only on
//! a 2xx response, rolls back (by simply dropping) otherwise. Handlers read
//! the in-flight `UnitOfWork` from request extensions instead of asking the
//! store for a free connection — the store layer has no separate "give me a
//! connection" call because Fjall doesn't need one, but the transactional
//! contract is the same one a pooled relational client would give you.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;

use crate::store::UnitOfWork;

use super::error::ApiError;
use super::state::AppState;

/// Shared so the handler and the committing middleware can both reach the
/// same `UnitOfWork`; `Mutex<Option<_>>` lets the middleware `take()` it
/// back out after the handler returns. `UnitOfWork` itself isn't `Clone`.
pub type SharedUnitOfWork = Arc<Mutex<Option<UnitOfWork>>>;

pub async fn with_transaction(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let store = state.store.clone();
    let uow = match tokio::task::spawn_blocking(move || store.begin()).await {
        Ok(uow) => uow,
        Err(_) => return ApiError::Internal("failed to begin unit of work".into()).into_response(),
    };
    let shared: SharedUnitOfWork = Arc::new(Mutex::new(Some(uow)));
    request.extensions_mut().insert(shared.clone());

    let response = next.run(request).await;

    let Some(uow) = shared.lock().await.take() else {
        return response;
    };

    if response.status().is_success() {
        match tokio::task::spawn_blocking(move || uow.commit()).await {
            Ok(Ok(())) => response,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "failed to commit unit of work");
                ApiError::Internal("failed to persist changes".into()).into_response()
            }
            Err(_) => ApiError::Internal("failed to persist changes".into()).into_response(),
        }
    } else {
        uow.rollback();
        response
    }
}
