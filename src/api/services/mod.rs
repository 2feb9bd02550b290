pub mod admin;
pub mod health;
pub mod jobs;
pub mod secrets;
pub mod tokens;

use super::error::ApiError;

/// Runs a `Store`/`SecretStore` call on the blocking thread pool and maps
/// its error into `ApiError`. Every Fjall-backed read or write in the HTTP
/// layer goes through this, mirroring the worker loop's own `spawn_blocking`
/// usage around the same repository methods.
pub(crate) async fn run_blocking<F, T, E>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(ApiError::Internal("background task panicked".into())),
    }
}
