use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::{Config, ContainerRuntime};
use crate::observability::Metrics;
use crate::queue::{FjallQueue, FjallQueueClient, QueueClient};
use crate::runtime::{docker::DockerRunner, process::ProcessRunner, ContainerRunner};
use crate::secrets::{self, KeyVault};
use crate::storage::StorageClient;
use crate::store::{Role, Store, User};
use crate::worker::{self, WorkerContext};

use super::auth::{require_admin, require_bearer_token};
use super::services;
use super::state::AppState;
use super::tx::with_transaction;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Builds every shared handle named in spec.md's startup ordering: config →
/// KeyVault bootstrap → JobRepository (`Store`) → ObjectStore → QueueClient
/// → default-user bootstrap. The API server and the worker pool both start
/// from this one `AppState`, rather than initializing their own copies.
async fn bootstrap() -> Result<AppState, AnyError> {
    info!("loading configuration");
    let config = Config::load()?;

    info!(db_uri = %config.store.db_uri, "opening store");
    let store = Arc::new(Store::open(&config.store.db_uri)?);

    info!("bootstrapping key vault");
    let master_keys = secrets::parse_master_keys(&config.secrets.master_keys)?;
    let vault = Arc::new(KeyVault::bootstrap(&store, master_keys)?);

    info!(base_path = %config.object_store.base_path, "initializing object store");
    let storage = Arc::new(StorageClient::from_config(&config.object_store)?);

    let queue_path = std::path::Path::new(&config.store.db_uri)
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .join("queue");
    info!(path = ?queue_path, "opening queue");
    let raw_queue = FjallQueue::open(&queue_path)?;
    let queue: Option<Arc<dyn QueueClient>> = Some(Arc::new(FjallQueueClient::new(raw_queue)));

    bootstrap_default_user(&store, &config)?;

    let metrics = Arc::new(Metrics::new());
    let config = Arc::new(config);

    Ok(AppState::new(config, store, vault, Some(storage), queue, metrics))
}

/// Creates the configured default admin user on first boot only. A fresh
/// bootstrap also mints one API token and logs its plaintext once, since
/// without it nothing could authenticate against a brand-new deployment.
fn bootstrap_default_user(store: &Store, config: &Config) -> Result<(), AnyError> {
    if store.get_user_by_username(&config.bootstrap.default_username)?.is_some() {
        return Ok(());
    }

    let id = match &config.bootstrap.default_user_id {
        Some(raw) => raw.parse()?,
        None => Uuid::now_v7(),
    };
    let user = User {
        id,
        username: config.bootstrap.default_username.clone(),
        email: config.bootstrap.default_email.clone(),
        role: Role::Admin,
        created_at: chrono::Utc::now(),
        secrets_initialized_at: None,
    };

    let plaintext = {
        use base64::Engine;
        let mut bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
        format!("rcide_{}", base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    };
    let token = crate::store::ApiToken {
        id: Uuid::now_v7(),
        user_id: user.id,
        name: "bootstrap".to_string(),
        token_hash: super::auth::hash_token(&plaintext),
        created_at: chrono::Utc::now(),
        expires_at: None,
        last_used_at: None,
        active: true,
    };

    let mut uow = store.begin();
    store.create_user(&mut uow, &user)?;
    store.create_token(&mut uow, &token)?;
    uow.commit()?;

    info!(
        user_id = %user.id,
        username = %user.username,
        token = %plaintext,
        "bootstrapped default admin user; this token is logged once and not recoverable afterward"
    );
    Ok(())
}

fn container_runner(config: &Config) -> Result<Arc<dyn ContainerRunner>, AnyError> {
    match config.worker.container_runtime {
        ContainerRuntime::Process => Ok(Arc::new(ProcessRunner::new())),
        ContainerRuntime::Docker => Ok(Arc::new(DockerRunner::connect()?)),
        // Config validation already rejects these at load time; unreachable
        // in a process that made it this far.
        ContainerRuntime::Containerd | ContainerRuntime::Kubernetes => {
            unreachable!("unsupported container runtime accepted past config validation")
        }
    }
}

fn worker_context(state: &AppState) -> Result<Arc<WorkerContext>, AnyError> {
    Ok(Arc::new(WorkerContext {
        store: state.store.clone(),
        vault: state.vault.clone(),
        storage: state.storage.clone().expect("object store is configured at bootstrap"),
        queue: state.queue.clone(),
        runner: container_runner(&state.config)?,
        metrics: state.metrics.clone(),
        config: state.config.worker.clone(),
    }))
}

/// Builds the full route tree over a caller-supplied `AppState`. Exposed so
/// integration tests can drive the real router against an isolated,
/// temp-directory-backed `AppState` without going through [`run`]'s
/// environment-driven bootstrap.
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/api/v1/health", get(services::health::health))
        .route("/api/health", get(services::health::health));

    let job_routes = Router::new()
        .route("/api/v1/jobs", post(services::jobs::create_job).get(services::jobs::list_jobs))
        .route(
            "/api/v1/jobs/{id}",
            get(services::jobs::get_job).delete(services::jobs::delete_job),
        )
        .route("/api/v1/jobs/{id}/cancel", put(services::jobs::cancel_job))
        .route("/api/v1/jobs/{id}/logs", get(services::jobs::get_logs));

    let secret_routes = Router::new()
        .route(
            "/api/v1/secrets/value",
            get(services::secrets::get_secret_value)
                .put(services::secrets::put_secret_value)
                .delete(services::secrets::delete_secret_value),
        )
        .route("/api/v1/secrets", get(services::secrets::list_secret_keys))
        .route("/api/v1/secrets/paths", get(services::secrets::list_secret_paths))
        .route("/api/v1/secrets/batch/get", post(services::secrets::batch_get_secrets))
        .route("/api/v1/secrets/batch/set", post(services::secrets::batch_set_secrets))
        .route("/api/v1/secrets/init", post(services::secrets::init_secrets));

    let bearer_routes = Router::new()
        .merge(job_routes)
        .merge(secret_routes)
        .layer(from_fn_with_state(state.clone(), require_bearer_token))
        .layer(from_fn_with_state(state.clone(), with_transaction));

    let admin_routes = Router::new()
        .route("/api/v1/tokens", post(services::tokens::create_token).get(services::tokens::list_tokens))
        .route("/api/v1/tokens/{id}", delete(services::tokens::delete_token))
        .route(
            "/api/v1/admin/secrets/master-keys",
            post(services::admin::create_master_key).get(services::admin::list_master_keys),
        )
        .route(
            "/api/v1/admin/secrets/master-keys/{name}/rotate",
            post(services::admin::rotate_master_key),
        )
        .route(
            "/api/v1/admin/secrets/master-keys/{name}",
            delete(services::admin::decommission_master_key),
        )
        .route("/api/v1/admin/secrets/sync-primary", post(services::admin::sync_primary))
        .layer(from_fn(require_admin))
        .layer(from_fn_with_state(state.clone(), require_bearer_token))
        .layer(from_fn_with_state(state.clone(), with_transaction));

    Router::new()
        .merge(health_routes)
        .merge(bearer_routes)
        .merge(admin_routes)
        .with_state(state)
        .layer(RequestDecompressionLayer::new())
}

pub async fn run(address_override: Option<SocketAddr>) -> Result<(), AnyError> {
    let state = bootstrap().await?;
    let address = address_override.unwrap_or(state.config.server.bind_addr);
    let ctx = worker_context(&state)?;
    tokio::spawn(worker::run(ctx));

    let app = build_router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "reactorcide API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Runs the worker pool only, with no HTTP server — for deployments that
/// split the API and worker into separate processes.
pub async fn run_worker_only() -> Result<(), AnyError> {
    let state = bootstrap().await?;
    let ctx = worker_context(&state)?;
    worker::run(ctx).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
