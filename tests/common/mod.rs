//! Shared test scaffolding: an isolated `AppState` backed by temp-directory
//! stores, plus user/token fixtures. Every integration test builds its own
//! `TestApp` so Fjall keyspaces never collide across tests run in parallel.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use reactorcide::api::state::AppState;
use reactorcide::config::Config;
use reactorcide::observability::Metrics;
use reactorcide::secrets::KeyVault;
use reactorcide::storage::StorageClient;
use reactorcide::store::{ApiToken, Role, Store, User};
use reactorcide::worker::WorkerContext;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub struct TestApp {
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(Store::open(dir.path().join("store")).expect("open store"));
        let vault = Arc::new(KeyVault::bootstrap(&store, vec![]).expect("bootstrap vault"));
        let storage = Arc::new(StorageClient::in_memory());
        let metrics = Arc::new(Metrics::new());

        let mut config = Config::default();
        config.worker.concurrency = 1;
        config.worker.workspace_root = dir.path().join("workspaces").to_string_lossy().into_owned();

        let state = AppState::new(Arc::new(config), store, vault, Some(storage), None, metrics);
        Self { state, _dir: dir }
    }

    pub fn router(&self) -> axum::Router {
        reactorcide::api::build_router(self.state.clone())
    }

    /// Mints a user of the given role plus a bearer token, returning the
    /// user and the plaintext `Authorization` header value.
    pub fn create_authenticated_user(&self, role: Role) -> (User, String) {
        let now = chrono::Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            username: format!("user-{}", Uuid::now_v7()),
            email: "test@example.com".to_string(),
            role,
            created_at: now,
            secrets_initialized_at: None,
        };
        let plaintext = format!("rcide_test_{}", Uuid::now_v7());
        let token = ApiToken {
            id: Uuid::now_v7(),
            user_id: user.id,
            name: "test".to_string(),
            token_hash: reactorcide::api::auth::hash_token(&plaintext),
            created_at: now,
            expires_at: None,
            last_used_at: None,
            active: true,
        };

        let mut uow = self.state.store.begin();
        self.state.store.create_user(&mut uow, &user).expect("create user");
        self.state.store.create_token(&mut uow, &token).expect("create token");
        uow.commit().expect("commit");

        (user, plaintext)
    }

    /// Builds a `WorkerContext` sharing this app's store/vault/storage, with
    /// a plain-process runner — enough to drive real job execution in tests
    /// without a container daemon.
    pub fn worker_context(&self) -> Arc<WorkerContext> {
        Arc::new(WorkerContext {
            store: self.state.store.clone(),
            vault: self.state.vault.clone(),
            storage: self.state.storage.clone().expect("storage configured"),
            queue: self.state.queue.clone(),
            runner: Arc::new(reactorcide::runtime::process::ProcessRunner::new()),
            metrics: self.state.metrics.clone(),
            config: self.state.config.worker.clone(),
        })
    }
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&value).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(router: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(req).await.expect("router call");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}
