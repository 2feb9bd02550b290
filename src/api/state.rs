use std::sync::Arc;

use crate::config::Config;
use crate::observability::Metrics;
use crate::queue::QueueClient;
use crate::secrets::KeyVault;
use crate::storage::StorageClient;
use crate::store::Store;

/// Shared handles threaded into every HTTP handler via axum's `State`
/// extractor. Cloning is cheap — everything inside is already behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub vault: Arc<KeyVault>,
    /// `None` when no object store backend is configured. Log retrieval
    /// treats this the same as the object store being unreachable: a 503.
    pub storage: Option<Arc<StorageClient>>,
    pub queue: Option<Arc<dyn QueueClient>>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<Store>,
        vault: Arc<KeyVault>,
        storage: Option<Arc<StorageClient>>,
        queue: Option<Arc<dyn QueueClient>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { config, store, vault, storage, queue, metrics }
    }
}
