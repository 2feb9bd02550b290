//! Configuration surface: layered defaults → TOML file → `REACTORCIDE_*`
//! environment variables, following the ancestor codebase's `config` +
//! `dotenvy` layering.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::humanize::ByteSize;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            object_store: ObjectStoreConfig::default(),
            secrets: SecretsConfig::default(),
            worker: WorkerConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_db_connect_max_retries")]
    pub db_connect_max_retries: u32,
    #[serde(default = "default_db_connect_retry_interval_seconds")]
    pub db_connect_retry_interval_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_payload_bytes: default_max_payload_bytes(),
            request_timeout_seconds: default_request_timeout_seconds(),
            db_connect_max_retries: default_db_connect_max_retries(),
            db_connect_retry_interval_seconds: default_db_connect_retry_interval_seconds(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(5 * 1024 * 1024)
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_db_connect_max_retries() -> u32 {
    30
}

fn default_db_connect_retry_interval_seconds() -> u64 {
    2
}

/// `REACTORCIDE_DB_URI` names the embedded Fjall keyspace path — the spec's
/// "relational database" contract, backed here by the embedded store per
/// `DESIGN.md`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_uri")]
    pub db_uri: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { db_uri: default_db_uri() }
    }
}

fn default_db_uri() -> String {
    "data/store".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStoreType {
    Local,
    Memory,
}

impl Default for ObjectStoreType {
    fn default() -> Self {
        ObjectStoreType::Local
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectStoreConfig {
    #[serde(rename = "type", default)]
    pub store_type: ObjectStoreType,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default)]
    pub prefix: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            store_type: ObjectStoreType::default(),
            bucket: default_bucket(),
            base_path: default_base_path(),
            prefix: String::new(),
        }
    }
}

fn default_bucket() -> String {
    "reactorcide".to_string()
}

fn default_base_path() -> String {
    "data/objects".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretsStorageType {
    Database,
    LocalFile,
}

impl Default for SecretsStorageType {
    fn default() -> Self {
        SecretsStorageType::Database
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecretsConfig {
    #[serde(default)]
    pub storage_type: SecretsStorageType,
    /// Raw `name1:base64key1,name2:base64key2,...` from `REACTORCIDE_MASTER_KEYS`.
    #[serde(default)]
    pub master_keys: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self { storage_type: SecretsStorageType::default(), master_keys: String::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerRuntime {
    Process,
    Docker,
    Containerd,
    Kubernetes,
}

impl Default for ContainerRuntime {
    fn default() -> Self {
        ContainerRuntime::Process
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub container_runtime: ContainerRuntime,
    #[serde(default = "default_runner_image")]
    pub default_runner_image: String,
    /// Root directory under which each job's workspace is prepared and
    /// bind-mounted to `/job`. Not named in spec.md's environment table;
    /// an ambient addition since the worker needs somewhere to materialize
    /// a job's source before spawning its container.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_name: default_queue_name(),
            poll_interval_ms: default_poll_interval_ms(),
            concurrency: default_concurrency(),
            dry_run: false,
            container_runtime: ContainerRuntime::default(),
            default_runner_image: default_runner_image(),
            workspace_root: default_workspace_root(),
        }
    }
}

fn default_queue_name() -> String {
    "default".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_concurrency() -> usize {
    4
}

fn default_runner_image() -> String {
    "alpine:latest".to_string()
}

fn default_workspace_root() -> String {
    "data/workspaces".to_string()
}

/// Default-user bootstrap (spec.md §5 startup ordering: "default-user
/// bootstrap" runs after KeyVault/store/object-store/queue init).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapConfig {
    pub default_user_id: Option<String>,
    #[serde(default = "default_username")]
    pub default_username: String,
    #[serde(default = "default_email")]
    pub default_email: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            default_user_id: None,
            default_username: default_username(),
            default_email: default_email(),
        }
    }
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_email() -> String {
    "admin@localhost".to_string()
}
