//! Request/response bodies for the HTTP API: the wire shape, kept distinct
//! from the persisted [`crate::store::model`] entities so the two can drift
//! independently (e.g. never serializing `token_hash` or `ciphertext`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::store::{ApiToken, Job, JobStatus, MasterKey, SourceType};

// -- jobs --------------------------------------------------------------

/// One overlay layer supplied at submission time: `environment` entries
/// merge onto the base `job_env_vars`, highest priority first, per
/// `jobspec::merge::merge_layers`.
#[derive(Debug, Deserialize)]
pub struct JobOverlay {
    pub label: String,
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub source_ref: Option<String>,
    pub source_path: Option<String>,
    pub runner_image: Option<String>,
    pub code_dir: Option<String>,
    pub job_dir: Option<String>,
    pub job_command: String,
    #[serde(default)]
    pub job_env_vars: HashMap<String, String>,
    pub timeout_seconds: Option<i64>,
    #[serde(default)]
    pub priority: i32,
    pub queue_name: Option<String>,
    /// Listed in decreasing priority order: `overlays[0]` wins.
    #[serde(default)]
    pub overlays: Vec<JobOverlay>,
    #[serde(default)]
    pub allow_secret_overrides: bool,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub source_ref: Option<String>,
    pub source_path: Option<String>,
    pub runner_image: String,
    pub code_dir: Option<String>,
    pub job_dir: Option<String>,
    pub job_command: String,
    pub job_env_vars: Value,
    pub timeout_seconds: Option<i64>,
    pub priority: i32,
    pub queue_name: String,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub triggers_detected: Option<usize>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            user_id: job.user_id,
            name: job.name,
            description: job.description,
            source_type: job.source_type,
            source_url: job.source_url,
            source_ref: job.source_ref,
            source_path: job.source_path,
            runner_image: job.runner_image,
            code_dir: job.code_dir,
            job_dir: job.job_dir,
            job_command: job.job_command,
            job_env_vars: job.job_env_vars,
            timeout_seconds: job.timeout_seconds,
            priority: job.priority,
            queue_name: job.queue_name,
            status: job.status,
            exit_code: job.exit_code,
            started_at: job.started_at,
            completed_at: job.completed_at,
            created_at: job.created_at,
            updated_at: job.updated_at,
            error_message: job.error_message,
            triggers_detected: job.triggers_detected,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub stream: Option<String>,
}

// -- tokens --------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub user_id: Uuid,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TokenCreatedResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// The only time the plaintext token is ever returned.
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<ApiToken> for TokenResponse {
    fn from(token: ApiToken) -> Self {
        Self {
            id: token.id,
            user_id: token.user_id,
            name: token.name,
            active: token.active,
            created_at: token.created_at,
            expires_at: token.expires_at,
            last_used_at: token.last_used_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenListResponse {
    pub tokens: Vec<TokenResponse>,
}

// -- secrets --------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SecretValueQuery {
    pub path: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct PutSecretValueRequest {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct SecretValueResponse {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct SecretPathQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct SecretKeysResponse {
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SecretPathsResponse {
    pub paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SecretRef {
    pub path: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchGetSecretsRequest {
    pub refs: Vec<SecretRef>,
}

#[derive(Debug, Serialize)]
pub struct BatchGetSecretsResponse {
    pub secrets: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct SecretWrite {
    pub path: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchSetSecretsRequest {
    pub secrets: Vec<SecretWrite>,
}

#[derive(Debug, Serialize)]
pub struct SecretsInitResponse {
    pub status: &'static str,
    pub org_id: Uuid,
}

// -- admin / master keys --------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateMasterKeyRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct MasterKeyResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub ordinal: u32,
    pub is_primary: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl From<MasterKey> for MasterKeyResponse {
    fn from(key: MasterKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            description: key.description,
            ordinal: key.ordinal,
            is_primary: key.is_primary,
            is_active: key.is_active(),
            created_at: key.created_at,
            retired_at: key.retired_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MasterKeyListResponse {
    pub master_keys: Vec<MasterKeyResponse>,
}

#[derive(Debug, Serialize)]
pub struct SyncPrimaryResponse {
    pub status: &'static str,
    pub tenants_synced: usize,
}

// -- health --------------------------------------------------------------

#[derive(Debug, Serialize, Default)]
pub struct VerificationInfo {
    pub verified: bool,
    pub user_authenticated: bool,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub verification: VerificationInfo,
}
