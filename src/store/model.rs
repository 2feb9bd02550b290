//! Persisted entities for the job coordinator's data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub secrets_initialized_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// SHA-256 hex digest of the bearer token. The plaintext token is never stored.
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl ApiToken {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Timeout
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Git,
    Copy,
    None,
}

/// One submitted unit of work. Field names mirror the data model's literal
/// vocabulary (`runner_image`, `job_command`, ...) rather than the nested
/// `jobspec::JobSpec` document tree, since the HTTP submission contract is
/// flat; [`crate::jobspec`] is consulted to materialize this into an
/// executable [`crate::jobspec::JobConfig`] at claim time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub source_ref: Option<String>,
    pub source_path: Option<String>,
    pub runner_image: String,
    pub code_dir: Option<String>,
    pub job_dir: Option<String>,
    pub job_command: String,
    /// Unresolved environment map as submitted (may contain `${env:...}`/`${secret:...}` references).
    #[serde(default)]
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
    /// Count of entries detected in a completed job's `triggers.json`, if any
    /// (detect-and-report only, see `DESIGN.md`).
    #[serde(default)]
    pub triggers_detected: Option<usize>,
}

impl Job {
    pub fn can_be_cancelled(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterKey {
    pub id: Uuid,
    /// Unique human-assigned name (admin API identifies keys by this, not `id`).
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Ordinal used to select which env-provisioned key material this row refers to.
    pub ordinal: u32,
    pub is_primary: bool,
    /// Raw 32-byte key material, present only for auto-generated/admin-registered
    /// keys so they survive a restart; absent for keys supplied via
    /// `REACTORCIDE_MASTER_KEYS`, which are never persisted.
    #[serde(default)]
    pub key_material: Option<[u8; 32]>,
    pub created_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl MasterKey {
    pub fn is_active(&self) -> bool {
        self.retired_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantKey {
    pub id: Uuid,
    pub tenant_user_id: Uuid,
    pub master_key_id: Uuid,
    /// The tenant's data-encryption key, Fernet-wrapped under the master key.
    pub wrapped_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secret {
    pub id: Uuid,
    pub tenant_user_id: Uuid,
    pub path: String,
    pub key: String,
    /// Secret value, Fernet-wrapped under the tenant's data-encryption key.
    pub ciphertext: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC3339 with nanosecond precision.
    pub timestamp: String,
    pub stream: LogStream,
    pub level: Option<String>,
    pub message: String,
}
