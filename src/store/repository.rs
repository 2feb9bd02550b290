use std::path::Path;

use chrono::Utc;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{Result, StoreError};
use super::model::{ApiToken, Job, JobStatus, MasterKey, Secret, TenantKey, User};
use super::partitions::*;
use super::unit_of_work::UnitOfWork;

/// Fjall-backed persistence for the job coordinator's relational entities.
///
/// Stands in for the external relational database: every method here is the
/// shape a `sqlx`-backed repository would expose, just implemented against an
/// embedded LSM keyspace instead of a client/server connection pool.
#[derive(Clone)]
pub struct Store {
    keyspace: Keyspace,
    users: PartitionHandle,
    tokens: PartitionHandle,
    jobs: PartitionHandle,
    master_keys: PartitionHandle,
    tenant_keys: PartitionHandle,
    secrets: PartitionHandle,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening store");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let opts = PartitionCreateOptions::default();

        Ok(Self {
            users: keyspace.open_partition("users", opts.clone())?,
            tokens: keyspace.open_partition("tokens", opts.clone())?,
            jobs: keyspace.open_partition("jobs", opts.clone())?,
            master_keys: keyspace.open_partition("master_keys", opts.clone())?,
            tenant_keys: keyspace.open_partition("tenant_keys", opts.clone())?,
            secrets: keyspace.open_partition("secrets", opts)?,
            keyspace,
        })
    }

    pub fn begin(&self) -> UnitOfWork {
        UnitOfWork::begin(&self.keyspace)
    }

    // -- users -----------------------------------------------------------

    pub fn create_user(&self, uow: &mut UnitOfWork, user: &User) -> Result<()> {
        if self.users.get(encode_username_index(&user.username))?.is_some() {
            return Err(StoreError::Conflict(format!("username {} taken", user.username)));
        }
        let value = serde_json::to_vec(user)?;
        uow.batch_mut().insert(&self.users, encode_user_key(&user.id.to_string()), value);
        uow.batch_mut().insert(
            &self.users,
            encode_username_index(&user.username),
            user.id.to_string().into_bytes(),
        );
        uow.batch_mut().insert(
            &self.users,
            encode_email_index(&user.email),
            user.id.to_string().into_bytes(),
        );
        Ok(())
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        match self.users.get(encode_user_key(&id.to_string()))? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    /// Direct (non-transactional) update. Used for the secrets-init marker,
    /// which sits outside any single request's unit of work.
    pub fn update_user_direct(&self, user: &User) -> Result<()> {
        let value = serde_json::to_vec(user)?;
        self.users.insert(encode_user_key(&user.id.to_string()), value)?;
        Ok(())
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.users.get(encode_username_index(username))? {
            Some(id_bytes) => {
                let id = String::from_utf8_lossy(&id_bytes).parse::<Uuid>().map_err(|e| {
                    StoreError::Serialization(serde::de::Error::custom(e.to_string()))
                })?;
                self.get_user(id)
            }
            None => Ok(None),
        }
    }

    // -- api tokens --------------------------------------------------------

    pub fn create_token(&self, uow: &mut UnitOfWork, token: &ApiToken) -> Result<()> {
        let value = serde_json::to_vec(token)?;
        uow.batch_mut().insert(&self.tokens, encode_token_key(&token.id.to_string()), value);
        uow.batch_mut().insert(
            &self.tokens,
            encode_token_hash_index(&token.token_hash),
            token.id.to_string().into_bytes(),
        );
        Ok(())
    }

    pub fn get_token_by_hash(&self, token_hash: &str) -> Result<Option<ApiToken>> {
        match self.tokens.get(encode_token_hash_index(token_hash))? {
            Some(id_bytes) => {
                let id = String::from_utf8_lossy(&id_bytes).parse::<Uuid>().map_err(|e| {
                    StoreError::Serialization(serde::de::Error::custom(e.to_string()))
                })?;
                match self.tokens.get(encode_token_key(&id.to_string()))? {
                    Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    /// Best-effort, write-behind update — never part of a request's unit of work.
    /// See DESIGN.md's Open Question resolution for `last_used_at`.
    pub fn touch_token_last_used(&self, id: Uuid) -> Result<()> {
        let key = encode_token_key(&id.to_string());
        if let Some(bytes) = self.tokens.get(&key)? {
            let mut token: ApiToken = serde_json::from_slice(&bytes)?;
            token.last_used_at = Some(Utc::now());
            self.tokens.insert(key, serde_json::to_vec(&token)?)?;
        }
        Ok(())
    }

    pub fn list_all_tokens(&self) -> Result<Vec<ApiToken>> {
        let mut tokens = Vec::new();
        for item in self.tokens.prefix(token_key_prefix()) {
            let (_, value) = item?;
            tokens.push(serde_json::from_slice(&value)?);
        }
        tokens.sort_by(|a: &ApiToken, b: &ApiToken| a.created_at.cmp(&b.created_at));
        Ok(tokens)
    }

    pub fn get_token(&self, id: Uuid) -> Result<Option<ApiToken>> {
        match self.tokens.get(encode_token_key(&id.to_string()))? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    /// Removes the token row and its hash index entry. Returns whether a row was found.
    pub fn delete_token(&self, id: Uuid) -> Result<bool> {
        let Some(token) = self.get_token(id)? else {
            return Ok(false);
        };
        self.tokens.remove(encode_token_key(&id.to_string()))?;
        self.tokens.remove(encode_token_hash_index(&token.token_hash))?;
        Ok(true)
    }

    // -- jobs --------------------------------------------------------------

    pub fn insert_job(&self, uow: &mut UnitOfWork, job: &Job) -> Result<()> {
        let value = serde_json::to_vec(job)?;
        uow.batch_mut().insert(&self.jobs, encode_job_key(&job.id.to_string()), value);
        Ok(())
    }

    pub fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        match self.jobs.get(encode_job_key(&id.to_string()))? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    pub fn update_job(&self, uow: &mut UnitOfWork, job: &Job) -> Result<()> {
        let value = serde_json::to_vec(job)?;
        uow.batch_mut().insert(&self.jobs, encode_job_key(&job.id.to_string()), value);
        Ok(())
    }

    /// Direct (non-transactional) update, used by the worker loop which owns
    /// the job for the duration of its run and isn't behind an HTTP request.
    pub fn update_job_direct(&self, job: &Job) -> Result<()> {
        let value = serde_json::to_vec(job)?;
        self.jobs.insert(encode_job_key(&job.id.to_string()), value)?;
        Ok(())
    }

    /// Conditional claim used by the database-polling worker fallback: only
    /// succeeds if the job is still in `submitted`/`queued` state, emulating
    /// `UPDATE ... WHERE status IN (...)` as an atomic compare-and-swap.
    pub fn claim_job(&self, id: Uuid) -> Result<Option<Job>> {
        let key = encode_job_key(&id.to_string());
        let Some(bytes) = self.jobs.get(&key)? else {
            return Ok(None);
        };
        let mut job: Job = serde_json::from_slice(&bytes)?;
        if !matches!(job.status, JobStatus::Submitted | JobStatus::Queued) {
            return Ok(None);
        }
        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        self.jobs.insert(key, serde_json::to_vec(&job)?)?;
        Ok(Some(job))
    }

    /// Jobs eligible for the database-polling fallback, ordered
    /// `priority DESC, created_at ASC` (see DESIGN.md for why this is an
    /// in-memory sort rather than an index-backed query).
    pub fn list_claimable_jobs(&self, limit: usize) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for item in self.jobs.prefix(job_key_prefix()) {
            let (_, value) = item?;
            let job: Job = serde_json::from_slice(&value)?;
            if matches!(job.status, JobStatus::Submitted | JobStatus::Queued) {
                jobs.push(job);
            }
        }
        jobs.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        jobs.truncate(limit);
        Ok(jobs)
    }

    pub fn list_jobs_for_user(&self, user_id: Uuid) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for item in self.jobs.prefix(job_key_prefix()) {
            let (_, value) = item?;
            let job: Job = serde_json::from_slice(&value)?;
            if job.user_id == user_id {
                jobs.push(job);
            }
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Every job across every tenant, newest first. Used by the admin job
    /// listing endpoint, which bypasses tenant scoping.
    pub fn list_all_jobs(&self) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for item in self.jobs.prefix(job_key_prefix()) {
            let (_, value) = item?;
            jobs.push(serde_json::from_slice(&value)?);
        }
        jobs.sort_by(|a: &Job, b: &Job| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Removes a job row outright. Returns whether a row was found.
    pub fn delete_job(&self, id: Uuid) -> Result<bool> {
        if self.jobs.get(encode_job_key(&id.to_string()))?.is_none() {
            return Ok(false);
        }
        self.jobs.remove(encode_job_key(&id.to_string()))?;
        Ok(true)
    }

    // -- master keys ---------------------------------------------------------

    pub fn create_master_key(&self, key: &MasterKey) -> Result<()> {
        let value = serde_json::to_vec(key)?;
        self.master_keys.insert(encode_master_key_key(&key.id.to_string()), value)?;
        Ok(())
    }

    pub fn list_master_keys(&self) -> Result<Vec<MasterKey>> {
        let mut keys = Vec::new();
        for item in self.master_keys.iter() {
            let (_, value) = item?;
            keys.push(serde_json::from_slice(&value)?);
        }
        keys.sort_by_key(|k: &MasterKey| k.ordinal);
        Ok(keys)
    }

    pub fn get_master_key_by_name(&self, name: &str) -> Result<Option<MasterKey>> {
        Ok(self.list_master_keys()?.into_iter().find(|k| k.name == name))
    }

    pub fn update_master_key(&self, key: &MasterKey) -> Result<()> {
        self.master_keys
            .insert(encode_master_key_key(&key.id.to_string()), serde_json::to_vec(key)?)?;
        Ok(())
    }

    /// Atomically flips `is_primary` across every master key row.
    pub fn set_primary_master_key(&self, id: Uuid) -> Result<()> {
        let mut batch = self.keyspace.batch();
        for item in self.master_keys.iter() {
            let (k, v) = item?;
            let mut key: MasterKey = serde_json::from_slice(&v)?;
            key.is_primary = key.id == id;
            batch.insert(&self.master_keys, k, serde_json::to_vec(&key)?);
        }
        batch.commit()?;
        debug!(%id, "rotated primary master key");
        Ok(())
    }

    /// Deletes every `TenantKey` row wrapped under `master_key_id`. Used when
    /// decommissioning a retired master key.
    pub fn delete_tenant_keys_for_master(&self, master_key_id: Uuid) -> Result<()> {
        let mut to_remove = Vec::new();
        for item in self.tenant_keys.iter() {
            let (k, v) = item?;
            let key: TenantKey = serde_json::from_slice(&v)?;
            if key.master_key_id == master_key_id {
                to_remove.push(k);
            }
        }
        for k in to_remove {
            self.tenant_keys.remove(k)?;
        }
        Ok(())
    }

    pub fn list_all_tenant_ids(&self) -> Result<Vec<Uuid>> {
        let mut ids = std::collections::HashSet::new();
        for item in self.tenant_keys.iter() {
            let (_, v) = item?;
            let key: TenantKey = serde_json::from_slice(&v)?;
            ids.insert(key.tenant_user_id);
        }
        Ok(ids.into_iter().collect())
    }

    // -- tenant keys -----------------------------------------------------------

    pub fn upsert_tenant_key(&self, key: &TenantKey) -> Result<()> {
        let value = serde_json::to_vec(key)?;
        self.tenant_keys.insert(
            encode_tenant_key_key(&key.tenant_user_id.to_string(), &key.master_key_id.to_string()),
            value,
        )?;
        Ok(())
    }

    pub fn get_tenant_keys(&self, tenant_user_id: Uuid) -> Result<Vec<TenantKey>> {
        let mut keys = Vec::new();
        for item in self.tenant_keys.prefix(tenant_key_prefix(&tenant_user_id.to_string())) {
            let (_, value) = item?;
            keys.push(serde_json::from_slice(&value)?);
        }
        Ok(keys)
    }

    // -- secrets ------------------------------------------------------------

    pub fn upsert_secret(&self, secret: &Secret) -> Result<()> {
        let value = serde_json::to_vec(secret)?;
        self.secrets.insert(
            encode_secret_key(&secret.tenant_user_id.to_string(), &secret.path, &secret.key),
            value,
        )?;
        Ok(())
    }

    pub fn get_secret(&self, tenant_user_id: Uuid, path: &str, key: &str) -> Result<Option<Secret>> {
        match self
            .secrets
            .get(encode_secret_key(&tenant_user_id.to_string(), path, key))?
        {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    pub fn delete_secret(&self, tenant_user_id: Uuid, path: &str, key: &str) -> Result<()> {
        self.secrets
            .remove(encode_secret_key(&tenant_user_id.to_string(), path, key))?;
        Ok(())
    }

    pub fn list_secrets_for_path(&self, tenant_user_id: Uuid, path: &str) -> Result<Vec<Secret>> {
        let mut secrets = Vec::new();
        for item in self.secrets.prefix(secret_path_prefix(&tenant_user_id.to_string(), path)) {
            let (_, value) = item?;
            secrets.push(serde_json::from_slice(&value)?);
        }
        Ok(secrets)
    }

    /// Distinct paths with at least one secret for this tenant.
    pub fn list_secret_paths(&self, tenant_user_id: Uuid) -> Result<Vec<String>> {
        let mut paths = std::collections::BTreeSet::new();
        for item in self.secrets.prefix(tenant_secrets_prefix(&tenant_user_id.to_string())) {
            let (_, value) = item?;
            let secret: Secret = serde_json::from_slice(&value)?;
            paths.insert(secret.path);
        }
        Ok(paths.into_iter().collect())
    }

    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}
