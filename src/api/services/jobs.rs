use axum::extract::{Extension, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::jobspec::merge::{merge_layers, Layer};
use crate::storage::StorageClient;
use crate::store::{Job, JobStatus};

use crate::api::auth::AuthContext;
use crate::api::error::ApiError;
use crate::api::models::{CreateJobRequest, JobListResponse, JobResponse, ListJobsQuery, LogsQuery};
use crate::api::state::AppState;
use crate::api::tx::SharedUnitOfWork;
use crate::api::validation::{parse_log_stream, validate_job_submission, LogStreamSelector};

use super::run_blocking;

pub async fn create_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(uow): Extension<SharedUnitOfWork>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    validate_job_submission(&req)?;

    let base = Layer { label: "base".to_string(), document: json!({ "environment": req.job_env_vars }) };
    let overlays = req
        .overlays
        .iter()
        .map(|o| Layer { label: o.label.clone(), document: json!({ "environment": o.environment }) })
        .collect();
    let (merged, overrides) = merge_layers(base, overlays);
    if !overrides.is_empty() && !req.allow_secret_overrides {
        let detail: Vec<String> = overrides.iter().map(|o| format!("{}:{}", o.overlay, o.key)).collect();
        return Err(ApiError::InvalidInput(format!(
            "overlay(s) replace secret reference(s) with literal values ({}); resubmit with allow_secret_overrides to proceed",
            detail.join(", ")
        )));
    }
    let job_env_vars = merged.get("environment").cloned().unwrap_or_else(|| json!({}));

    let now = Utc::now();
    let job = Job {
        id: Uuid::now_v7(),
        user_id: auth.user.id,
        name: req.name,
        description: req.description,
        source_type: req.source_type,
        source_url: req.source_url,
        source_ref: req.source_ref,
        source_path: req.source_path,
        runner_image: req.runner_image.unwrap_or_else(|| state.config.worker.default_runner_image.clone()),
        code_dir: req.code_dir,
        job_dir: req.job_dir,
        job_command: req.job_command,
        job_env_vars,
        timeout_seconds: req.timeout_seconds,
        priority: req.priority,
        queue_name: req.queue_name.unwrap_or_else(|| state.config.worker.queue_name.clone()),
        status: JobStatus::Submitted,
        exit_code: None,
        started_at: None,
        completed_at: None,
        created_at: now,
        updated_at: now,
        error_message: None,
        triggers_detected: None,
    };

    {
        let mut guard = uow.lock().await;
        let uow = guard.as_mut().expect("unit of work present for the duration of the request");
        state.store.insert_job(uow, &job)?;
    }

    if let Some(queue) = &state.queue {
        if let Err(e) = queue.submit_task(job.id, job.queue_name.clone(), job.priority).await {
            tracing::warn!(
                error = %e, job_id = %job.id,
                "failed to submit job to queue; database-polling fallback will still pick it up"
            );
        }
    }

    state.metrics.job_submitted();
    Ok((StatusCode::CREATED, Json(job.into())))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(q): Query<ListJobsQuery>,
) -> Result<Json<JobListResponse>, ApiError> {
    let store = state.store.clone();
    let is_admin = auth.is_admin();
    let user_id = auth.user.id;
    let jobs = run_blocking(move || {
        if is_admin { store.list_all_jobs() } else { store.list_jobs_for_user(user_id) }
    })
    .await?;

    let total = jobs.len();
    let page = jobs.into_iter().skip(q.offset).take(q.limit).map(JobResponse::from).collect();
    Ok(Json(JobListResponse { jobs: page, total, limit: q.limit, offset: q.offset }))
}

pub async fn get_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let store = state.store.clone();
    let job = run_blocking(move || store.get_job(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no job {id}")))?;
    if !auth.can_access(job.user_id) {
        return Err(ApiError::Forbidden("not authorized for this job".into()));
    }
    Ok(Json(job.into()))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(uow): Extension<SharedUnitOfWork>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let store = state.store.clone();
    let mut job = run_blocking(move || store.get_job(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no job {id}")))?;
    if !auth.can_access(job.user_id) {
        return Err(ApiError::Forbidden("not authorized for this job".into()));
    }
    if !job.can_be_cancelled() {
        return Err(ApiError::Conflict("job is already in a terminal state".into()));
    }

    job.status = JobStatus::Cancelled;
    job.updated_at = Utc::now();
    {
        let mut guard = uow.lock().await;
        let uow = guard.as_mut().expect("unit of work present for the duration of the request");
        state.store.update_job(uow, &job)?;
    }
    state.metrics.job_cancelled();
    Ok(Json(job.into()))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let lookup_store = state.store.clone();
    let job = run_blocking(move || lookup_store.get_job(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no job {id}")))?;
    if !auth.can_access(job.user_id) {
        return Err(ApiError::Forbidden("not authorized for this job".into()));
    }

    let store = state.store.clone();
    let deleted = run_blocking(move || store.delete_job(id)).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("no job {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_logs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(q): Query<LogsQuery>,
) -> Result<Response, ApiError> {
    let selector = parse_log_stream(q.stream.as_deref())?;

    let store = state.store.clone();
    let job = run_blocking(move || store.get_job(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no job {id}")))?;
    if !auth.can_access(job.user_id) {
        return Err(ApiError::Forbidden("not authorized for this job".into()));
    }

    let storage = state
        .storage
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("object store is not configured".into()))?;

    let stdout_key = format!("logs/{id}/stdout.json");
    let stderr_key = format!("logs/{id}/stderr.json");

    let body = match selector {
        LogStreamSelector::Stdout => fetch_log(&storage, &stdout_key)
            .await?
            .ok_or_else(|| ApiError::NotFound("no stdout log for this job".into()))?,
        LogStreamSelector::Stderr => fetch_log(&storage, &stderr_key)
            .await?
            .ok_or_else(|| ApiError::NotFound("no stderr log for this job".into()))?,
        LogStreamSelector::Combined => {
            let stdout = fetch_log(&storage, &stdout_key).await?;
            let stderr = fetch_log(&storage, &stderr_key).await?;
            match (stdout, stderr) {
                (None, None) => return Err(ApiError::NotFound("no logs recorded for this job".into())),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (Some(a), Some(b)) => merge_logs(a, b),
            }
        }
    };

    Ok(([(header::CONTENT_TYPE, "application/json")], Json(body)).into_response())
}

async fn fetch_log(storage: &StorageClient, key: &str) -> Result<Option<Value>, ApiError> {
    if !storage.exists(key).await? {
        return Ok(None);
    }
    let bytes = storage.get(key).await?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Merges two per-stream `LogEntry` JSON arrays, sorted by `timestamp`
/// ascending (RFC3339Nano strings sort lexicographically in time order).
fn merge_logs(a: Value, b: Value) -> Value {
    let mut entries = Vec::new();
    if let Value::Array(items) = a {
        entries.extend(items);
    }
    if let Value::Array(items) = b {
        entries.extend(items);
    }
    entries.sort_by(|x, y| {
        let xs = x.get("timestamp").and_then(Value::as_str).unwrap_or_default();
        let ys = y.get("timestamp").and_then(Value::as_str).unwrap_or_default();
        xs.cmp(ys)
    });
    Value::Array(entries)
}
