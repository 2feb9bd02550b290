//! Poll→claim→prepare→spawn→stream→persist-logs→update-status loop.
//!
//! Both claim modes (queue-backed, database-polling fallback) converge on
//! the same `Store::claim_job` conditional transition: it is simultaneously
//! the "lease" the ancestor codebase's queue gave a claim and the "Job to
//! running" step the per-job lifecycle calls for, so there is exactly one
//! place a job flips to `running`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::jobspec::{loader::to_job_config, model::JobSpec};
use crate::observability::Metrics;
use crate::queue::QueueClient;
use crate::runtime::{ContainerHandle, ContainerRunner, LogReader};
use crate::secrets::{resolve_env, KeyVault, Masker, SecretStore};
use crate::storage::StorageClient;
use crate::store::{Job, JobStatus, LogEntry, LogStream, Store};

use super::error::{Result, WorkerError};
use super::workspace;

/// Shared handles the worker loop and every job it runs need. One instance
/// is built at startup and cloned (via `Arc`) into every spawned job task.
pub struct WorkerContext {
    pub store: Arc<Store>,
    pub vault: Arc<KeyVault>,
    pub storage: Arc<StorageClient>,
    pub queue: Option<Arc<dyn QueueClient>>,
    pub runner: Arc<dyn ContainerRunner>,
    pub metrics: Arc<Metrics>,
    pub config: WorkerConfig,
}

struct ClaimedWork {
    job: Job,
    queue_seq: Option<u64>,
}

enum RunOutcome {
    Finished(i32),
    TimedOut,
    Cancelled,
}

/// Runs the worker's bounded-concurrency loop forever. Each slot claims and
/// executes one job end-to-end; slots run in parallel, gated by a
/// `tokio::sync::Semaphore` of size `concurrency`.
pub async fn run(ctx: Arc<WorkerContext>) -> ! {
    let semaphore = Arc::new(Semaphore::new(ctx.config.concurrency));
    loop {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("worker semaphore is never closed");

        match claim_next(&ctx).await {
            Ok(Some(work)) => {
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    execute(ctx, work).await;
                    drop(permit);
                });
            }
            Ok(None) => {
                drop(permit);
                tokio::time::sleep(Duration::from_millis(ctx.config.poll_interval_ms)).await;
            }
            Err(e) => {
                drop(permit);
                warn!(error = %e, "worker claim attempt failed");
                tokio::time::sleep(Duration::from_millis(ctx.config.poll_interval_ms)).await;
            }
        }
    }
}

/// Claims and executes exactly one job if one is available. Returns whether
/// work was found — used by tests to drive the loop deterministically
/// instead of racing the infinite `run` loop.
pub async fn run_once(ctx: Arc<WorkerContext>) -> Result<bool> {
    match claim_next(&ctx).await? {
        Some(work) => {
            execute(ctx, work).await;
            Ok(true)
        }
        None => Ok(false),
    }
}

async fn claim_next(ctx: &WorkerContext) -> Result<Option<ClaimedWork>> {
    if let Some(queue) = &ctx.queue {
        let Some(claimed) = queue.claim_task(&ctx.config.queue_name).await? else {
            return Ok(None);
        };
        let store = ctx.store.clone();
        let job_id = claimed.task.job_id;
        let job = tokio::task::spawn_blocking(move || store.claim_job(job_id))
            .await
            .expect("blocking task panicked")?;
        match job {
            Some(job) => Ok(Some(ClaimedWork { job, queue_seq: Some(claimed.seq) })),
            None => {
                // Stale queue entry (job already claimed or terminal) — drop it.
                queue.ack_task(claimed.seq).await?;
                Ok(None)
            }
        }
    } else {
        let store = ctx.store.clone();
        let candidates = tokio::task::spawn_blocking(move || store.list_claimable_jobs(1))
            .await
            .expect("blocking task panicked")?;
        let Some(candidate) = candidates.into_iter().next() else {
            return Ok(None);
        };
        let store = ctx.store.clone();
        let id = candidate.id;
        let job = tokio::task::spawn_blocking(move || store.claim_job(id))
            .await
            .expect("blocking task panicked")?;
        Ok(job.map(|job| ClaimedWork { job, queue_seq: None }))
    }
}

async fn execute(ctx: Arc<WorkerContext>, work: ClaimedWork) {
    let ClaimedWork { job, queue_seq } = work;
    let job_id = job.id;

    if let Err(e) = run_job(&ctx, job).await {
        warn!(%job_id, error = %e, "job execution failed");
    }

    if let (Some(seq), Some(queue)) = (queue_seq, &ctx.queue) {
        if let Err(e) = queue.ack_task(seq).await {
            warn!(%job_id, error = %e, "failed to ack queue task after job execution");
        }
    }
}

fn spec_from_job(job: &Job) -> JobSpec {
    JobSpec {
        name: Some(job.name.clone()),
        command: Some(job.job_command.clone()),
        image: Some(job.runner_image.clone()),
        environment: HashMap::new(),
        working_dir: job.job_dir.clone(),
        source: None,
        timeout_seconds: job.timeout_seconds,
        capabilities: Vec::new(),
    }
}

async fn run_job(ctx: &WorkerContext, mut job: Job) -> Result<()> {
    let job_id = job.id;
    let tenant_id = job.user_id;
    let masker = Arc::new(Masker::new());

    // Steps 1-2: hydrate the environment, resolve `${env:}`/`${secret:}`
    // references, register every concrete secret value for masking. Status
    // already transitioned to `running` by the claim that produced `job`.
    let env_map: HashMap<String, String> = serde_json::from_value(job.job_env_vars.clone()).unwrap_or_default();
    let resolved = {
        let store = ctx.store.clone();
        let vault = ctx.vault.clone();
        tokio::task::spawn_blocking(move || {
            resolve_env(&env_map, tenant_id, tenant_id, |path, key| {
                SecretStore::new(&store, &vault).get(tenant_id, path, key)
            })
        })
        .await
        .expect("blocking task panicked")?
    };
    masker.register_all(resolved.secret_values.clone());

    let workspace_root = PathBuf::from(&ctx.config.workspace_root);
    let job_for_workspace = job.clone();
    let workspace_dir = tokio::task::spawn_blocking(move || workspace::prepare(&job_for_workspace, &workspace_root))
        .await
        .expect("blocking task panicked")?;

    let spec = spec_from_job(&job);
    let job_config = to_job_config(
        &spec,
        resolved.env,
        &job_id.to_string(),
        &job.queue_name,
        workspace_dir.to_string_lossy().into_owned(),
    )?;

    // Step 4: spawn. Failures before start are fatal for this job.
    let handle = match ctx.runner.spawn_job(&job_config).await {
        Ok(handle) => handle,
        Err(e) => {
            job.status = JobStatus::Failed;
            job.exit_code = Some(-1);
            job.error_message = Some(e.to_string());
            job.completed_at = Some(Utc::now());
            persist_job(ctx, &job).await?;
            ctx.metrics.job_failed();
            return Err(e.into());
        }
    };

    let (outcome, handle) = drive_container(ctx, job_id, handle, job.timeout_seconds, masker).await;

    // Step 9: cleanup is unconditional regardless of how the drive loop exited.
    if let Err(e) = ctx.runner.cleanup(handle).await {
        warn!(%job_id, error = %e, "container cleanup failed (best-effort)");
    }

    let triggers_detected = tokio::task::spawn_blocking(move || detect_triggers(&workspace_dir))
        .await
        .expect("blocking task panicked");

    match outcome {
        Ok(RunOutcome::Finished(code)) => {
            job.status = if code == 0 { JobStatus::Completed } else { JobStatus::Failed };
            job.exit_code = Some(code);
            if job.status == JobStatus::Failed {
                ctx.metrics.job_failed();
            } else {
                ctx.metrics.job_completed();
            }
        }
        Ok(RunOutcome::TimedOut) => {
            job.status = JobStatus::Timeout;
            job.exit_code = Some(-1);
            ctx.metrics.job_timed_out();
        }
        Ok(RunOutcome::Cancelled) => {
            job.status = JobStatus::Cancelled;
            job.exit_code = Some(-1);
            ctx.metrics.job_cancelled();
        }
        Err(e) => {
            job.status = JobStatus::Failed;
            job.exit_code = Some(-1);
            job.error_message = Some(e.to_string());
            ctx.metrics.job_failed();
        }
    }
    job.completed_at = Some(Utc::now());
    job.triggers_detected = triggers_detected;
    persist_job(ctx, &job).await?;

    Ok(())
}

async fn persist_job(ctx: &WorkerContext, job: &Job) -> Result<()> {
    let store = ctx.store.clone();
    let job = job.clone();
    tokio::task::spawn_blocking(move || store.update_job_direct(&job))
        .await
        .expect("blocking task panicked")?;
    Ok(())
}

/// Steps 5-8: stream/mask/persist logs while waiting for completion, racing
/// a timeout deadline and a periodic re-read of the job's status so an
/// out-of-band cancel (set by the cancel API endpoint while this job is
/// `running`) is observed. Returns the handle back to the caller so cleanup
/// stays the caller's single, unconditional responsibility.
async fn drive_container(
    ctx: &WorkerContext,
    job_id: Uuid,
    mut handle: ContainerHandle,
    timeout_seconds: Option<i64>,
    masker: Arc<Masker>,
) -> (Result<RunOutcome>, ContainerHandle) {
    let result = drive_container_inner(ctx, job_id, &mut handle, timeout_seconds, masker).await;
    (result, handle)
}

async fn drive_container_inner(
    ctx: &WorkerContext,
    job_id: Uuid,
    handle: &mut ContainerHandle,
    timeout_seconds: Option<i64>,
    masker: Arc<Masker>,
) -> Result<RunOutcome> {
    let (stdout, stderr) = ctx.runner.stream_logs(handle).await?;
    let stdout_task = tokio::spawn(drain_log(ctx.storage.clone(), job_id, LogStream::Stdout, stdout, masker.clone()));
    let stderr_task = tokio::spawn(drain_log(ctx.storage.clone(), job_id, LogStream::Stderr, stderr, masker));

    let deadline = timeout_seconds
        .filter(|s| *s > 0)
        .map(|s| tokio::time::Instant::now() + Duration::from_secs(s as u64));
    let mut cancel_check = tokio::time::interval(Duration::from_secs(2));
    cancel_check.tick().await; // first tick fires immediately

    let wait_fut = ctx.runner.wait_for_completion(handle);
    tokio::pin!(wait_fut);

    let outcome = loop {
        tokio::select! {
            result = &mut wait_fut => {
                break RunOutcome::Finished(result?);
            }
            _ = cancel_check.tick() => {
                if let Some(deadline) = deadline {
                    if tokio::time::Instant::now() >= deadline {
                        ctx.runner.terminate(handle).await.ok();
                        break RunOutcome::TimedOut;
                    }
                }
                let store = ctx.store.clone();
                let current = tokio::task::spawn_blocking(move || store.get_job(job_id))
                    .await
                    .expect("blocking task panicked")?;
                if matches!(current, Some(j) if j.status == JobStatus::Cancelled) {
                    ctx.runner.terminate(handle).await.ok();
                    break RunOutcome::Cancelled;
                }
            }
        }
    };

    let _ = stdout_task.await;
    let _ = stderr_task.await;
    Ok(outcome)
}

async fn drain_log(
    storage: Arc<StorageClient>,
    job_id: Uuid,
    stream: LogStream,
    reader: LogReader,
    masker: Arc<Masker>,
) -> Result<()> {
    let mut lines = reader.lines();
    let mut entries = Vec::new();
    while let Some(line) = lines.next_line().await? {
        entries.push(LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
            stream,
            level: None,
            message: masker.mask(&line),
        });
    }

    let key = match stream {
        LogStream::Stdout => format!("logs/{job_id}/stdout.json"),
        LogStream::Stderr => format!("logs/{job_id}/stderr.json"),
    };
    storage.put(&key, serde_json::to_vec(&entries)?).await.map_err(WorkerError::Storage)?;
    Ok(())
}

/// Detect-and-report only (spec's Non-goal on follow-up enqueue): reads
/// `{workspace_dir}/triggers.json` if present and logs one event per entry.
fn detect_triggers(workspace_dir: &std::path::Path) -> Option<usize> {
    let raw = std::fs::read_to_string(workspace_dir.join("triggers.json")).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    let triggers = value.as_array()?;
    for (index, trigger) in triggers.iter().enumerate() {
        info!(index, %trigger, "detected trigger in completed job workspace");
    }
    Some(triggers.len())
}
