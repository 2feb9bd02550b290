//! Materializes a job's `workspace_dir` before it's bind-mounted to `/job`.
//!
//! Source checkout is outside the five subsystems this crate specifies
//! (spec.md §1 scopes container execution, not artifact staging), so this
//! stays intentionally thin: `none` is an empty directory, `copy` copies a
//! local path, `git` shells out to the system `git` binary. Synchronous —
//! callers run it via `spawn_blocking`.

use std::path::{Path, PathBuf};

use crate::store::{Job, SourceType};

use super::error::{Result, WorkerError};

pub fn prepare(job: &Job, workspace_root: &Path) -> Result<PathBuf> {
    let dir = workspace_root.join(job.id.to_string());
    std::fs::create_dir_all(&dir)?;

    match job.source_type {
        SourceType::None => {}
        SourceType::Copy => {
            if let Some(source_path) = &job.source_path {
                copy_dir_recursive(Path::new(source_path), &dir)?;
            }
        }
        SourceType::Git => {
            if let Some(url) = &job.source_url {
                git_clone(url, job.source_ref.as_deref(), &dir)?;
            }
        }
    }

    Ok(dir)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    if !src.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let dest_path = dst.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            std::fs::create_dir_all(&dest_path)?;
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), dest_path)?;
        }
    }
    Ok(())
}

fn git_clone(url: &str, git_ref: Option<&str>, dest: &Path) -> Result<()> {
    let status = std::process::Command::new("git")
        .args(["clone", "--quiet", url])
        .arg(dest)
        .status()
        .map_err(WorkerError::Io)?;
    if !status.success() {
        return Err(WorkerError::Io(std::io::Error::other(format!("git clone of {url} failed"))));
    }

    if let Some(git_ref) = git_ref {
        let status = std::process::Command::new("git")
            .args(["-C"])
            .arg(dest)
            .args(["checkout", "--quiet", git_ref])
            .status()
            .map_err(WorkerError::Io)?;
        if !status.success() {
            return Err(WorkerError::Io(std::io::Error::other(format!("git checkout of {git_ref} failed"))));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn sample_job(source_type: SourceType, source_path: Option<String>) -> Job {
        Job {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            name: "job".into(),
            description: String::new(),
            source_type,
            source_url: None,
            source_ref: None,
            source_path,
            runner_image: "alpine".into(),
            code_dir: None,
            job_dir: None,
            job_command: "echo hi".into(),
            job_env_vars: serde_json::json!({}),
            timeout_seconds: None,
            priority: 0,
            queue_name: "default".into(),
            status: crate::store::JobStatus::Running,
            exit_code: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            error_message: None,
            triggers_detected: None,
        }
    }

    #[test]
    fn none_source_yields_empty_workspace() {
        let root = TempDir::new().unwrap();
        let job = sample_job(SourceType::None, None);
        let dir = prepare(&job, root.path()).unwrap();
        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn copy_source_materializes_files() {
        let root = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        std::fs::write(source.path().join("run.sh"), b"echo hi").unwrap();

        let job = sample_job(SourceType::Copy, Some(source.path().to_string_lossy().into_owned()));
        let dir = prepare(&job, root.path()).unwrap();
        assert!(dir.join("run.sh").exists());
    }
}
