//! Plain-OS-process backend: runs a job's argv directly via
//! `tokio::process::Command`. Used for `dry_run` mode and the test suite so
//! the full worker loop can be exercised without a container daemon —
//! the "for offline/local use" counterpart to the local-file secrets
//! variant.

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::warn;

use super::{buffered, ContainerHandle, ContainerRunner, LogReader, Result, RuntimeError};
use crate::jobspec::JobConfig;

pub struct ProcessHandle {
    child: Child,
}

pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRunner for ProcessRunner {
    async fn spawn_job(&self, config: &JobConfig) -> Result<ContainerHandle> {
        let Some((program, args)) = config.argv.split_first() else {
            return Err(RuntimeError::SpawnFailed("empty argv".into()));
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .envs(&config.env)
            .current_dir(&config.workspace_dir)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| RuntimeError::SpawnFailed(e.to_string()))?;

        Ok(ContainerHandle::Process(ProcessHandle { child }))
    }

    async fn stream_logs(&self, handle: &mut ContainerHandle) -> Result<(LogReader, LogReader)> {
        let ContainerHandle::Process(process) = handle else {
            unreachable!("ProcessRunner only produces ContainerHandle::Process");
        };
        let stdout = process
            .child
            .stdout
            .take()
            .ok_or_else(|| RuntimeError::SpawnFailed("stdout already taken".into()))?;
        let stderr = process
            .child
            .stderr
            .take()
            .ok_or_else(|| RuntimeError::SpawnFailed("stderr already taken".into()))?;
        Ok((buffered(stdout), buffered(stderr)))
    }

    async fn wait_for_completion(&self, handle: &mut ContainerHandle) -> Result<i32> {
        let ContainerHandle::Process(process) = handle else {
            unreachable!("ProcessRunner only produces ContainerHandle::Process");
        };
        let status = process.child.wait().await?;
        Ok(status.code().unwrap_or(-1))
    }

    async fn terminate(&self, handle: &mut ContainerHandle) -> Result<()> {
        let ContainerHandle::Process(process) = handle else {
            unreachable!("ProcessRunner only produces ContainerHandle::Process");
        };
        if let Err(e) = process.child.start_kill() {
            warn!(error = %e, "failed to kill timed-out process");
        }
        Ok(())
    }

    async fn cleanup(&self, handle: ContainerHandle) -> Result<()> {
        let ContainerHandle::Process(mut process) = handle else {
            unreachable!("ProcessRunner only produces ContainerHandle::Process");
        };
        let _ = process.child.kill().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn config(command: &str, workspace: &std::path::Path) -> JobConfig {
        JobConfig {
            image: String::new(),
            argv: crate::jobspec::shellwords::split(command).unwrap(),
            env: HashMap::new(),
            workspace_dir: workspace.to_string_lossy().into_owned(),
            working_dir: "/job".into(),
            timeout_seconds: None,
        }
    }

    #[tokio::test]
    async fn spawns_and_captures_stdout() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessRunner::new();
        let mut handle = runner.spawn_job(&config("echo hello", dir.path())).await.unwrap();
        let (mut stdout, _stderr) = runner.stream_logs(&mut handle).await.unwrap();
        let mut buf = String::new();
        stdout.read_to_string(&mut buf).await.unwrap();
        let code = runner.wait_for_completion(&mut handle).await.unwrap();
        runner.cleanup(handle).await.unwrap();
        assert_eq!(buf.trim(), "hello");
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessRunner::new();
        let mut handle = runner.spawn_job(&config("sh -c 'exit 7'", dir.path())).await.unwrap();
        let code = runner.wait_for_completion(&mut handle).await.unwrap();
        runner.cleanup(handle).await.unwrap();
        assert_eq!(code, 7);
    }
}
