//! `ContainerRunner` abstraction: spawn/stream/wait/cleanup across runtime
//! backends. The spec names Docker, containerd, and Kubernetes; this crate
//! ships a Docker backend (via `bollard`) and a plain-process backend used
//! for `dry_run` and the test suite, and accepts-but-rejects the other two
//! at startup rather than faking a partial implementation of either wire
//! protocol.

pub mod docker;
pub mod error;
pub mod process;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, BufReader};

pub use error::{Result, RuntimeError};

use crate::jobspec::JobConfig;

/// Either backend's piped stdout/stderr, boxed so the trait stays object-safe
/// across both implementations' concrete reader types.
pub type LogReader = std::pin::Pin<Box<dyn AsyncBufRead + Send>>;

pub fn buffered<R: tokio::io::AsyncRead + Send + 'static>(reader: R) -> LogReader {
    Box::pin(BufReader::new(reader))
}

/// Opaque handle to a running container/process. Each backend stashes
/// whatever identifying state (container id, child process) it needs;
/// callers never inspect the variant.
pub enum ContainerHandle {
    Process(process::ProcessHandle),
    Docker(docker::DockerHandle),
}

/// Runtime backends named in the external interface but not implemented by
/// this crate (the spec scopes only the contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnimplementedBackend {
    Containerd,
    Kubernetes,
}

impl UnimplementedBackend {
    pub fn name(&self) -> &'static str {
        match self {
            UnimplementedBackend::Containerd => "containerd",
            UnimplementedBackend::Kubernetes => "kubernetes",
        }
    }
}

#[async_trait]
pub trait ContainerRunner: Send + Sync {
    /// Starts a container/process with `config`'s image, argv, env, and a
    /// bind-mount of `workspace_dir` to `/job`. Failures before start are
    /// fatal for the job (caller transitions it to `failed` with exit code
    /// -1).
    async fn spawn_job(&self, config: &JobConfig) -> Result<ContainerHandle>;

    /// Returns byte streams for stdout/stderr that close when the
    /// container/process exits.
    async fn stream_logs(&self, handle: &mut ContainerHandle) -> Result<(LogReader, LogReader)>;

    /// Blocks until the container/process exits, returning its exit code.
    async fn wait_for_completion(&self, handle: &mut ContainerHandle) -> Result<i32>;

    /// Best-effort teardown. Failures are logged, not propagated as fatal.
    async fn cleanup(&self, handle: ContainerHandle) -> Result<()>;

    /// Requests early termination (used by worker-side timeout/cancellation).
    async fn terminate(&self, handle: &mut ContainerHandle) -> Result<()>;
}
