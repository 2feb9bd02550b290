use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to spawn container: {0}")]
    SpawnFailed(String),

    #[error("container runtime not compiled in: {0}")]
    NotCompiledIn(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
