use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("storage engine error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("task not found: seq={0}")]
    NotFound(u64),
}

pub type Result<T> = std::result::Result<T, QueueError>;
