use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("queue error: {0}")]
    Queue(#[from] crate::queue::QueueError),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("job spec error: {0}")]
    JobSpec(#[from] crate::jobspec::JobSpecError),

    #[error("secrets error: {0}")]
    Secrets(#[from] crate::secrets::SecretsError),

    #[error("runtime error: {0}")]
    Runtime(#[from] crate::runtime::RuntimeError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
