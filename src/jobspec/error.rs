use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobSpecError {
    #[error("invalid job spec document: {0}")]
    InvalidDocument(String),

    #[error("command is empty after tokenization")]
    EmptyCommand,

    #[error("unterminated quote in command string")]
    UnterminatedQuote,

    #[error("overlay {overlay:?} replaces secret reference for env key {key:?} with a literal value; pass allow_secret_overrides to proceed")]
    SecretOverrideBlocked { overlay: String, key: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, JobSpecError>;
