use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretsError {
    /// Collapses every crypto failure mode (bad version byte, short token,
    /// bad HMAC, bad padding) into one variant so callers can't distinguish
    /// *why* a token failed to authenticate.
    #[error("authentication failure")]
    AuthenticationFailure,

    #[error("requester is not authorized for this tenant")]
    AuthorizationFailure,

    #[error("secret not found: {path}:{key}")]
    NotFound { path: String, key: String },

    #[error("invalid path or key: {0}")]
    InvalidIdentifier(String),

    #[error("no active master key configured")]
    NoActiveMasterKey,

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SecretsError>;
