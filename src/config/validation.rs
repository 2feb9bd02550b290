use thiserror::Error;

use super::models::{Config, ContainerRuntime};
use crate::secrets::{self, SecretsError};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("REACTORCIDE_MASTER_KEYS entry is malformed or does not decode to 32 bytes: {0}")]
    InvalidMasterKeys(#[from] SecretsError),

    #[error("worker concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("container_runtime '{0}' requires a compiled-in runner")]
    UnsupportedContainerRuntime(String),
}

/// Validates the loaded configuration beyond what `serde`'s deserialization
/// already enforces: master key format, and resource bounds that would
/// otherwise fail confusingly deep inside the worker or key vault.
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    secrets::parse_master_keys(&config.secrets.master_keys)?;

    if config.worker.concurrency == 0 {
        return Err(ValidationError::InvalidConcurrency);
    }

    if matches!(config.worker.container_runtime, ContainerRuntime::Containerd | ContainerRuntime::Kubernetes) {
        return Err(ValidationError::UnsupportedContainerRuntime(
            format!("{:?}", config.worker.container_runtime).to_lowercase(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = Config::default();
        config.worker.concurrency = 0;
        assert!(matches!(validate(&config), Err(ValidationError::InvalidConcurrency)));
    }

    #[test]
    fn rejects_malformed_master_keys() {
        let mut config = Config::default();
        config.secrets.master_keys = "not-valid".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::InvalidMasterKeys(_))));
    }

    #[test]
    fn rejects_uncompiled_container_runtime() {
        let mut config = Config::default();
        config.worker.container_runtime = super::ContainerRuntime::Kubernetes;
        assert!(matches!(validate(&config), Err(ValidationError::UnsupportedContainerRuntime(_))));
    }
}
