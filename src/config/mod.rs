//! Layered configuration: defaults → TOML file → `REACTORCIDE_*` environment
//! variables.
//!
//! # Usage
//!
//! ```no_run
//! use reactorcide::config::Config;
//!
//! let config = Config::load().expect("failed to load configuration");
//! println!("listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Every key can be overridden with `REACTORCIDE__<section>__<key>` (e.g.
//! `REACTORCIDE__WORKER__CONCURRENCY=8`). The flat single-segment names
//! listed in spec.md §6 (`REACTORCIDE_DB_URI`, `REACTORCIDE_PORT`,
//! `REACTORCIDE_MASTER_KEYS`, `REACTORCIDE_OBJECT_STORE_{TYPE,BUCKET,BASE_PATH,PREFIX}`,
//! `REACTORCIDE_SECRETS_STORAGE_TYPE`, `REACTORCIDE_DEFAULT_USER_ID`,
//! `REACTORCIDE_DEFAULT_RUNNER_IMAGE`, `REACTORCIDE_CONTAINER_RUNTIME`) are
//! also recognized directly and take precedence over the nested form.
//!
//! # Configuration File
//!
//! Loaded by default from `config/reactorcide.toml`, overridable via
//! `REACTORCIDE_CONFIG`.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    BootstrapConfig, Config, ContainerRuntime, ObjectStoreConfig, ObjectStoreType, SecretsConfig,
    SecretsStorageType, ServerConfig, StoreConfig, WorkerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl Config {
    /// Loads configuration from all sources (file + environment), highest
    /// priority first: flat `REACTORCIDE_*` vars, nested `REACTORCIDE__*`
    /// vars, the TOML file, then struct defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Loads configuration from a specific path, useful for tests.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[worker]\nqueue_name = \"ci\"\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.worker.queue_name, "ci");
    }

    #[test]
    fn validation_rejects_bad_master_keys() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[secrets]\nmaster_keys = \"garbage\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
