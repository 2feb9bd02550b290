use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "REACTORCIDE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/reactorcide.toml";
const ENV_PREFIX: &str = "REACTORCIDE";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from a `.env` file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Loads configuration from a specific path. Useful for testing with custom
/// configuration files.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "loading configuration file");
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            path = %config_path.display(),
            "no configuration file found, using defaults and environment overrides"
        );
    }

    // REACTORCIDE__SERVER__BIND_ADDR -> server.bind_addr, etc.
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    // Flat single-segment overrides named directly in spec.md §6
    // (REACTORCIDE_DB_URI, REACTORCIDE_PORT, REACTORCIDE_MASTER_KEYS, ...)
    // take precedence over the nested `__`-separated form.
    builder = flat_overrides(builder);

    let config = builder.build()?;
    config.try_deserialize()
}

fn flat_overrides(mut builder: config::ConfigBuilder<config::builder::DefaultState>) -> config::ConfigBuilder<config::builder::DefaultState> {
    let direct = [
        ("REACTORCIDE_DB_URI", "store.db_uri"),
        ("REACTORCIDE_PORT", "server.bind_addr"),
        ("REACTORCIDE_MASTER_KEYS", "secrets.master_keys"),
        ("REACTORCIDE_OBJECT_STORE_TYPE", "object_store.type"),
        ("REACTORCIDE_OBJECT_STORE_BUCKET", "object_store.bucket"),
        ("REACTORCIDE_OBJECT_STORE_BASE_PATH", "object_store.base_path"),
        ("REACTORCIDE_OBJECT_STORE_PREFIX", "object_store.prefix"),
        ("REACTORCIDE_SECRETS_STORAGE_TYPE", "secrets.storage_type"),
        ("REACTORCIDE_DEFAULT_USER_ID", "bootstrap.default_user_id"),
        ("REACTORCIDE_DEFAULT_RUNNER_IMAGE", "worker.default_runner_image"),
        ("REACTORCIDE_CONTAINER_RUNTIME", "worker.container_runtime"),
    ];
    for (env_var, key) in direct {
        if let Ok(value) = env::var(env_var) {
            let value = if env_var == "REACTORCIDE_PORT" {
                format!("0.0.0.0:{value}")
            } else {
                value
            };
            builder = builder.set_override(key, value).expect("static override key is valid");
        }
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.worker.concurrency, 4);
    }

    #[test]
    fn load_from_toml_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"
max_payload_bytes = "10MB"

[worker]
concurrency = 8
queue_name = "ci"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.max_payload_bytes.as_u64(), 10 * 1024 * 1024);
        assert_eq!(config.worker.concurrency, 8);
        assert_eq!(config.worker.queue_name, "ci");
    }

    #[test]
    fn flat_port_override_wins_over_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[server]\nbind_addr = \"127.0.0.1:1111\"\n").unwrap();

        unsafe {
            env::set_var("REACTORCIDE_PORT", "7777");
        }
        let config = load_from_sources(config_path).unwrap();
        unsafe {
            env::remove_var("REACTORCIDE_PORT");
        }
        assert_eq!(config.server.bind_addr.port(), 7777);
    }
}
