//! Reads a base job spec document plus zero or more overlays and produces
//! a materialized [`JobConfig`].

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use super::error::{JobSpecError, Result};
use super::merge::{merge_layers, to_job_spec, Layer};
use super::model::{JobConfig, JobSpec, SecretOverride, KNOWN_CAPABILITIES};
use super::shellwords;

/// Parses a document as YAML or JSON, detected by content rather than file
/// extension (overlays may arrive inline in an API request body).
pub fn parse_document(raw: &str) -> Result<Value> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        Ok(serde_json::from_str(raw)?)
    } else {
        Ok(serde_yaml::from_str(raw)?)
    }
}

pub fn load_document_from_path(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)?;
    parse_document(&raw)
}

/// Loads a base document plus overlays (listed in decreasing priority
/// order, matching the API's submission contract) and returns the merged
/// [`JobSpec`] together with any detected [`SecretOverride`]s.
///
/// `allow_secret_overrides = false` causes this to fail with
/// [`JobSpecError::SecretOverrideBlocked`] on the first detected override
/// rather than silently accepting it.
pub fn load(
    base: Layer,
    overlays: Vec<Layer>,
    allow_secret_overrides: bool,
) -> Result<(JobSpec, Vec<SecretOverride>)> {
    let (merged, overrides) = merge_layers(base, overlays);

    if !allow_secret_overrides {
        if let Some(first) = overrides.first() {
            return Err(JobSpecError::SecretOverrideBlocked {
                overlay: first.overlay.clone(),
                key: first.key.clone(),
            });
        }
    }

    let spec = to_job_spec(&merged)?;
    for capability in &spec.capabilities {
        if !KNOWN_CAPABILITIES.contains(&capability.as_str()) {
            warn!(capability, "job spec references an unrecognized capability");
        }
    }
    Ok((spec, overrides))
}

/// Materializes a [`JobSpec`] (with its environment already secret/env
/// resolved by the caller) into an executable [`JobConfig`].
pub fn to_job_config(
    spec: &JobSpec,
    resolved_env: HashMap<String, String>,
    job_id: &str,
    queue_name: &str,
    workspace_dir: String,
) -> Result<JobConfig> {
    let command = spec.command.as_deref().unwrap_or_default();
    let argv = shellwords::split(command)?;
    if argv.is_empty() {
        return Err(JobSpecError::EmptyCommand);
    }

    let mut env = resolved_env;
    env.insert("REACTORCIDE_JOB_ID".to_string(), job_id.to_string());
    env.insert("REACTORCIDE_QUEUE_NAME".to_string(), queue_name.to_string());

    Ok(JobConfig {
        image: spec.image.clone().unwrap_or_default(),
        argv,
        env,
        workspace_dir: workspace_dir.clone(),
        working_dir: spec.working_dir.clone().unwrap_or_else(|| "/job".to_string()),
        timeout_seconds: spec.timeout_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_base_with_no_overlays() {
        let base = Layer { label: "base".into(), document: json!({"name": "job", "command": "echo hi", "image": "alpine"}) };
        let (spec, overrides) = load(base, vec![], false).unwrap();
        assert_eq!(spec.name.as_deref(), Some("job"));
        assert!(overrides.is_empty());
    }

    #[test]
    fn blocks_secret_override_without_opt_in() {
        let base = Layer { label: "base".into(), document: json!({"environment": {"PG_PASS": "${secret:db:pass}"}}) };
        let overlay = Layer { label: "prod.yaml".into(), document: json!({"environment": {"PG_PASS": "literal"}}) };
        let result = load(base, vec![overlay], false);
        assert!(matches!(result, Err(JobSpecError::SecretOverrideBlocked { .. })));
    }

    #[test]
    fn allows_secret_override_with_opt_in() {
        let base = Layer { label: "base".into(), document: json!({"environment": {"PG_PASS": "${secret:db:pass}"}}) };
        let overlay = Layer { label: "prod.yaml".into(), document: json!({"environment": {"PG_PASS": "literal"}}) };
        let (spec, overrides) = load(base, vec![overlay], true).unwrap();
        assert_eq!(spec.environment["PG_PASS"], "literal");
        assert_eq!(overrides.len(), 1);
    }

    #[test]
    fn to_job_config_splits_command_and_injects_identifiers() {
        let spec = JobSpec { command: Some("echo 'hello world'".into()), image: Some("alpine".into()), ..Default::default() };
        let config = to_job_config(&spec, HashMap::new(), "job-1", "default", "/workspace/job-1".into()).unwrap();
        assert_eq!(config.argv, vec!["echo", "hello world"]);
        assert_eq!(config.env["REACTORCIDE_JOB_ID"], "job-1");
        assert_eq!(config.env["REACTORCIDE_QUEUE_NAME"], "default");
        assert_eq!(config.working_dir, "/job");
    }

    #[test]
    fn empty_command_is_rejected() {
        let spec = JobSpec::default();
        let result = to_job_config(&spec, HashMap::new(), "job-1", "default", "/ws".into());
        assert!(matches!(result, Err(JobSpecError::EmptyCommand)));
    }
}
