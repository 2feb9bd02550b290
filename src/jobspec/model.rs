//! The job specification document tree: `name`, `command`, `image`,
//! `environment`, `working_dir`, optional `source`, `timeout_seconds`,
//! `capabilities`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Git,
    Copy,
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type")]
    pub source_type: Option<SourceType>,
    pub url: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Capability values this crate recognizes. The spec leaves the vocabulary
/// open (Open Question, resolved in DESIGN.md); unknown values are accepted
/// and logged rather than rejected.
pub const KNOWN_CAPABILITIES: &[&str] = &["network", "privileged-false"];

/// Materialized, ready-to-execute form of a [`JobSpec`]: argv, final
/// environment (augmented with job/queue identifiers), image, and the two
/// directories a [`crate::runtime::ContainerRunner`] bind-mounts.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub image: String,
    pub argv: Vec<String>,
    pub env: HashMap<String, String>,
    pub workspace_dir: String,
    pub working_dir: String,
    pub timeout_seconds: Option<i64>,
}

/// Records that a higher-priority overlay replaced a `${secret:...}`
/// reference with a literal value for a given environment key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretOverride {
    pub overlay: String,
    pub key: String,
}
