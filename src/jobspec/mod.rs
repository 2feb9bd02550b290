//! Job specification model and overlay merge.
//!
//! A job spec is a small YAML/JSON document tree (`name`, `command`,
//! `image`, `environment`, `working_dir`, `source`, `timeout_seconds`,
//! `capabilities`). Overlays are merged deterministically (deep for maps,
//! replace for scalars/sequences) with first-listed-wins precedence, and the
//! merge step reports any overlay that replaced a `${secret:...}` reference
//! with a literal value. [`loader::to_job_config`] turns the merged spec
//! plus a resolved environment into the executable form the worker hands to
//! a [`crate::runtime::ContainerRunner`].

pub mod error;
pub mod loader;
pub mod merge;
pub mod model;
pub mod shellwords;

pub use error::{JobSpecError, Result};
pub use loader::{load, load_document_from_path, parse_document, to_job_config};
pub use merge::Layer;
pub use model::{JobConfig, JobSpec, Source, SourceType, SecretOverride};
