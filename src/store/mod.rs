//! Persistence layer for users, tokens, jobs, and the envelope-encryption
//! key hierarchy.
//!
//! Fjall (an embedded LSM key-value store) stands in for the external
//! relational database: each entity gets its own partition, and the
//! [`UnitOfWork`] models what a per-request SQL transaction would give you —
//! an atomic multi-write batch that commits or rolls back as a whole.

pub mod error;
pub mod model;
pub mod partitions;
pub mod repository;
pub mod unit_of_work;

pub use error::{Result, StoreError};
pub use model::{
    ApiToken, Job, JobStatus, LogEntry, LogStream, MasterKey, Role, Secret, SourceType, TenantKey, User,
};
pub use repository::Store;
pub use unit_of_work::UnitOfWork;
