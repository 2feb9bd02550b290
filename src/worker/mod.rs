//! Job execution worker: claims jobs from the queue (or, absent a queue
//! client, by polling the store directly), hydrates their environment,
//! spawns a container via [`crate::runtime::ContainerRunner`], and streams
//! masked logs back to object storage while tracking status.

pub mod engine;
pub mod error;
pub mod workspace;

pub use engine::{run, run_once, WorkerContext};
pub use error::{Result, WorkerError};
