pub mod client;
pub mod error;
pub mod model;
pub mod store;

pub use client::{FjallQueueClient, QueueClient};
pub use error::{QueueError, Result};
pub use model::{ClaimedTask, QueueTask};
pub use store::FjallQueue;
