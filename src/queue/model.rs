use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A claimable reference to a persisted [`crate::store::Job`]. The queue
/// itself is opaque to job content — the worker re-fetches the `Job` row
/// from the [`crate::store::Store`] once it owns a claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueTask {
    pub job_id: Uuid,
    pub queue_name: String,
    pub priority: i32,
    pub enqueued_at: DateTime<Utc>,
}

/// A task handed to a worker slot, tagged with the sequence number needed
/// to ack/nack it.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub seq: u64,
    pub task: QueueTask,
}
