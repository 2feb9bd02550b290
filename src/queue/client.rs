//! External-facing queue contract: submit-task and claim-task primitives,
//! decoupled from the `FjallQueue` storage engine so the worker pool and
//! API layer depend on a trait rather than a concrete backend.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::error::Result;
use super::model::{ClaimedTask, QueueTask};
use super::store::FjallQueue;

#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn submit_task(&self, job_id: Uuid, queue_name: &str, priority: i32) -> Result<u64>;
    async fn claim_task(&self, queue_name: &str) -> Result<Option<ClaimedTask>>;
    async fn ack_task(&self, seq: u64) -> Result<()>;
    async fn nack_task(&self, seq: u64) -> Result<()>;
}

/// Adapts the synchronous, blocking [`FjallQueue`] to the async
/// [`QueueClient`] contract. Fjall's own I/O is synchronous, so calls are
/// dispatched to tokio's blocking pool the way [`crate::store::Store`]'s
/// blocking methods are called from async handlers elsewhere in this crate.
pub struct FjallQueueClient {
    queue: std::sync::Arc<FjallQueue>,
}

impl FjallQueueClient {
    pub fn new(queue: FjallQueue) -> Self {
        Self { queue: std::sync::Arc::new(queue) }
    }
}

#[async_trait]
impl QueueClient for FjallQueueClient {
    async fn submit_task(&self, job_id: Uuid, queue_name: &str, priority: i32) -> Result<u64> {
        let queue = self.queue.clone();
        let task = QueueTask { job_id, queue_name: queue_name.to_string(), priority, enqueued_at: Utc::now() };
        tokio::task::spawn_blocking(move || queue.enqueue(&task)).await.expect("blocking task panicked")
    }

    async fn claim_task(&self, queue_name: &str) -> Result<Option<ClaimedTask>> {
        let queue = self.queue.clone();
        let queue_name = queue_name.to_string();
        tokio::task::spawn_blocking(move || queue.claim(&queue_name)).await.expect("blocking task panicked")
    }

    async fn ack_task(&self, seq: u64) -> Result<()> {
        let queue = self.queue.clone();
        tokio::task::spawn_blocking(move || queue.ack(seq)).await.expect("blocking task panicked")
    }

    async fn nack_task(&self, seq: u64) -> Result<()> {
        let queue = self.queue.clone();
        tokio::task::spawn_blocking(move || queue.nack(seq)).await.expect("blocking task panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn submit_then_claim_round_trips() {
        let dir = TempDir::new().unwrap();
        let client = FjallQueueClient::new(FjallQueue::open(dir.path()).unwrap());

        let job_id = Uuid::now_v7();
        client.submit_task(job_id, "default", 0).await.unwrap();

        let claimed = client.claim_task("default").await.unwrap().unwrap();
        assert_eq!(claimed.task.job_id, job_id);

        client.ack_task(claimed.seq).await.unwrap();
        assert!(client.claim_task("default").await.unwrap().is_none());
    }
}
