//! Fjall-backed task queue: sequential task persistence plus priority +
//! lease claim semantics, generalized from the ancestor codebase's
//! `FjallQueue` (sequential u64 keys, atomic counter persisted for crash
//! recovery) from its protobuf `DownloadTask` encoding to this crate's
//! JSON-encoded `QueueTask`.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};

use super::error::Result;
use super::model::{ClaimedTask, QueueTask};

/// How long a claim holds exclusive ownership before it's eligible to be
/// reclaimed by another worker (treated as crashed).
const LEASE_DURATION_SECONDS: i64 = 300;

pub struct FjallQueue {
    keyspace: Keyspace,
    tasks: PartitionHandle,
    metadata: PartitionHandle,
    leases: PartitionHandle,
    seq_counter: AtomicU64,
}

impl FjallQueue {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!(path = %path.as_ref().display(), "opening queue");
        let keyspace = Config::new(path).open()?;
        let opts = PartitionCreateOptions::default();

        let tasks = keyspace.open_partition("tasks", opts.clone())?;
        let metadata = keyspace.open_partition("metadata", opts.clone())?;
        let leases = keyspace.open_partition("leases", opts)?;

        let current_seq = metadata
            .get(b"next_seq")?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);

        Ok(Self { keyspace, tasks, metadata, leases, seq_counter: AtomicU64::new(current_seq) })
    }

    /// Persists `task` under the next sequence number and returns it.
    pub fn enqueue(&self, task: &QueueTask) -> Result<u64> {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        let key = seq.to_be_bytes();
        self.tasks.insert(key, serde_json::to_vec(task)?)?;
        self.metadata.insert(b"next_seq", (seq + 1).to_be_bytes())?;
        debug!(seq, job_id = %task.job_id, queue = %task.queue_name, "task enqueued");
        Ok(seq)
    }

    /// Claims the highest-priority, oldest-enqueued unleased task for
    /// `queue_name`. Priority is authoritative (spec.md §9 Open Question);
    /// since Fjall has no secondary index, eligible tasks are scanned and
    /// sorted in memory — acceptable given expected queue depth.
    pub fn claim(&self, queue_name: &str) -> Result<Option<ClaimedTask>> {
        let now = Utc::now();
        let mut candidates = Vec::new();

        for item in self.tasks.iter() {
            let (key, value) = item?;
            let seq = u64::from_be_bytes(key.as_ref().try_into().unwrap_or([0u8; 8]));
            let task: QueueTask = serde_json::from_slice(&value)?;
            if task.queue_name != queue_name {
                continue;
            }
            if self.lease_active(seq, now)? {
                continue;
            }
            candidates.push((seq, task));
        }

        candidates.sort_by(|a, b| b.1.priority.cmp(&a.1.priority).then(a.1.enqueued_at.cmp(&b.1.enqueued_at)));

        let Some((seq, task)) = candidates.into_iter().next() else {
            return Ok(None);
        };

        let lease_until = now + Duration::seconds(LEASE_DURATION_SECONDS);
        self.leases.insert(seq.to_be_bytes(), lease_until.timestamp_micros().to_be_bytes())?;
        Ok(Some(ClaimedTask { seq, task }))
    }

    fn lease_active(&self, seq: u64, now: DateTime<Utc>) -> Result<bool> {
        match self.leases.get(seq.to_be_bytes())? {
            Some(bytes) => {
                let micros = i64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0; 8]));
                let expiry = DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or(now);
                Ok(expiry > now)
            }
            None => Ok(false),
        }
    }

    /// Removes a task permanently (successful completion).
    pub fn ack(&self, seq: u64) -> Result<()> {
        self.tasks.remove(seq.to_be_bytes())?;
        self.leases.remove(seq.to_be_bytes())?;
        Ok(())
    }

    /// Releases the lease so the task becomes claimable again (e.g. a
    /// worker crashed or the job was cancelled before a container spawned).
    pub fn nack(&self, seq: u64) -> Result<()> {
        self.leases.remove(seq.to_be_bytes())?;
        Ok(())
    }

    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn task(queue: &str, priority: i32) -> QueueTask {
        QueueTask { job_id: Uuid::now_v7(), queue_name: queue.into(), priority, enqueued_at: Utc::now() }
    }

    #[test]
    fn claim_returns_highest_priority_first() {
        let dir = TempDir::new().unwrap();
        let queue = FjallQueue::open(dir.path()).unwrap();
        queue.enqueue(&task("default", 1)).unwrap();
        queue.enqueue(&task("default", 5)).unwrap();
        queue.enqueue(&task("default", 3)).unwrap();

        let claimed = queue.claim("default").unwrap().unwrap();
        assert_eq!(claimed.task.priority, 5);
    }

    #[test]
    fn claimed_task_is_not_reclaimed_until_acked_or_nacked() {
        let dir = TempDir::new().unwrap();
        let queue = FjallQueue::open(dir.path()).unwrap();
        queue.enqueue(&task("default", 1)).unwrap();

        let first = queue.claim("default").unwrap();
        assert!(first.is_some());
        let second = queue.claim("default").unwrap();
        assert!(second.is_none());

        queue.nack(first.unwrap().seq).unwrap();
        assert!(queue.claim("default").unwrap().is_some());
    }

    #[test]
    fn ack_removes_task_permanently() {
        let dir = TempDir::new().unwrap();
        let queue = FjallQueue::open(dir.path()).unwrap();
        queue.enqueue(&task("default", 1)).unwrap();
        let claimed = queue.claim("default").unwrap().unwrap();
        queue.ack(claimed.seq).unwrap();
        assert!(queue.claim("default").unwrap().is_none());
    }

    #[test]
    fn different_queue_names_are_isolated() {
        let dir = TempDir::new().unwrap();
        let queue = FjallQueue::open(dir.path()).unwrap();
        queue.enqueue(&task("a", 1)).unwrap();
        assert!(queue.claim("b").unwrap().is_none());
        assert!(queue.claim("a").unwrap().is_some());
    }
}
