//! Explicit "unit of work" value threaded through request handlers.
//!
//! Fjall has no client/server transaction the way a relational database does,
//! but it does give us an atomic multi-partition write batch. A `UnitOfWork`
//! wraps one such batch: repository methods that mutate state accept
//! `&mut UnitOfWork` and write into the batch rather than the partitions
//! directly, so nothing becomes visible to readers until `commit` runs.

use fjall::{Batch, Keyspace};

use super::error::Result;

pub struct UnitOfWork {
    keyspace: Keyspace,
    batch: Batch,
    committed: bool,
}

impl UnitOfWork {
    pub fn begin(keyspace: &Keyspace) -> Self {
        Self {
            keyspace: keyspace.clone(),
            batch: keyspace.batch(),
            committed: false,
        }
    }

    pub fn batch_mut(&mut self) -> &mut Batch {
        &mut self.batch
    }

    pub fn commit(mut self) -> Result<()> {
        self.batch.commit()?;
        self.committed = true;
        self.keyspace.persist(fjall::PersistMode::Buffer)?;
        Ok(())
    }

    pub fn rollback(self) {
        // Dropping an uncommitted batch discards its writes.
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.committed {
            tracing::trace!("unit of work dropped without commit, writes discarded");
        }
    }
}
