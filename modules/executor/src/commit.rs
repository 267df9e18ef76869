//! Deferred durable writes tied to block acceptance

use pchain_core::{ChainId, PlatformResult, TxId};
use pchain_state::{BaseState, ChainState, Database, VersionedChanges};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::shared_memory::{AtomicRequests, SharedMemory};

/// Shared-memory writes an executed atomic transaction still owes.
///
/// Produced by execution, applied once the containing block is accepted.
/// `apply` consumes the value, so it runs at most once per execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use = "an atomic commit does nothing until applied"]
pub struct AtomicCommit {
    pub tx_id: TxId,
    pub requests: BTreeMap<ChainId, AtomicRequests>,
}

impl AtomicCommit {
    /// Number of UTXOs put or removed
    pub fn len(&self) -> usize {
        self.requests
            .values()
            .map(|r| r.remove.len() + r.put.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the requests; `false` means they were already applied
    pub fn apply(self, memory: &dyn SharedMemory) -> PlatformResult<bool> {
        let applied = memory.apply(&self.tx_id, &self.requests)?;
        if !applied {
            warn!("Atomic commit {} was already applied", self.tx_id);
        }
        Ok(applied)
    }

    pub fn to_bytes(&self) -> PlatformResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> PlatformResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Apply every atomic commit left in `base`'s outbox, oldest first,
/// releasing each once shared memory holds it.
///
/// Stops at the first failure; whatever is left is retried on the next
/// call. Returns the number of commits delivered.
pub fn deliver_outbox<D: Database>(
    base: &BaseState<D>,
    memory: &dyn SharedMemory,
) -> PlatformResult<usize> {
    let pending = base.outbox()?;
    for (seq, record) in &pending {
        AtomicCommit::from_bytes(record)?.apply(memory)?;
        base.release_outbox(*seq)?;
    }
    if !pending.is_empty() {
        debug!("Delivered {} atomic commits", pending.len());
    }
    Ok(pending.len())
}

/// Everything an accepted block changes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptedBlock {
    pub changes: VersionedChanges,
    /// In transaction order
    pub commits: Vec<AtomicCommit>,
}

impl AcceptedBlock {
    /// Make the block durable on `base`, then release its shared-memory
    /// writes in order.
    ///
    /// The atomic commits are written to `base`'s outbox in the same batch
    /// as the state changes, so either both land or neither does. If
    /// delivery to `memory` fails afterwards the block stays accepted and
    /// [`deliver_outbox`] finishes the job later. If the base commit fails,
    /// the staged block is discarded and `base` is left as it was.
    pub fn accept<D: Database>(
        self,
        base: &mut BaseState<D>,
        memory: &dyn SharedMemory,
    ) -> PlatformResult<()> {
        let AcceptedBlock { changes, commits } = self;
        let total = commits.len();
        base.apply_versioned(changes);

        let staged: PlatformResult<()> = commits.iter().try_for_each(|commit| {
            base.stage_outbox(commit.to_bytes()?);
            Ok(())
        });
        if let Err(e) = staged.and_then(|()| base.commit()) {
            base.abort()?;
            return Err(e);
        }

        deliver_outbox(base, memory)?;
        info!(
            "Accepted block at chain time {} with {} atomic commits",
            base.timestamp(),
            total
        );
        Ok(())
    }
}
