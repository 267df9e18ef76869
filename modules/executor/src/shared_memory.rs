//! Cross-chain shared memory
//!
//! Each chain pair has an inbound area: chain `B` reads the UTXOs chain `A`
//! exported to it, and removes them when it imports. Applying a
//! transaction's requests is atomic and idempotent per transaction id.

use parking_lot::Mutex;
use pchain_core::{Address, Amount, ChainId, PlatformResult, TxId, UtxoId, Violation, WriteBatch};
use pchain_state::Database;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const UTXO_PREFIX: &[u8] = b"atomic:";
const APPLIED_PREFIX: &[u8] = b"applied:";

/// Value placed in shared memory by an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicUtxo {
    pub id: UtxoId,
    /// Chain that exported it
    pub source_chain: ChainId,
    pub owner: Address,
    pub amount: Amount,
}

/// What one transaction does to the area shared with one peer chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicRequests {
    /// UTXOs the peer sent us, consumed by an import
    pub remove: Vec<UtxoId>,
    /// UTXOs we send the peer
    pub put: Vec<AtomicUtxo>,
}

/// Shared memory as seen from one chain
pub trait SharedMemory: Send + Sync {
    /// UTXOs `peer` exported to this chain. Any id not present is a
    /// `MissingAtomicUtxo` violation.
    fn get(&self, peer: &ChainId, ids: &[UtxoId]) -> PlatformResult<Vec<AtomicUtxo>>;

    /// Apply every request of transaction `tx_id` atomically.
    ///
    /// Returns `false` without writing if `tx_id` was already applied.
    fn apply(
        &self,
        tx_id: &TxId,
        requests: &BTreeMap<ChainId, AtomicRequests>,
    ) -> PlatformResult<bool>;
}

/// [`SharedMemory`] for `chain_id` over any [`Database`].
///
/// Several chains may share one database; keys carry both chain ids.
pub struct ChainMemory<D: Database> {
    chain_id: ChainId,
    db: D,
    write_lock: Mutex<()>,
}

impl<D: Database> ChainMemory<D> {
    pub fn new(chain_id: ChainId, db: D) -> Self {
        Self {
            chain_id,
            db,
            write_lock: Mutex::new(()),
        }
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    /// Whether `tx_id` has already been applied on this chain
    pub fn is_applied(&self, tx_id: &TxId) -> PlatformResult<bool> {
        self.db.has(&applied_key(&self.chain_id, tx_id))
    }

    /// Every UTXO currently waiting for this chain from `peer`
    pub fn inbound(&self, peer: &ChainId) -> PlatformResult<Vec<AtomicUtxo>> {
        let mut prefix = UTXO_PREFIX.to_vec();
        prefix.extend_from_slice(self.chain_id.as_bytes());
        prefix.extend_from_slice(peer.as_bytes());
        self.db
            .iter_prefix(&prefix)?
            .map(|entry| entry.and_then(|(_, value)| Ok(bincode::deserialize(&value)?)))
            .collect()
    }
}

/// `atomic: ++ reader ++ writer ++ utxo id`
fn utxo_key(reader: &ChainId, writer: &ChainId, id: &UtxoId) -> Vec<u8> {
    let mut key = UTXO_PREFIX.to_vec();
    key.extend_from_slice(reader.as_bytes());
    key.extend_from_slice(writer.as_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

fn applied_key(chain: &ChainId, tx_id: &TxId) -> Vec<u8> {
    let mut key = APPLIED_PREFIX.to_vec();
    key.extend_from_slice(chain.as_bytes());
    key.extend_from_slice(tx_id.as_bytes());
    key
}

impl<D: Database> SharedMemory for ChainMemory<D> {
    fn get(&self, peer: &ChainId, ids: &[UtxoId]) -> PlatformResult<Vec<AtomicUtxo>> {
        ids.iter()
            .map(|id| match self.db.get(&utxo_key(&self.chain_id, peer, id))? {
                Some(bytes) => Ok(bincode::deserialize(&bytes)?),
                None => Err(Violation::MissingAtomicUtxo(*id).into()),
            })
            .collect()
    }

    fn apply(
        &self,
        tx_id: &TxId,
        requests: &BTreeMap<ChainId, AtomicRequests>,
    ) -> PlatformResult<bool> {
        let _guard = self.write_lock.lock();
        let marker = applied_key(&self.chain_id, tx_id);
        if self.db.has(&marker)? {
            debug!("Shared memory requests of {} already applied", tx_id);
            return Ok(false);
        }

        let mut batch = WriteBatch::new();
        for (peer, request) in requests {
            for id in &request.remove {
                batch.delete(utxo_key(&self.chain_id, peer, id));
            }
            for utxo in &request.put {
                batch.set(utxo_key(peer, &self.chain_id, &utxo.id), bincode::serialize(utxo)?);
            }
        }
        batch.set(marker, Vec::new());
        self.db.write_batch(batch)?;

        debug!(
            "Applied shared memory requests of {} on chain {} ({} peers)",
            tx_id,
            self.chain_id,
            requests.len()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pchain_core::{Id, PlatformError};
    use pchain_state::{MemDb, SledDb};
    use std::sync::Arc;

    const P: ChainId = Id([0; 32]);
    const X: ChainId = Id([1; 32]);

    fn utxo(n: u8) -> AtomicUtxo {
        AtomicUtxo {
            id: Id([n; 32]),
            source_chain: P,
            owner: Address([n; 32]),
            amount: Amount(n as u64 * 100),
        }
    }

    fn put_to(peer: ChainId, utxos: Vec<AtomicUtxo>) -> BTreeMap<ChainId, AtomicRequests> {
        BTreeMap::from([(
            peer,
            AtomicRequests {
                remove: vec![],
                put: utxos,
            },
        )])
    }

    #[test]
    fn test_export_is_visible_to_peer_only() {
        let db = Arc::new(MemDb::new());
        let p = ChainMemory::new(P, db.clone());
        let x = ChainMemory::new(X, db);

        assert!(p.apply(&Id([9; 32]), &put_to(X, vec![utxo(1), utxo(2)])).unwrap());

        let got = x.get(&P, &[Id([2; 32]), Id([1; 32])]).unwrap();
        assert_eq!(got, vec![utxo(2), utxo(1)]);
        assert_eq!(x.inbound(&P).unwrap().len(), 2);
        assert!(p.inbound(&X).unwrap().is_empty());

        let err = p.get(&X, &[Id([1; 32])]).unwrap_err();
        assert_eq!(
            err,
            PlatformError::SemanticViolation(Violation::MissingAtomicUtxo(Id([1; 32])))
        );
    }

    #[test]
    fn test_remove_and_replay() {
        let db = Arc::new(MemDb::new());
        let p = ChainMemory::new(P, db.clone());
        let x = ChainMemory::new(X, db);
        p.apply(&Id([9; 32]), &put_to(X, vec![utxo(1)])).unwrap();

        let import = BTreeMap::from([(
            P,
            AtomicRequests {
                remove: vec![Id([1; 32])],
                put: vec![],
            },
        )]);
        assert!(x.apply(&Id([10; 32]), &import).unwrap());
        assert!(x.get(&P, &[Id([1; 32])]).is_err());

        // replaying an applied transaction writes nothing
        assert!(!p.apply(&Id([9; 32]), &put_to(X, vec![utxo(1)])).unwrap());
        assert!(x.get(&P, &[Id([1; 32])]).is_err());
        assert!(!x.apply(&Id([10; 32]), &import).unwrap());
        assert!(x.is_applied(&Id([10; 32])).unwrap());
    }

    #[test]
    fn test_markers_survive_restart() {
        let tmp = tempfile::TempDir::new().unwrap();
        {
            let p = ChainMemory::new(P, SledDb::open(tmp.path()).unwrap());
            assert!(p.apply(&Id([9; 32]), &put_to(X, vec![utxo(3)])).unwrap());
        }
        let db = SledDb::open(tmp.path()).unwrap();
        let p = ChainMemory::new(P, db.clone());
        let x = ChainMemory::new(X, db);
        assert!(!p.apply(&Id([9; 32]), &put_to(X, vec![utxo(3)])).unwrap());
        assert_eq!(x.get(&P, &[Id([3; 32])]).unwrap(), vec![utxo(3)]);
    }
}
