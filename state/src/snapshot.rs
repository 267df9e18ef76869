//! Point-in-time copies of a database

use pchain_core::{Id, PlatformResult, Timestamp};
use serde::{Deserialize, Serialize};

use crate::memory::MemDb;
use crate::store::{compute_state_root, Database, StateEntry};

/// A complete copy of a database's contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// State root hash
    pub root: Id,
    /// All state entries in key order
    pub entries: Vec<StateEntry>,
    /// Wall-clock time the snapshot was taken
    pub taken_at: Timestamp,
}

impl StateSnapshot {
    pub fn new(entries: Vec<StateEntry>) -> Self {
        let root = compute_state_root(&entries);
        Self {
            root,
            entries,
            taken_at: Timestamp::now(),
        }
    }

    /// Capture everything currently committed to `db`
    pub fn capture(db: &dyn Database) -> PlatformResult<Self> {
        Ok(Self::new(db.all_entries()?))
    }

    /// Verify snapshot integrity
    pub fn verify(&self) -> bool {
        compute_state_root(&self.entries) == self.root
    }

    /// Whether two snapshots hold the same bytes, ignoring when they were taken
    pub fn same_contents(&self, other: &StateSnapshot) -> bool {
        self.root == other.root && self.entries == other.entries
    }

    /// Restore snapshot to a memory database
    pub fn restore(&self) -> MemDb {
        MemDb::with_data(self.entries.iter().map(|e| (e.key.clone(), e.value.clone())))
    }

    pub fn to_bytes(&self) -> PlatformResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> PlatformResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pchain_core::WriteBatch;

    fn populated() -> MemDb {
        let db = MemDb::new();
        let mut batch = WriteBatch::new();
        batch.set(b"key1".to_vec(), b"value1".to_vec());
        batch.set(b"key2".to_vec(), b"value2".to_vec());
        db.write_batch(batch).unwrap();
        db
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let snapshot = StateSnapshot::capture(&populated()).unwrap();
        assert!(snapshot.verify());
        assert_eq!(snapshot.len(), 2);

        let bytes = snapshot.to_bytes().unwrap();
        let restored = StateSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(restored, snapshot);

        let db = snapshot.restore();
        assert_eq!(db.compute_root().unwrap(), snapshot.root);
    }

    #[test]
    fn test_snapshot_detects_change() {
        let db = populated();
        let before = StateSnapshot::capture(&db).unwrap();

        let mut batch = WriteBatch::new();
        batch.set(b"key1".to_vec(), b"changed".to_vec());
        db.write_batch(batch).unwrap();

        let after = StateSnapshot::capture(&db).unwrap();
        assert!(!before.same_contents(&after));
        assert!(before.same_contents(&StateSnapshot::capture(&before.restore()).unwrap()));
    }

    #[test]
    fn test_tampered_snapshot_fails_verification() {
        let mut snapshot = StateSnapshot::capture(&populated()).unwrap();
        snapshot.entries[0].value = b"forged".to_vec();
        assert!(!snapshot.verify());
    }
}
