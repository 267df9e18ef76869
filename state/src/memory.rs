//! In-memory database for tests and short-lived views

use parking_lot::RwLock;
use pchain_core::{PlatformResult, StateChange, WriteBatch};
use std::collections::BTreeMap;

use crate::store::{Database, DbIterator};

/// Ordered in-memory key-value store
#[derive(Debug, Default)]
pub struct MemDb {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            data: RwLock::new(data.into_iter().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Clone for MemDb {
    fn clone(&self) -> Self {
        Self {
            data: RwLock::new(self.data.read().clone()),
        }
    }
}

impl Database for MemDb {
    fn get(&self, key: &[u8]) -> PlatformResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn has(&self, key: &[u8]) -> PlatformResult<bool> {
        Ok(self.data.read().contains_key(key))
    }

    fn iter_prefix(&self, prefix: &[u8]) -> PlatformResult<DbIterator<'_>> {
        // Copy the range out so no lock is held while the caller iterates
        let entries: Vec<(Vec<u8>, Vec<u8>)> = self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn write_batch(&self, batch: WriteBatch) -> PlatformResult<()> {
        let mut data = self.data.write();
        for change in batch {
            match change {
                StateChange::Set { key, value } => {
                    data.insert(key, value);
                }
                StateChange::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_db_basic() {
        let db = MemDb::new();

        let mut batch = WriteBatch::new();
        batch.set(b"key1".to_vec(), b"value1".to_vec());
        db.write_batch(batch).unwrap();
        assert_eq!(db.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert!(db.has(b"key1").unwrap());

        let mut batch = WriteBatch::new();
        batch.delete(b"key1".to_vec());
        db.write_batch(batch).unwrap();
        assert_eq!(db.get(b"key1").unwrap(), None);
        assert!(db.is_empty());
    }

    #[test]
    fn test_batch_applies_in_order() {
        let db = MemDb::new();
        let mut batch = WriteBatch::new();
        batch.set(b"k".to_vec(), b"old".to_vec());
        batch.delete(b"k".to_vec());
        batch.set(b"k".to_vec(), b"new".to_vec());
        db.write_batch(batch).unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_prefix_iteration() {
        let db = MemDb::with_data(vec![
            (b"a:2".to_vec(), b"2".to_vec()),
            (b"a:1".to_vec(), b"1".to_vec()),
            (b"b:1".to_vec(), b"x".to_vec()),
            (b"a".to_vec(), b"bare".to_vec()),
        ]);

        let keys: Vec<Vec<u8>> = db
            .iter_prefix(b"a:")
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(keys, vec![b"a:1".to_vec(), b"a:2".to_vec()]);
        assert_eq!(db.iter_prefix(b"").unwrap().count(), 4);
        assert_eq!(db.iter_prefix(b"c").unwrap().count(), 0);
    }

    #[test]
    fn test_root_tracks_contents() {
        let db = MemDb::new();
        let empty = db.compute_root().unwrap();

        let mut batch = WriteBatch::new();
        batch.set(b"k".to_vec(), b"v".to_vec());
        db.write_batch(batch).unwrap();
        let root = db.compute_root().unwrap();
        assert_ne!(root, empty);
        assert_eq!(root, db.clone().compute_root().unwrap());
    }
}
