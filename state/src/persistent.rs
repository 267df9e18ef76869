//! Persistent database using sled

use pchain_core::{PlatformResult, StateChange, WriteBatch};
use sled::{Db, Tree};
use std::path::Path;

use crate::store::{Database, DbIterator};

const STATE_TREE: &str = "state";

/// One sled tree behind the [`Database`] seam
#[derive(Clone)]
pub struct SledDb {
    db: Db,
    tree: Tree,
}

impl SledDb {
    /// Open or create the database at `path`.
    ///
    /// Every batch is flushed on write, so sled's background flusher is
    /// disabled. Dropping the last handle then releases the file lock at
    /// once and the path can be reopened immediately.
    pub fn open<P: AsRef<Path>>(path: P) -> PlatformResult<Self> {
        let db = sled::Config::new()
            .path(path)
            .flush_every_ms(None)
            .open()?;
        Self::from_db(db, STATE_TREE)
    }

    /// A throwaway database removed when dropped
    pub fn temporary() -> PlatformResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, STATE_TREE)
    }

    /// Another named tree inside the same sled instance
    pub fn open_tree(&self, name: &str) -> PlatformResult<Self> {
        Self::from_db(self.db.clone(), name)
    }

    fn from_db(db: Db, name: &str) -> PlatformResult<Self> {
        let tree = db.open_tree(name)?;
        Ok(Self { db, tree })
    }

    /// Get database size estimate
    pub fn size_estimate(&self) -> usize {
        self.tree.len()
    }
}

impl Database for SledDb {
    fn get(&self, key: &[u8]) -> PlatformResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    fn has(&self, key: &[u8]) -> PlatformResult<bool> {
        Ok(self.tree.contains_key(key)?)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> PlatformResult<DbIterator<'_>> {
        let iter = self.tree.scan_prefix(prefix).map(|result| {
            result
                .map(|(key, value)| (key.to_vec(), value.to_vec()))
                .map_err(Into::into)
        });
        Ok(Box::new(iter))
    }

    fn write_batch(&self, batch: WriteBatch) -> PlatformResult<()> {
        let mut sled_batch = sled::Batch::default();
        for change in batch {
            match change {
                StateChange::Set { key, value } => sled_batch.insert(key, value),
                StateChange::Delete { key } => sled_batch.remove(key),
            }
        }

        self.tree.apply_batch(sled_batch)?;
        self.db.flush()?;
        Ok(())
    }
}
