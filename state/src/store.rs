//! Storage seam and account records

use pchain_core::{Address, Amount, Id, PlatformResult, WriteBatch};
use pchain_crypto::hashing::{hash_multiple, merkle_root};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lazily produced `(key, value)` pairs in ascending key order
pub type DbIterator<'a> = Box<dyn Iterator<Item = PlatformResult<(Vec<u8>, Vec<u8>)>> + 'a>;

/// Ordered key-value store with atomic batch writes
pub trait Database: Send + Sync {
    fn get(&self, key: &[u8]) -> PlatformResult<Option<Vec<u8>>>;

    fn has(&self, key: &[u8]) -> PlatformResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// All entries whose key starts with `prefix`, in key order
    fn iter_prefix(&self, prefix: &[u8]) -> PlatformResult<DbIterator<'_>>;

    /// Apply every write in `batch` or none of them
    fn write_batch(&self, batch: WriteBatch) -> PlatformResult<()>;

    /// Every entry in the store
    fn all_entries(&self) -> PlatformResult<Vec<StateEntry>> {
        self.iter_prefix(&[])?
            .map(|r| r.map(|(key, value)| StateEntry { key, value }))
            .collect()
    }

    fn compute_root(&self) -> PlatformResult<Id> {
        Ok(compute_state_root(&self.all_entries()?))
    }
}

impl<D: Database + ?Sized> Database for Arc<D> {
    fn get(&self, key: &[u8]) -> PlatformResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn has(&self, key: &[u8]) -> PlatformResult<bool> {
        (**self).has(key)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> PlatformResult<DbIterator<'_>> {
        (**self).iter_prefix(prefix)
    }

    fn write_batch(&self, batch: WriteBatch) -> PlatformResult<()> {
        (**self).write_batch(batch)
    }
}

/// Account state for export and import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AccountState {
    pub balance: Amount,
    pub nonce: u64,
}

impl AccountState {
    pub fn new(balance: Amount, nonce: u64) -> Self {
        Self { balance, nonce }
    }

    pub fn to_bytes(&self) -> PlatformResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> PlatformResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// State entry for merkle tree computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl StateEntry {
    pub fn hash(&self) -> Id {
        hash_multiple(&[&(self.key.len() as u64).to_be_bytes(), &self.key, &self.value])
    }
}

/// Compute state root from entries
pub fn compute_state_root(entries: &[StateEntry]) -> Id {
    if entries.is_empty() {
        return Id::ZERO;
    }

    // Sort entries by key for deterministic ordering
    let mut sorted: Vec<_> = entries.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    let leaves: Vec<Id> = sorted.iter().map(|e| e.hash()).collect();
    merkle_root(&leaves)
}

/// Key prefix for accounts
const ACCOUNT_PREFIX: &[u8] = b"account:";

/// Chain time of the last committed state
pub const TIMESTAMP_KEY: &[u8] = b"meta:timestamp";

/// Build account key
pub fn account_key(address: &Address) -> Vec<u8> {
    let mut key = ACCOUNT_PREFIX.to_vec();
    key.extend_from_slice(address.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_state_serialization() {
        let state = AccountState::new(Amount::from_pch(1000), 5);
        let bytes = state.to_bytes().unwrap();
        let restored = AccountState::from_bytes(&bytes).unwrap();

        assert_eq!(state, restored);
        assert!(AccountState::from_bytes(&bytes[..3]).is_err());
    }

    #[test]
    fn test_state_root_ignores_entry_order() {
        let a = StateEntry {
            key: b"key1".to_vec(),
            value: b"value1".to_vec(),
        };
        let b = StateEntry {
            key: b"key2".to_vec(),
            value: b"value2".to_vec(),
        };

        let root1 = compute_state_root(&[a.clone(), b.clone()]);
        let root2 = compute_state_root(&[b.clone(), a.clone()]);
        assert_eq!(root1, root2);
        assert_ne!(root1, compute_state_root(&[a]));
        assert_eq!(compute_state_root(&[]), Id::ZERO);
    }

    #[test]
    fn test_entry_hash_separates_key_and_value() {
        let a = StateEntry {
            key: b"ab".to_vec(),
            value: b"c".to_vec(),
        };
        let b = StateEntry {
            key: b"a".to_vec(),
            value: b"bc".to_vec(),
        };
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_account_key() {
        let address = Address([1u8; 32]);
        let key = account_key(&address);
        assert!(key.starts_with(ACCOUNT_PREFIX));
        assert_eq!(&key[ACCOUNT_PREFIX.len()..], address.as_bytes());
        assert_ne!(key, account_key(&Address([2u8; 32])));
    }
}
