//! Core traits shared by the state and executor crates

/// Result type for pchain operations
pub type PlatformResult<T> = Result<T, crate::error::PlatformError>;

/// A single raw key-value write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl StateChange {
    pub fn key(&self) -> &[u8] {
        match self {
            StateChange::Set { key, .. } | StateChange::Delete { key } => key,
        }
    }
}

/// Ordered list of writes applied atomically by a database
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    changes: Vec<StateChange>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.changes.push(StateChange::Set { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.changes.push(StateChange::Delete { key });
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn into_changes(self) -> Vec<StateChange> {
        self.changes
    }
}

impl IntoIterator for WriteBatch {
    type Item = StateChange;
    type IntoIter = std::vec::IntoIter<StateChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}
