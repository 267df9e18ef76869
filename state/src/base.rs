//! Committed chain state over a [`Database`]

use pchain_core::{
    Address, NodeId, PlatformError, PlatformResult, SubnetId, Timestamp, TxId, UtxoId, WriteBatch,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::staker::{SortKey, Staker};
use crate::stakers::{Change, Cursor, Layers, Scope, SetChanges, StakerSet, Stakers};
use crate::store::{account_key, AccountState, Database, TIMESTAMP_KEY};
use crate::versioned::ChainState;

// Staker key layout: [set][index] ++ fields
//   v  subnet ++ node             -> validator
//   d  subnet ++ node ++ sort key -> delegator
//   t  tx id                      -> delegator
//   o  sort key                   -> any staker
const VALIDATOR_INDEX: u8 = b'v';
const DELEGATOR_INDEX: u8 = b'd';
const TX_INDEX: u8 = b't';
const ORDERED_INDEX: u8 = b'o';

fn set_byte(set: StakerSet) -> u8 {
    match set {
        StakerSet::Current => b'c',
        StakerSet::Pending => b'p',
    }
}

fn index_prefix(set: StakerSet, index: u8) -> Vec<u8> {
    vec![set_byte(set), index]
}

fn validator_key(set: StakerSet, subnet_id: &SubnetId, node_id: &NodeId) -> Vec<u8> {
    let mut key = index_prefix(set, VALIDATOR_INDEX);
    key.extend_from_slice(subnet_id.as_bytes());
    key.extend_from_slice(node_id.as_bytes());
    key
}

fn delegator_prefix(set: StakerSet, subnet_id: &SubnetId, node_id: &NodeId) -> Vec<u8> {
    let mut key = index_prefix(set, DELEGATOR_INDEX);
    key.extend_from_slice(subnet_id.as_bytes());
    key.extend_from_slice(node_id.as_bytes());
    key
}

fn delegator_key(set: StakerSet, staker: &Staker) -> Vec<u8> {
    let mut key = delegator_prefix(set, &staker.subnet_id, &staker.node_id);
    key.extend_from_slice(&staker.sort_key().to_bytes());
    key
}

fn tx_key(set: StakerSet, tx_id: &TxId) -> Vec<u8> {
    let mut key = index_prefix(set, TX_INDEX);
    key.extend_from_slice(tx_id.as_bytes());
    key
}

fn ordered_key(set: StakerSet, sort_key: &SortKey) -> Vec<u8> {
    let mut key = index_prefix(set, ORDERED_INDEX);
    key.extend_from_slice(&sort_key.to_bytes());
    key
}

fn encode_staker(staker: &Staker) -> PlatformResult<Vec<u8>> {
    Ok(bincode::serialize(staker)?)
}

fn decode_staker(bytes: &[u8]) -> PlatformResult<Staker> {
    Ok(bincode::deserialize(bytes)?)
}

/// `outbox: ++ sequence (u64 BE)`: records committed with a block and
/// released once delivered
const OUTBOX_PREFIX: &[u8] = b"outbox:";

fn outbox_key(seq: u64) -> Vec<u8> {
    let mut key = OUTBOX_PREFIX.to_vec();
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn outbox_seq(key: &[u8]) -> PlatformResult<u64> {
    let raw: [u8; 8] = key
        .strip_prefix(OUTBOX_PREFIX)
        .and_then(|rest| rest.try_into().ok())
        .ok_or_else(|| PlatformError::Serialization("malformed outbox key".into()))?;
    Ok(u64::from_be_bytes(raw))
}

/// Sequence number the next committed outbox record takes
fn load_next_outbox_seq(db: &dyn Database) -> PlatformResult<u64> {
    let mut next = 0;
    for entry in db.iter_prefix(OUTBOX_PREFIX)? {
        let (key, _) = entry?;
        next = outbox_seq(&key)? + 1;
    }
    Ok(next)
}

fn load_timestamp(db: &dyn Database) -> PlatformResult<Timestamp> {
    let Some(bytes) = db.get(TIMESTAMP_KEY)? else {
        return Ok(Timestamp::ZERO);
    };
    let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
        PlatformError::Serialization(format!("timestamp record has {} bytes", bytes.len()))
    })?;
    Ok(Timestamp::from_unix(u64::from_be_bytes(raw)))
}

/// The last accepted chain state.
///
/// Writes are staged in memory and become durable together on
/// [`BaseState::commit`]. Reads see staged writes.
pub struct BaseState<D: Database> {
    db: D,
    current: SetChanges,
    pending: SetChanges,
    accounts: BTreeMap<Address, AccountState>,
    timestamp: Timestamp,
    timestamp_dirty: bool,
    outbox: Vec<Vec<u8>>,
    next_outbox_seq: u64,
}

impl<D: Database> BaseState<D> {
    /// Load the chain time and wrap `db`
    pub fn open(db: D) -> PlatformResult<Self> {
        let timestamp = load_timestamp(&db)?;
        let next_outbox_seq = load_next_outbox_seq(&db)?;
        debug!("Opened base state at chain time {}", timestamp);

        Ok(Self {
            db,
            current: SetChanges::new(),
            pending: SetChanges::new(),
            accounts: BTreeMap::new(),
            timestamp,
            timestamp_dirty: false,
            outbox: Vec::new(),
            next_outbox_seq,
        })
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    pub fn has_uncommitted(&self) -> bool {
        !self.current.is_empty()
            || !self.pending.is_empty()
            || !self.accounts.is_empty()
            || self.timestamp_dirty
            || !self.outbox.is_empty()
    }

    /// Throw away staged writes
    pub fn abort(&mut self) -> PlatformResult<()> {
        self.current = SetChanges::new();
        self.pending = SetChanges::new();
        self.accounts.clear();
        self.outbox.clear();
        if self.timestamp_dirty {
            self.timestamp = load_timestamp(&self.db)?;
            self.timestamp_dirty = false;
        }
        Ok(())
    }

    /// Write every staged change in one atomic batch.
    ///
    /// On error nothing is written and the staged changes are kept.
    pub fn commit(&mut self) -> PlatformResult<usize> {
        let mut batch = WriteBatch::new();
        for set in StakerSet::ALL {
            for change in self.changes(set).iter() {
                self.stage_change(&mut batch, set, change)?;
            }
        }
        for (address, account) in &self.accounts {
            batch.set(account_key(address), account.to_bytes()?);
        }
        if self.timestamp_dirty {
            batch.set(TIMESTAMP_KEY.to_vec(), self.timestamp.to_be_bytes().to_vec());
        }
        let first_seq = self.next_outbox_seq;
        for (seq, record) in (first_seq..).zip(&self.outbox) {
            batch.set(outbox_key(seq), record.clone());
        }

        let writes = batch.len();
        self.db.write_batch(batch)?;

        info!(
            "Committed {} current, {} pending staker changes and {} accounts ({} writes)",
            self.current.len(),
            self.pending.len(),
            self.accounts.len(),
            writes
        );
        self.current = SetChanges::new();
        self.pending = SetChanges::new();
        self.accounts.clear();
        self.timestamp_dirty = false;
        self.next_outbox_seq = first_seq + self.outbox.len() as u64;
        self.outbox.clear();
        Ok(writes)
    }

    /// Stage `record` to be written with the next commit
    pub fn stage_outbox(&mut self, record: Vec<u8>) {
        self.outbox.push(record);
    }

    /// Committed outbox records in commit order
    pub fn outbox(&self) -> PlatformResult<Vec<(u64, Vec<u8>)>> {
        self.db
            .iter_prefix(OUTBOX_PREFIX)?
            .map(|entry| entry.and_then(|(key, value)| Ok((outbox_seq(&key)?, value))))
            .collect()
    }

    /// Durably drop a delivered outbox record
    pub fn release_outbox(&self, seq: u64) -> PlatformResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(outbox_key(seq));
        self.db.write_batch(batch)
    }

    fn stage_change(&self, batch: &mut WriteBatch, set: StakerSet, change: &Change) -> PlatformResult<()> {
        let staker = change.staker();
        if staker.priority.is_validator() {
            let key = validator_key(set, &staker.subnet_id, &staker.node_id);
            if let Some(old) = self.db.get(&key)? {
                let old = decode_staker(&old)?;
                batch.delete(ordered_key(set, &old.sort_key()));
                batch.delete(key.clone());
            }
            if let Change::Put(new) = change {
                let bytes = encode_staker(new)?;
                batch.set(key, bytes.clone());
                batch.set(ordered_key(set, &new.sort_key()), bytes);
            }
        } else {
            let key = tx_key(set, &staker.tx_id);
            if let Some(old) = self.db.get(&key)? {
                let old = decode_staker(&old)?;
                batch.delete(ordered_key(set, &old.sort_key()));
                batch.delete(delegator_key(set, &old));
                batch.delete(key.clone());
            }
            if let Change::Put(new) = change {
                let bytes = encode_staker(new)?;
                batch.set(key, bytes.clone());
                batch.set(delegator_key(set, new), bytes.clone());
                batch.set(ordered_key(set, &new.sort_key()), bytes);
            }
        }
        Ok(())
    }

    fn changes(&self, set: StakerSet) -> &SetChanges {
        match set {
            StakerSet::Current => &self.current,
            StakerSet::Pending => &self.pending,
        }
    }

    fn changes_mut(&mut self, set: StakerSet) -> &mut SetChanges {
        match set {
            StakerSet::Current => &mut self.current,
            StakerSet::Pending => &mut self.pending,
        }
    }

    fn db_cursor(&self, prefix: Vec<u8>) -> PlatformResult<Cursor<'_>> {
        let entries = self.db.iter_prefix(&prefix)?;
        Ok(Box::new(
            entries.map(|entry| entry.and_then(|(_, value)| decode_staker(&value))),
        ))
    }
}

impl<D: Database> Stakers for BaseState<D> {
    fn get_validator(
        &self,
        set: StakerSet,
        subnet_id: &SubnetId,
        node_id: &NodeId,
    ) -> PlatformResult<Staker> {
        match self.changes(set).validator(subnet_id, node_id) {
            Some(Change::Put(staker)) => return Ok(staker.clone()),
            Some(Change::Delete(_)) => return Err(PlatformError::NotFound),
            None => {}
        }
        match self.db.get(&validator_key(set, subnet_id, node_id))? {
            Some(bytes) => decode_staker(&bytes),
            None => Err(PlatformError::NotFound),
        }
    }

    fn put_validator(&mut self, set: StakerSet, staker: Staker) {
        if let Ok(existing) = self.get_validator(set, &staker.subnet_id, &staker.node_id) {
            if existing.tx_id != staker.tx_id {
                warn!(
                    "Replacing {} validator {} on subnet {} (tx {} -> {})",
                    set.label(),
                    staker.node_id,
                    staker.subnet_id,
                    existing.tx_id,
                    staker.tx_id
                );
            }
        }
        self.changes_mut(set).put_validator(staker);
    }

    fn delete_validator(&mut self, set: StakerSet, staker: &Staker) {
        self.changes_mut(set).delete_validator(staker);
    }

    fn put_delegator(&mut self, set: StakerSet, staker: Staker) {
        self.changes_mut(set).put_delegator(staker);
    }

    fn delete_delegator(&mut self, set: StakerSet, staker: &Staker) {
        self.changes_mut(set).delete_delegator(staker);
    }

    fn layers(&self, set: StakerSet, scope: &Scope) -> PlatformResult<Layers<'_>> {
        let prefix = match scope {
            Scope::All => index_prefix(set, ORDERED_INDEX),
            Scope::Delegators { subnet_id, node_id } => delegator_prefix(set, subnet_id, node_id),
        };
        Ok(Layers::new(self.db_cursor(prefix)?).push(self.changes(set)))
    }
}

impl<D: Database> ChainState for BaseState<D> {
    fn get_account(&self, address: &Address) -> PlatformResult<AccountState> {
        if let Some(account) = self.accounts.get(address) {
            return Ok(*account);
        }
        match self.db.get(&account_key(address))? {
            Some(bytes) => AccountState::from_bytes(&bytes),
            None => Ok(AccountState::default()),
        }
    }

    fn put_account(&mut self, address: Address, account: AccountState) {
        self.accounts.insert(address, account);
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
        self.timestamp_dirty = true;
    }

    fn is_atomic_consumed(&self, _utxo_id: &UtxoId) -> bool {
        // Consumed UTXOs leave shared memory once their block is accepted
        false
    }

    fn mark_atomic_consumed(&mut self, _utxo_id: UtxoId) {}

    fn as_stakers(&self) -> &dyn Stakers {
        self
    }
}
