//! Full chain-state view: stakers, accounts, chain time and consumed UTXOs

use pchain_core::{Address, NodeId, PlatformResult, SubnetId, Timestamp, UtxoId};
use std::collections::{BTreeMap, BTreeSet};

use crate::diff::Diff;
use crate::staker::Staker;
use crate::stakers::{Layers, Scope, StakerChanges, StakerSet, Stakers};
use crate::store::AccountState;

/// Everything a transaction executor may read or stage
pub trait ChainState: Stakers {
    /// Account record of `address`; absent accounts read as empty
    fn get_account(&self, address: &Address) -> PlatformResult<AccountState>;

    fn put_account(&mut self, address: Address, account: AccountState);

    fn timestamp(&self) -> Timestamp;

    fn set_timestamp(&mut self, timestamp: Timestamp);

    /// Whether an earlier, not yet accepted, import in this view spent `utxo_id`
    fn is_atomic_consumed(&self, utxo_id: &UtxoId) -> bool;

    fn mark_atomic_consumed(&mut self, utxo_id: UtxoId);

    fn as_stakers(&self) -> &dyn Stakers;

    /// Fold detached changes into this view
    fn apply_versioned(&mut self, changes: VersionedChanges) {
        let VersionedChanges {
            stakers,
            accounts,
            timestamp,
            consumed,
        } = changes;
        self.apply_changes(stakers);
        for (address, account) in accounts {
            self.put_account(address, account);
        }
        if let Some(timestamp) = timestamp {
            self.set_timestamp(timestamp);
        }
        for utxo_id in consumed {
            self.mark_atomic_consumed(utxo_id);
        }
    }
}

/// Changes detached from a [`Versioned`] view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionedChanges {
    pub stakers: StakerChanges,
    pub accounts: BTreeMap<Address, AccountState>,
    pub timestamp: Option<Timestamp>,
    pub consumed: BTreeSet<UtxoId>,
}

impl VersionedChanges {
    pub fn is_empty(&self) -> bool {
        self.stakers.is_empty()
            && self.accounts.is_empty()
            && self.timestamp.is_none()
            && self.consumed.is_empty()
    }
}

/// A scratch chain state over a parent [`ChainState`].
///
/// Built per block or per transaction; dropped to discard, or detached with
/// [`Versioned::into_changes`] and folded into the parent.
pub struct Versioned<'a> {
    parent: &'a dyn ChainState,
    stakers: Diff<'a>,
    accounts: BTreeMap<Address, AccountState>,
    timestamp: Option<Timestamp>,
    consumed: BTreeSet<UtxoId>,
}

impl<'a> Versioned<'a> {
    pub fn new(parent: &'a dyn ChainState) -> Self {
        Self {
            parent,
            stakers: Diff::new(parent.as_stakers()),
            accounts: BTreeMap::new(),
            timestamp: None,
            consumed: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stakers.is_empty()
            && self.accounts.is_empty()
            && self.timestamp.is_none()
            && self.consumed.is_empty()
    }

    /// UTXOs spent in this view
    pub fn consumed(&self) -> &BTreeSet<UtxoId> {
        &self.consumed
    }

    pub fn into_changes(self) -> VersionedChanges {
        VersionedChanges {
            stakers: self.stakers.into_changes(),
            accounts: self.accounts,
            timestamp: self.timestamp,
            consumed: self.consumed,
        }
    }
}

impl<'a> Stakers for Versioned<'a> {
    fn get_validator(
        &self,
        set: StakerSet,
        subnet_id: &SubnetId,
        node_id: &NodeId,
    ) -> PlatformResult<Staker> {
        self.stakers.get_validator(set, subnet_id, node_id)
    }

    fn put_validator(&mut self, set: StakerSet, staker: Staker) {
        self.stakers.put_validator(set, staker)
    }

    fn delete_validator(&mut self, set: StakerSet, staker: &Staker) {
        self.stakers.delete_validator(set, staker)
    }

    fn put_delegator(&mut self, set: StakerSet, staker: Staker) {
        self.stakers.put_delegator(set, staker)
    }

    fn delete_delegator(&mut self, set: StakerSet, staker: &Staker) {
        self.stakers.delete_delegator(set, staker)
    }

    fn layers(&self, set: StakerSet, scope: &Scope) -> PlatformResult<Layers<'_>> {
        self.stakers.layers(set, scope)
    }
}

impl<'a> ChainState for Versioned<'a> {
    fn get_account(&self, address: &Address) -> PlatformResult<AccountState> {
        match self.accounts.get(address) {
            Some(account) => Ok(*account),
            None => self.parent.get_account(address),
        }
    }

    fn put_account(&mut self, address: Address, account: AccountState) {
        self.accounts.insert(address, account);
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp.unwrap_or_else(|| self.parent.timestamp())
    }

    fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.timestamp = Some(timestamp);
    }

    fn is_atomic_consumed(&self, utxo_id: &UtxoId) -> bool {
        self.consumed.contains(utxo_id) || self.parent.is_atomic_consumed(utxo_id)
    }

    fn mark_atomic_consumed(&mut self, utxo_id: UtxoId) {
        self.consumed.insert(utxo_id);
    }

    fn as_stakers(&self) -> &dyn Stakers {
        self
    }
}
