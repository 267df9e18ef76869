//! The staker-set interface shared by base state and diffs

use pchain_core::{NodeId, PlatformResult, SubnetId, TxId};
use std::collections::{BTreeMap, HashMap};

use crate::iterator::StakerIterator;
use crate::staker::{SortKey, Staker};

/// Which of the two staker sets an operation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StakerSet {
    Current,
    Pending,
}

impl StakerSet {
    pub const ALL: [StakerSet; 2] = [StakerSet::Current, StakerSet::Pending];

    pub fn label(self) -> &'static str {
        match self {
            StakerSet::Current => "current",
            StakerSet::Pending => "pending",
        }
    }
}

/// What an iterator walks over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every validator and delegator in the set
    All,
    /// Delegators of one validator
    Delegators { subnet_id: SubnetId, node_id: NodeId },
}

/// One staged mutation, carrying the record it concerns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Put(Staker),
    Delete(Staker),
}

impl Change {
    pub fn staker(&self) -> &Staker {
        match self {
            Change::Put(s) | Change::Delete(s) => s,
        }
    }
}

/// Stream of stakers from one storage layer, in sort-key order
pub type Cursor<'a> = Box<dyn Iterator<Item = PlatformResult<Staker>> + 'a>;

/// Staged mutations to one staker set.
///
/// At most one change is kept per staker identity; a later put or delete
/// replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetChanges {
    validators: HashMap<(SubnetId, NodeId), Change>,
    delegators: HashMap<(SubnetId, NodeId), BTreeMap<TxId, Change>>,
    /// Every staged put, by sort key
    added: BTreeMap<SortKey, Staker>,
}

impl SetChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty() && self.delegators.is_empty()
    }

    pub fn len(&self) -> usize {
        self.validators.len() + self.delegators.values().map(BTreeMap::len).sum::<usize>()
    }

    pub fn validator(&self, subnet_id: &SubnetId, node_id: &NodeId) -> Option<&Change> {
        self.validators.get(&(*subnet_id, *node_id))
    }

    pub fn put_validator(&mut self, staker: Staker) {
        let key = (staker.subnet_id, staker.node_id);
        self.added.insert(staker.sort_key(), staker.clone());
        if let Some(Change::Put(old)) = self.validators.insert(key, Change::Put(staker)) {
            self.forget_put(&old);
        }
    }

    pub fn delete_validator(&mut self, staker: &Staker) {
        let key = (staker.subnet_id, staker.node_id);
        if let Some(Change::Put(old)) = self.validators.insert(key, Change::Delete(staker.clone())) {
            self.forget_put(&old);
        }
    }

    pub fn put_delegator(&mut self, staker: Staker) {
        let key = (staker.subnet_id, staker.node_id);
        self.added.insert(staker.sort_key(), staker.clone());
        let previous = self
            .delegators
            .entry(key)
            .or_default()
            .insert(staker.tx_id, Change::Put(staker));
        if let Some(Change::Put(old)) = previous {
            self.forget_put(&old);
        }
    }

    pub fn delete_delegator(&mut self, staker: &Staker) {
        let key = (staker.subnet_id, staker.node_id);
        let previous = self
            .delegators
            .entry(key)
            .or_default()
            .insert(staker.tx_id, Change::Delete(staker.clone()));
        if let Some(Change::Put(old)) = previous {
            self.forget_put(&old);
        }
    }

    fn forget_put(&mut self, old: &Staker) {
        // The replacing put may share the old sort key; keep it then
        if let Some(current) = self.added.get(&old.sort_key()) {
            if current == old && !self.holds_put(current) {
                self.added.remove(&old.sort_key());
            }
        }
    }

    fn holds_put(&self, staker: &Staker) -> bool {
        let key = (staker.subnet_id, staker.node_id);
        let change = if staker.priority.is_validator() {
            self.validators.get(&key)
        } else {
            self.delegators.get(&key).and_then(|m| m.get(&staker.tx_id))
        };
        matches!(change, Some(Change::Put(s)) if s == staker)
    }

    /// Whether this layer has any change for `staker`'s identity
    pub fn shadows(&self, staker: &Staker) -> bool {
        let key = (staker.subnet_id, staker.node_id);
        if staker.priority.is_validator() {
            self.validators.contains_key(&key)
        } else {
            self.delegators
                .get(&key)
                .map_or(false, |m| m.contains_key(&staker.tx_id))
        }
    }

    /// This layer's puts within `scope`, in sort-key order
    pub fn cursor(&self, scope: &Scope) -> Cursor<'_> {
        match scope {
            Scope::All => Box::new(self.added.values().cloned().map(Ok)),
            Scope::Delegators { subnet_id, node_id } => {
                let mut puts: Vec<Staker> = self
                    .delegators
                    .get(&(*subnet_id, *node_id))
                    .into_iter()
                    .flat_map(BTreeMap::values)
                    .filter_map(|change| match change {
                        Change::Put(s) => Some(s.clone()),
                        Change::Delete(_) => None,
                    })
                    .collect();
                puts.sort_by_key(Staker::sort_key);
                Box::new(puts.into_iter().map(Ok))
            }
        }
    }

    /// Every staged change
    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.validators
            .values()
            .chain(self.delegators.values().flat_map(BTreeMap::values))
    }

    pub fn into_changes(self) -> impl Iterator<Item = Change> {
        self.validators
            .into_values()
            .chain(self.delegators.into_values().flat_map(BTreeMap::into_values))
    }
}

/// Staged changes to both sets, detached from the view that produced them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StakerChanges {
    pub current: SetChanges,
    pub pending: SetChanges,
}

impl StakerChanges {
    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.pending.is_empty()
    }

    pub fn set(&self, set: StakerSet) -> &SetChanges {
        match set {
            StakerSet::Current => &self.current,
            StakerSet::Pending => &self.pending,
        }
    }

    pub fn set_mut(&mut self, set: StakerSet) -> &mut SetChanges {
        match set {
            StakerSet::Current => &mut self.current,
            StakerSet::Pending => &mut self.pending,
        }
    }
}

/// The storage layers behind one iteration, deepest first
pub struct Layers<'a> {
    pub base: Cursor<'a>,
    /// Overlays from the layer just above `base` to the view itself
    pub overlays: Vec<&'a SetChanges>,
}

impl<'a> Layers<'a> {
    pub fn new(base: Cursor<'a>) -> Self {
        Self {
            base,
            overlays: Vec::new(),
        }
    }

    /// Stack one more overlay on top
    pub fn push(mut self, overlay: &'a SetChanges) -> Self {
        self.overlays.push(overlay);
        self
    }
}

/// Read and write access to the current and pending staker sets.
///
/// Implemented by the committed base state and by every diff layered over
/// it. The set-generic methods are required; the named accessors are
/// provided on top of them.
pub trait Stakers {
    /// The validator of `node_id` on `subnet_id`, or `NotFound`
    fn get_validator(
        &self,
        set: StakerSet,
        subnet_id: &SubnetId,
        node_id: &NodeId,
    ) -> PlatformResult<Staker>;

    fn put_validator(&mut self, set: StakerSet, staker: Staker);

    fn delete_validator(&mut self, set: StakerSet, staker: &Staker);

    fn put_delegator(&mut self, set: StakerSet, staker: Staker);

    fn delete_delegator(&mut self, set: StakerSet, staker: &Staker);

    /// Storage layers making up this view of `set`, restricted to `scope`
    fn layers(&self, set: StakerSet, scope: &Scope) -> PlatformResult<Layers<'_>>;

    /// All stakers in `set`, in sort-key order
    fn staker_iterator(&self, set: StakerSet) -> PlatformResult<StakerIterator<'_>> {
        Ok(StakerIterator::new(self.layers(set, &Scope::All)?, Scope::All))
    }

    /// Delegators of one validator in `set`, in sort-key order
    fn delegator_iterator(
        &self,
        set: StakerSet,
        subnet_id: &SubnetId,
        node_id: &NodeId,
    ) -> PlatformResult<StakerIterator<'_>> {
        let scope = Scope::Delegators {
            subnet_id: *subnet_id,
            node_id: *node_id,
        };
        Ok(StakerIterator::new(self.layers(set, &scope)?, scope))
    }

    /// Fold detached changes into this view
    fn apply_changes(&mut self, changes: StakerChanges) {
        let StakerChanges { current, pending } = changes;
        for (set, set_changes) in [(StakerSet::Current, current), (StakerSet::Pending, pending)] {
            for change in set_changes.into_changes() {
                match change {
                    Change::Put(s) if s.priority.is_validator() => self.put_validator(set, s),
                    Change::Put(s) => self.put_delegator(set, s),
                    Change::Delete(s) if s.priority.is_validator() => {
                        self.delete_validator(set, &s)
                    }
                    Change::Delete(s) => self.delete_delegator(set, &s),
                }
            }
        }
    }

    // ============ Current set ============

    fn get_current_validator(
        &self,
        subnet_id: &SubnetId,
        node_id: &NodeId,
    ) -> PlatformResult<Staker> {
        self.get_validator(StakerSet::Current, subnet_id, node_id)
    }

    fn put_current_validator(&mut self, staker: Staker) {
        self.put_validator(StakerSet::Current, staker)
    }

    fn delete_current_validator(&mut self, staker: &Staker) {
        self.delete_validator(StakerSet::Current, staker)
    }

    fn get_current_delegator_iterator(
        &self,
        subnet_id: &SubnetId,
        node_id: &NodeId,
    ) -> PlatformResult<StakerIterator<'_>> {
        self.delegator_iterator(StakerSet::Current, subnet_id, node_id)
    }

    fn put_current_delegator(&mut self, staker: Staker) {
        self.put_delegator(StakerSet::Current, staker)
    }

    fn delete_current_delegator(&mut self, staker: &Staker) {
        self.delete_delegator(StakerSet::Current, staker)
    }

    fn get_current_staker_iterator(&self) -> PlatformResult<StakerIterator<'_>> {
        self.staker_iterator(StakerSet::Current)
    }

    // ============ Pending set ============

    fn get_pending_validator(
        &self,
        subnet_id: &SubnetId,
        node_id: &NodeId,
    ) -> PlatformResult<Staker> {
        self.get_validator(StakerSet::Pending, subnet_id, node_id)
    }

    fn put_pending_validator(&mut self, staker: Staker) {
        self.put_validator(StakerSet::Pending, staker)
    }

    fn delete_pending_validator(&mut self, staker: &Staker) {
        self.delete_validator(StakerSet::Pending, staker)
    }

    fn get_pending_delegator_iterator(
        &self,
        subnet_id: &SubnetId,
        node_id: &NodeId,
    ) -> PlatformResult<StakerIterator<'_>> {
        self.delegator_iterator(StakerSet::Pending, subnet_id, node_id)
    }

    fn put_pending_delegator(&mut self, staker: Staker) {
        self.put_delegator(StakerSet::Pending, staker)
    }

    fn delete_pending_delegator(&mut self, staker: &Staker) {
        self.delete_delegator(StakerSet::Pending, staker)
    }

    fn get_pending_staker_iterator(&self) -> PlatformResult<StakerIterator<'_>> {
        self.staker_iterator(StakerSet::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staker::Priority;
    use pchain_core::{Id, Timestamp, PRIMARY_NETWORK_ID};

    fn delegator(tx: u8, end: u64) -> Staker {
        Staker::new_current(
            Id([tx; 32]),
            NodeId([1; 20]),
            PRIMARY_NETWORK_ID,
            25,
            Timestamp::ZERO,
            Timestamp::from_unix(end),
            Priority::PrimaryNetworkDelegatorCurrent,
        )
    }

    fn collect(cursor: Cursor<'_>) -> Vec<Staker> {
        cursor.map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_replacing_put_drops_old_sort_key() {
        let mut changes = SetChanges::new();
        let first = delegator(1, 100);
        let moved = delegator(1, 200);

        changes.put_delegator(first.clone());
        changes.put_delegator(moved.clone());
        assert_eq!(collect(changes.cursor(&Scope::All)), vec![moved.clone()]);
        assert_eq!(changes.len(), 1);

        changes.delete_delegator(&moved);
        assert!(collect(changes.cursor(&Scope::All)).is_empty());
        assert!(changes.shadows(&first));
    }

    #[test]
    fn test_identical_put_twice_stays_visible() {
        let mut changes = SetChanges::new();
        let d = delegator(1, 100);
        changes.put_delegator(d.clone());
        changes.put_delegator(d.clone());
        assert_eq!(collect(changes.cursor(&Scope::All)), vec![d]);
    }

    #[test]
    fn test_delegator_cursor_is_scoped_and_sorted() {
        let mut changes = SetChanges::new();
        changes.put_delegator(delegator(3, 300));
        changes.put_delegator(delegator(2, 100));
        let mut elsewhere = delegator(4, 50);
        elsewhere.node_id = NodeId([9; 20]);
        changes.put_delegator(elsewhere);

        let scope = Scope::Delegators {
            subnet_id: PRIMARY_NETWORK_ID,
            node_id: NodeId([1; 20]),
        };
        let ends: Vec<u64> = collect(changes.cursor(&scope))
            .iter()
            .map(|s| s.end_time.as_unix())
            .collect();
        assert_eq!(ends, vec![100, 300]);
        assert_eq!(changes.cursor(&Scope::All).count(), 3);
    }
}
