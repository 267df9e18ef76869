//! Uncommitted staker changes layered over a parent view

use pchain_core::{NodeId, PlatformError, PlatformResult, SubnetId};
use tracing::warn;

use crate::staker::Staker;
use crate::stakers::{Change, Layers, Scope, SetChanges, StakerChanges, StakerSet, Stakers};

/// A scratch layer over any [`Stakers`] view.
///
/// Reads fall through to the parent unless this layer has a change for the
/// same identity. The parent is only borrowed, so any number of diffs may
/// share one parent at a time; none of them can modify it. Folding is done
/// by detaching the changes with [`Diff::into_changes`] and applying them
/// to the parent once the borrow has ended.
pub struct Diff<'a> {
    parent: &'a dyn Stakers,
    changes: StakerChanges,
}

impl<'a> Diff<'a> {
    pub fn new(parent: &'a dyn Stakers) -> Self {
        Self {
            parent,
            changes: StakerChanges::default(),
        }
    }

    pub fn parent(&self) -> &'a dyn Stakers {
        self.parent
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &StakerChanges {
        &self.changes
    }

    /// Detach the staged changes, ending the borrow of the parent
    pub fn into_changes(self) -> StakerChanges {
        self.changes
    }

    fn set(&self, set: StakerSet) -> &SetChanges {
        self.changes.set(set)
    }

    fn set_mut(&mut self, set: StakerSet) -> &mut SetChanges {
        self.changes.set_mut(set)
    }
}

impl<'a> Stakers for Diff<'a> {
    fn get_validator(
        &self,
        set: StakerSet,
        subnet_id: &SubnetId,
        node_id: &NodeId,
    ) -> PlatformResult<Staker> {
        match self.set(set).validator(subnet_id, node_id) {
            Some(Change::Put(staker)) => Ok(staker.clone()),
            Some(Change::Delete(_)) => Err(PlatformError::NotFound),
            None => self.parent.get_validator(set, subnet_id, node_id),
        }
    }

    fn put_validator(&mut self, set: StakerSet, staker: Staker) {
        if let Ok(existing) = self.get_validator(set, &staker.subnet_id, &staker.node_id) {
            if existing.tx_id != staker.tx_id {
                warn!(
                    "Diff replaces {} validator {} on subnet {} (tx {} -> {})",
                    set.label(),
                    staker.node_id,
                    staker.subnet_id,
                    existing.tx_id,
                    staker.tx_id
                );
            }
        }
        self.set_mut(set).put_validator(staker);
    }

    fn delete_validator(&mut self, set: StakerSet, staker: &Staker) {
        self.set_mut(set).delete_validator(staker);
    }

    fn put_delegator(&mut self, set: StakerSet, staker: Staker) {
        self.set_mut(set).put_delegator(staker);
    }

    fn delete_delegator(&mut self, set: StakerSet, staker: &Staker) {
        self.set_mut(set).delete_delegator(staker);
    }

    fn layers(&self, set: StakerSet, scope: &Scope) -> PlatformResult<Layers<'_>> {
        Ok(self.parent.layers(set, scope)?.push(self.set(set)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BaseState;
    use crate::memory::MemDb;
    use crate::staker::Priority;
    use pchain_core::{Id, Timestamp, PRIMARY_NETWORK_ID};

    fn validator(node: u8, end: u64) -> Staker {
        Staker::new_current(
            Id([node; 32]),
            NodeId([node; 20]),
            PRIMARY_NETWORK_ID,
            2000,
            Timestamp::ZERO,
            Timestamp::from_unix(end),
            Priority::PrimaryNetworkValidatorCurrent,
        )
    }

    fn delegator(node: u8, tx: u8, end: u64) -> Staker {
        Staker::new_current(
            Id([tx; 32]),
            NodeId([node; 20]),
            PRIMARY_NETWORK_ID,
            25,
            Timestamp::ZERO,
            Timestamp::from_unix(end),
            Priority::PrimaryNetworkDelegatorCurrent,
        )
    }

    fn current_ends(view: &dyn Stakers) -> Vec<u64> {
        view.get_current_staker_iterator()
            .unwrap()
            .map(|r| r.unwrap().end_time.as_unix())
            .collect()
    }

    fn base_with(stakers: &[Staker]) -> BaseState<MemDb> {
        let mut base = BaseState::open(MemDb::new()).unwrap();
        for s in stakers {
            if s.priority.is_validator() {
                base.put_current_validator(s.clone());
            } else {
                base.put_current_delegator(s.clone());
            }
        }
        base.commit().unwrap();
        base
    }

    #[test]
    fn test_reads_fall_through_to_parent() {
        let v = validator(1, 100);
        let base = base_with(&[v.clone()]);
        let diff = Diff::new(&base);

        assert_eq!(diff.get_current_validator(&PRIMARY_NETWORK_ID, &v.node_id).unwrap(), v);
        assert!(diff
            .get_pending_validator(&PRIMARY_NETWORK_ID, &v.node_id)
            .unwrap_err()
            .is_not_found());
        assert!(diff.is_empty());
    }

    #[test]
    fn test_delete_in_diff_hides_parent() {
        let v = validator(1, 100);
        let base = base_with(&[v.clone(), validator(2, 200)]);
        let mut diff = Diff::new(&base);

        diff.delete_current_validator(&v);
        assert!(diff
            .get_current_validator(&PRIMARY_NETWORK_ID, &v.node_id)
            .unwrap_err()
            .is_not_found());
        assert_eq!(current_ends(&diff), vec![200]);
        assert_eq!(current_ends(&base), vec![100, 200]);
    }

    #[test]
    fn test_diff_of_diff() {
        let base = base_with(&[validator(1, 100), delegator(1, 9, 90)]);
        let mut lower = Diff::new(&base);
        lower.put_current_validator(validator(2, 200));

        let mut upper = Diff::new(&lower);
        upper.delete_current_delegator(&delegator(1, 9, 90));
        upper.put_current_delegator(delegator(1, 8, 80));

        assert_eq!(current_ends(&upper), vec![80, 100, 200]);
        assert_eq!(current_ends(&lower), vec![90, 100, 200]);

        let delegators: Vec<Staker> = upper
            .get_current_delegator_iterator(&PRIMARY_NETWORK_ID, &NodeId([1; 20]))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(delegators, vec![delegator(1, 8, 80)]);

        let changes = upper.into_changes();
        lower.apply_changes(changes);
        assert_eq!(current_ends(&lower), vec![80, 100, 200]);
    }

    #[test]
    fn test_sibling_diffs_are_independent() {
        let base = base_with(&[validator(1, 100)]);
        let mut left = Diff::new(&base);
        let mut right = Diff::new(&base);

        left.put_current_validator(validator(2, 200));
        right.delete_current_validator(&validator(1, 100));

        assert_eq!(current_ends(&left), vec![100, 200]);
        assert!(current_ends(&right).is_empty());
        assert_eq!(current_ends(&base), vec![100]);
    }
}
