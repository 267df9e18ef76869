//! Staker records and their orderings

use pchain_core::{NodeId, SubnetId, Timestamp, TxId, PRIMARY_NETWORK_ID};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Network scope × role × lifecycle status.
///
/// Declaration order is the tie-break order for stakers sharing a
/// `next_time`: pending entries sort before current ones, and within the
/// current set subnet stakers leave before primary-network ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    PrimaryNetworkDelegatorApricotPending = 1,
    PrimaryNetworkValidatorPending,
    PrimaryNetworkDelegatorBanffPending,
    SubnetPermissionlessValidatorPending,
    SubnetPermissionlessDelegatorPending,
    SubnetPermissionedValidatorPending,
    SubnetPermissionedValidatorCurrent,
    SubnetPermissionlessDelegatorCurrent,
    SubnetPermissionlessValidatorCurrent,
    PrimaryNetworkDelegatorCurrent,
    PrimaryNetworkValidatorCurrent,
}

impl Priority {
    pub fn is_current(self) -> bool {
        self >= Priority::SubnetPermissionedValidatorCurrent
    }

    pub fn is_pending(self) -> bool {
        !self.is_current()
    }

    pub fn is_validator(self) -> bool {
        matches!(
            self,
            Priority::PrimaryNetworkValidatorPending
                | Priority::SubnetPermissionlessValidatorPending
                | Priority::SubnetPermissionedValidatorPending
                | Priority::SubnetPermissionedValidatorCurrent
                | Priority::SubnetPermissionlessValidatorCurrent
                | Priority::PrimaryNetworkValidatorCurrent
        )
    }

    pub fn is_delegator(self) -> bool {
        !self.is_validator()
    }

    pub fn is_primary_network(self) -> bool {
        matches!(
            self,
            Priority::PrimaryNetworkDelegatorApricotPending
                | Priority::PrimaryNetworkValidatorPending
                | Priority::PrimaryNetworkDelegatorBanffPending
                | Priority::PrimaryNetworkDelegatorCurrent
                | Priority::PrimaryNetworkValidatorCurrent
        )
    }

    /// The current-set priority a pending staker takes on when it starts
    pub fn promoted(self) -> Priority {
        match self {
            Priority::PrimaryNetworkDelegatorApricotPending
            | Priority::PrimaryNetworkDelegatorBanffPending => Priority::PrimaryNetworkDelegatorCurrent,
            Priority::PrimaryNetworkValidatorPending => Priority::PrimaryNetworkValidatorCurrent,
            Priority::SubnetPermissionlessValidatorPending => {
                Priority::SubnetPermissionlessValidatorCurrent
            }
            Priority::SubnetPermissionlessDelegatorPending => {
                Priority::SubnetPermissionlessDelegatorCurrent
            }
            Priority::SubnetPermissionedValidatorPending => {
                Priority::SubnetPermissionedValidatorCurrent
            }
            current => current,
        }
    }

    /// Pending validator priority for a subnet
    pub fn pending_validator(subnet_id: &SubnetId) -> Priority {
        if *subnet_id == PRIMARY_NETWORK_ID {
            Priority::PrimaryNetworkValidatorPending
        } else {
            Priority::SubnetPermissionedValidatorPending
        }
    }
}

/// One staking commitment of a validator or delegator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Staker {
    pub tx_id: TxId,
    pub node_id: NodeId,
    pub subnet_id: SubnetId,
    pub weight: u64,

    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// When this staker next changes state: `start_time` while pending,
    /// `end_time` once current
    pub next_time: Timestamp,
    pub priority: Priority,
}

impl Staker {
    /// A staker in the current set, leaving at `end_time`
    pub fn new_current(
        tx_id: TxId,
        node_id: NodeId,
        subnet_id: SubnetId,
        weight: u64,
        start_time: Timestamp,
        end_time: Timestamp,
        priority: Priority,
    ) -> Self {
        Self {
            tx_id,
            node_id,
            subnet_id,
            weight,
            start_time,
            end_time,
            next_time: end_time,
            priority,
        }
    }

    /// A staker in the pending set, starting at `start_time`
    pub fn new_pending(
        tx_id: TxId,
        node_id: NodeId,
        subnet_id: SubnetId,
        weight: u64,
        start_time: Timestamp,
        end_time: Timestamp,
        priority: Priority,
    ) -> Self {
        Self {
            next_time: start_time,
            ..Self::new_current(tx_id, node_id, subnet_id, weight, start_time, end_time, priority)
        }
    }

    /// The current-set record of a pending staker
    pub fn promoted(&self) -> Staker {
        Staker {
            next_time: self.end_time,
            priority: self.priority.promoted(),
            ..self.clone()
        }
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey {
            next_time: self.next_time,
            priority: self.priority,
            tx_id: self.tx_id,
        }
    }

    pub fn identity(&self) -> StakerId {
        if self.priority.is_validator() {
            StakerId::Validator {
                subnet_id: self.subnet_id,
                node_id: self.node_id,
            }
        } else {
            StakerId::Delegator {
                subnet_id: self.subnet_id,
                node_id: self.node_id,
                tx_id: self.tx_id,
            }
        }
    }

    /// Whether this staker's period fully contains `[start, end]`
    pub fn covers(&self, start: Timestamp, end: Timestamp) -> bool {
        self.start_time <= start && end <= self.end_time
    }
}

/// Uniqueness key of a staker within one set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StakerId {
    Validator {
        subnet_id: SubnetId,
        node_id: NodeId,
    },
    Delegator {
        subnet_id: SubnetId,
        node_id: NodeId,
        tx_id: TxId,
    },
}

/// Total order over a staker set: `(next_time, priority, tx_id)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub next_time: Timestamp,
    pub priority: Priority,
    pub tx_id: TxId,
}

impl SortKey {
    pub const ENCODED_LEN: usize = 8 + 1 + TxId::LEN;

    /// Big-endian encoding whose byte order matches `Ord`
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[..8].copy_from_slice(&self.next_time.to_be_bytes());
        out[8] = self.priority as u8;
        out[9..].copy_from_slice(self.tx_id.as_bytes());
        out
    }
}

/// Ordering helper for sorting stakers directly
pub fn compare_stakers(a: &Staker, b: &Staker) -> Ordering {
    a.sort_key().cmp(&b.sort_key())
}
