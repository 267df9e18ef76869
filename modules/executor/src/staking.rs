//! Staking transactions and chain-time advancement

use pchain_core::{
    Amount, ForkClock, NodeId, PlatformError, PlatformResult, StakingConfig, SubnetId, Timestamp,
    TxId, Violation, PRIMARY_NETWORK_ID,
};
use pchain_state::{ChainState, Priority, Staker, Stakers};
use tracing::{debug, info};

use crate::executor::charge;
use crate::transaction::{AddDelegatorTx, AddValidatorTx, SignedTx, UnsignedTx};

fn found(lookup: PlatformResult<Staker>) -> PlatformResult<Option<Staker>> {
    match lookup {
        Ok(staker) => Ok(Some(staker)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// The validator of `node_id` on `subnet_id`, current or pending
fn find_validator(
    state: &dyn Stakers,
    subnet_id: &SubnetId,
    node_id: &NodeId,
) -> PlatformResult<Option<Staker>> {
    if let Some(staker) = found(state.get_current_validator(subnet_id, node_id))? {
        return Ok(Some(staker));
    }
    found(state.get_pending_validator(subnet_id, node_id))
}

/// Earliest `next_time` across the current and pending sets
pub fn next_staker_change_time(state: &dyn Stakers) -> PlatformResult<Option<Timestamp>> {
    let current = state.get_current_staker_iterator()?.next().transpose()?;
    let pending = state.get_pending_staker_iterator()?.next().transpose()?;
    Ok(current
        .into_iter()
        .chain(pending)
        .map(|s| s.next_time)
        .min())
}

/// Executes validator and delegator registrations, and moves chain time
pub struct StakerTxExecutor {
    staking: StakingConfig,
    clock: ForkClock,
}

impl StakerTxExecutor {
    pub fn new(staking: StakingConfig, clock: ForkClock) -> Self {
        Self { staking, clock }
    }

    /// Register the staker described by `tx` in the pending set
    pub fn execute(&self, tx: &SignedTx, state: &mut dyn ChainState) -> PlatformResult<Staker> {
        let tx_id = tx.id()?;
        match &tx.unsigned {
            UnsignedTx::AddValidator(add) => self.add_validator(tx, tx_id, add, state),
            UnsignedTx::AddDelegator(add) => self.add_delegator(tx, tx_id, add, state),
            other => Err(PlatformError::UnsupportedTransactionType(other.kind())),
        }
    }

    fn check_window(
        &self,
        state: &dyn ChainState,
        start: Timestamp,
        end: Timestamp,
    ) -> PlatformResult<()> {
        let now = state.timestamp();
        if start <= now {
            return Err(Violation::InvalidTimeWindow(format!(
                "start {} is not after chain time {}",
                start, now
            ))
            .into());
        }
        if end <= start {
            return Err(Violation::InvalidTimeWindow(format!(
                "end {} is not after start {}",
                end, start
            ))
            .into());
        }
        let duration = end.since(start);
        if duration < self.staking.min_stake_duration()
            || duration > self.staking.max_stake_duration()
        {
            return Err(Violation::InvalidTimeWindow(format!(
                "staking period of {}s is outside [{}, {}]",
                duration.as_secs(),
                self.staking.min_stake_duration_secs,
                self.staking.max_stake_duration_secs
            ))
            .into());
        }
        Ok(())
    }

    fn check_weight(weight: u64, min: u64, max: u64) -> PlatformResult<()> {
        if weight < min || weight > max {
            return Err(Violation::StakeOutOfRange { weight, min, max }.into());
        }
        Ok(())
    }

    /// Stake plus fee on the primary network, the fee alone on a subnet
    fn cost(subnet_id: &SubnetId, weight: u64, fee: Amount) -> PlatformResult<Amount> {
        if *subnet_id == PRIMARY_NETWORK_ID {
            Ok(Amount(weight).checked_add(fee).ok_or(Violation::Overflow)?)
        } else {
            Ok(fee)
        }
    }

    fn add_validator(
        &self,
        tx: &SignedTx,
        tx_id: TxId,
        add: &AddValidatorTx,
        state: &mut dyn ChainState,
    ) -> PlatformResult<Staker> {
        self.check_window(state, add.start_time, add.end_time)?;
        if add.subnet_id == PRIMARY_NETWORK_ID {
            Self::check_weight(
                add.weight,
                self.staking.min_validator_stake,
                self.staking.max_validator_stake,
            )?;
        } else {
            Self::check_weight(add.weight, 1, u64::MAX)?;
        }
        if find_validator(state.as_stakers(), &add.subnet_id, &add.node_id)?.is_some() {
            return Err(Violation::ValidatorExists.into());
        }
        if add.subnet_id != PRIMARY_NETWORK_ID {
            let primary = find_validator(state.as_stakers(), &PRIMARY_NETWORK_ID, &add.node_id)?
                .ok_or(Violation::ValidatorMissing)?;
            if !primary.covers(add.start_time, add.end_time) {
                return Err(Violation::OutsideValidatorPeriod.into());
            }
        }
        tx.verify_credentials(&[add.from])?;
        let cost = Self::cost(&add.subnet_id, add.weight, self.clock.add_validator_fee(&add.subnet_id))?;
        let payer = charge(state, &add.from, add.nonce, cost)?;

        let staker = Staker::new_pending(
            tx_id,
            add.node_id,
            add.subnet_id,
            add.weight,
            add.start_time,
            add.end_time,
            Priority::pending_validator(&add.subnet_id),
        );
        state.put_account(add.from, payer);
        state.put_pending_validator(staker.clone());
        debug!(
            "Added pending validator {} on subnet {} from {} to {}",
            add.node_id, add.subnet_id, add.start_time, add.end_time
        );
        Ok(staker)
    }

    fn add_delegator(
        &self,
        tx: &SignedTx,
        tx_id: TxId,
        add: &AddDelegatorTx,
        state: &mut dyn ChainState,
    ) -> PlatformResult<Staker> {
        self.check_window(state, add.start_time, add.end_time)?;
        let min = if add.subnet_id == PRIMARY_NETWORK_ID {
            self.staking.min_delegator_stake
        } else {
            1
        };
        Self::check_weight(add.weight, min, u64::MAX)?;
        let validator = find_validator(state.as_stakers(), &add.subnet_id, &add.node_id)?
            .ok_or(Violation::ValidatorMissing)?;
        if !validator.covers(add.start_time, add.end_time) {
            return Err(Violation::OutsideValidatorPeriod.into());
        }
        tx.verify_credentials(&[add.from])?;
        let cost = Self::cost(&add.subnet_id, add.weight, self.clock.add_delegator_fee(&add.subnet_id))?;
        let payer = charge(state, &add.from, add.nonce, cost)?;

        let priority = if add.subnet_id != PRIMARY_NETWORK_ID {
            Priority::SubnetPermissionlessDelegatorPending
        } else if self.clock.is_banff_activated(state.timestamp()) {
            Priority::PrimaryNetworkDelegatorBanffPending
        } else {
            Priority::PrimaryNetworkDelegatorApricotPending
        };
        let staker = Staker::new_pending(
            tx_id,
            add.node_id,
            add.subnet_id,
            add.weight,
            add.start_time,
            add.end_time,
            priority,
        );
        state.put_account(add.from, payer);
        state.put_pending_delegator(staker.clone());
        debug!(
            "Added pending delegator {} to {} on subnet {}",
            tx_id, add.node_id, add.subnet_id
        );
        Ok(staker)
    }

    /// Move chain time to `new_time`, starting and retiring stakers on the
    /// way. Returns the number of stakers that changed set.
    pub fn advance_time(
        &self,
        state: &mut dyn ChainState,
        new_time: Timestamp,
    ) -> PlatformResult<usize> {
        let current = state.timestamp();
        if new_time < current {
            return Err(Violation::TimeReversal {
                current,
                proposed: new_time,
            }
            .into());
        }

        let starting = due(state.get_pending_staker_iterator()?, new_time)?;
        for staker in &starting {
            let promoted = staker.promoted();
            if staker.priority.is_validator() {
                state.delete_pending_validator(staker);
                state.put_current_validator(promoted);
            } else {
                state.delete_pending_delegator(staker);
                state.put_current_delegator(promoted);
            }
        }

        let leaving = due(state.get_current_staker_iterator()?, new_time)?;
        for staker in &leaving {
            if staker.priority.is_validator() {
                state.delete_current_validator(staker);
            } else {
                state.delete_current_delegator(staker);
            }
        }

        state.set_timestamp(new_time);
        info!(
            "Advanced chain time to {}: {} stakers started, {} left",
            new_time,
            starting.len(),
            leaving.len()
        );
        Ok(starting.len() + leaving.len())
    }
}

/// Stakers whose `next_time` is at or before `t`, read out before any write
fn due(
    stakers: impl Iterator<Item = PlatformResult<Staker>>,
    t: Timestamp,
) -> PlatformResult<Vec<Staker>> {
    let mut out = Vec::new();
    for staker in stakers {
        let staker = staker?;
        if staker.next_time > t {
            break;
        }
        out.push(staker);
    }
    Ok(out)
}
