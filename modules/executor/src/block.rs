//! Block-level execution over one versioned view

use pchain_core::{ForkClock, PlatformConfig, PlatformResult, Timestamp};
use pchain_state::{BaseState, ChainState, Database, Versioned};
use tracing::debug;

use crate::commit::{deliver_outbox, AcceptedBlock};
use crate::executor::AtomicExecutor;
use crate::shared_memory::SharedMemory;
use crate::staking::StakerTxExecutor;
use crate::transaction::SignedTx;

/// Runs a block's transactions in order, atomic and staking alike
pub struct BlockExecutor<M: SharedMemory> {
    atomic: AtomicExecutor<M>,
    staking: StakerTxExecutor,
}

impl<M: SharedMemory> BlockExecutor<M> {
    pub fn new(config: &PlatformConfig, memory: M) -> PlatformResult<Self> {
        config.validate()?;
        let clock = ForkClock::new(config.upgrades.clone(), config.fees.clone())?;
        Ok(Self {
            atomic: AtomicExecutor::new(config.chain.clone(), clock.clone(), memory),
            staking: StakerTxExecutor::new(config.staking.clone(), clock),
        })
    }

    pub fn atomic(&self) -> &AtomicExecutor<M> {
        &self.atomic
    }

    pub fn staking(&self) -> &StakerTxExecutor {
        &self.staking
    }

    /// Move chain time to `time`, then execute `txs` on top of `parent`.
    ///
    /// Any failing transaction rejects the whole block; `parent` is never
    /// written.
    pub fn execute_block(
        &self,
        parent: &dyn ChainState,
        time: Timestamp,
        txs: &[SignedTx],
    ) -> PlatformResult<AcceptedBlock> {
        let mut state = Versioned::new(parent);
        self.staking.advance_time(&mut state, time)?;

        let mut commits = Vec::new();
        for tx in txs {
            if tx.unsigned.is_atomic() {
                commits.push(self.atomic.execute_atomic_tx(tx, &mut state)?);
            } else {
                self.staking.execute(tx, &mut state)?;
            }
        }
        debug!(
            "Executed block of {} transactions at {} ({} atomic)",
            txs.len(),
            time,
            commits.len()
        );
        Ok(AcceptedBlock {
            changes: state.into_changes(),
            commits,
        })
    }

    /// Make `block` durable on `base` and release its shared-memory writes
    pub fn accept<D: Database>(
        &self,
        block: AcceptedBlock,
        base: &mut BaseState<D>,
    ) -> PlatformResult<()> {
        block.accept(base, self.atomic.memory())
    }

    /// Deliver atomic commits a previous run accepted but never released.
    /// Call once after opening `base`.
    pub fn recover<D: Database>(&self, base: &BaseState<D>) -> PlatformResult<usize> {
        deliver_outbox(base, self.atomic.memory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_memory::ChainMemory;
    use crate::transaction::{AddValidatorTx, ExportTx, UnsignedTx};
    use pchain_core::{Amount, NodeId, Violation, PRIMARY_NETWORK_ID};
    use pchain_crypto::hashing::derive_utxo_id;
    use pchain_crypto::keys::KeyPair;
    use pchain_state::{AccountState, MemDb, SledDb, Stakers, StateSnapshot};
    use std::sync::Arc;

    const DAY: u64 = 24 * 60 * 60;

    fn block_txs(owner: &KeyPair, asset_chain: pchain_core::ChainId) -> Vec<SignedTx> {
        let export = UnsignedTx::Export(ExportTx {
            from: owner.address(),
            destination_chain: asset_chain,
            to: owner.address(),
            amount: Amount::from_pch(3),
            nonce: 0,
        });
        let add = UnsignedTx::AddValidator(AddValidatorTx {
            node_id: NodeId([4; 20]),
            subnet_id: PRIMARY_NETWORK_ID,
            weight: Amount::from_pch(2_000).0,
            start_time: Timestamp::from_unix(2 * DAY),
            end_time: Timestamp::from_unix(60 * DAY),
            from: owner.address(),
            nonce: 1,
        });
        vec![
            SignedTx::sign(export, &[owner]).unwrap(),
            SignedTx::sign(add, &[owner]).unwrap(),
        ]
    }

    #[test]
    fn test_block_accept_survives_restart() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = PlatformConfig::default();
        let owner = KeyPair::generate();
        let shared = Arc::new(MemDb::new());
        let executor =
            BlockExecutor::new(&config, ChainMemory::new(config.chain.chain_id, shared.clone()))
                .unwrap();
        let txs = block_txs(&owner, config.chain.asset_chain_id);

        {
            let db = SledDb::open(tmp.path()).unwrap();
            let mut base = BaseState::open(db).unwrap();
            base.put_account(owner.address(), AccountState::new(Amount::from_pch(5_000), 0));
            base.commit().unwrap();

            let block = executor.execute_block(&base, Timestamp::from_unix(DAY), &txs).unwrap();
            assert_eq!(block.commits.len(), 1);
            executor.accept(block, &mut base).unwrap();
        }

        let base = BaseState::open(SledDb::open(tmp.path()).unwrap()).unwrap();
        assert_eq!(executor.recover(&base).unwrap(), 0);
        assert_eq!(base.timestamp(), Timestamp::from_unix(DAY));
        assert_eq!(base.get_account(&owner.address()).unwrap().nonce, 2);
        let pending = base.get_pending_validator(&PRIMARY_NETWORK_ID, &NodeId([4; 20])).unwrap();
        assert_eq!(pending.tx_id, txs[1].id().unwrap());

        let asset = ChainMemory::new(config.chain.asset_chain_id, shared);
        let utxo_id = derive_utxo_id(&txs[0].id().unwrap(), 0);
        let inbound = asset.get(&config.chain.chain_id, &[utxo_id]).unwrap();
        assert_eq!(inbound[0].amount, Amount::from_pch(3));
    }

    #[test]
    fn test_recover_delivers_commits_left_in_outbox() {
        let config = PlatformConfig::default();
        let owner = KeyPair::generate();
        let shared = Arc::new(MemDb::new());
        let executor =
            BlockExecutor::new(&config, ChainMemory::new(config.chain.chain_id, shared.clone()))
                .unwrap();
        let mut base = BaseState::open(MemDb::new()).unwrap();
        base.put_account(owner.address(), AccountState::new(Amount::from_pch(5_000), 0));
        base.commit().unwrap();

        // the block reached disk but the process stopped before delivery
        let txs = block_txs(&owner, config.chain.asset_chain_id);
        let block = executor.execute_block(&base, Timestamp::from_unix(DAY), &txs).unwrap();
        base.apply_versioned(block.changes);
        for commit in &block.commits {
            base.stage_outbox(commit.to_bytes().unwrap());
        }
        base.commit().unwrap();

        let asset = ChainMemory::new(config.chain.asset_chain_id, shared);
        assert!(asset.inbound(&config.chain.chain_id).unwrap().is_empty());
        assert_eq!(executor.recover(&base).unwrap(), 1);
        assert_eq!(asset.inbound(&config.chain.chain_id).unwrap().len(), 1);
        assert!(base.outbox().unwrap().is_empty());
    }

    #[test]
    fn test_failing_tx_rejects_whole_block() {
        let config = PlatformConfig::default();
        let owner = KeyPair::generate();
        let shared = Arc::new(MemDb::new());
        let executor =
            BlockExecutor::new(&config, ChainMemory::new(config.chain.chain_id, shared.clone()))
                .unwrap();
        let mut base = BaseState::open(MemDb::new()).unwrap();
        // enough for the export but not for the stake
        base.put_account(owner.address(), AccountState::new(Amount::from_pch(10), 0));
        base.commit().unwrap();
        let before = StateSnapshot::capture(base.db()).unwrap();

        let txs = block_txs(&owner, config.chain.asset_chain_id);
        let err = executor
            .execute_block(&base, Timestamp::from_unix(DAY), &txs)
            .unwrap_err();
        assert!(matches!(err.violation(), Some(Violation::InsufficientBalance { .. })));

        assert!(!base.has_uncommitted());
        assert!(before.same_contents(&StateSnapshot::capture(base.db()).unwrap()));
        assert!(shared.is_empty());
    }

    #[test]
    fn test_time_moves_before_transactions() {
        let config = PlatformConfig::default();
        let owner = KeyPair::generate();
        let executor = BlockExecutor::new(
            &config,
            ChainMemory::new(config.chain.chain_id, Arc::new(MemDb::new())),
        )
        .unwrap();
        let mut base = BaseState::open(MemDb::new()).unwrap();
        base.put_account(owner.address(), AccountState::new(Amount::from_pch(5_000), 0));
        base.commit().unwrap();

        // the validator starts at 2 days, which is no longer in the future
        let txs = block_txs(&owner, config.chain.asset_chain_id);
        let err = executor
            .execute_block(&base, Timestamp::from_unix(2 * DAY), &txs)
            .unwrap_err();
        assert!(matches!(err.violation(), Some(Violation::InvalidTimeWindow(_))));

        let block = executor.execute_block(&base, Timestamp::from_unix(DAY), &txs).unwrap();
        executor.accept(block, &mut base).unwrap();
        let block = executor.execute_block(&base, Timestamp::from_unix(2 * DAY), &[]).unwrap();
        executor.accept(block, &mut base).unwrap();
        assert!(base.get_current_validator(&PRIMARY_NETWORK_ID, &NodeId([4; 20])).is_ok());
    }
}
