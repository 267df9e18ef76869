//! Atomic (cross-chain) transaction execution

use pchain_core::{
    Address, Amount, ChainConfig, ChainId, ForkClock, PlatformError, PlatformResult, Violation,
};
use pchain_crypto::hashing::derive_utxo_id;
use pchain_state::{AccountState, ChainState, Versioned};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::commit::AtomicCommit;
use crate::shared_memory::{AtomicRequests, AtomicUtxo, SharedMemory};
use crate::transaction::{ExportTx, ImportTx, SignedTx, UnsignedTx};

/// Check `from`'s nonce and balance for a spend of `cost`, returning the
/// account as it will be after the spend
pub(crate) fn charge(
    state: &dyn ChainState,
    from: &Address,
    nonce: u64,
    cost: Amount,
) -> PlatformResult<AccountState> {
    let account = state.get_account(from)?;
    if nonce != account.nonce {
        return Err(Violation::InvalidNonce {
            expected: account.nonce,
            got: nonce,
        }
        .into());
    }
    let balance = account
        .balance
        .checked_sub(cost)
        .ok_or(Violation::InsufficientBalance {
            required: cost,
            available: account.balance,
        })?;
    let nonce = account.nonce.checked_add(1).ok_or(Violation::Overflow)?;
    Ok(AccountState::new(balance, nonce))
}

/// Executes import and export transactions against a versioned state.
///
/// Every check runs before the first write, so a rejected transaction
/// leaves the state untouched.
pub struct AtomicExecutor<M: SharedMemory> {
    chain: ChainConfig,
    clock: ForkClock,
    memory: M,
}

impl<M: SharedMemory> AtomicExecutor<M> {
    pub fn new(chain: ChainConfig, clock: ForkClock, memory: M) -> Self {
        Self {
            chain,
            clock,
            memory,
        }
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Apply `tx` to `state` and describe the shared-memory writes it owes
    pub fn execute_atomic_tx(
        &self,
        tx: &SignedTx,
        state: &mut dyn ChainState,
    ) -> PlatformResult<AtomicCommit> {
        match &tx.unsigned {
            UnsignedTx::Export(export) => self.execute_export(tx, export, state),
            UnsignedTx::Import(import) => self.execute_import(tx, import, state),
            other => Err(PlatformError::UnsupportedTransactionType(other.kind())),
        }
    }

    /// Run `tx` against a throwaway view of `parent`
    pub fn semantic_verify_atomic(
        &self,
        tx: &SignedTx,
        parent: &dyn ChainState,
    ) -> PlatformResult<()> {
        let mut scratch = Versioned::new(parent);
        self.execute_atomic_tx(tx, &mut scratch).map(|_| ())
    }

    /// Before AP5 only the asset chain may exchange UTXOs with this one
    fn check_peer(&self, peer: &ChainId, state: &dyn ChainState) -> PlatformResult<()> {
        if !self.chain.shares_validators_with(peer) {
            return Err(Violation::UnknownChain(*peer).into());
        }
        if !self.clock.is_apricot_phase5_activated(state.timestamp())
            && *peer != self.chain.asset_chain_id
        {
            return Err(Violation::ChainNotActivated(*peer).into());
        }
        Ok(())
    }

    fn execute_export(
        &self,
        tx: &SignedTx,
        export: &ExportTx,
        state: &mut dyn ChainState,
    ) -> PlatformResult<AtomicCommit> {
        let tx_id = tx.id()?;
        self.check_peer(&export.destination_chain, state)?;
        if export.amount == Amount::ZERO {
            return Err(Violation::ZeroAmount.into());
        }
        tx.verify_credentials(&[export.from])?;

        let cost = export
            .amount
            .checked_add(self.clock.tx_fee())
            .ok_or(Violation::Overflow)?;
        let sender = charge(state, &export.from, export.nonce, cost)?;

        state.put_account(export.from, sender);
        let utxo = AtomicUtxo {
            id: derive_utxo_id(&tx_id, 0),
            source_chain: self.chain.chain_id,
            owner: export.to,
            amount: export.amount,
        };
        debug!(
            "Exported {} from {} to chain {} as utxo {}",
            export.amount, export.from, export.destination_chain, utxo.id
        );

        let requests = BTreeMap::from([(
            export.destination_chain,
            AtomicRequests {
                remove: Vec::new(),
                put: vec![utxo],
            },
        )]);
        Ok(AtomicCommit { tx_id, requests })
    }

    fn execute_import(
        &self,
        tx: &SignedTx,
        import: &ImportTx,
        state: &mut dyn ChainState,
    ) -> PlatformResult<AtomicCommit> {
        let tx_id = tx.id()?;
        self.check_peer(&import.source_chain, state)?;
        if import.imported.is_empty() {
            return Err(Violation::EmptyImport.into());
        }
        let mut seen = BTreeSet::new();
        for id in &import.imported {
            if !seen.insert(*id) {
                return Err(Violation::DuplicateImport(*id).into());
            }
            if state.is_atomic_consumed(id) {
                return Err(Violation::AtomicUtxoConsumed(*id).into());
            }
        }

        let utxos = self.memory.get(&import.source_chain, &import.imported)?;
        let owners: Vec<Address> = utxos.iter().map(|u| u.owner).collect();
        tx.verify_credentials(&owners)?;

        let total = utxos
            .iter()
            .try_fold(Amount::ZERO, |sum, u| sum.checked_add(u.amount))
            .ok_or(Violation::Overflow)?;
        let mut recipient = state.get_account(&import.to)?;
        recipient.balance = recipient
            .balance
            .checked_add(total)
            .ok_or(Violation::Overflow)?;

        state.put_account(import.to, recipient);
        for id in &import.imported {
            state.mark_atomic_consumed(*id);
        }
        debug!(
            "Imported {} utxos worth {} from chain {} to {}",
            utxos.len(),
            total,
            import.source_chain,
            import.to
        );

        let requests = BTreeMap::from([(
            import.source_chain,
            AtomicRequests {
                remove: import.imported.clone(),
                put: Vec::new(),
            },
        )]);
        Ok(AtomicCommit { tx_id, requests })
    }
}
