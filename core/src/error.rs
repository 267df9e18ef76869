//! Error types for pchain

use crate::types::{Amount, ChainId, Timestamp, UtxoId};
use thiserror::Error;

/// Main error type for pchain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Point lookup found nothing. Expected and non-fatal.
    #[error("not found")]
    NotFound,

    #[error("unsupported transaction type: {0}")]
    UnsupportedTransactionType(&'static str),

    #[error("semantic violation: {0}")]
    SemanticViolation(#[from] Violation),

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PlatformError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound)
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            PlatformError::SemanticViolation(v) => Some(v),
            _ => None,
        }
    }
}

/// Reasons a transaction is rejected against the current state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    // ============ Funds ============
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("amount overflow")]
    Overflow,

    #[error("zero amount transfer")]
    ZeroAmount,

    // ============ Credentials ============
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("expected {expected} credentials, got {got}")]
    CredentialCount { expected: usize, got: usize },

    // ============ Cross-chain ============
    #[error("chain {0} does not share this validator set")]
    UnknownChain(ChainId),

    #[error("chain {0} not reachable before apricot phase 5")]
    ChainNotActivated(ChainId),

    #[error("atomic utxo {0} is missing from shared memory")]
    MissingAtomicUtxo(UtxoId),

    #[error("atomic utxo {0} already consumed")]
    AtomicUtxoConsumed(UtxoId),

    #[error("atomic utxo {0} imported twice")]
    DuplicateImport(UtxoId),

    #[error("import lists no utxos")]
    EmptyImport,

    // ============ Staking ============
    #[error("invalid staking window: {0}")]
    InvalidTimeWindow(String),

    #[error("stake {weight} outside of [{min}, {max}]")]
    StakeOutOfRange { weight: u64, min: u64, max: u64 },

    #[error("validator already exists")]
    ValidatorExists,

    #[error("validator not found")]
    ValidatorMissing,

    #[error("staking period is not contained in the validator's period")]
    OutsideValidatorPeriod,

    #[error("chain time cannot move from {current} back to {proposed}")]
    TimeReversal { current: Timestamp, proposed: Timestamp },
}

impl From<bincode::Error> for PlatformError {
    fn from(err: bincode::Error) -> Self {
        PlatformError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        PlatformError::Serialization(err.to_string())
    }
}

impl From<sled::Error> for PlatformError {
    fn from(err: sled::Error) -> Self {
        PlatformError::StorageFailure(err.to_string())
    }
}

impl From<std::io::Error> for PlatformError {
    fn from(err: std::io::Error) -> Self {
        PlatformError::StorageFailure(err.to_string())
    }
}
