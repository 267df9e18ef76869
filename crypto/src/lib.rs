//! pchain Cryptography Module
//!
//! - Ed25519 for credentials
//! - BLAKE3 for transaction and UTXO ids
//! - Merkle roots over state snapshots

pub mod keys;
pub mod signing;
pub mod hashing;

pub use keys::*;
pub use signing::*;
pub use hashing::*;
