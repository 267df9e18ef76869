//! Credential keys and the addresses they control

use ed25519_dalek::{SigningKey, VerifyingKey};
use pchain_core::{Address, PublicKey};
use rand::rngs::OsRng;

use crate::hashing::blake3_hash;

/// Ed25519 key owning one account address
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic key, for fixtures and replays
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair({})", self.address())
    }
}

/// Address = BLAKE3(public key)
pub fn address_from_public_key(public_key: &PublicKey) -> Address {
    Address::from_bytes(*blake3_hash(public_key.as_bytes()).as_bytes())
}

pub fn verify_address(address: &Address, public_key: &PublicKey) -> bool {
    *address == address_from_public_key(public_key)
}

pub(crate) fn verifying_key(key: &PublicKey) -> Option<VerifyingKey> {
    VerifyingKey::from_bytes(key.as_bytes()).ok()
}
