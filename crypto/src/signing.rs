//! Digital signature operations using Ed25519

use ed25519_dalek::{Signer, Verifier};
use pchain_core::{Address, PublicKey, Signature};
use thiserror::Error;

use crate::keys::{verify_address, verifying_key, KeyPair};

/// Why a signature was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed public key")]
    MalformedPublicKey,

    #[error("public key does not match owner")]
    WrongSigner,

    #[error("signature verification failed")]
    BadSignature,
}

/// Sign a message using Ed25519
pub fn sign(keypair: &KeyPair, message: &[u8]) -> Signature {
    let signature = keypair.signing_key().sign(message);
    Signature::from_bytes(signature.to_bytes())
}

/// Verify a signature using Ed25519
pub fn verify(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), SignatureError> {
    let key = verifying_key(public_key).ok_or(SignatureError::MalformedPublicKey)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());

    key.verify(message, &sig)
        .map_err(|_| SignatureError::BadSignature)
}

/// Verify that `owner` produced `signature` over `message`
pub fn verify_owner(
    owner: &Address,
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), SignatureError> {
    if !verify_address(owner, public_key) {
        return Err(SignatureError::WrongSigner);
    }
    verify(public_key, message, signature)
}
