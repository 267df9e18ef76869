//! Platform-chain transactions and their credentials

use pchain_core::{
    Address, Amount, ChainId, NodeId, PlatformResult, PublicKey, Signature, SubnetId, Timestamp,
    TxId, UtxoId, Violation,
};
use pchain_crypto::hashing::hash;
use pchain_crypto::keys::KeyPair;
use pchain_crypto::signing::{sign, verify_owner};
use serde::{Deserialize, Serialize};

/// Domain separator for signed bytes
const SIGNING_PREFIX: &[u8] = b"PCHAIN_TX:";

/// Move `amount` out of `from` into shared memory for `destination_chain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTx {
    pub from: Address,
    pub destination_chain: ChainId,
    /// Owner of the produced UTXO on the destination chain
    pub to: Address,
    pub amount: Amount,
    pub nonce: u64,
}

/// Consume UTXOs that `source_chain` exported to this chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTx {
    pub source_chain: ChainId,
    pub imported: Vec<UtxoId>,
    pub to: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddValidatorTx {
    pub node_id: NodeId,
    pub subnet_id: SubnetId,
    pub weight: u64,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// Account paying the stake and fee
    pub from: Address,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDelegatorTx {
    pub node_id: NodeId,
    pub subnet_id: SubnetId,
    pub weight: u64,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub from: Address,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnsignedTx {
    Export(ExportTx),
    Import(ImportTx),
    AddValidator(AddValidatorTx),
    AddDelegator(AddDelegatorTx),
}

impl UnsignedTx {
    pub fn kind(&self) -> &'static str {
        match self {
            UnsignedTx::Export(_) => "export",
            UnsignedTx::Import(_) => "import",
            UnsignedTx::AddValidator(_) => "add_validator",
            UnsignedTx::AddDelegator(_) => "add_delegator",
        }
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self, UnsignedTx::Export(_) | UnsignedTx::Import(_))
    }

    /// Bytes every credential signs
    pub fn signing_bytes(&self) -> PlatformResult<Vec<u8>> {
        let body = bincode::serialize(self)?;
        let mut bytes = Vec::with_capacity(SIGNING_PREFIX.len() + body.len());
        bytes.extend_from_slice(SIGNING_PREFIX);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    pub fn id(&self) -> PlatformResult<TxId> {
        Ok(hash(&self.signing_bytes()?))
    }
}

/// Proof that the owner of an input authorised the transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub public_key: PublicKey,
    pub signature: Signature,
}

impl Credential {
    pub fn verify(&self, owner: &Address, message: &[u8]) -> Result<(), Violation> {
        verify_owner(owner, &self.public_key, message, &self.signature)
            .map_err(|e| Violation::InvalidCredential(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    pub unsigned: UnsignedTx,
    /// One credential per input, in input order
    pub credentials: Vec<Credential>,
}

impl SignedTx {
    /// Sign `unsigned` with each key in turn
    pub fn sign(unsigned: UnsignedTx, signers: &[&KeyPair]) -> PlatformResult<Self> {
        let message = unsigned.signing_bytes()?;
        let credentials = signers
            .iter()
            .map(|kp| Credential {
                public_key: kp.public_key(),
                signature: sign(kp, &message),
            })
            .collect();
        Ok(Self {
            unsigned,
            credentials,
        })
    }

    pub fn id(&self) -> PlatformResult<TxId> {
        self.unsigned.id()
    }

    /// Check that credentials `0..owners.len()` were produced by `owners`
    pub fn verify_credentials(&self, owners: &[Address]) -> PlatformResult<()> {
        if self.credentials.len() != owners.len() {
            return Err(Violation::CredentialCount {
                expected: owners.len(),
                got: self.credentials.len(),
            }
            .into());
        }
        let message = self.unsigned.signing_bytes()?;
        for (credential, owner) in self.credentials.iter().zip(owners) {
            credential.verify(owner, &message)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> PlatformResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> PlatformResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
