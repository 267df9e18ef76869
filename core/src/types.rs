//! Core types for pchain
//!
//! Fixed-size identifiers, amounts and chain time.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, Bytes, IfIsHumanReadable};
use std::fmt;
use std::time::Duration;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr, $label:expr) => {
        $(#[$meta])*
        #[serde_as]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        pub struct $name(#[serde_as(as = "IfIsHumanReadable<Hex>")] pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;
            pub const ZERO: $name = $name([0u8; $len]);

            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let arr: [u8; $len] = bytes.try_into().ok()?;
                Some($name(arr))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s.trim_start_matches("0x"))?;
                Self::from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}0x{}", $label, &self.to_hex()[..12])
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(0x{})", stringify!($name), self.to_hex())
            }
        }
    };
}

fixed_bytes!(
    /// 32-byte identifier used for transactions, subnets, chains and UTXOs
    Id,
    32,
    ""
);

fixed_bytes!(
    /// 20-byte validator node identifier
    NodeId,
    20,
    "node:"
);

fixed_bytes!(
    /// 32-byte address derived from a public key hash
    Address,
    32,
    "addr:"
);

fixed_bytes!(
    /// 32-byte Ed25519 public key
    PublicKey,
    32,
    "pk:"
);

/// 64-byte Ed25519 signature
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")] pub [u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Signature(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(0x{}...)", &self.to_hex()[..16])
    }
}

/// Transaction ID (hash of the unsigned transaction bytes)
pub type TxId = Id;

/// Subnet identifier
pub type SubnetId = Id;

/// Chain identifier
pub type ChainId = Id;

/// Identifier of a UTXO placed in cross-chain shared memory
pub type UtxoId = Id;

/// The primary network is the subnet every validator belongs to
pub const PRIMARY_NETWORK_ID: SubnetId = Id::ZERO;

/// Token amount in nano units
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Amount(pub u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const MAX: Amount = Amount(u64::MAX);

    /// One PCH = 10^9 nano units
    pub const DECIMALS: u32 = 9;
    pub const ONE_PCH: u64 = 1_000_000_000;

    pub fn new(value: u64) -> Self {
        Amount(value)
    }

    pub fn from_pch(pch: u64) -> Self {
        Amount(pch.saturating_mul(Self::ONE_PCH))
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::ONE_PCH;
        let frac = self.0 % Self::ONE_PCH;
        if frac == 0 {
            write!(f, "{} PCH", whole)
        } else {
            write!(f, "{}.{:09} PCH", whole, frac)
        }
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

/// Chain time in seconds since Unix epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    pub fn now() -> Self {
        Timestamp(chrono::Utc::now().timestamp().max(0) as u64)
    }

    pub fn from_unix(secs: u64) -> Self {
        Timestamp(secs)
    }

    pub fn as_unix(&self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, duration: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(duration.as_secs()))
    }

    pub fn saturating_sub(self, duration: Duration) -> Timestamp {
        Timestamp(self.0.saturating_sub(duration.as_secs()))
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later
    pub fn since(&self, earlier: Timestamp) -> Duration {
        Duration::from_secs(self.0.saturating_sub(earlier.0))
    }

    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp(self.0 as i64, 0) {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
            None => write!(f, "{}", self.0),
        }
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}
