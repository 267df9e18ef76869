//! Configuration types for pchain
//!
//! Supplied once at node startup and read-only afterwards.

use crate::error::PlatformError;
use crate::traits::PlatformResult;
use crate::types::{Amount, ChainId, Id, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main platform chain configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Identity of this chain and the chains it shares a validator set with
    pub chain: ChainConfig,

    /// Staking limits
    pub staking: StakingConfig,

    /// Fee schedule
    pub fees: FeeConfig,

    /// Network upgrade activation times
    pub upgrades: UpgradeConfig,

    /// Logging
    pub logging: LoggingConfig,
}

impl PlatformConfig {
    pub fn from_json(json: &str) -> PlatformResult<Self> {
        let config: PlatformConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> PlatformResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configurations that cannot describe a running chain
    pub fn validate(&self) -> PlatformResult<()> {
        self.chain.validate()?;
        self.staking.validate()?;
        self.upgrades.validate()
    }
}

/// Chain identity configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// ID of the platform chain this node runs
    pub chain_id: ChainId,

    /// Chain holding the primary asset, the only export target before AP5
    pub asset_chain_id: ChainId,

    /// Chains validated by the primary network that may exchange atomic UTXOs
    pub atomic_chains: Vec<ChainId>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        let asset_chain_id = Id([0x01; 32]);
        Self {
            chain_id: Id::ZERO,
            asset_chain_id,
            atomic_chains: vec![asset_chain_id, Id([0x02; 32])],
        }
    }
}

impl ChainConfig {
    pub fn shares_validators_with(&self, chain: &ChainId) -> bool {
        *chain != self.chain_id && self.atomic_chains.contains(chain)
    }

    fn validate(&self) -> PlatformResult<()> {
        if self.atomic_chains.contains(&self.chain_id) {
            return Err(PlatformError::Config(
                "atomic_chains must not contain the platform chain itself".into(),
            ));
        }
        if !self.atomic_chains.contains(&self.asset_chain_id) {
            return Err(PlatformError::Config(
                "asset_chain_id must be listed in atomic_chains".into(),
            ));
        }
        Ok(())
    }
}

/// Staking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingConfig {
    /// Minimum stake to validate the primary network
    pub min_validator_stake: u64,

    /// Maximum stake bonded on a primary network validator
    pub max_validator_stake: u64,

    /// Minimum stake a delegator may bond
    pub min_delegator_stake: u64,

    /// Minimum staking period in seconds
    pub min_stake_duration_secs: u64,

    /// Maximum staking period in seconds
    pub max_stake_duration_secs: u64,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            min_validator_stake: Amount::from_pch(2_000).0,
            max_validator_stake: Amount::from_pch(3_000_000).0,
            min_delegator_stake: Amount::from_pch(25).0,
            min_stake_duration_secs: 14 * 24 * 60 * 60,
            max_stake_duration_secs: 365 * 24 * 60 * 60,
        }
    }
}

impl StakingConfig {
    pub fn min_stake_duration(&self) -> Duration {
        Duration::from_secs(self.min_stake_duration_secs)
    }

    pub fn max_stake_duration(&self) -> Duration {
        Duration::from_secs(self.max_stake_duration_secs)
    }

    fn validate(&self) -> PlatformResult<()> {
        if self.min_validator_stake > self.max_validator_stake {
            return Err(PlatformError::Config(
                "min_validator_stake exceeds max_validator_stake".into(),
            ));
        }
        if self.min_stake_duration_secs == 0
            || self.min_stake_duration_secs > self.max_stake_duration_secs
        {
            return Err(PlatformError::Config(
                "stake durations must satisfy 0 < min <= max".into(),
            ));
        }
        Ok(())
    }
}

/// Fee schedule, all amounts in nano units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Burned by every non-state-creating transaction, including atomic ones
    pub tx_fee: u64,

    /// Burned by state-creating transactions before AP3
    pub create_asset_tx_fee: u64,

    /// Burned by subnet creation after AP3
    pub create_subnet_tx_fee: u64,

    /// Burned by blockchain creation after AP3
    pub create_blockchain_tx_fee: u64,

    pub add_primary_network_validator_fee: u64,
    pub add_primary_network_delegator_fee: u64,
    pub add_subnet_validator_fee: u64,
    pub add_subnet_delegator_fee: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            tx_fee: 1_000_000,
            create_asset_tx_fee: 10_000_000,
            create_subnet_tx_fee: Amount::ONE_PCH,
            create_blockchain_tx_fee: Amount::ONE_PCH,
            add_primary_network_validator_fee: 0,
            add_primary_network_delegator_fee: 0,
            add_subnet_validator_fee: 1_000_000,
            add_subnet_delegator_fee: 1_000_000,
        }
    }
}

/// Network upgrade activation times
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    pub apricot_phase3_time: Timestamp,
    pub apricot_phase5_time: Timestamp,
    pub banff_time: Timestamp,
    pub cortina_time: Timestamp,
    pub durango_time: Timestamp,
}

impl UpgradeConfig {
    /// Every upgrade activated at genesis
    pub fn all_active() -> Self {
        Self::default()
    }

    /// Upgrades in activation order, paired with their names
    pub fn schedule(&self) -> [(&'static str, Timestamp); 5] {
        [
            ("apricot_phase3", self.apricot_phase3_time),
            ("apricot_phase5", self.apricot_phase5_time),
            ("banff", self.banff_time),
            ("cortina", self.cortina_time),
            ("durango", self.durango_time),
        ]
    }

    pub(crate) fn validate(&self) -> PlatformResult<()> {
        let schedule = self.schedule();
        for pair in schedule.windows(2) {
            let (prev_name, prev) = pair[0];
            let (next_name, next) = pair[1];
            if next < prev {
                return Err(PlatformError::Config(format!(
                    "{} ({}) activates before {} ({})",
                    next_name, next, prev_name, prev
                )));
            }
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Include the event target in output
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PlatformConfig::default().validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_with_partial_input() {
        let json = r#"{ "fees": { "tx_fee": 42 }, "upgrades": { "durango_time": 100 } }"#;
        let config = PlatformConfig::from_json(json).unwrap();
        assert_eq!(config.fees.tx_fee, 42);
        assert_eq!(config.fees.create_asset_tx_fee, FeeConfig::default().create_asset_tx_fee);
        assert_eq!(config.upgrades.durango_time, Timestamp::from_unix(100));

        let again = PlatformConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn test_unordered_upgrades_rejected() {
        let json = r#"{ "upgrades": { "apricot_phase5_time": 100, "banff_time": 50,
            "cortina_time": 200, "durango_time": 300 } }"#;
        let result = PlatformConfig::from_json(json);
        assert!(matches!(result, Err(PlatformError::Config(_))));
    }

    #[test]
    fn test_chain_config_checks() {
        let mut config = PlatformConfig::default();
        config.chain.atomic_chains.push(config.chain.chain_id);
        assert!(config.validate().is_err());

        let chain = ChainConfig::default();
        assert!(chain.shares_validators_with(&chain.asset_chain_id));
        assert!(!chain.shares_validators_with(&chain.chain_id));
        assert!(!chain.shares_validators_with(&Id([9; 32])));
    }

    #[test]
    fn test_invalid_staking_limits() {
        let mut config = PlatformConfig::default();
        config.staking.min_validator_stake = config.staking.max_validator_stake + 1;
        assert!(config.validate().is_err());
    }
}
