//! Fork activation predicates and the fee schedule that depends on them

use crate::config::{FeeConfig, UpgradeConfig};
use crate::traits::PlatformResult;
use crate::types::{Amount, SubnetId, Timestamp, PRIMARY_NETWORK_ID};

/// Pure view over the configured upgrade table.
///
/// Every predicate is `t >= activation_time`. Cloning is cheap and the value
/// is never mutated, so it can be shared freely between executors.
#[derive(Debug, Clone, PartialEq)]
pub struct ForkClock {
    upgrades: UpgradeConfig,
    fees: FeeConfig,
}

impl ForkClock {
    pub fn new(upgrades: UpgradeConfig, fees: FeeConfig) -> PlatformResult<Self> {
        upgrades.validate()?;
        Ok(Self { upgrades, fees })
    }

    pub fn upgrades(&self) -> &UpgradeConfig {
        &self.upgrades
    }

    pub fn is_apricot_phase3_activated(&self, t: Timestamp) -> bool {
        t >= self.upgrades.apricot_phase3_time
    }

    pub fn is_apricot_phase5_activated(&self, t: Timestamp) -> bool {
        t >= self.upgrades.apricot_phase5_time
    }

    pub fn is_banff_activated(&self, t: Timestamp) -> bool {
        t >= self.upgrades.banff_time
    }

    pub fn is_cortina_activated(&self, t: Timestamp) -> bool {
        t >= self.upgrades.cortina_time
    }

    pub fn is_durango_activated(&self, t: Timestamp) -> bool {
        t >= self.upgrades.durango_time
    }

    /// Fee burned by import and export transactions
    pub fn tx_fee(&self) -> Amount {
        Amount(self.fees.tx_fee)
    }

    pub fn create_blockchain_tx_fee(&self, t: Timestamp) -> Amount {
        if self.is_apricot_phase3_activated(t) {
            Amount(self.fees.create_blockchain_tx_fee)
        } else {
            Amount(self.fees.create_asset_tx_fee)
        }
    }

    pub fn create_subnet_tx_fee(&self, t: Timestamp) -> Amount {
        if self.is_apricot_phase3_activated(t) {
            Amount(self.fees.create_subnet_tx_fee)
        } else {
            Amount(self.fees.create_asset_tx_fee)
        }
    }

    pub fn add_validator_fee(&self, subnet_id: &SubnetId) -> Amount {
        if *subnet_id == PRIMARY_NETWORK_ID {
            Amount(self.fees.add_primary_network_validator_fee)
        } else {
            Amount(self.fees.add_subnet_validator_fee)
        }
    }

    pub fn add_delegator_fee(&self, subnet_id: &SubnetId) -> Amount {
        if *subnet_id == PRIMARY_NETWORK_ID {
            Amount(self.fees.add_primary_network_delegator_fee)
        } else {
            Amount(self.fees.add_subnet_delegator_fee)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::types::Id;

    fn staged_clock() -> ForkClock {
        let upgrades = UpgradeConfig {
            apricot_phase3_time: Timestamp::from_unix(100),
            apricot_phase5_time: Timestamp::from_unix(200),
            banff_time: Timestamp::from_unix(300),
            cortina_time: Timestamp::from_unix(400),
            durango_time: Timestamp::from_unix(500),
        };
        ForkClock::new(upgrades, FeeConfig::default()).unwrap()
    }

    #[test]
    fn test_activation_is_inclusive() {
        let clock = staged_clock();
        assert!(!clock.is_apricot_phase3_activated(Timestamp::from_unix(99)));
        assert!(clock.is_apricot_phase3_activated(Timestamp::from_unix(100)));
        assert!(!clock.is_banff_activated(Timestamp::from_unix(299)));
        assert!(clock.is_banff_activated(Timestamp::from_unix(300)));
        assert!(clock.is_durango_activated(Timestamp::MAX));
        assert!(!clock.is_cortina_activated(Timestamp::ZERO));
        assert!(clock.is_apricot_phase5_activated(Timestamp::from_unix(250)));
    }

    #[test]
    fn test_creation_fees_switch_at_ap3() {
        let clock = staged_clock();
        let fees = FeeConfig::default();
        let before = Timestamp::from_unix(50);
        let after = Timestamp::from_unix(150);

        assert_eq!(clock.create_blockchain_tx_fee(before).0, fees.create_asset_tx_fee);
        assert_eq!(clock.create_blockchain_tx_fee(after).0, fees.create_blockchain_tx_fee);
        assert_eq!(clock.create_subnet_tx_fee(before).0, fees.create_asset_tx_fee);
        assert_eq!(clock.create_subnet_tx_fee(after).0, fees.create_subnet_tx_fee);
    }

    #[test]
    fn test_staking_fees_by_subnet() {
        let clock = staged_clock();
        let fees = FeeConfig::default();
        let subnet = Id([3; 32]);
        assert_eq!(clock.add_validator_fee(&PRIMARY_NETWORK_ID).0, fees.add_primary_network_validator_fee);
        assert_eq!(clock.add_validator_fee(&subnet).0, fees.add_subnet_validator_fee);
        assert_eq!(clock.add_delegator_fee(&subnet).0, fees.add_subnet_delegator_fee);
    }

    #[test]
    fn test_unordered_thresholds_rejected() {
        let upgrades = UpgradeConfig {
            banff_time: Timestamp::from_unix(10),
            cortina_time: Timestamp::from_unix(5),
            ..UpgradeConfig::default()
        };
        let result = ForkClock::new(upgrades, FeeConfig::default());
        assert!(matches!(result, Err(PlatformError::Config(_))));
    }
}
