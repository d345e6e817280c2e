use hub_bank::{Amount, Coins};
use hub_modules_api::Context;
use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;
use crate::error::SequencerError;

pub const DEFAULT_MIN_BOND: Amount = 1_000_000;
pub const DEFAULT_NOTICE_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_UNBONDING_TIME_SECS: u64 = 21 * 24 * 60 * 60;
pub const DEFAULT_LIVENESS_SLASH_MIN_ABSOLUTE: Amount = 100;

/// Module-wide parameters, stored in state and replaced only by the authority.
#[cfg_attr(
    feature = "native",
    derive(schemars::JsonSchema),
    schemars(bound = "C::Address: ::schemars::JsonSchema", rename = "Params")
)]
#[derive(
    borsh::BorshDeserialize, borsh::BorshSerialize, Serialize, Deserialize, Debug, PartialEq, Clone,
)]
#[serde(bound = "")]
pub struct Params<C: Context> {
    /// Global minimum bond. Its token address is the bond denomination.
    pub min_bond: Coins<C>,
    /// Seconds between a proposer giving notice and a successor being chosen.
    pub notice_period: u64,
    /// Seconds a scheduled bond decrease waits before it is paid out.
    pub unbonding_time: u64,
    /// Fraction of the proposer's stake burned on a liveness failure.
    pub liveness_slash_min_multiplier: Decimal,
    /// Floor of a liveness slash.
    pub liveness_slash_min_absolute: Amount,
    /// Dishonor added per liveness failure.
    pub dishonor_liveness: u64,
    /// Dishonor at which anyone may kick the proposer.
    pub dishonor_kick_threshold: u64,
    /// Share of a fraudulent sequencer's stake paid to the rewardee.
    pub fraud_reward_multiplier: Decimal,
}

impl<C: Context> Params<C> {
    /// Default parameters with bonds denominated in `bond_token`.
    pub fn default_for(bond_token: C::Address) -> Self {
        Self {
            min_bond: Coins {
                amount: DEFAULT_MIN_BOND,
                token_address: bond_token,
            },
            notice_period: DEFAULT_NOTICE_PERIOD_SECS,
            unbonding_time: DEFAULT_UNBONDING_TIME_SECS,
            liveness_slash_min_multiplier: Decimal::percent(1),
            liveness_slash_min_absolute: DEFAULT_LIVENESS_SLASH_MIN_ABSOLUTE,
            dishonor_liveness: 1,
            dishonor_kick_threshold: 1,
            fraud_reward_multiplier: Decimal::percent(50),
        }
    }

    pub fn bond_token(&self) -> &C::Address {
        &self.min_bond.token_address
    }

    pub fn validate(&self) -> Result<(), SequencerError> {
        let invalid = |reason: &str| Err(SequencerError::InvalidParams(reason.to_owned()));
        if self.min_bond.amount == 0 {
            return invalid("min bond must be positive");
        }
        if self.notice_period == 0 {
            return invalid("notice period must be positive");
        }
        if self.unbonding_time == 0 {
            return invalid("unbonding time must be positive");
        }
        if self.dishonor_kick_threshold == 0 {
            return invalid("dishonor kick threshold must be positive");
        }
        if self.liveness_slash_min_multiplier > Decimal::ONE {
            return invalid("liveness slash multiplier must not exceed one");
        }
        if self.fraud_reward_multiplier > Decimal::ONE {
            return invalid("fraud reward multiplier must not exceed one");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hub_modules_api::default_context::DefaultContext;

    use super::*;
    use crate::error::ErrorKind;

    fn params() -> Params<DefaultContext> {
        Params::default_for([3u8; 32].into())
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(params().validate(), Ok(()));
    }

    #[test]
    fn zero_thresholds_are_out_of_range() {
        let mut zero_bond = params();
        zero_bond.min_bond.amount = 0;
        let mut zero_threshold = params();
        zero_threshold.dishonor_kick_threshold = 0;
        let mut zero_notice = params();
        zero_notice.notice_period = 0;
        let mut big_multiplier = params();
        big_multiplier.fraud_reward_multiplier = Decimal::from_ratio(3, 2);

        for bad in [zero_bond, zero_threshold, zero_notice, big_multiplier] {
            let err = bad.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::OutOfRange);
        }
    }

    #[test]
    fn json_uses_decimal_strings() {
        let json = serde_json::to_value(params()).unwrap();
        assert_eq!(json["liveness_slash_min_multiplier"], "0.01");
        assert_eq!(json["fraud_reward_multiplier"], "0.5");
        let back: Params<DefaultContext> = serde_json::from_value(json).unwrap();
        assert_eq!(back, params());
    }
}
