use borsh::{BorshDeserialize, BorshSerialize};
use hub_bank::Amount;
use hub_modules_api::{Context, Timestamp};
use serde::{Deserialize, Serialize};

use crate::metadata::SequencerMetadata;

pub type RollappId = String;

/// Length of the consensus (dymint) public key, an ed25519 key.
pub const CONSENSUS_PUB_KEY_LENGTH: usize = 32;
/// Length of the address derived from a consensus key.
pub const DYMINT_ADDRESS_LENGTH: usize = 20;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[cfg_attr(feature = "native", derive(schemars::JsonSchema))]
pub enum OperatingStatus {
    Unbonded,
    /// Carried by imported records only. No operation of this module enters it.
    Unbonding,
    Bonded,
}

impl OperatingStatus {
    pub const ALL: [OperatingStatus; 3] = [
        OperatingStatus::Unbonded,
        OperatingStatus::Unbonding,
        OperatingStatus::Bonded,
    ];
}

/// A party bonded to produce blocks for one rollapp.
#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Sequencer<C: Context> {
    /// Account of the sequencer. Also the account its bond is refunded to.
    pub address: C::Address,
    pub rollapp_id: RollappId,
    pub dymint_pub_key: Vec<u8>,
    /// Bonded stake, denominated in the bond token.
    pub tokens: Amount,
    pub status: OperatingStatus,
    /// Whether the sequencer may be elected proposer or successor.
    pub opted_in: bool,
    /// Terminal. A jailed sequencer is never bonded again.
    pub jailed: bool,
    /// Accumulated liveness failures. Never decreases.
    pub dishonor: u64,
    /// End of the notice period, zero when not in notice.
    pub notice_period_time: Timestamp,
    pub unbond_request_height: u64,
    pub metadata: SequencerMetadata,
    pub reward_addr: C::Address,
    /// Sorted and free of duplicates.
    pub whitelisted_relayers: Vec<C::Address>,
}

impl<C: Context> Sequencer<C> {
    /// The placeholder meaning "no sequencer". It is never persisted and never
    /// takes part in elections.
    pub fn sentinel() -> Self {
        let address = sentinel_address::<C>();
        Self {
            reward_addr: address.clone(),
            address,
            rollapp_id: RollappId::new(),
            dymint_pub_key: Vec::new(),
            tokens: 0,
            status: OperatingStatus::Bonded,
            opted_in: true,
            jailed: false,
            dishonor: 0,
            notice_period_time: Timestamp::ZERO,
            unbond_request_height: 0,
            metadata: SequencerMetadata::default(),
            whitelisted_relayers: Vec::new(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        is_sentinel_address::<C>(&self.address)
    }

    pub fn is_bonded(&self) -> bool {
        self.status == OperatingStatus::Bonded
    }

    /// Bonded, opted in and not jailed.
    pub fn is_potential_proposer(&self) -> bool {
        self.is_bonded() && self.opted_in && !self.jailed
    }

    pub fn is_noticed(&self) -> bool {
        !self.notice_period_time.is_zero()
    }

    pub fn notice_elapsed(&self, now: Timestamp) -> bool {
        self.is_noticed() && self.notice_period_time <= now
    }
}

/// The reserved address of the sentinel sequencer.
pub fn sentinel_address<C: Context>() -> C::Address {
    C::Address::from([0u8; 32])
}

pub fn is_sentinel_address<C: Context>(address: &C::Address) -> bool {
    address.as_ref() == [0u8; 32].as_slice()
}

/// A scheduled partial unbond, paid out once `maturity_time` is reached.
#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct BondReduction<C: Context> {
    pub id: u64,
    pub sequencer_address: C::Address,
    pub amount: Amount,
    pub maturity_time: Timestamp,
}
