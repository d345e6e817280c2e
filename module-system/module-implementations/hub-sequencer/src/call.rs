use anyhow::{Context as _, Result};
use hub_bank::Coins;
use hub_modules_api::{CallResponse, Context, WorkingSet};

use crate::bonding::{ensure_active, normalize_relayers, Registration};
use crate::error::SequencerError;
use crate::event::SequencerEvent;
use crate::metadata::SequencerMetadata;
use crate::params::Params;
use crate::SequencerRegistry;

/// This enumeration represents the available call messages for interacting with
/// the sequencer module. Every message acts on the sender's own sequencer unless
/// stated otherwise.
#[cfg_attr(
    feature = "native",
    derive(serde::Serialize),
    derive(serde::Deserialize),
    derive(schemars::JsonSchema),
    schemars(bound = "C::Address: ::schemars::JsonSchema", rename = "CallMessage"),
    serde(bound = "C::Address: serde::Serialize + serde::de::DeserializeOwned")
)]
#[derive(borsh::BorshDeserialize, borsh::BorshSerialize, Debug, PartialEq, Clone)]
pub enum CallMessage<C: Context> {
    /// Registers the sender as a sequencer and escrows its bond.
    CreateSequencer(Registration<C>),

    /// Replaces the sequencer's metadata.
    UpdateSequencerInformation { metadata: SequencerMetadata },

    UpdateRewardAddress { reward_addr: C::Address },

    /// Replaces the set of relayers allowed to act for the sequencer.
    UpdateWhitelistedRelayers { relayers: Vec<C::Address> },

    /// Makes the sequencer eligible, or not, to be elected proposer or successor.
    UpdateOptInStatus { opted_in: bool },

    IncreaseBond { amount: Coins<C> },

    /// Schedules a bond decrease, paid out after the unbonding time.
    DecreaseBond { amount: Coins<C> },

    /// Leaves the rollapp. The proposer and the successor serve a notice period first.
    Unbond,

    /// Replaces a dishonored proposer with the sender.
    KickProposer,

    /// Authority only.
    UpdateParams { params: Params<C> },

    /// Authority only. Punishes `sequencer` for fraud.
    PunishSequencer {
        sequencer: C::Address,
        rewardee: Option<C::Address>,
    },
}

impl<C: Context> SequencerRegistry<C> {
    pub(crate) fn dispatch(
        &self,
        msg: CallMessage<C>,
        context: &C,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<CallResponse> {
        let sender = context.sender();
        match msg {
            CallMessage::CreateSequencer(registration) => {
                self.register(sender, registration, working_set)
                    .context("Failed to create sequencer")?;
            }
            CallMessage::UpdateSequencerInformation { metadata } => {
                self.update_metadata(sender, metadata, working_set)?;
            }
            CallMessage::UpdateRewardAddress { reward_addr } => {
                self.update_reward_address(sender, reward_addr, working_set)?;
            }
            CallMessage::UpdateWhitelistedRelayers { relayers } => {
                self.update_whitelisted_relayers(sender, relayers, working_set)?;
            }
            CallMessage::UpdateOptInStatus { opted_in } => {
                self.update_opt_in_status(sender, opted_in, working_set)?;
            }
            CallMessage::IncreaseBond { amount } => {
                self.ensure_bond_denom(&amount, working_set)?;
                self.increase_bond(sender, amount.amount, working_set)
                    .context("Failed to increase bond")?;
            }
            CallMessage::DecreaseBond { amount } => {
                self.ensure_bond_denom(&amount, working_set)?;
                self.decrease_bond(sender, amount.amount, context.block_time(), working_set)
                    .context("Failed to decrease bond")?;
            }
            CallMessage::Unbond => {
                self.unbond(
                    sender,
                    context.block_height(),
                    context.block_time(),
                    working_set,
                )
                .context("Failed to unbond")?;
            }
            CallMessage::KickProposer => {
                self.kick_proposer(sender, working_set)
                    .context("Failed to kick proposer")?;
            }
            CallMessage::UpdateParams { params } => {
                self.update_params(sender, params, working_set)?;
            }
            CallMessage::PunishSequencer {
                sequencer,
                rewardee,
            } => {
                self.ensure_authority(sender, working_set)?;
                self.handle_fraud(&sequencer, rewardee.as_ref(), working_set)
                    .with_context(|| format!("Failed to punish {sequencer}"))?;
            }
        }
        Ok(CallResponse::default())
    }

    fn ensure_bond_denom(
        &self,
        coins: &Coins<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let params = self.params(working_set)?;
        if &coins.token_address != params.bond_token() {
            return Err(SequencerError::InvalidDenom {
                expected: params.bond_token().to_string(),
                got: coins.token_address.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn ensure_authority(
        &self,
        sender: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let authority = self
            .authority
            .get_or_err(working_set)
            .context("Sequencer authority is not initialized")?;
        if &authority != sender {
            return Err(SequencerError::Unauthorized(sender.to_string()).into());
        }
        Ok(())
    }

    pub(crate) fn update_metadata(
        &self,
        address: &C::Address,
        metadata: SequencerMetadata,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let mut sequencer = self.get_real(address, working_set)?;
        if sequencer.jailed {
            return Err(SequencerError::Jailed(address.to_string()).into());
        }
        let rollapp = self
            .rollapps
            .get_rollapp(&sequencer.rollapp_id, working_set)
            .ok_or_else(|| SequencerError::RollappNotFound(sequencer.rollapp_id.clone()))?;
        metadata.validate(rollapp.vm_type)?;

        sequencer.metadata = metadata;
        self.set_sequencer(&sequencer, working_set)?;
        SequencerEvent::MetadataUpdated {
            sequencer: address.to_string(),
        }
        .emit(working_set);
        Ok(())
    }

    pub(crate) fn update_reward_address(
        &self,
        address: &C::Address,
        reward_addr: C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let mut sequencer = self.get_real(address, working_set)?;
        sequencer.reward_addr = reward_addr;
        self.set_sequencer(&sequencer, working_set)?;
        SequencerEvent::RewardAddressUpdated {
            sequencer: address.to_string(),
            reward_addr: sequencer.reward_addr.to_string(),
        }
        .emit(working_set);
        Ok(())
    }

    pub(crate) fn update_whitelisted_relayers(
        &self,
        address: &C::Address,
        relayers: Vec<C::Address>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let mut sequencer = self.get_real(address, working_set)?;
        sequencer.whitelisted_relayers = normalize_relayers(relayers)?;
        self.set_sequencer(&sequencer, working_set)?;
        SequencerEvent::RelayersUpdated {
            sequencer: address.to_string(),
            relayers: sequencer
                .whitelisted_relayers
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
        .emit(working_set);
        Ok(())
    }

    pub(crate) fn update_opt_in_status(
        &self,
        address: &C::Address,
        opted_in: bool,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let mut sequencer = self.get_real(address, working_set)?;
        ensure_active(&sequencer)?;
        if self.is_proposer(&sequencer, working_set) || self.is_successor(&sequencer, working_set)
        {
            return Err(SequencerError::ProposerOrSuccessor.into());
        }

        sequencer.opted_in = opted_in;
        self.set_sequencer(&sequencer, working_set)?;
        SequencerEvent::OptInUpdated {
            sequencer: address.to_string(),
            opted_in,
        }
        .emit(working_set);

        if opted_in {
            self.recover_from_sentinel(&sequencer.rollapp_id, working_set)?;
        }
        Ok(())
    }

    pub(crate) fn update_params(
        &self,
        sender: &C::Address,
        params: Params<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        self.ensure_authority(sender, working_set)?;
        params.validate()?;
        let current = self.params(working_set)?;
        if params.bond_token() != current.bond_token() {
            return Err(SequencerError::InvalidParams(
                "the bond denomination cannot change".to_owned(),
            )
            .into());
        }
        self.params.set(&params, working_set);
        tracing::info!("Sequencer params updated");
        SequencerEvent::ParamsUpdated.emit(working_set);
        Ok(())
    }
}
