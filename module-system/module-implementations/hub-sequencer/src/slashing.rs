//! Liveness slashing, kicking and fraud punishment.

use anyhow::{Context as _, Result};
use hub_bank::Amount;
use hub_modules_api::{Context, WorkingSet};

use crate::bonding::ensure_active;
use crate::error::SequencerError;
use crate::event::SequencerEvent;
use crate::types::{OperatingStatus, Sequencer};
use crate::SequencerRegistry;

impl<C: Context> SequencerRegistry<C> {
    /// Burns part of the proposer's bond for a liveness failure and adds
    /// dishonor. Does nothing when the rollapp has no proposer.
    pub fn slash_liveness(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        working_set.with_revertable(|working_set| self.slash_proposer(rollapp_id, working_set))
    }

    fn slash_proposer(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let Some(mut proposer) = self.find_proposer(rollapp_id, working_set) else {
            return Ok(());
        };
        let params = self.params(working_set)?;
        let proportional = params
            .liveness_slash_min_multiplier
            .mul_floor(proposer.tokens);
        let amount = proposer
            .tokens
            .min(params.liveness_slash_min_absolute.max(proportional));

        self.burn(amount, working_set)
            .with_context(|| format!("Failed to slash {}", proposer.address))?;
        proposer.tokens -= amount;
        proposer.dishonor = proposer.dishonor.saturating_add(params.dishonor_liveness);
        self.set_sequencer(&proposer, working_set)?;

        tracing::info!(
            sequencer = %proposer.address,
            %rollapp_id,
            amount,
            dishonor = proposer.dishonor,
            "Proposer slashed for liveness"
        );
        SequencerEvent::LivenessSlashed {
            sequencer: proposer.address.to_string(),
            rollapp_id: rollapp_id.to_owned(),
            amount,
            dishonor: proposer.dishonor,
        }
        .emit(working_set);
        Ok(())
    }

    /// Whether anyone may kick `proposer`.
    pub fn kickable(
        &self,
        proposer: &Sequencer<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<bool> {
        if proposer.is_sentinel() {
            return Ok(false);
        }
        let threshold = self.params(working_set)?.dishonor_kick_threshold;
        Ok(proposer.dishonor >= threshold)
    }

    /// Removes a dishonored proposer on behalf of `kicker`, a sequencer of the
    /// same rollapp, which becomes the new proposer.
    pub fn kick_proposer(
        &self,
        kicker: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        working_set.with_revertable(|working_set| self.kick(kicker, working_set))
    }

    fn kick(&self, kicker: &C::Address, working_set: &mut WorkingSet<C::Storage>) -> Result<()> {
        let kicker = self.get_real(kicker, working_set)?;
        ensure_active(&kicker)?;
        let rollapp_id = kicker.rollapp_id.clone();

        let mut proposer = self.get_proposer(&rollapp_id, working_set);
        if proposer.address == kicker.address {
            return Err(SequencerError::ProposerNotKickable(
                "the proposer cannot kick itself".to_owned(),
            )
            .into());
        }
        if !self.kickable(&proposer, working_set)? {
            return Err(SequencerError::ProposerNotKickable(format!(
                "proposer {} of {rollapp_id} is below the dishonor threshold",
                proposer.address
            ))
            .into());
        }

        self.clear_proposer(&rollapp_id, working_set);
        self.drop_successor(&rollapp_id, working_set)?;
        self.force_unbond(&mut proposer, working_set)
            .context("Failed to refund the kicked proposer")?;
        self.opt_out_all(&rollapp_id, working_set)?;

        for hooks in &self.hooks {
            hooks
                .after_kick_proposer(&proposer, working_set)
                .context("Kick proposer hook failed")?;
            hooks
                .on_hard_fork(&rollapp_id, working_set)
                .context("Hard fork hook failed")?;
        }

        let mut kicker = self.get_real(&kicker.address, working_set)?;
        kicker.opted_in = true;
        self.set_sequencer(&kicker, working_set)?;
        self.recover_from_sentinel(&rollapp_id, working_set)?;

        tracing::info!(
            %rollapp_id,
            proposer = %proposer.address,
            kicker = %kicker.address,
            "Proposer kicked"
        );
        SequencerEvent::ProposerKicked {
            rollapp_id,
            proposer: proposer.address.to_string(),
            kicker: kicker.address.to_string(),
        }
        .emit(working_set);
        Ok(())
    }

    /// Punishes a sequencer for proven fraud: it is jailed and its whole bond is
    /// forfeited. `rewardee` receives the configured share, the rest is burned.
    /// A fraudulent proposer also triggers a hard fork of its rollapp.
    ///
    /// Punishing a jailed sequencer with no tokens left does nothing.
    pub fn handle_fraud(
        &self,
        address: &C::Address,
        rewardee: Option<&C::Address>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        working_set.with_revertable(|working_set| self.punish(address, rewardee, working_set))
    }

    fn punish(
        &self,
        address: &C::Address,
        rewardee: Option<&C::Address>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let mut sequencer = self.get_real(address, working_set)?;
        if sequencer.jailed && sequencer.tokens == 0 {
            return Ok(());
        }
        let rollapp_id = sequencer.rollapp_id.clone();
        let was_proposer = self.is_proposer(&sequencer, working_set);

        if was_proposer {
            self.clear_proposer(&rollapp_id, working_set);
            self.drop_successor(&rollapp_id, working_set)?;
        } else if self.is_successor(&sequencer, working_set) {
            self.clear_successor(&rollapp_id, working_set);
        }

        let forfeited = sequencer.tokens;
        let reward = match rewardee {
            Some(_) => self
                .params(working_set)?
                .fraud_reward_multiplier
                .mul_floor(forfeited),
            None => 0,
        };
        if let Some(rewardee) = rewardee {
            self.reward(rewardee, reward, working_set)?;
        }
        let burned: Amount = forfeited - reward;
        self.burn(burned, working_set)?;

        sequencer.tokens = 0;
        sequencer.jailed = true;
        sequencer.status = OperatingStatus::Unbonded;
        sequencer.opted_in = false;
        self.clear_notice(&mut sequencer, working_set);
        self.cancel_bond_reductions(&sequencer.address, working_set);
        self.set_sequencer(&sequencer, working_set)?;

        if was_proposer {
            self.opt_out_all(&rollapp_id, working_set)?;
            for hooks in &self.hooks {
                hooks
                    .on_hard_fork(&rollapp_id, working_set)
                    .context("Hard fork hook failed")?;
            }
        }

        tracing::info!(
            sequencer = %address,
            %rollapp_id,
            reward,
            burned,
            was_proposer,
            "Sequencer punished"
        );
        SequencerEvent::Punished {
            sequencer: address.to_string(),
            rollapp_id,
            rewardee: rewardee.map(ToString::to_string),
            reward,
            burned,
        }
        .emit(working_set);
        Ok(())
    }

    /// Opts out every bonded sequencer of the rollapp.
    fn opt_out_all(&self, rollapp_id: &str, working_set: &mut WorkingSet<C::Storage>) -> Result<()> {
        let bonded =
            self.list_by_rollapp_and_status(rollapp_id, OperatingStatus::Bonded, working_set);
        for mut sequencer in bonded.into_iter().filter(|s| s.opted_in) {
            sequencer.opted_in = false;
            self.set_sequencer(&sequencer, working_set)?;
        }
        Ok(())
    }
}
