//! The notice-period rotation protocol.
//!
//! A proposer that wants to leave gives notice. Once the notice period has
//! elapsed a successor is chosen, and the proposer's last block hands the
//! rollapp over to it.

use anyhow::{Context as _, Result};
use hub_modules_api::{Context, Timestamp, WorkingSet};

use crate::error::SequencerError;
use crate::event::SequencerEvent;
use crate::types::Sequencer;
use crate::SequencerRegistry;

/// Result of a proposer's last block.
#[derive(Debug, Clone, PartialEq)]
pub enum RotationOutcome<C: Context> {
    /// The successor took over.
    Rotated { new_proposer: C::Address },
    /// Nobody was eligible. The rollapp has no proposer until a sequencer
    /// registers or opts in.
    ProposerVacated,
}

impl<C: Context> SequencerRegistry<C> {
    /// Handles an unbond request. The proposer and the successor start their
    /// notice period and the returned time is when it ends. Anyone else is
    /// unbonded right away and `None` is returned.
    pub fn unbond(
        &self,
        address: &C::Address,
        height: u64,
        now: Timestamp,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Option<Timestamp>> {
        working_set
            .with_revertable(|working_set| self.request_unbond(address, height, now, working_set))
    }

    fn request_unbond(
        &self,
        address: &C::Address,
        height: u64,
        now: Timestamp,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Option<Timestamp>> {
        let mut sequencer = self.get_real(address, working_set)?;
        if !sequencer.is_bonded() {
            return Err(SequencerError::NotBonded(address.to_string()).into());
        }
        if sequencer.unbond_request_height == 0 {
            sequencer.unbond_request_height = height;
        }

        let is_proposer = self.is_proposer(&sequencer, working_set);
        if !is_proposer && !self.is_successor(&sequencer, working_set) {
            let tokens = sequencer.tokens;
            self.try_unbond(&mut sequencer, tokens, working_set)?;
            return Ok(None);
        }

        // Before launch there are no blocks to hand over.
        let launched = self
            .rollapps
            .get_rollapp(&sequencer.rollapp_id, working_set)
            .map_or(true, |rollapp| rollapp.launched);
        let no_successor = self
            .get_successor(&sequencer.rollapp_id, working_set)
            .is_sentinel();
        if is_proposer && !launched && no_successor {
            let rollapp_id = sequencer.rollapp_id.clone();
            self.clear_proposer(&rollapp_id, working_set);
            let tokens = sequencer.tokens;
            self.try_unbond(&mut sequencer, tokens, working_set)?;
            self.recover_from_sentinel(&rollapp_id, working_set)?;
            return Ok(None);
        }

        self.start_notice(&mut sequencer, now, working_set).map(Some)
    }

    /// Starts the notice period of a proposer or successor. Repeated requests
    /// keep the original end time.
    pub(crate) fn start_notice(
        &self,
        sequencer: &mut Sequencer<C>,
        now: Timestamp,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Timestamp> {
        if sequencer.is_noticed() {
            self.set_sequencer(sequencer, working_set)?;
            return Ok(sequencer.notice_period_time);
        }
        let notice_period = self.params(working_set)?.notice_period;
        let ends_at = now.plus_secs(notice_period);
        sequencer.notice_period_time = ends_at;
        self.notice_queue
            .push(ends_at, &sequencer.address, &sequencer.rollapp_id, working_set);
        self.set_sequencer(sequencer, working_set)?;

        tracing::info!(
            sequencer = %sequencer.address,
            rollapp_id = %sequencer.rollapp_id,
            %ends_at,
            "Notice period started"
        );
        SequencerEvent::NoticeStarted {
            sequencer: sequencer.address.to_string(),
            rollapp_id: sequencer.rollapp_id.clone(),
            ends_at,
        }
        .emit(working_set);
        Ok(ends_at)
    }

    /// Takes the sequencer out of the notice queue. The caller persists it.
    pub(crate) fn clear_notice(
        &self,
        sequencer: &mut Sequencer<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) {
        if sequencer.is_noticed() {
            self.notice_queue
                .remove(sequencer.notice_period_time, &sequencer.address, working_set);
            sequencer.notice_period_time = Timestamp::ZERO;
        }
    }

    /// Per-block processing: matures notice periods, then bond reductions.
    pub fn end_block(&self, now: Timestamp, working_set: &mut WorkingSet<C::Storage>) {
        self.handle_notice_periods(now, working_set);
        self.handle_bond_reduction(now, working_set);
    }

    /// Chooses successors for proposers whose notice period has elapsed.
    /// A successor's own notice stays queued until it becomes the proposer.
    pub fn handle_notice_periods(
        &self,
        now: Timestamp,
        working_set: &mut WorkingSet<C::Storage>,
    ) {
        for (ends_at, address, rollapp_id) in self.notice_queue.due(now, working_set) {
            let result = working_set.with_revertable(|working_set| {
                self.mature_notice(ends_at, &address, &rollapp_id, working_set)
            });
            if let Err(err) = result {
                tracing::error!(
                    sequencer = %address,
                    %rollapp_id,
                    error = ?err,
                    "Failed to process elapsed notice period"
                );
            }
        }
    }

    fn mature_notice(
        &self,
        ends_at: Timestamp,
        address: &C::Address,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let mut sequencer = self.get(address, working_set);
        let stale = sequencer.is_sentinel() || sequencer.notice_period_time != ends_at;

        if !stale && self.is_proposer(&sequencer, working_set) {
            self.notice_queue.remove(ends_at, address, working_set);
            return self.choose_successor(rollapp_id, address, working_set);
        }
        if !stale && self.is_successor(&sequencer, working_set) {
            return Ok(());
        }

        self.notice_queue.remove(ends_at, address, working_set);
        if !stale {
            sequencer.notice_period_time = Timestamp::ZERO;
            self.set_sequencer(&sequencer, working_set)?;
        }
        tracing::debug!(sequencer = %address, %rollapp_id, "Dropped stale notice entry");
        Ok(())
    }

    fn choose_successor(
        &self,
        rollapp_id: &str,
        proposer: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        if !self.get_successor(rollapp_id, working_set).is_sentinel() {
            return Ok(());
        }
        match self.elect(rollapp_id, Some(proposer), working_set) {
            Some(successor) => {
                self.set_successor(rollapp_id, &successor.address, working_set);
                tracing::info!(%rollapp_id, successor = %successor.address, "Successor chosen");
                SequencerEvent::SuccessorChosen {
                    rollapp_id: rollapp_id.to_owned(),
                    successor: successor.address.to_string(),
                }
                .emit(working_set);
            }
            None => {
                tracing::warn!(%rollapp_id, "Notice period elapsed but no successor is eligible");
            }
        }
        Ok(())
    }

    /// Called by the rollapp layer before it accepts a state update from
    /// `sequencer`. Returns the rotation outcome when `is_last_block` is set.
    pub fn before_update_state(
        &self,
        rollapp_id: &str,
        sequencer: &C::Address,
        is_last_block: bool,
        now: Timestamp,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Option<RotationOutcome<C>>> {
        let proposer = self.get_proposer(rollapp_id, working_set);
        if proposer.is_sentinel() || &proposer.address != sequencer {
            return Err(SequencerError::NotProposer {
                sequencer: sequencer.to_string(),
                rollapp_id: rollapp_id.to_owned(),
            }
            .into());
        }
        if !is_last_block {
            return Ok(None);
        }
        if !proposer.notice_elapsed(now) {
            return Err(SequencerError::NoticeNotElapsed {
                sequencer: sequencer.to_string(),
                ends_at: proposer.notice_period_time,
                now,
            }
            .into());
        }
        working_set
            .with_revertable(|working_set| self.complete_rotation(rollapp_id, proposer, working_set))
            .with_context(|| format!("Failed to rotate the proposer of {rollapp_id}"))
            .map(Some)
    }

    fn complete_rotation(
        &self,
        rollapp_id: &str,
        mut old_proposer: Sequencer<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<RotationOutcome<C>> {
        if !old_proposer.is_bonded() {
            return Err(SequencerError::Internal(format!(
                "proposer {} of {rollapp_id} is not bonded",
                old_proposer.address
            ))
            .into());
        }

        let successor = match self.find_successor(rollapp_id, working_set) {
            Some(successor) => Some(successor),
            // Someone may have become eligible since the notice period elapsed.
            None => self.elect(rollapp_id, Some(&old_proposer.address), working_set),
        };
        let new_proposer = successor.unwrap_or_else(Sequencer::sentinel);
        self.set_proposer(rollapp_id, &new_proposer.address, working_set);
        self.clear_successor(rollapp_id, working_set);

        let tokens = old_proposer.tokens;
        self.try_unbond(&mut old_proposer, tokens, working_set)?;

        for hooks in &self.hooks {
            hooks.after_rotation(rollapp_id, &old_proposer, &new_proposer, working_set)?;
        }

        SequencerEvent::RotationCompleted {
            rollapp_id: rollapp_id.to_owned(),
            old_proposer: old_proposer.address.to_string(),
            new_proposer: new_proposer.address.to_string(),
        }
        .emit(working_set);

        if new_proposer.is_sentinel() {
            tracing::warn!(
                %rollapp_id,
                old_proposer = %old_proposer.address,
                "Rollapp left without a proposer"
            );
            return Ok(RotationOutcome::ProposerVacated);
        }
        tracing::info!(
            %rollapp_id,
            old_proposer = %old_proposer.address,
            new_proposer = %new_proposer.address,
            "Proposer rotated"
        );
        SequencerEvent::ProposerChanged {
            rollapp_id: rollapp_id.to_owned(),
            proposer: new_proposer.address.to_string(),
        }
        .emit(working_set);
        Ok(RotationOutcome::Rotated {
            new_proposer: new_proposer.address,
        })
    }
}
