//! Per-rollapp proposer and successor pointers.

use anyhow::Result;
use hub_modules_api::{Context, WorkingSet};

use crate::election::choose_proposer;
use crate::event::SequencerEvent;
use crate::types::{sentinel_address, OperatingStatus, RollappId, Sequencer};
use crate::SequencerRegistry;

impl<C: Context> SequencerRegistry<C> {
    /// The rollapp's proposer, or the sentinel when it has none.
    pub fn get_proposer(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Sequencer<C> {
        match self.proposers.get(rollapp_id, working_set) {
            Some(address) => self.get(&address, working_set),
            None => Sequencer::sentinel(),
        }
    }

    /// The rollapp's successor, or the sentinel when none is chosen.
    pub fn get_successor(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Sequencer<C> {
        match self.successors.get(rollapp_id, working_set) {
            Some(address) => self.get(&address, working_set),
            None => Sequencer::sentinel(),
        }
    }

    pub fn find_proposer(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Option<Sequencer<C>> {
        Some(self.get_proposer(rollapp_id, working_set)).filter(|s| !s.is_sentinel())
    }

    pub fn find_successor(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Option<Sequencer<C>> {
        Some(self.get_successor(rollapp_id, working_set)).filter(|s| !s.is_sentinel())
    }

    pub fn is_proposer(
        &self,
        sequencer: &Sequencer<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> bool {
        !sequencer.is_sentinel()
            && self.get_proposer(&sequencer.rollapp_id, working_set).address == sequencer.address
    }

    pub fn is_successor(
        &self,
        sequencer: &Sequencer<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> bool {
        !sequencer.is_sentinel()
            && self.get_successor(&sequencer.rollapp_id, working_set).address == sequencer.address
    }

    pub(crate) fn set_proposer(
        &self,
        rollapp_id: &str,
        address: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) {
        self.proposers.set(rollapp_id, address, working_set);
    }

    pub(crate) fn set_successor(
        &self,
        rollapp_id: &str,
        address: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) {
        self.successors.set(rollapp_id, address, working_set);
    }

    pub(crate) fn clear_proposer(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) {
        self.set_proposer(rollapp_id, &sentinel_address::<C>(), working_set);
    }

    pub(crate) fn clear_successor(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) {
        self.set_successor(rollapp_id, &sentinel_address::<C>(), working_set);
    }

    /// Clears the successor pointer together with any notice the successor gave.
    pub(crate) fn drop_successor(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let mut successor = self.get_successor(rollapp_id, working_set);
        self.clear_successor(rollapp_id, working_set);
        if !successor.is_sentinel() && successor.is_noticed() {
            self.clear_notice(&mut successor, working_set);
            self.set_sequencer(&successor, working_set)?;
        }
        Ok(())
    }

    /// Every rollapp with a proposer, as `(rollapp, proposer)`.
    pub fn all_proposers(
        &self,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Vec<(RollappId, Sequencer<C>)> {
        self.proposers
            .iter(working_set)
            .into_iter()
            .map(|(rollapp_id, address)| (rollapp_id, self.get(&address, working_set)))
            .filter(|(_, proposer)| !proposer.is_sentinel())
            .collect()
    }

    /// Runs the proposer choice over the rollapp's bonded sequencers, skipping `exclude`.
    pub(crate) fn elect(
        &self,
        rollapp_id: &str,
        exclude: Option<&C::Address>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Option<Sequencer<C>> {
        let bonded =
            self.list_by_rollapp_and_status(rollapp_id, OperatingStatus::Bonded, working_set);
        choose_proposer(&bonded, exclude).cloned()
    }

    /// Elects a proposer if the rollapp currently has none. Does nothing when
    /// there is a proposer or no eligible sequencer.
    pub(crate) fn recover_from_sentinel(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        if !self.get_proposer(rollapp_id, working_set).is_sentinel() {
            return Ok(());
        }
        let Some(proposer) = self.elect(rollapp_id, None, working_set) else {
            tracing::debug!(%rollapp_id, "No eligible sequencer to recover the proposer");
            return Ok(());
        };
        self.set_proposer(rollapp_id, &proposer.address, working_set);
        // The new proposer cannot also be the successor.
        if self.get_successor(rollapp_id, working_set).address == proposer.address {
            self.clear_successor(rollapp_id, working_set);
        }
        tracing::info!(%rollapp_id, proposer = %proposer.address, "Proposer elected");
        SequencerEvent::ProposerChanged {
            rollapp_id: rollapp_id.to_owned(),
            proposer: proposer.address.to_string(),
        }
        .emit(working_set);
        Ok(())
    }
}
