use anyhow::{bail, Context as _, Result};
use hub_modules_api::{Context, Timestamp, WorkingSet};
use serde::{Deserialize, Serialize};

use crate::bonding::normalize_relayers;
use crate::params::Params;
use crate::types::{BondReduction, RollappId, Sequencer};
use crate::SequencerRegistry;

/// A proposer or successor assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct RollappPointer<C: Context> {
    pub rollapp_id: RollappId,
    pub address: C::Address,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct NoticeEntry<C: Context> {
    pub sequencer: C::Address,
    pub rollapp_id: RollappId,
    pub ends_at: Timestamp,
}

/// Initial configuration of the sequencer module, and the format of its
/// exported state. The bonds of `sequencers` must already be held by the
/// module account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SequencerConfig<C: Context> {
    pub params: Params<C>,
    /// Account allowed to update params and punish sequencers.
    pub authority: C::Address,
    #[serde(default)]
    pub sequencers: Vec<Sequencer<C>>,
    #[serde(default)]
    pub proposers: Vec<RollappPointer<C>>,
    #[serde(default)]
    pub successors: Vec<RollappPointer<C>>,
    #[serde(default)]
    pub notice_queue: Vec<NoticeEntry<C>>,
    #[serde(default)]
    pub bond_reductions: Vec<BondReduction<C>>,
}

impl<C: Context> SequencerConfig<C> {
    /// A config with no sequencers.
    pub fn new(params: Params<C>, authority: C::Address) -> Self {
        Self {
            params,
            authority,
            sequencers: Vec::new(),
            proposers: Vec::new(),
            successors: Vec::new(),
            notice_queue: Vec::new(),
            bond_reductions: Vec::new(),
        }
    }
}

impl<C: Context> SequencerRegistry<C> {
    pub(crate) fn init_module(
        &self,
        config: &SequencerConfig<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        config.params.validate().context("Invalid genesis params")?;
        self.params.set(&config.params, working_set);
        self.authority.set(&config.authority, working_set);

        for sequencer in &config.sequencers {
            if sequencer.jailed && sequencer.is_bonded() {
                bail!("Genesis sequencer {} is jailed but bonded", sequencer.address);
            }
            let mut sequencer = sequencer.clone();
            sequencer.whitelisted_relayers = normalize_relayers(sequencer.whitelisted_relayers)?;
            if self.sequencers.contains(&sequencer.address, working_set) {
                bail!("Duplicate genesis sequencer {}", sequencer.address);
            }
            self.set_sequencer(&sequencer, working_set)
                .with_context(|| format!("Failed to import sequencer {}", sequencer.address))?;
        }

        for pointer in &config.proposers {
            self.check_pointer(pointer, working_set)?;
            self.set_proposer(&pointer.rollapp_id, &pointer.address, working_set);
        }
        for pointer in &config.successors {
            self.check_pointer(pointer, working_set)?;
            self.set_successor(&pointer.rollapp_id, &pointer.address, working_set);
        }

        for entry in &config.notice_queue {
            let sequencer = self.get_real(&entry.sequencer, working_set)?;
            if sequencer.notice_period_time != entry.ends_at {
                bail!(
                    "Notice entry of {} ends at {}, sequencer notice ends at {}",
                    entry.sequencer,
                    entry.ends_at,
                    sequencer.notice_period_time
                );
            }
            self.notice_queue
                .push(entry.ends_at, &entry.sequencer, &entry.rollapp_id, working_set);
        }
        // Only a proposer whose notice already matured has left the queue.
        for sequencer in config.sequencers.iter().filter(|s| s.is_noticed()) {
            let queued = config
                .notice_queue
                .iter()
                .any(|entry| entry.sequencer == sequencer.address);
            if !queued && !self.is_proposer(sequencer, working_set) {
                bail!(
                    "Genesis sequencer {} is in notice until {} but has no notice entry",
                    sequencer.address,
                    sequencer.notice_period_time
                );
            }
        }

        let mut next_id = 0;
        for reduction in &config.bond_reductions {
            self.get_real(&reduction.sequencer_address, working_set)?;
            self.bond_reductions
                .push(reduction.maturity_time, &reduction.id, reduction, working_set);
            self.reductions_by_sequencer.set(
                &(reduction.sequencer_address.clone(), reduction.id),
                &reduction.maturity_time,
                working_set,
            );
            next_id = next_id.max(reduction.id + 1);
        }
        self.next_reduction_id.set(&next_id, working_set);

        tracing::info!(
            sequencers = config.sequencers.len(),
            proposers = config.proposers.len(),
            "Sequencer module initialized"
        );
        Ok(())
    }

    fn check_pointer(
        &self,
        pointer: &RollappPointer<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let sequencer = self.get_real(&pointer.address, working_set)?;
        if sequencer.rollapp_id != pointer.rollapp_id {
            bail!(
                "Sequencer {} belongs to {}, not {}",
                pointer.address,
                sequencer.rollapp_id,
                pointer.rollapp_id
            );
        }
        if !sequencer.is_bonded() {
            bail!("Sequencer {} is not bonded", pointer.address);
        }
        Ok(())
    }

    /// Exports the full module state in the genesis format.
    pub fn export_genesis(
        &self,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<SequencerConfig<C>> {
        let params = self.params(working_set)?;
        let authority = self
            .authority
            .get_or_err(working_set)
            .context("Sequencer authority is not initialized")?;

        let pointers = |entries: Vec<(RollappId, C::Address)>| -> Vec<RollappPointer<C>> {
            entries
                .into_iter()
                .filter(|(_, address)| !crate::types::is_sentinel_address::<C>(address))
                .map(|(rollapp_id, address)| RollappPointer {
                    rollapp_id,
                    address,
                })
                .collect()
        };
        let proposers = pointers(self.proposers.iter(working_set));
        let successors = pointers(self.successors.iter(working_set));

        let notice_queue = self
            .notice_queue
            .iter(working_set)
            .into_iter()
            .map(|(ends_at, sequencer, rollapp_id)| NoticeEntry {
                sequencer,
                rollapp_id,
                ends_at,
            })
            .collect();
        let bond_reductions = self
            .bond_reductions
            .iter(working_set)
            .into_iter()
            .map(|(_, _, reduction)| reduction)
            .collect();

        Ok(SequencerConfig {
            params,
            authority,
            sequencers: self.list_all(working_set),
            proposers,
            successors,
            notice_queue,
            bond_reductions,
        })
    }
}
