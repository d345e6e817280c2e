//! Defines queries exposed by the sequencer module, along with the relevant types
use anyhow::Result;
use hub_modules_api::{Context, WorkingSet};
use serde::{Deserialize, Serialize};

use crate::types::{BondReduction, OperatingStatus, RollappId, Sequencer};
use crate::{Params, SequencerRegistry};

/// Structure returned by the `sequencer` and `sequencer_by_dymint_addr` queries.
#[derive(Debug, PartialEq, Deserialize, Serialize, Clone)]
#[serde(bound = "")]
pub struct SequencerResponse<C: Context> {
    pub sequencer: Option<Sequencer<C>>,
}

#[derive(Debug, PartialEq, Deserialize, Serialize, Clone)]
#[serde(bound = "")]
pub struct SequencersResponse<C: Context> {
    pub sequencers: Vec<Sequencer<C>>,
}

/// Structure returned by the `proposer` and `successor` queries. `None` when the
/// slot is empty.
#[derive(Debug, PartialEq, Deserialize, Serialize, Clone)]
#[serde(bound = "")]
pub struct PointerResponse<C: Context> {
    pub rollapp_id: RollappId,
    pub address: Option<C::Address>,
}

#[derive(Debug, PartialEq, Deserialize, Serialize, Clone)]
#[serde(bound = "")]
pub struct ProposersResponse<C: Context> {
    pub proposers: Vec<PointerResponse<C>>,
}

#[derive(Debug, PartialEq, Deserialize, Serialize, Clone)]
#[serde(bound = "")]
pub struct BondReductionsResponse<C: Context> {
    pub reductions: Vec<BondReduction<C>>,
}

impl<C: Context> SequencerRegistry<C> {
    pub fn sequencer(
        &self,
        address: C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> SequencerResponse<C> {
        SequencerResponse {
            sequencer: self.get_real(&address, working_set).ok(),
        }
    }

    /// Sequencers of a rollapp, optionally only those with the given status.
    pub fn sequencers_by_rollapp(
        &self,
        rollapp_id: RollappId,
        status: Option<OperatingStatus>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> SequencersResponse<C> {
        let sequencers = match status {
            Some(status) => self.list_by_rollapp_and_status(&rollapp_id, status, working_set),
            None => self.list_by_rollapp(&rollapp_id, working_set),
        };
        SequencersResponse { sequencers }
    }

    pub fn sequencer_by_dymint_addr(
        &self,
        dymint_addr: Vec<u8>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> SequencerResponse<C> {
        SequencerResponse {
            sequencer: self.get_by_dymint_addr(&dymint_addr, working_set),
        }
    }

    pub fn proposer(
        &self,
        rollapp_id: RollappId,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> PointerResponse<C> {
        let address = self
            .find_proposer(&rollapp_id, working_set)
            .map(|proposer| proposer.address);
        PointerResponse {
            rollapp_id,
            address,
        }
    }

    pub fn successor(
        &self,
        rollapp_id: RollappId,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> PointerResponse<C> {
        let address = self
            .find_successor(&rollapp_id, working_set)
            .map(|successor| successor.address);
        PointerResponse {
            rollapp_id,
            address,
        }
    }

    pub fn proposers(&self, working_set: &mut WorkingSet<C::Storage>) -> ProposersResponse<C> {
        ProposersResponse {
            proposers: self
                .all_proposers(working_set)
                .into_iter()
                .map(|(rollapp_id, proposer)| PointerResponse {
                    rollapp_id,
                    address: Some(proposer.address),
                })
                .collect(),
        }
    }

    pub fn bond_reductions(
        &self,
        address: C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> BondReductionsResponse<C> {
        BondReductionsResponse {
            reductions: self.pending_bond_reductions(&address, working_set),
        }
    }

    pub fn query_params(&self, working_set: &mut WorkingSet<C::Storage>) -> Result<Params<C>> {
        self.params(working_set)
    }
}
