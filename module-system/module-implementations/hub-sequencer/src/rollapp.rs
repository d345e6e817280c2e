//! The rollapp registry as seen from the sequencer module.

use borsh::{BorshDeserialize, BorshSerialize};
use hub_bank::Amount;
use hub_modules_api::{Context, WorkingSet};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[cfg_attr(feature = "native", derive(schemars::JsonSchema))]
pub enum VmType {
    Evm,
    Wasm,
}

/// The parts of a rollapp registration the sequencer module depends on.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Rollapp {
    pub rollapp_id: String,
    pub vm_type: VmType,
    pub launched: bool,
    /// Comma-separated addresses allowed to register before launch, or `*` for anyone.
    pub initial_sequencer: String,
    /// Overrides the global minimum bond when set.
    pub min_sequencer_bond: Option<Amount>,
}

impl Rollapp {
    pub fn is_initial_sequencer(&self, address: &str) -> bool {
        self.initial_sequencer
            .split(',')
            .map(str::trim)
            .any(|allowed| allowed == "*" || allowed == address)
    }
}

/// Read access to the rollapp registry.
pub trait RollappKeeper<C: Context>: Send + Sync {
    fn get_rollapp(&self, rollapp_id: &str, working_set: &mut WorkingSet<C::Storage>)
        -> Option<Rollapp>;
}
