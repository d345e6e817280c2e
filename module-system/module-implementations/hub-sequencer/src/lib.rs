mod bonding;
pub mod call;
mod custody;
pub mod decimal;
mod directory;
pub mod election;
pub mod error;
pub mod event;
pub mod genesis;
pub mod hooks;
pub mod invariants;
pub mod metadata;
pub mod params;
pub mod queue;
#[cfg(feature = "native")]
pub mod query;
pub mod rollapp;
mod rotation;
mod slashing;
mod store;
pub mod types;

use std::sync::Arc;

use hub_bank::Bank;
use hub_modules_api::{CallResponse, Context, Error, Module, ModuleInfo, Prefix, WorkingSet};
use hub_state::{StateMap, StateValue};

pub use crate::bonding::Registration;
pub use crate::call::CallMessage;
pub use crate::decimal::Decimal;
pub use crate::error::{error_kind, ErrorKind, SequencerError};
pub use crate::event::SequencerEvent;
pub use crate::genesis::SequencerConfig;
pub use crate::hooks::{SequencerHooks, UnbondBlocker};
pub use crate::metadata::{ContactDetails, SequencerMetadata, SnapshotInfo};
pub use crate::params::Params;
pub use crate::queue::{MaturityQueue, MemoryTimeQueue, TimeQueue};
pub use crate::rollapp::{Rollapp, RollappKeeper, VmType};
pub use crate::rotation::RotationOutcome;
pub use crate::store::dymint_address;
pub use crate::types::{BondReduction, OperatingStatus, RollappId, Sequencer};

/// The sequencer module tracks which parties may produce blocks for each rollapp.
/// It provides functionality for:
/// - Registration and bonding, including time-locked bond decreases.
/// - Proposer and successor election and notice-period rotation.
/// - Liveness slashing, kicking and fraud punishment.
#[derive(Clone)]
pub struct SequencerRegistry<C: Context> {
    /// The address of the module. Bonds are escrowed in this account.
    pub(crate) address: C::Address,

    pub(crate) params: StateValue<Params<C>>,

    /// Account allowed to update params and punish sequencers.
    pub(crate) authority: StateValue<C::Address>,

    pub(crate) sequencers: StateMap<C::Address, Sequencer<C>>,

    /// `(rollapp, status, address)` index over `sequencers`.
    pub(crate) sequencers_by_rollapp: StateMap<(RollappId, OperatingStatus, C::Address), bool>,

    /// Consensus address to sequencer address.
    pub(crate) sequencers_by_dymint_addr: StateMap<Vec<u8>, C::Address>,

    /// The sentinel address is stored to mean "no proposer".
    pub(crate) proposers: StateMap<RollappId, C::Address>,

    pub(crate) successors: StateMap<RollappId, C::Address>,

    /// Proposers and successors serving their notice period.
    pub(crate) notice_queue: TimeQueue<C::Address, RollappId>,

    /// Scheduled bond decreases, keyed by reduction id.
    pub(crate) bond_reductions: TimeQueue<u64, BondReduction<C>>,

    pub(crate) reductions_by_sequencer: StateMap<(C::Address, u64), hub_modules_api::Timestamp>,

    pub(crate) next_reduction_id: StateValue<u64>,

    pub(crate) bank: Bank<C>,

    pub(crate) rollapps: Arc<dyn RollappKeeper<C>>,

    pub(crate) unbond_blockers: Vec<Arc<dyn UnbondBlocker<C>>>,

    pub(crate) hooks: Vec<Arc<dyn SequencerHooks<C>>>,
}

impl<C: Context> SequencerRegistry<C> {
    pub fn new(bank: Bank<C>, rollapps: Arc<dyn RollappKeeper<C>>) -> Self {
        let storage = |field: &'static str| -> hub_state::Prefix {
            Prefix::new_storage(module_path!(), "SequencerRegistry", field).into()
        };
        Self {
            address: C::Address::from(
                Prefix::new_module(module_path!(), "SequencerRegistry").hash::<C>(),
            ),
            params: StateValue::new(storage("params")),
            authority: StateValue::new(storage("authority")),
            sequencers: StateMap::new(storage("sequencers")),
            sequencers_by_rollapp: StateMap::new(storage("sequencers_by_rollapp")),
            sequencers_by_dymint_addr: StateMap::new(storage("sequencers_by_dymint_addr")),
            proposers: StateMap::new(storage("proposers")),
            successors: StateMap::new(storage("successors")),
            notice_queue: TimeQueue::new(storage("notice_queue")),
            bond_reductions: TimeQueue::new(storage("bond_reductions")),
            reductions_by_sequencer: StateMap::new(storage("reductions_by_sequencer")),
            next_reduction_id: StateValue::new(storage("next_reduction_id")),
            bank,
            rollapps,
            unbond_blockers: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Adds a module that may veto unbonds and bond decreases.
    pub fn with_unbond_blocker(mut self, blocker: Arc<dyn UnbondBlocker<C>>) -> Self {
        self.unbond_blockers.push(blocker);
        self
    }

    /// Adds a receiver of kick, hard fork and rotation notifications.
    pub fn with_hooks(mut self, hooks: Arc<dyn SequencerHooks<C>>) -> Self {
        self.hooks.push(hooks);
        self
    }

    pub fn bank(&self) -> &Bank<C> {
        &self.bank
    }
}

impl<C: Context> ModuleInfo for SequencerRegistry<C> {
    type Context = C;

    fn address(&self) -> &C::Address {
        &self.address
    }
}

impl<C: Context> Module for SequencerRegistry<C> {
    type Context = C;

    type Config = SequencerConfig<C>;

    type CallMessage = call::CallMessage<C>;

    fn genesis(
        &self,
        config: &Self::Config,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<(), Error> {
        Ok(self.init_module(config, working_set)?)
    }

    fn call(
        &self,
        msg: Self::CallMessage,
        context: &Self::Context,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<CallResponse, Error> {
        // A failed message leaves no writes or events behind.
        Ok(working_set.with_revertable(|working_set| self.dispatch(msg, context, working_set))?)
    }
}
