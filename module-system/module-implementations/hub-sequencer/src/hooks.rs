use anyhow::Result;
use hub_modules_api::{Context, WorkingSet};

use crate::types::Sequencer;

/// Lets another module veto a sequencer's unbond or bond decrease, for example
/// while a dispute involving it is open.
pub trait UnbondBlocker<C: Context>: Send + Sync {
    fn can_unbond(
        &self,
        sequencer: &Sequencer<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()>;
}

/// Notifications sent to other modules. An error aborts the operation that
/// triggered the notification.
pub trait SequencerHooks<C: Context>: Send + Sync {
    fn after_kick_proposer(
        &self,
        _kicked: &Sequencer<C>,
        _working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        Ok(())
    }

    /// The rollapp's state since the last trusted update must be discarded.
    fn on_hard_fork(
        &self,
        _rollapp_id: &str,
        _working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        Ok(())
    }

    /// `new_proposer` is the sentinel when the rollapp was left without a proposer.
    fn after_rotation(
        &self,
        _rollapp_id: &str,
        _old_proposer: &Sequencer<C>,
        _new_proposer: &Sequencer<C>,
        _working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        Ok(())
    }
}
