use hub_bank::Amount;
use hub_modules_api::{Storage, Timestamp, WorkingSet};
use serde::{Deserialize, Serialize};

/// Events emitted by the module. Stored on the working set as
/// `(key, json body)` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SequencerEvent {
    Created {
        sequencer: String,
        rollapp_id: String,
        bond: Amount,
    },
    MetadataUpdated {
        sequencer: String,
    },
    RewardAddressUpdated {
        sequencer: String,
        reward_addr: String,
    },
    RelayersUpdated {
        sequencer: String,
        relayers: Vec<String>,
    },
    OptInUpdated {
        sequencer: String,
        opted_in: bool,
    },
    BondIncreased {
        sequencer: String,
        added: Amount,
        bond: Amount,
    },
    BondDecreaseScheduled {
        sequencer: String,
        amount: Amount,
        completion_time: Timestamp,
    },
    BondDecreased {
        sequencer: String,
        amount: Amount,
        bond: Amount,
    },
    Unbonded {
        sequencer: String,
        rollapp_id: String,
    },
    NoticeStarted {
        sequencer: String,
        rollapp_id: String,
        ends_at: Timestamp,
    },
    ProposerChanged {
        rollapp_id: String,
        proposer: String,
    },
    SuccessorChosen {
        rollapp_id: String,
        successor: String,
    },
    RotationCompleted {
        rollapp_id: String,
        old_proposer: String,
        new_proposer: String,
    },
    LivenessSlashed {
        sequencer: String,
        rollapp_id: String,
        amount: Amount,
        dishonor: u64,
    },
    ProposerKicked {
        rollapp_id: String,
        proposer: String,
        kicker: String,
    },
    Punished {
        sequencer: String,
        rollapp_id: String,
        rewardee: Option<String>,
        reward: Amount,
        burned: Amount,
    },
    ParamsUpdated,
}

impl SequencerEvent {
    pub fn key(&self) -> &'static str {
        match self {
            SequencerEvent::Created { .. } => "create_sequencer",
            SequencerEvent::MetadataUpdated { .. } => "update_sequencer_metadata",
            SequencerEvent::RewardAddressUpdated { .. } => "update_reward_address",
            SequencerEvent::RelayersUpdated { .. } => "update_whitelisted_relayers",
            SequencerEvent::OptInUpdated { .. } => "update_opt_in_status",
            SequencerEvent::BondIncreased { .. } => "increase_bond",
            SequencerEvent::BondDecreaseScheduled { .. } => "decrease_bond_scheduled",
            SequencerEvent::BondDecreased { .. } => "decrease_bond",
            SequencerEvent::Unbonded { .. } => "unbonded",
            SequencerEvent::NoticeStarted { .. } => "notice_started",
            SequencerEvent::ProposerChanged { .. } => "proposer_changed",
            SequencerEvent::SuccessorChosen { .. } => "successor_chosen",
            SequencerEvent::RotationCompleted { .. } => "rotation_completed",
            SequencerEvent::LivenessSlashed { .. } => "liveness_slashed",
            SequencerEvent::ProposerKicked { .. } => "proposer_kicked",
            SequencerEvent::Punished { .. } => "sequencer_punished",
            SequencerEvent::ParamsUpdated => "params_updated",
        }
    }

    pub(crate) fn emit<S: Storage>(&self, working_set: &mut WorkingSet<S>) {
        match serde_json::to_string(self) {
            Ok(body) => working_set.add_event(self.key(), &body),
            Err(err) => tracing::warn!(key = self.key(), %err, "Failed to encode event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_is_tagged_json() {
        let event = SequencerEvent::NoticeStarted {
            sequencer: "hub1seq".to_owned(),
            rollapp_id: "rollapp_1234-1".to_owned(),
            ends_at: Timestamp::from_secs(42),
        };
        let body = serde_json::to_value(&event).unwrap();
        assert_eq!(body["type"], "notice_started");
        assert_eq!(body["ends_at"], 42);
        assert_eq!(event.key(), "notice_started");
    }
}
