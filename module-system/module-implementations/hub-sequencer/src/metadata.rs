use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::error::SequencerError;
use crate::rollapp::VmType;

pub const MAX_MONIKER_LENGTH: usize = 70;
pub const MAX_DETAILS_LENGTH: usize = 280;
pub const MAX_EXTRA_DATA_LENGTH: usize = 512;
pub const MAX_CONTACT_FIELD_LENGTH: usize = 256;
pub const MAX_URL_LIST_LENGTH: usize = 20;

/// Operational information published by a sequencer. Opaque to the module
/// apart from length limits and the VM-specific rules in [`SequencerMetadata::validate`].
#[derive(
    Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[cfg_attr(feature = "native", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct SequencerMetadata {
    pub moniker: String,
    pub details: String,
    pub p2p_seeds: Vec<String>,
    pub rpcs: Vec<String>,
    pub evm_rpcs: Vec<String>,
    pub rest_api_urls: Vec<String>,
    pub explorer_url: String,
    pub genesis_urls: Vec<String>,
    pub contact_details: ContactDetails,
    pub extra_data: Vec<u8>,
    pub snapshots: Vec<SnapshotInfo>,
    pub gas_price: Option<u128>,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[cfg_attr(feature = "native", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct ContactDetails {
    pub website: String,
    pub telegram: String,
    pub x: String,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[cfg_attr(feature = "native", derive(schemars::JsonSchema))]
pub struct SnapshotInfo {
    pub snapshot_url: String,
    pub height: u64,
    pub checksum: String,
}

impl SequencerMetadata {
    /// Checks length limits and the rules of the rollapp's VM.
    pub fn validate(&self, vm_type: VmType) -> Result<(), SequencerError> {
        let invalid = |reason: String| Err(SequencerError::InvalidMetadata(reason));

        if self.moniker.len() > MAX_MONIKER_LENGTH {
            return invalid(format!("moniker longer than {MAX_MONIKER_LENGTH}"));
        }
        if self.details.len() > MAX_DETAILS_LENGTH {
            return invalid(format!("details longer than {MAX_DETAILS_LENGTH}"));
        }
        if self.extra_data.len() > MAX_EXTRA_DATA_LENGTH {
            return invalid(format!("extra data longer than {MAX_EXTRA_DATA_LENGTH}"));
        }

        let contact = &self.contact_details;
        for (name, field) in [
            ("website", &contact.website),
            ("telegram", &contact.telegram),
            ("x", &contact.x),
        ] {
            if field.len() > MAX_CONTACT_FIELD_LENGTH {
                return invalid(format!(
                    "contact {name} longer than {MAX_CONTACT_FIELD_LENGTH}"
                ));
            }
        }

        for (name, list) in [
            ("p2p_seeds", &self.p2p_seeds),
            ("rpcs", &self.rpcs),
            ("evm_rpcs", &self.evm_rpcs),
            ("rest_api_urls", &self.rest_api_urls),
            ("genesis_urls", &self.genesis_urls),
        ] {
            if list.len() > MAX_URL_LIST_LENGTH {
                return invalid(format!("{name} has more than {MAX_URL_LIST_LENGTH} entries"));
            }
            if list.iter().any(|url| url.trim().is_empty()) {
                return invalid(format!("{name} contains an empty entry"));
            }
        }

        if vm_type == VmType::Wasm && !self.evm_rpcs.is_empty() {
            return invalid("evm rpcs are not allowed for wasm rollapps".to_owned());
        }
        Ok(())
    }
}
