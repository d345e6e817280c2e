use hub_state::MemoryStorage;
use serde::{Deserialize, Serialize};

use crate::{Address, Context, Spec, Timestamp};

/// The context used by the node: the transaction sender plus the header of the block
/// being executed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DefaultContext {
    pub sender: Address,
    pub block_height: u64,
    pub block_time: Timestamp,
}

impl Spec for DefaultContext {
    type Address = Address;
    type Storage = MemoryStorage;
    type Hasher = sha2::Sha256;
}

impl Context for DefaultContext {
    fn sender(&self) -> &Self::Address {
        &self.sender
    }

    fn block_height(&self) -> u64 {
        self.block_height
    }

    fn block_time(&self) -> Timestamp {
        self.block_time
    }

    fn new(sender: Self::Address, block_height: u64, block_time: Timestamp) -> Self {
        Self {
            sender,
            block_height,
            block_time,
        }
    }
}
