mod bech32;
pub mod default_context;
mod error;
mod prefix;
mod response;
mod time;

use core::fmt::{self, Debug, Display};
use core::hash::Hash;
use core::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
pub use error::Error;
pub use hub_state::{Storage, WorkingSet};
pub use prefix::Prefix;
pub use response::CallResponse;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
pub use sha2::digest;
pub use time::Timestamp;

pub use crate::bech32::{AddressBech32, Bech32ParseError};

/// The bounds every hub address type satisfies.
pub trait AddressTrait:
    PartialEq
    + Eq
    + Ord
    + Hash
    + Clone
    + Debug
    + Display
    + AsRef<[u8]>
    + From<[u8; 32]>
    + for<'a> TryFrom<&'a [u8], Error = anyhow::Error>
    + FromStr<Err = Bech32ParseError>
    + BorshSerialize
    + BorshDeserialize
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.addr
    }
}

impl AddressTrait for Address {}

#[derive(
    PartialEq,
    Clone,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    borsh::BorshDeserialize,
    borsh::BorshSerialize,
    Serialize,
    Deserialize,
)]
#[serde(try_from = "AddressBech32", into = "AddressBech32")]
pub struct Address {
    addr: [u8; 32],
}

impl Address {
    /// The all-zero address.
    pub const fn zero() -> Self {
        Self { addr: [0; 32] }
    }
}

impl<'a> TryFrom<&'a [u8]> for Address {
    type Error = anyhow::Error;

    fn try_from(addr: &'a [u8]) -> Result<Self, Self::Error> {
        if addr.len() != 32 {
            anyhow::bail!("Address must be 32 bytes long");
        }
        let mut addr_bytes = [0u8; 32];
        addr_bytes.copy_from_slice(addr);
        Ok(Self { addr: addr_bytes })
    }
}

impl From<[u8; 32]> for Address {
    fn from(addr: [u8; 32]) -> Self {
        Self { addr }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", AddressBech32::from(self))
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", AddressBech32::from(self))
    }
}

impl TryFrom<AddressBech32> for Address {
    type Error = Bech32ParseError;

    fn try_from(addr: AddressBech32) -> Result<Self, Self::Error> {
        Ok(Self {
            addr: addr.to_byte_array()?,
        })
    }
}

impl FromStr for Address {
    type Err = Bech32ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::try_from(AddressBech32::from_str(s)?)
    }
}

#[cfg(feature = "native")]
impl schemars::JsonSchema for Address {
    fn schema_name() -> String {
        "Address".to_owned()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        <String as schemars::JsonSchema>::json_schema(gen)
    }
}

/// The `Spec` trait configures certain key primitives used by a particular hub chain.
/// `Spec` is almost always implemented on a Context object; since all Modules are generic
/// over a Context, chain developers can swap out the address format, the hasher or the storage
/// backend without touching their module implementations.
pub trait Spec {
    /// The Address type used on the chain. Typically calculated as the hash of a public key.
    type Address: AddressTrait;

    /// State storage used by the chain.
    type Storage: Storage + Send + Sync;

    /// The hasher preferred by the chain, such as Sha256.
    type Hasher: digest::Digest<OutputSize = digest::typenum::U32>;
}

/// A context contains information which is passed to modules during
/// transaction execution: the sender of the transaction and the header
/// of the block it is included in.
///
/// Context objects also implement the [`Spec`] trait, which specifies the types to be used in this
/// instance of the state transition function.
pub trait Context: Spec + Clone + Debug + PartialEq {
    /// Sender of the transaction.
    fn sender(&self) -> &Self::Address;

    /// Height of the block being executed.
    fn block_height(&self) -> u64;

    /// Timestamp of the block being executed.
    fn block_time(&self) -> Timestamp;

    /// Constructor for the Context.
    fn new(sender: Self::Address, block_height: u64, block_time: Timestamp) -> Self;
}

/// Methods from this trait should be called only once when the chain is deployed.
pub trait Genesis {
    type Context: Context;

    /// Initial configuration for the module.
    type Config;

    /// Initializes the state of the chain.
    fn genesis(
        &self,
        config: &Self::Config,
        working_set: &mut WorkingSet<<Self::Context as Spec>::Storage>,
    ) -> Result<(), Error>;
}

impl<T> Genesis for T
where
    T: Module,
{
    type Context = <Self as Module>::Context;

    type Config = <Self as Module>::Config;

    fn genesis(
        &self,
        config: &Self::Config,
        working_set: &mut WorkingSet<<<Self as Genesis>::Context as Spec>::Storage>,
    ) -> Result<(), Error> {
        <Self as Module>::genesis(self, config, working_set)
    }
}

/// Every module implements this trait. State changes happen either at genesis or through
/// a [`Module::CallMessage`] dispatched with a [`Context`].
pub trait Module {
    /// Execution context.
    type Context: Context;

    /// Configuration for the genesis method.
    type Config;

    /// Module defined argument to the call method.
    type CallMessage: Debug + BorshSerialize + BorshDeserialize;

    /// Genesis is called when the chain is deployed and can be used to set initial state values in the module.
    fn genesis(
        &self,
        config: &Self::Config,
        working_set: &mut WorkingSet<<Self::Context as Spec>::Storage>,
    ) -> Result<(), Error>;

    /// Call allows interaction with the module and invokes state changes.
    /// It takes a module defined type and a context as parameters.
    fn call(
        &self,
        message: Self::CallMessage,
        context: &Self::Context,
        working_set: &mut WorkingSet<<Self::Context as Spec>::Storage>,
    ) -> Result<CallResponse, Error>;
}

/// Every module has to implement this trait.
pub trait ModuleInfo {
    type Context: Context;

    /// Returns address of the module.
    fn address(&self) -> &<Self::Context as Spec>::Address;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_round_trips_through_bech32() {
        let addr = Address::from([7u8; 32]);
        let text = addr.to_string();
        assert!(text.starts_with("hub1"));
        assert_eq!(Address::from_str(&text).unwrap(), addr);

        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", text));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn wrong_hrp_is_rejected() {
        let other = crate::bech32::vec_to_bech32m(&[1u8; 32], "sov").unwrap();
        assert!(matches!(
            Address::from_str(&other),
            Err(Bech32ParseError::WrongHPR(hrp)) if hrp == "sov"
        ));
    }

    #[test]
    fn short_slices_are_rejected() {
        assert!(Address::try_from(&[1u8; 31][..]).is_err());
    }
}
