pub mod call;
pub mod genesis;
#[cfg(feature = "native")]
pub mod query;
mod token;
mod utils;

use hub_modules_api::{CallResponse, Context, Error, Module, ModuleInfo, Prefix, WorkingSet};
use hub_state::StateMap;
use token::Token;
pub use token::{Amount, BankError, Coins};
pub use utils::{get_genesis_token_address, get_token_address};

pub struct TokenConfig<C: Context> {
    pub token_name: String,
    pub salt: u64,
    pub address_and_balances: Vec<(C::Address, u64)>,
}

/// Initial configuration for hub-bank module.
pub struct BankConfig<C: Context> {
    pub tokens: Vec<TokenConfig<C>>,
}

/// The hub-bank module manages user balances. It provides functionality for:
/// - Token creation.
/// - Token transfers.
/// - Token burn.
#[derive(Clone)]
pub struct Bank<C: Context> {
    /// The address of the hub-bank module.
    pub(crate) address: C::Address,

    /// A mapping of addresses to tokens in the hub-bank.
    pub(crate) tokens: StateMap<C::Address, Token<C>>,
}

impl<C: Context> Default for Bank<C> {
    fn default() -> Self {
        Self {
            address: C::Address::from(Prefix::new_module(module_path!(), "Bank").hash::<C>()),
            tokens: StateMap::new(Prefix::new_storage(module_path!(), "Bank", "tokens").into()),
        }
    }
}

impl<C: Context> ModuleInfo for Bank<C> {
    type Context = C;

    fn address(&self) -> &C::Address {
        &self.address
    }
}

impl<C: Context> Module for Bank<C> {
    type Context = C;

    type Config = BankConfig<C>;

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
        match msg {
            call::CallMessage::Transfer { to, coins } => {
                Ok(self.transfer(to, coins, context, working_set)?)
            }

            call::CallMessage::Burn { coins } => Ok(self.burn(coins, context, working_set)?),
        }
    }
}
