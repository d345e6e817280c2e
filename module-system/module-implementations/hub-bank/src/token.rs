use std::fmt::Formatter;

use anyhow::Result;
use hub_modules_api::{Context, WorkingSet};
use hub_state::{Prefix, StateMap};
use thiserror::Error;

/// Type alias to store an amount of token.
pub type Amount = u64;

/// Structure that stores information specifying
/// a given `amount` (type [`Amount`]) of coins stored at a `token_address`
/// (type [`hub_modules_api::Spec::Address`]).
#[cfg_attr(
    feature = "native",
    derive(schemars::JsonSchema),
    schemars(bound = "C::Address: ::schemars::JsonSchema", rename = "Coins")
)]
#[derive(
    borsh::BorshDeserialize,
    borsh::BorshSerialize,
    serde::Serialize,
    serde::Deserialize,
    Debug,
    PartialEq,
    Clone,
)]
#[serde(bound = "C::Address: serde::Serialize + serde::de::DeserializeOwned")]
pub struct Coins<C: Context> {
    /// An `amount` of coins stored.
    pub amount: Amount,
    /// The address where the tokens are stored.
    pub token_address: C::Address,
}

impl<C: Context> std::fmt::Display for Coins<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "token_address={} amount={}",
            self.token_address, self.amount
        )
    }
}

/// Errors raised by balance-changing operations. Handlers wrap them with
/// context, callers can still recover them with `downcast_ref`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BankError {
    #[error("Insufficient funds for {account}: balance {balance}, required {required}")]
    InsufficientFunds {
        account: String,
        balance: Amount,
        required: Amount,
    },
    #[error("Token {0} does not exist")]
    UnknownToken(String),
    #[error("Balance overflow for {0}")]
    Overflow(String),
}

/// This struct represents a token in the hub-bank module.
#[derive(borsh::BorshDeserialize, borsh::BorshSerialize, Debug, PartialEq, Clone)]
pub(crate) struct Token<C: Context> {
    /// Name of the token.
    pub(crate) name: String,
    /// Total supply of the coins.
    pub(crate) total_supply: u64,
    /// Mapping from user address to user balance.
    pub(crate) balances: StateMap<C::Address, Amount>,
}

impl<C: Context> Token<C> {
    /// Transfer the amount `amount` of tokens from the address `from` to the address `to`.
    /// First checks that there is enough token of that type stored in `from`. If so, update
    /// the balances of the `from` and `to` accounts.
    pub(crate) fn transfer(
        &self,
        from: &C::Address,
        to: &C::Address,
        amount: Amount,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let from_balance = self.check_balance(from, amount, working_set)?;

        // We can't overflow here because the sum must be smaller or eq to `total_supply` which is u64.
        let to_balance = self.balances.get(to, working_set).unwrap_or_default() + amount;

        self.balances.set(from, &from_balance, working_set);
        self.balances.set(to, &to_balance, working_set);

        Ok(())
    }

    /// Burns a specified `amount` of token from the adress `from`. First check that the address has enough token to burn,
    /// if not returns an error. Otherwise, update the balances by substracting the amount burnt.
    pub(crate) fn burn(
        &mut self,
        from: &C::Address,
        amount: Amount,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let new_balance = self.check_balance(from, amount, working_set)?;
        self.balances.set(from, &new_balance, working_set);
        self.total_supply = self.total_supply.saturating_sub(amount);

        Ok(())
    }

    // Check that amount can be deducted from address
    // Returns new balance after subtraction.
    fn check_balance(
        &self,
        from: &C::Address,
        amount: Amount,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Amount> {
        let balance = self.balances.get(from, working_set).unwrap_or_default();
        match balance.checked_sub(amount) {
            Some(from_balance) => Ok(from_balance),
            None => Err(BankError::InsufficientFunds {
                account: from.to_string(),
                balance,
                required: amount,
            }
            .into()),
        }
    }

    /// Creates a token from a given set of parameters.
    /// The `token_name`, `sender` address (as a `u8` slice), and the `salt` (`u64` number) are used as an input
    /// to an hash function that computes the token address. Then the initial accounts and balances are populated
    /// from the `address_and_balances` slice and the `total_supply` of tokens is updated each time.
    /// Returns a tuple containing the computed `token_address` and the created `token` object.
    pub(crate) fn create(
        token_name: &str,
        address_and_balances: &[(C::Address, u64)],
        sender: &[u8],
        salt: u64,
        parent_prefix: &Prefix,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<(C::Address, Self)> {
        let token_address = crate::get_token_address::<C>(token_name, sender, salt);
        let token_prefix = prefix_from_address_with_parent::<C>(parent_prefix, &token_address);
        let balances: StateMap<C::Address, Amount> = StateMap::new(token_prefix);

        let mut total_supply: Option<u64> = Some(0);
        for (address, balance) in address_and_balances.iter() {
            let current = balances.get(address, working_set).unwrap_or_default();
            let updated = current
                .checked_add(*balance)
                .ok_or_else(|| BankError::Overflow(address.to_string()))?;
            balances.set(address, &updated, working_set);
            total_supply = total_supply.and_then(|ts| ts.checked_add(*balance));
        }

        let total_supply =
            total_supply.ok_or_else(|| BankError::Overflow(token_name.to_owned()))?;

        let token = Token::<C> {
            name: token_name.to_owned(),
            total_supply,
            balances,
        };

        Ok((token_address, token))
    }
}

pub(crate) fn prefix_from_address_with_parent<C: Context>(
    parent_prefix: &Prefix,
    token_address: &C::Address,
) -> Prefix {
    parent_prefix.extended(token_address.as_ref())
}
