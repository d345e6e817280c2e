use anyhow::{Context as _, Result};
use hub_modules_api::{CallResponse, Context, WorkingSet};

use crate::{Bank, BankError, Coins, Token};

/// This enumeration represents the available call messages for interacting with the hub-bank module.
#[cfg_attr(
    feature = "native",
    derive(serde::Serialize),
    derive(serde::Deserialize),
    derive(schemars::JsonSchema),
    schemars(bound = "C::Address: ::schemars::JsonSchema", rename = "CallMessage"),
    serde(bound = "C::Address: serde::Serialize + serde::de::DeserializeOwned")
)]
#[derive(borsh::BorshDeserialize, borsh::BorshSerialize, Debug, PartialEq, Clone)]
pub enum CallMessage<C: Context> {
    /// Transfers a specified amount of tokens to the specified address.
    Transfer {
        /// The address to which the tokens will be transferred.
        to: C::Address,
        /// The amount of tokens to transfer.
        coins: Coins<C>,
    },

    /// Burns a specified amount of tokens.
    Burn {
        /// The amount of tokens to burn.
        coins: Coins<C>,
    },
}

impl<C: Context> Bank<C> {
    pub(crate) fn transfer(
        &self,
        to: C::Address,
        coins: Coins<C>,
        context: &C,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<CallResponse> {
        self.transfer_from(context.sender(), &to, coins, working_set)?;
        Ok(CallResponse::default())
    }

    pub(crate) fn burn(
        &self,
        coins: Coins<C>,
        context: &C,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<CallResponse> {
        self.burn_from(context.sender(), &coins, working_set)?;
        Ok(CallResponse::default())
    }

    /// Transfers the set of `coins` from the address `from` to the address `to`.
    ///
    /// Returns an error if the token address doesn't exist or `from` doesn't have
    /// enough tokens.
    pub fn transfer_from(
        &self,
        from: &C::Address,
        to: &C::Address,
        coins: Coins<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<CallResponse> {
        let token = self.token(&coins.token_address, working_set)?;
        token
            .transfer(from, to, coins.amount, working_set)
            .with_context(|| {
                format!(
                    "Failed transfer from={} to={} of coins({})",
                    from, to, coins
                )
            })?;
        tracing::debug!(%from, %to, %coins, "Transferred");
        Ok(CallResponse::default())
    }

    /// Burns the set of `coins` held by `owner`, reducing the token's total supply.
    ///
    /// Returns an error if the token address doesn't exist or `owner` doesn't have
    /// enough tokens.
    pub fn burn_from(
        &self,
        owner: &C::Address,
        coins: &Coins<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let mut token = self.token(&coins.token_address, working_set)?;
        token
            .burn(owner, coins.amount, working_set)
            .with_context(|| format!("Failed to burn coins({}) from owner {}", coins, owner))?;
        self.tokens.set(&coins.token_address, &token, working_set);
        tracing::debug!(%owner, %coins, "Burned");
        Ok(())
    }

    fn token(
        &self,
        token_address: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Token<C>> {
        self.tokens
            .get(token_address, working_set)
            .ok_or_else(|| BankError::UnknownToken(token_address.to_string()).into())
    }
}

impl<C: Context> Bank<C> {
    /// Helper function used by the rpc method [`balance_of`](Bank::balance_of) to return the balance of the token stored at `token_address`
    /// for the user having the address `user_address` from the underlying storage. If the token address doesn't exist, or
    /// if the user doesn't have tokens of that type, return `None`. Otherwise, wrap the resulting balance in `Some`.
    pub fn get_balance_of(
        &self,
        user_address: &C::Address,
        token_address: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Option<u64> {
        self.tokens
            .get(token_address, working_set)
            .and_then(|token| token.balances.get(user_address, working_set))
    }

    /// Get the name of a token by address
    pub fn get_token_name(
        &self,
        token_address: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Option<String> {
        let token = self.tokens.get(token_address, working_set);
        token.map(|token| token.name)
    }

    /// Returns the total supply of the token stored at `token_address`, if it exists.
    pub fn get_total_supply_of(
        &self,
        token_address: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Option<u64> {
        self.tokens
            .get(token_address, working_set)
            .map(|token| token.total_supply)
    }
}
