//! Movements of bonded tokens between sequencers and the module account.

use anyhow::{Context as _, Result};
use hub_bank::{Amount, Coins};
use hub_modules_api::{Context, WorkingSet};

use crate::params::Params;
use crate::SequencerRegistry;

impl<C: Context> SequencerRegistry<C> {
    pub fn params(&self, working_set: &mut WorkingSet<C::Storage>) -> Result<Params<C>> {
        self.params
            .get_or_err(working_set)
            .context("Sequencer params are not initialized")
    }

    fn bond_coins(
        &self,
        amount: Amount,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Coins<C>> {
        Ok(Coins {
            amount,
            token_address: self.params(working_set)?.min_bond.token_address,
        })
    }

    /// Moves `amount` of the bond token from `from` into the module account.
    pub(crate) fn escrow(
        &self,
        from: &C::Address,
        amount: Amount,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let coins = self.bond_coins(amount, working_set)?;
        self.bank
            .transfer_from(from, &self.address, coins, working_set)
            .with_context(|| format!("Failed to escrow bond of {from}"))?;
        Ok(())
    }

    /// Pays `amount` of escrowed bond to `to`.
    pub(crate) fn refund(
        &self,
        to: &C::Address,
        amount: Amount,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let coins = self.bond_coins(amount, working_set)?;
        self.bank
            .transfer_from(&self.address, to, coins, working_set)
            .with_context(|| format!("Failed to refund bond to {to}"))?;
        Ok(())
    }

    /// Pays part of a forfeited bond to a third party.
    pub(crate) fn reward(
        &self,
        to: &C::Address,
        amount: Amount,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let coins = self.bond_coins(amount, working_set)?;
        self.bank
            .transfer_from(&self.address, to, coins, working_set)
            .with_context(|| format!("Failed to pay slash reward to {to}"))?;
        Ok(())
    }

    pub(crate) fn burn(
        &self,
        amount: Amount,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let coins = self.bond_coins(amount, working_set)?;
        self.bank
            .burn_from(&self.address, &coins, working_set)
            .context("Failed to burn slashed bond")
    }

    /// Balance of the bond token held by the module account.
    pub fn escrowed(&self, working_set: &mut WorkingSet<C::Storage>) -> Result<Amount> {
        let token = self.params(working_set)?.min_bond.token_address;
        Ok(self
            .bank
            .get_balance_of(&self.address, &token, working_set)
            .unwrap_or_default())
    }
}
