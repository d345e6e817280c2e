//! Registration, bond changes and unbonding.

use anyhow::{Context as _, Result};
use hub_bank::{Amount, Coins};
use hub_modules_api::{Context, Timestamp, WorkingSet};

use crate::error::SequencerError;
use crate::event::SequencerEvent;
use crate::metadata::SequencerMetadata;
use crate::queue::MaturityQueue;
use crate::store::dymint_address;
use crate::types::{
    is_sentinel_address, BondReduction, OperatingStatus, RollappId, Sequencer,
    CONSENSUS_PUB_KEY_LENGTH,
};
use crate::SequencerRegistry;

/// A request to register the sender as a sequencer of a rollapp.
#[cfg_attr(
    feature = "native",
    derive(serde::Serialize),
    derive(serde::Deserialize),
    derive(schemars::JsonSchema),
    schemars(bound = "C::Address: ::schemars::JsonSchema", rename = "Registration"),
    serde(bound = "C::Address: serde::Serialize + serde::de::DeserializeOwned")
)]
#[derive(borsh::BorshDeserialize, borsh::BorshSerialize, Debug, PartialEq, Clone)]
pub struct Registration<C: Context> {
    pub rollapp_id: RollappId,
    /// Ed25519 public key the sequencer signs rollapp blocks with.
    pub dymint_pub_key: Vec<u8>,
    pub bond: Coins<C>,
    pub metadata: SequencerMetadata,
    /// Defaults to the sequencer's own address.
    pub reward_addr: Option<C::Address>,
    pub whitelisted_relayers: Vec<C::Address>,
}

/// Sorts relayers, rejecting duplicates.
pub(crate) fn normalize_relayers<A: Ord + std::fmt::Display>(
    mut relayers: Vec<A>,
) -> Result<Vec<A>, SequencerError> {
    relayers.sort();
    if let Some(pair) = relayers.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(SequencerError::InvalidRelayers(format!(
            "duplicate relayer {}",
            pair[0]
        )));
    }
    Ok(relayers)
}

impl<C: Context> SequencerRegistry<C> {
    /// Registers `creator` as a sequencer and escrows its bond. The first
    /// eligible sequencer of a rollapp without a proposer becomes its proposer.
    pub fn register(
        &self,
        creator: &C::Address,
        registration: Registration<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Sequencer<C>> {
        working_set.with_revertable(|working_set| {
            self.create_sequencer(creator, registration, working_set)
        })
    }

    fn create_sequencer(
        &self,
        creator: &C::Address,
        registration: Registration<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Sequencer<C>> {
        let Registration {
            rollapp_id,
            dymint_pub_key,
            bond,
            metadata,
            reward_addr,
            whitelisted_relayers,
        } = registration;

        let rollapp = self
            .rollapps
            .get_rollapp(&rollapp_id, working_set)
            .ok_or_else(|| SequencerError::RollappNotFound(rollapp_id.clone()))?;
        if !rollapp.launched && !rollapp.is_initial_sequencer(&creator.to_string()) {
            return Err(SequencerError::NotInitialSequencer(creator.to_string()).into());
        }

        let params = self.params(working_set)?;
        if &bond.token_address != params.bond_token() {
            return Err(SequencerError::InvalidDenom {
                expected: params.bond_token().to_string(),
                got: bond.token_address.to_string(),
            }
            .into());
        }
        if dymint_pub_key.len() != CONSENSUS_PUB_KEY_LENGTH {
            return Err(SequencerError::InvalidConsensusKey(format!(
                "expected {CONSENSUS_PUB_KEY_LENGTH} bytes, got {}",
                dymint_pub_key.len()
            ))
            .into());
        }
        if is_sentinel_address::<C>(creator) || self.sequencers.contains(creator, working_set) {
            return Err(SequencerError::SequencerExists(creator.to_string()).into());
        }
        let dymint_addr = dymint_address::<C>(&dymint_pub_key);
        if let Some(owner) = self.sequencers_by_dymint_addr.get(&dymint_addr, working_set) {
            return Err(SequencerError::ConsensusKeyInUse(owner.to_string()).into());
        }

        let min_bond = rollapp
            .min_sequencer_bond
            .unwrap_or(params.min_bond.amount);
        if bond.amount < min_bond {
            return Err(SequencerError::InsufficientBond {
                bond: bond.amount,
                min_bond,
            }
            .into());
        }
        metadata.validate(rollapp.vm_type)?;
        let whitelisted_relayers = normalize_relayers(whitelisted_relayers)?;

        self.escrow(creator, bond.amount, working_set)?;

        let sequencer = Sequencer {
            address: creator.clone(),
            rollapp_id: rollapp_id.clone(),
            dymint_pub_key,
            tokens: bond.amount,
            status: OperatingStatus::Bonded,
            opted_in: true,
            jailed: false,
            dishonor: 0,
            notice_period_time: Timestamp::ZERO,
            unbond_request_height: 0,
            metadata,
            reward_addr: reward_addr.unwrap_or_else(|| creator.clone()),
            whitelisted_relayers,
        };
        self.set_sequencer(&sequencer, working_set)?;

        tracing::info!(
            sequencer = %creator,
            %rollapp_id,
            dymint_addr = %hex::encode(&dymint_addr),
            bond = bond.amount,
            "Sequencer registered"
        );
        SequencerEvent::Created {
            sequencer: creator.to_string(),
            rollapp_id: rollapp_id.clone(),
            bond: bond.amount,
        }
        .emit(working_set);

        self.recover_from_sentinel(&rollapp_id, working_set)
            .context("Failed to elect a proposer after registration")?;
        Ok(sequencer)
    }

    /// The minimum bond currently required on the rollapp.
    pub fn min_bond_for(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Amount> {
        let global = self.params(working_set)?.min_bond.amount;
        Ok(self
            .rollapps
            .get_rollapp(rollapp_id, working_set)
            .and_then(|rollapp| rollapp.min_sequencer_bond)
            .unwrap_or(global))
    }

    /// Asks every registered [`UnbondBlocker`](crate::UnbondBlocker). The first veto wins.
    pub(crate) fn check_unbond_blockers(
        &self,
        sequencer: &Sequencer<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        for blocker in &self.unbond_blockers {
            blocker
                .can_unbond(sequencer, working_set)
                .map_err(|err| {
                    err.context(SequencerError::UnbondBlocked(sequencer.address.to_string()))
                })?;
        }
        Ok(())
    }

    /// Returns `amount` of the sequencer's bond to it. Refunding everything
    /// unbonds the sequencer.
    ///
    /// Fails for the proposer and the successor, which have to go through a
    /// notice period instead, and when a partial refund would leave less than
    /// the rollapp's minimum bond.
    pub fn try_unbond(
        &self,
        sequencer: &mut Sequencer<C>,
        amount: Amount,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        if self.is_proposer(sequencer, working_set) || self.is_successor(sequencer, working_set) {
            return Err(SequencerError::ProposerOrSuccessor.into());
        }
        self.check_unbond_blockers(sequencer, working_set)?;

        if amount > sequencer.tokens {
            return Err(SequencerError::InvalidAmount(format!(
                "cannot unbond {amount}, bond is {}",
                sequencer.tokens
            ))
            .into());
        }
        if amount != sequencer.tokens {
            let min_bond = self.min_bond_for(&sequencer.rollapp_id, working_set)?;
            let max_reduction = sequencer.tokens.saturating_sub(min_bond);
            if amount > max_reduction {
                return Err(SequencerError::UnbondNotAllowed(format!(
                    "at most {max_reduction} can be unbonded while keeping the minimum bond {min_bond}"
                ))
                .into());
            }
        }

        self.refund(&sequencer.address, amount, working_set)?;
        sequencer.tokens -= amount;

        if sequencer.tokens == 0 {
            self.finish_unbond(sequencer, working_set)?;
        } else {
            self.set_sequencer(sequencer, working_set)?;
            SequencerEvent::BondDecreased {
                sequencer: sequencer.address.to_string(),
                amount,
                bond: sequencer.tokens,
            }
            .emit(working_set);
        }
        Ok(())
    }

    /// Refunds the whole bond without consulting blockers. Used when the
    /// sequencer is removed rather than leaving on its own.
    pub(crate) fn force_unbond(
        &self,
        sequencer: &mut Sequencer<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        self.refund(&sequencer.address, sequencer.tokens, working_set)?;
        sequencer.tokens = 0;
        self.finish_unbond(sequencer, working_set)
    }

    /// Marks a sequencer whose tokens are gone as unbonded and drops its
    /// pending notice and bond decreases.
    fn finish_unbond(
        &self,
        sequencer: &mut Sequencer<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        sequencer.status = OperatingStatus::Unbonded;
        sequencer.opted_in = false;
        self.clear_notice(sequencer, working_set);
        self.cancel_bond_reductions(&sequencer.address, working_set);
        self.set_sequencer(sequencer, working_set)?;

        tracing::info!(
            sequencer = %sequencer.address,
            rollapp_id = %sequencer.rollapp_id,
            "Sequencer unbonded"
        );
        SequencerEvent::Unbonded {
            sequencer: sequencer.address.to_string(),
            rollapp_id: sequencer.rollapp_id.clone(),
        }
        .emit(working_set);
        Ok(())
    }

    pub fn increase_bond(
        &self,
        address: &C::Address,
        amount: Amount,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Sequencer<C>> {
        let mut sequencer = self.get_real(address, working_set)?;
        ensure_active(&sequencer)?;
        if amount == 0 {
            let reason = "bond increase must be positive".to_owned();
            return Err(SequencerError::InvalidAmount(reason).into());
        }
        sequencer.tokens = sequencer
            .tokens
            .checked_add(amount)
            .ok_or_else(|| SequencerError::InvalidAmount("bond overflow".to_owned()))?;
        working_set.with_revertable(|working_set| -> Result<()> {
            self.escrow(address, amount, working_set)?;
            Ok(self.set_sequencer(&sequencer, working_set)?)
        })?;

        SequencerEvent::BondIncreased {
            sequencer: address.to_string(),
            added: amount,
            bond: sequencer.tokens,
        }
        .emit(working_set);
        Ok(sequencer)
    }

    /// Schedules a bond decrease, paid out once the unbonding time has passed.
    /// Returns the completion time.
    pub fn decrease_bond(
        &self,
        address: &C::Address,
        amount: Amount,
        now: Timestamp,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Timestamp> {
        let sequencer = self.get_real(address, working_set)?;
        ensure_active(&sequencer)?;
        if amount == 0 {
            let reason = "bond decrease must be positive".to_owned();
            return Err(SequencerError::InvalidAmount(reason).into());
        }

        let pending: Amount = self
            .pending_bond_reductions(address, working_set)
            .iter()
            .map(|reduction| reduction.amount)
            .sum();
        let effective_bond = sequencer.tokens.saturating_sub(pending);
        let min_bond = self.min_bond_for(&sequencer.rollapp_id, working_set)?;
        let remaining = effective_bond.checked_sub(amount).unwrap_or_default();
        if amount > effective_bond || remaining < min_bond {
            return Err(SequencerError::InsufficientBond {
                bond: remaining,
                min_bond,
            }
            .into());
        }
        self.check_unbond_blockers(&sequencer, working_set)?;

        let unbonding_time = self.params(working_set)?.unbonding_time;
        let completion_time = now.plus_secs(unbonding_time);
        let id = self.next_reduction_id.get(working_set).unwrap_or_default();
        self.next_reduction_id.set(&(id + 1), working_set);

        let reduction = BondReduction {
            id,
            sequencer_address: address.clone(),
            amount,
            maturity_time: completion_time,
        };
        self.bond_reductions
            .push(completion_time, &id, &reduction, working_set);
        self.reductions_by_sequencer
            .set(&(address.clone(), id), &completion_time, working_set);

        SequencerEvent::BondDecreaseScheduled {
            sequencer: address.to_string(),
            amount,
            completion_time,
        }
        .emit(working_set);
        Ok(completion_time)
    }

    /// Pending bond decreases of the sequencer, in scheduling order.
    pub fn pending_bond_reductions(
        &self,
        address: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Vec<BondReduction<C>> {
        self.reductions_by_sequencer
            .iter_prefix(address, working_set)
            .into_iter()
            .filter_map(|((_, id), maturity)| self.bond_reductions.get(maturity, &id, working_set))
            .collect()
    }

    pub(crate) fn cancel_bond_reductions(
        &self,
        address: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) {
        for ((_, id), maturity) in self.reductions_by_sequencer.iter_prefix(address, working_set) {
            self.bond_reductions.remove(maturity, &id, working_set);
            self.reductions_by_sequencer
                .delete(&(address.clone(), id), working_set);
        }
    }

    /// Pays out every bond decrease due by `now`. A failing entry is logged and
    /// dropped without affecting the others.
    pub fn handle_bond_reduction(
        &self,
        now: Timestamp,
        working_set: &mut WorkingSet<C::Storage>,
    ) {
        let due = self.bond_reductions.bind(working_set).drain_due(now);
        for (_, id, reduction) in due {
            self.reductions_by_sequencer
                .delete(&(reduction.sequencer_address.clone(), id), working_set);
            let result = working_set.with_revertable(|working_set| {
                self.complete_bond_reduction(&reduction, working_set)
            });
            if let Err(err) = result {
                tracing::error!(
                    sequencer = %reduction.sequencer_address,
                    amount = reduction.amount,
                    error = ?err,
                    "Failed to complete bond reduction"
                );
            }
        }
    }

    fn complete_bond_reduction(
        &self,
        reduction: &BondReduction<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<()> {
        let mut sequencer = self.get_real(&reduction.sequencer_address, working_set)?;
        if !sequencer.is_bonded() {
            return Err(SequencerError::NotBonded(sequencer.address.to_string()).into());
        }
        let min_bond = self.min_bond_for(&sequencer.rollapp_id, working_set)?;
        let amount = reduction
            .amount
            .min(sequencer.tokens.saturating_sub(min_bond));
        if amount < reduction.amount {
            tracing::warn!(
                sequencer = %sequencer.address,
                scheduled = reduction.amount,
                paid = amount,
                min_bond,
                "Bond reduction clamped to the minimum bond"
            );
        }

        self.refund(&sequencer.address, amount, working_set)?;
        sequencer.tokens -= amount;
        self.set_sequencer(&sequencer, working_set)?;

        SequencerEvent::BondDecreased {
            sequencer: sequencer.address.to_string(),
            amount,
            bond: sequencer.tokens,
        }
        .emit(working_set);
        Ok(())
    }
}

/// Bonded and not jailed.
pub(crate) fn ensure_active<C: Context>(sequencer: &Sequencer<C>) -> Result<(), SequencerError> {
    if sequencer.jailed {
        return Err(SequencerError::Jailed(sequencer.address.to_string()));
    }
    if !sequencer.is_bonded() {
        return Err(SequencerError::NotBonded(sequencer.address.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relayers_are_sorted_and_unique() {
        assert_eq!(normalize_relayers(vec![3, 1, 2]), Ok(vec![1, 2, 3]));
        assert!(matches!(
            normalize_relayers(vec![3, 1, 3]),
            Err(SequencerError::InvalidRelayers(_))
        ));
        assert_eq!(normalize_relayers(Vec::<u8>::new()), Ok(vec![]));
    }
}
