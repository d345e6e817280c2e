//! Sequencer records and their secondary indexes.

use hub_modules_api::digest::Digest;
use hub_modules_api::{Context, WorkingSet};

use crate::error::SequencerError;
use crate::types::{
    is_sentinel_address, OperatingStatus, RollappId, Sequencer, DYMINT_ADDRESS_LENGTH,
};
use crate::SequencerRegistry;

/// The consensus address of a public key: the first 20 bytes of its hash.
pub fn dymint_address<C: Context>(pub_key: &[u8]) -> Vec<u8> {
    let hash = C::Hasher::digest(pub_key);
    hash[..DYMINT_ADDRESS_LENGTH].to_vec()
}

type IndexKey<A> = (RollappId, OperatingStatus, A);

/// Writes needed to move the rollapp index from `old` to `new`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct IndexDelta<A> {
    pub(crate) remove: Option<IndexKey<A>>,
    pub(crate) insert: Option<IndexKey<A>>,
}

fn index_key<C: Context>(sequencer: &Sequencer<C>) -> IndexKey<C::Address> {
    (
        sequencer.rollapp_id.clone(),
        sequencer.status,
        sequencer.address.clone(),
    )
}

pub(crate) fn index_delta<C: Context>(
    old: Option<&Sequencer<C>>,
    new: &Sequencer<C>,
) -> IndexDelta<C::Address> {
    let new_key = index_key(new);
    match old.map(index_key::<C>) {
        Some(old_key) if old_key == new_key => IndexDelta {
            remove: None,
            insert: None,
        },
        old_key => IndexDelta {
            remove: old_key,
            insert: Some(new_key),
        },
    }
}

impl<C: Context> SequencerRegistry<C> {
    /// Returns the sequencer, or the sentinel if there is none at `address`.
    pub fn get(
        &self,
        address: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Sequencer<C> {
        self.sequencers
            .get(address, working_set)
            .unwrap_or_else(Sequencer::sentinel)
    }

    /// Returns the sequencer at `address`, failing if there is none.
    pub fn get_real(
        &self,
        address: &C::Address,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<Sequencer<C>, SequencerError> {
        if is_sentinel_address::<C>(address) {
            return Err(SequencerError::SequencerNotFound(address.to_string()));
        }
        self.sequencers
            .get(address, working_set)
            .ok_or_else(|| SequencerError::SequencerNotFound(address.to_string()))
    }

    /// Persists `sequencer` and updates the rollapp and consensus-key indexes in
    /// the same step.
    ///
    /// The rollapp and consensus key of a stored sequencer are immutable, and a
    /// consensus key belongs to at most one sequencer.
    pub(crate) fn set_sequencer(
        &self,
        sequencer: &Sequencer<C>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Result<(), SequencerError> {
        if sequencer.is_sentinel() {
            return Err(SequencerError::Internal(
                "the sentinel sequencer is never stored".to_owned(),
            ));
        }
        let old = self.sequencers.get(&sequencer.address, working_set);

        match &old {
            Some(old) => {
                if old.dymint_pub_key != sequencer.dymint_pub_key {
                    return Err(SequencerError::Internal(format!(
                        "consensus key of {} cannot change",
                        sequencer.address
                    )));
                }
                if old.rollapp_id != sequencer.rollapp_id {
                    return Err(SequencerError::Internal(format!(
                        "rollapp of {} cannot change",
                        sequencer.address
                    )));
                }
            }
            None => {
                let dymint_addr = dymint_address::<C>(&sequencer.dymint_pub_key);
                if let Some(owner) = self.sequencers_by_dymint_addr.get(&dymint_addr, working_set) {
                    if owner != sequencer.address {
                        return Err(SequencerError::ConsensusKeyInUse(owner.to_string()));
                    }
                }
                self.sequencers_by_dymint_addr
                    .set(&dymint_addr, &sequencer.address, working_set);
            }
        }

        let delta = index_delta(old.as_ref(), sequencer);
        if let Some(key) = delta.remove {
            self.sequencers_by_rollapp.delete(&key, working_set);
        }
        if let Some(key) = delta.insert {
            self.sequencers_by_rollapp.set(&key, &true, working_set);
        }
        self.sequencers.set(&sequencer.address, sequencer, working_set);
        Ok(())
    }

    pub fn list_by_rollapp(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Vec<Sequencer<C>> {
        let keys = self.sequencers_by_rollapp.iter_prefix(rollapp_id, working_set);
        self.resolve_index(keys, working_set)
    }

    pub fn list_by_rollapp_and_status(
        &self,
        rollapp_id: &str,
        status: OperatingStatus,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Vec<Sequencer<C>> {
        let keys = self
            .sequencers_by_rollapp
            .iter_prefix(&(rollapp_id.to_owned(), status), working_set);
        self.resolve_index(keys, working_set)
    }

    pub fn list_all(&self, working_set: &mut WorkingSet<C::Storage>) -> Vec<Sequencer<C>> {
        self.sequencers
            .iter(working_set)
            .into_iter()
            .map(|(_, sequencer)| sequencer)
            .collect()
    }

    /// Looks a sequencer up by its consensus address (see [`dymint_address`]).
    pub fn get_by_dymint_addr(
        &self,
        dymint_addr: &[u8],
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Option<Sequencer<C>> {
        let address = self.sequencers_by_dymint_addr.get(dymint_addr, working_set)?;
        self.sequencers.get(&address, working_set)
    }

    fn resolve_index(
        &self,
        keys: Vec<(IndexKey<C::Address>, bool)>,
        working_set: &mut WorkingSet<C::Storage>,
    ) -> Vec<Sequencer<C>> {
        keys.into_iter()
            .filter_map(|((_, _, address), _)| self.sequencers.get(&address, working_set))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use hub_modules_api::default_context::DefaultContext;

    use super::*;

    type C = DefaultContext;

    fn sequencer(byte: u8, status: OperatingStatus) -> Sequencer<C> {
        let mut sequencer = Sequencer::<C>::sentinel();
        sequencer.address = [byte; 32].into();
        sequencer.rollapp_id = "rollapp_1234-1".to_owned();
        sequencer.dymint_pub_key = vec![byte; 32];
        sequencer.status = status;
        sequencer
    }

    #[test]
    fn delta_for_new_record_only_inserts() {
        let new = sequencer(1, OperatingStatus::Bonded);
        let delta = index_delta(None, &new);
        assert_eq!(delta.remove, None);
        assert_eq!(delta.insert, Some(index_key(&new)));
    }

    #[test]
    fn delta_for_unchanged_status_is_empty() {
        let old = sequencer(1, OperatingStatus::Bonded);
        let mut new = old.clone();
        new.tokens += 5;
        assert_eq!(
            index_delta(Some(&old), &new),
            IndexDelta {
                remove: None,
                insert: None
            }
        );
    }

    #[test]
    fn delta_for_status_change_moves_the_entry() {
        let old = sequencer(1, OperatingStatus::Bonded);
        let new = sequencer(1, OperatingStatus::Unbonded);
        let delta = index_delta(Some(&old), &new);
        assert_eq!(delta.remove, Some(index_key(&old)));
        assert_eq!(delta.insert, Some(index_key(&new)));
    }

    #[test]
    fn dymint_address_is_twenty_bytes() {
        let addr = dymint_address::<C>(&[7; 32]);
        assert_eq!(addr.len(), DYMINT_ADDRESS_LENGTH);
        assert_ne!(addr, dymint_address::<C>(&[8; 32]));
    }
}
