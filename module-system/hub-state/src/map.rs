use core::marker::PhantomData;
use std::borrow::Borrow;

use thiserror::Error;

use crate::codec::{BorshCodec, EncodeKeyLike, EncodeKeyPrefix, StateCodec};
use crate::storage::StorageKey;
use crate::{Prefix, Storage, WorkingSet};

/// A container that maps keys to values.
///
/// # Type parameters
/// [`StateMap`] is generic over:
/// - a key type (`K`);
/// - a value type (`V`);
/// - a [`StateCodec`] (`C`).
///
/// Iteration (`iter`, `iter_prefix`, `iter_until`) yields entries in ascending order
/// of their encoded keys.
#[derive(borsh::BorshDeserialize, borsh::BorshSerialize, Debug, PartialEq, Clone)]
pub struct StateMap<K, V, C = BorshCodec>
where
    C: StateCodec<K, V>,
{
    _phantom: (PhantomData<K>, PhantomData<V>),
    codec: C,
    prefix: Prefix,
}

/// Error type for `StateMap` get method.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Value not found for prefix: {0} and: storage key {1}")]
    MissingValue(Prefix, StorageKey),
}

impl<K, V> StateMap<K, V>
where
    BorshCodec: StateCodec<K, V>,
{
    /// Creates a new [`StateMap`] with the given prefix and the default
    /// [`StateCodec`] (i.e. [`BorshCodec`]).
    pub fn new(prefix: Prefix) -> Self {
        Self {
            _phantom: (PhantomData, PhantomData),
            codec: BorshCodec,
            prefix,
        }
    }
}

impl<K, V, C> StateMap<K, V, C>
where
    C: StateCodec<K, V>,
{
    /// Creates a new [`StateMap`] with the given prefix and codec.
    pub fn with_codec(prefix: Prefix, codec: C) -> Self {
        Self {
            _phantom: (PhantomData, PhantomData),
            codec,
            prefix,
        }
    }

    /// Returns the prefix used when this [`StateMap`] was created.
    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// Inserts a key-value pair into the map.
    pub fn set<S, Q>(&self, key: &Q, value: &V, working_set: &mut WorkingSet<S>)
    where
        S: Storage,
        K: Borrow<Q>,
        Q: ?Sized,
        C: EncodeKeyLike<Q, K>,
    {
        working_set.set_value(self.prefix(), &self.codec, key, value)
    }

    /// Returns the value corresponding to the key or None if key is absent in the StateMap.
    ///
    /// We can use as argument any type that can be borrowed by the key.
    ///
    /// ```rust
    /// use hub_state::{StateMap, Storage, WorkingSet};
    ///
    /// fn foo<S>(map: StateMap<String, u64>, key: &str, ws: &mut WorkingSet<S>) -> Option<u64>
    /// where
    ///     S: Storage,
    /// {
    ///     map.get(key, ws)
    /// }
    /// ```
    pub fn get<S, Q>(&self, key: &Q, working_set: &mut WorkingSet<S>) -> Option<V>
    where
        S: Storage,
        K: Borrow<Q>,
        Q: ?Sized,
        C: EncodeKeyLike<Q, K>,
    {
        working_set.get_value(self.prefix(), &self.codec, key)
    }

    /// Returns the value corresponding to the key or Error if key is absent in the StateMap.
    ///
    /// For reference, check [Self::get].
    pub fn get_or_err<S, Q>(&self, key: &Q, working_set: &mut WorkingSet<S>) -> Result<V, Error>
    where
        S: Storage,
        K: Borrow<Q>,
        Q: ?Sized,
        C: EncodeKeyLike<Q, K>,
    {
        self.get(key, working_set).ok_or_else(|| {
            Error::MissingValue(
                self.prefix().clone(),
                StorageKey::new(self.prefix(), key, &self.codec),
            )
        })
    }

    /// Returns true if the key is present in the map.
    pub fn contains<S, Q>(&self, key: &Q, working_set: &mut WorkingSet<S>) -> bool
    where
        S: Storage,
        K: Borrow<Q>,
        Q: ?Sized,
        C: EncodeKeyLike<Q, K>,
    {
        self.get(key, working_set).is_some()
    }

    /// Removes a key from the StateMap, returning the corresponding value (or None if the key is absent).
    pub fn remove<S, Q>(&self, key: &Q, working_set: &mut WorkingSet<S>) -> Option<V>
    where
        S: Storage,
        K: Borrow<Q>,
        Q: ?Sized,
        C: EncodeKeyLike<Q, K>,
    {
        working_set.remove_value(self.prefix(), &self.codec, key)
    }

    /// Deletes a key from the StateMap.
    pub fn delete<S, Q>(&self, key: &Q, working_set: &mut WorkingSet<S>)
    where
        S: Storage,
        K: Borrow<Q>,
        Q: ?Sized,
        C: EncodeKeyLike<Q, K>,
    {
        working_set.delete_value(self.prefix(), &self.codec, key);
    }

    /// Returns every entry of the map.
    pub fn iter<S: Storage>(&self, working_set: &mut WorkingSet<S>) -> Vec<(K, V)> {
        working_set.scan_decoded(self.prefix(), &self.codec, &[], None)
    }

    /// Returns the entries whose key starts with the given leading component,
    /// e.g. every `(rollapp, address)` key for one rollapp.
    pub fn iter_prefix<S, P>(&self, key_prefix: &P, working_set: &mut WorkingSet<S>) -> Vec<(K, V)>
    where
        S: Storage,
        P: ?Sized,
        C: EncodeKeyPrefix<P>,
    {
        let key_prefix = self.codec.encode_key_prefix(key_prefix);
        working_set.scan_decoded(self.prefix(), &self.codec, &key_prefix, None)
    }

    /// Returns the entries whose encoded key sorts strictly before the encoding of `end`.
    ///
    /// `end` may be a full key or a leading component of one, e.g. the timestamp of a
    /// `(Timestamp, address)` key.
    pub fn iter_until<S, P>(&self, end: &P, working_set: &mut WorkingSet<S>) -> Vec<(K, V)>
    where
        S: Storage,
        P: ?Sized,
        C: EncodeKeyPrefix<P>,
    {
        let end = self.codec.encode_key_prefix(end);
        working_set.scan_decoded(self.prefix(), &self.codec, &[], Some(&end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    #[test]
    fn prefix_scan_sees_pending_writes_and_deletes() {
        let map: StateMap<(String, [u8; 2]), u8> =
            StateMap::new(Prefix::new(b"idx/".to_vec()));
        let storage = MemoryStorage::new();
        let mut ws = WorkingSet::new(storage.clone());
        map.set(&("a".to_string(), [1, 1]), &1, &mut ws);
        map.set(&("a".to_string(), [0, 9]), &2, &mut ws);
        map.set(&("ab".to_string(), [0, 0]), &3, &mut ws);
        let storage = ws.checkpoint().commit();

        let mut ws = WorkingSet::new(storage);
        map.delete(&("a".to_string(), [1, 1]), &mut ws);
        map.set(&("a".to_string(), [0, 1]), &4, &mut ws);

        let found: Vec<u8> = map
            .iter_prefix(&"a".to_string(), &mut ws)
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(found, vec![4, 2]);
        assert_eq!(map.iter(&mut ws).len(), 3);
    }

    #[test]
    fn iter_until_is_exclusive() {
        let map: StateMap<[u8; 2], u8> = StateMap::new(Prefix::new(b"q/".to_vec()));
        let mut ws = WorkingSet::new(MemoryStorage::new());
        let entries: [([u8; 2], u8); 4] = [([0, 5], 1), ([1, 0], 2), ([1, 1], 3), ([2, 0], 4)];
        for (k, v) in entries {
            map.set(&k, &v, &mut ws);
        }
        let due: Vec<u8> = map
            .iter_until(&[1u8, 1], &mut ws)
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(due, vec![1, 2]);
    }
}
