//! Time-ordered queues of entries that mature at a block time.
//!
//! Entries are keyed by `(maturity, key)`. [`Timestamp`] encodes big-endian, so
//! "everything due by `now`" is one range scan ending before `now + 1`.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use hub_modules_api::{Storage, Timestamp, WorkingSet};
use hub_state::{Prefix, StateMap};

/// A schedule of values that become due at a given time.
///
/// Due entries are returned in `(maturity, encoded key)` order, so every
/// implementation replays identically.
pub trait MaturityQueue<K, V> {
    fn schedule(&mut self, maturity: Timestamp, key: K, value: V);

    fn cancel(&mut self, maturity: Timestamp, key: &K) -> Option<V>;

    /// Entries with `maturity <= now`, left in the queue.
    fn due(&mut self, now: Timestamp) -> Vec<(Timestamp, K, V)>;

    /// Entries with `maturity <= now`, removed from the queue before they are returned.
    fn drain_due(&mut self, now: Timestamp) -> Vec<(Timestamp, K, V)> {
        let due = self.due(now);
        for (maturity, key, _) in &due {
            self.cancel(*maturity, key);
        }
        due
    }
}

/// A [`MaturityQueue`] persisted in module state.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeQueue<K, V>
where
    K: BorshSerialize + BorshDeserialize,
    V: BorshSerialize + BorshDeserialize,
{
    entries: StateMap<(Timestamp, K), V>,
}

impl<K, V> TimeQueue<K, V>
where
    K: BorshSerialize + BorshDeserialize + Clone,
    V: BorshSerialize + BorshDeserialize,
{
    pub fn new(prefix: Prefix) -> Self {
        Self {
            entries: StateMap::new(prefix),
        }
    }

    pub fn push<S: Storage>(
        &self,
        maturity: Timestamp,
        key: &K,
        value: &V,
        working_set: &mut WorkingSet<S>,
    ) {
        self.entries.set(&(maturity, key.clone()), value, working_set);
    }

    pub fn remove<S: Storage>(
        &self,
        maturity: Timestamp,
        key: &K,
        working_set: &mut WorkingSet<S>,
    ) -> Option<V> {
        self.entries.remove(&(maturity, key.clone()), working_set)
    }

    pub fn get<S: Storage>(
        &self,
        maturity: Timestamp,
        key: &K,
        working_set: &mut WorkingSet<S>,
    ) -> Option<V> {
        self.entries.get(&(maturity, key.clone()), working_set)
    }

    pub fn contains<S: Storage>(
        &self,
        maturity: Timestamp,
        key: &K,
        working_set: &mut WorkingSet<S>,
    ) -> bool {
        self.entries.contains(&(maturity, key.clone()), working_set)
    }

    pub fn due<S: Storage>(
        &self,
        now: Timestamp,
        working_set: &mut WorkingSet<S>,
    ) -> Vec<(Timestamp, K, V)> {
        self.entries
            .iter_until(&now.next(), working_set)
            .into_iter()
            .map(|((maturity, key), value)| (maturity, key, value))
            .collect()
    }

    pub fn iter<S: Storage>(&self, working_set: &mut WorkingSet<S>) -> Vec<(Timestamp, K, V)> {
        self.entries
            .iter(working_set)
            .into_iter()
            .map(|((maturity, key), value)| (maturity, key, value))
            .collect()
    }

    /// Borrows the queue together with a working set as a [`MaturityQueue`].
    pub fn bind<'a, S: Storage>(
        &'a self,
        working_set: &'a mut WorkingSet<S>,
    ) -> BoundTimeQueue<'a, K, V, S> {
        BoundTimeQueue {
            queue: self,
            working_set,
        }
    }
}

pub struct BoundTimeQueue<'a, K, V, S>
where
    K: BorshSerialize + BorshDeserialize,
    V: BorshSerialize + BorshDeserialize,
    S: Storage,
{
    queue: &'a TimeQueue<K, V>,
    working_set: &'a mut WorkingSet<S>,
}

impl<'a, K, V, S> MaturityQueue<K, V> for BoundTimeQueue<'a, K, V, S>
where
    K: BorshSerialize + BorshDeserialize + Clone,
    V: BorshSerialize + BorshDeserialize,
    S: Storage,
{
    fn schedule(&mut self, maturity: Timestamp, key: K, value: V) {
        self.queue.push(maturity, &key, &value, self.working_set);
    }

    fn cancel(&mut self, maturity: Timestamp, key: &K) -> Option<V> {
        self.queue.remove(maturity, key, self.working_set)
    }

    fn due(&mut self, now: Timestamp) -> Vec<(Timestamp, K, V)> {
        self.queue.due(now, self.working_set)
    }
}

/// An in-memory [`MaturityQueue`] with the same ordering as [`TimeQueue`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTimeQueue<K, V> {
    entries: BTreeMap<(Timestamp, Vec<u8>), (K, V)>,
}

impl<K, V> MemoryTimeQueue<K, V> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn encode_key<K: BorshSerialize>(key: &K) -> Vec<u8> {
    key.try_to_vec().expect("Failed to serialize queue key")
}

impl<K, V> MaturityQueue<K, V> for MemoryTimeQueue<K, V>
where
    K: BorshSerialize + Clone,
    V: Clone,
{
    fn schedule(&mut self, maturity: Timestamp, key: K, value: V) {
        self.entries.insert((maturity, encode_key(&key)), (key, value));
    }

    fn cancel(&mut self, maturity: Timestamp, key: &K) -> Option<V> {
        self.entries
            .remove(&(maturity, encode_key(key)))
            .map(|(_, value)| value)
    }

    fn due(&mut self, now: Timestamp) -> Vec<(Timestamp, K, V)> {
        self.entries
            .range(..(now.next(), Vec::new()))
            .map(|((maturity, _), (key, value))| (*maturity, key.clone(), value.clone()))
            .collect()
    }
}
