use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::{Arc, RwLock};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::codec::{EncodeKeyLike, StateValueCodec};
use crate::Prefix;

// `Key` type for the `Storage`
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Serialize,
    Deserialize,
    BorshDeserialize,
    BorshSerialize,
)]
pub struct StorageKey {
    key: Arc<Vec<u8>>,
}

impl StorageKey {
    /// Creates a new StorageKey that combines a prefix and a key.
    pub fn new<K, Q, KC>(prefix: &Prefix, key: &Q, codec: &KC) -> Self
    where
        KC: EncodeKeyLike<Q, K>,
        Q: ?Sized,
    {
        let encoded_key = codec.encode_key_like(key);
        Self::from_parts(prefix, &encoded_key)
    }

    /// Creates a new StorageKey from the bare prefix, used by single-value containers.
    pub fn singleton(prefix: &Prefix) -> Self {
        Self::from_parts(prefix, &[])
    }

    pub(crate) fn from_parts(prefix: &Prefix, encoded_key: &[u8]) -> Self {
        let mut full_key = Vec::with_capacity(prefix.len() + encoded_key.len());
        full_key.extend_from_slice(prefix.as_bytes());
        full_key.extend_from_slice(encoded_key);
        Self {
            key: Arc::new(full_key),
        }
    }

    pub fn key(&self) -> Arc<Vec<u8>> {
        self.key.clone()
    }

    /// The raw bytes of the key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl From<Vec<u8>> for StorageKey {
    fn from(key: Vec<u8>) -> Self {
        Self { key: Arc::new(key) }
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.key.as_ref()))
    }
}

/// A serialized value suitable for storing. Internally uses an [`Arc<Vec<u8>>`] for cheap cloning.
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize, Default,
)]
pub struct StorageValue {
    value: Arc<Vec<u8>>,
}

impl From<Vec<u8>> for StorageValue {
    fn from(value: Vec<u8>) -> Self {
        Self {
            value: Arc::new(value),
        }
    }
}

impl StorageValue {
    /// Create a new storage value by serializing the input with the given codec.
    pub fn new<V, VC>(value: &V, codec: &VC) -> Self
    where
        VC: StateValueCodec<V>,
    {
        let encoded_value = codec.encode_value(value);
        Self {
            value: Arc::new(encoded_value),
        }
    }

    /// Get the bytes of this value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

/// The write set produced by a [`crate::StateCheckpoint`], ordered by key.
/// `None` marks a deletion.
pub type OrderedWrites = BTreeMap<StorageKey, Option<StorageValue>>;

/// An ordered key-value store that the working set reads from and commits to.
///
/// Implementations must iterate in ascending byte order of the keys, because
/// state containers rely on that order for prefix and range scans.
pub trait Storage: Clone {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &StorageKey) -> Option<StorageValue>;

    /// Returns every entry with `lower <= key` and, if `upper` is given,
    /// `key < upper`, in ascending key order.
    fn range(&self, lower: &[u8], upper: Option<&[u8]>) -> Vec<(StorageKey, StorageValue)>;

    /// Applies a write set atomically.
    fn commit(&self, writes: OrderedWrites);

    /// Returns true if nothing has been committed to the storage yet.
    fn is_empty(&self) -> bool;
}

/// A [`Storage`] kept entirely in memory. Clones share the same underlying map.
#[derive(Clone, Default, Debug)]
pub struct MemoryStorage {
    entries: Arc<RwLock<BTreeMap<Vec<u8>, StorageValue>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<Vec<u8>, StorageValue>> {
        // Commits never leave the map half-written, so a poisoned lock is still readable.
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &StorageKey) -> Option<StorageValue> {
        self.read().get(key.as_bytes()).cloned()
    }

    fn range(&self, lower: &[u8], upper: Option<&[u8]>) -> Vec<(StorageKey, StorageValue)> {
        use std::ops::Bound;

        let upper = match upper {
            Some(upper) => Bound::Excluded(upper.to_vec()),
            None => Bound::Unbounded,
        };
        self.read()
            .range((Bound::Included(lower.to_vec()), upper))
            .map(|(k, v)| (StorageKey::from(k.clone()), v.clone()))
            .collect()
    }

    fn commit(&self, writes: OrderedWrites) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (key, value) in writes {
            match value {
                Some(value) => {
                    entries.insert(key.as_bytes().to_vec(), value);
                }
                None => {
                    entries.remove(key.as_bytes());
                }
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Returns the smallest byte string greater than every string starting with `prefix`,
/// or `None` if no such string exists (the prefix is empty or all `0xff`).
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < u8::MAX {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_upper_bound_carries() {
        assert_eq!(prefix_upper_bound(&[1, 2, 3]), Some(vec![1, 2, 4]));
        assert_eq!(prefix_upper_bound(&[1, 0xff, 0xff]), Some(vec![2]));
        assert_eq!(prefix_upper_bound(&[0xff]), None);
        assert_eq!(prefix_upper_bound(&[]), None);
    }

    #[test]
    fn memory_storage_range_is_ordered_and_bounded() {
        let storage = MemoryStorage::new();
        let mut writes = OrderedWrites::new();
        for k in [vec![3u8], vec![1], vec![2, 0], vec![2], vec![4]] {
            writes.insert(StorageKey::from(k.clone()), Some(StorageValue::from(k)));
        }
        storage.commit(writes);

        let keys: Vec<Vec<u8>> = storage
            .range(&[2], Some(&[4]))
            .into_iter()
            .map(|(k, _)| k.as_bytes().to_vec())
            .collect();
        assert_eq!(keys, vec![vec![2], vec![2, 0], vec![3]]);

        let mut deletes = OrderedWrites::new();
        deletes.insert(StorageKey::from(vec![3u8]), None);
        storage.commit(deletes);
        assert!(storage.get(&StorageKey::from(vec![3u8])).is_none());
        assert!(!storage.is_empty());
    }
}
