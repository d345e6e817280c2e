use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::codec::{EncodeKeyLike, StateKeyCodec, StateValueCodec};
use crate::storage::{prefix_upper_bound, OrderedWrites, StorageKey, StorageValue};
use crate::{Event, Prefix, Storage};

/// A set of pending writes. `None` marks a deletion.
type WriteLayer = BTreeMap<StorageKey, Option<StorageValue>>;

/// This structure is responsible for storing the write set
/// and is obtained from the `WorkingSet` by using either the `checkpoint` or `revert` method.
pub struct StateCheckpoint<S: Storage> {
    inner: S,
    writes: WriteLayer,
}

impl<S: Storage> StateCheckpoint<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            writes: Default::default(),
        }
    }

    pub fn to_revertable(self) -> WorkingSet<S> {
        WorkingSet {
            checkpoint: self,
            layers: vec![Default::default()],
            events: Default::default(),
            event_marks: Default::default(),
        }
    }

    /// Hands out the accumulated writes, leaving the checkpoint empty.
    pub fn freeze(&mut self) -> OrderedWrites {
        std::mem::take(&mut self.writes)
    }

    /// Commits the accumulated writes into the backing storage.
    pub fn commit(mut self) -> S {
        let writes = self.freeze();
        self.inner.commit(writes);
        self.inner
    }
}

impl<S: Storage> Debug for StateCheckpoint<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCheckpoint")
            .field("writes", &self.writes.len())
            .finish()
    }
}

/// This structure contains the write set and the events collected during the execution of a transaction.
/// There are two ways to convert it into a StateCheckpoint:
/// 1. By using the checkpoint() method, where all the changes are added to the underlying StateCheckpoint.
/// 2. By using the revert method, where the most recent changes are reverted and the previous `StateCheckpoint` is returned.
///
/// Inside a transaction, [`WorkingSet::with_revertable`] stages a nested layer that is folded into
/// its parent on success and dropped, together with the events it emitted, on failure.
pub struct WorkingSet<S: Storage> {
    checkpoint: StateCheckpoint<S>,
    // Never empty. The last layer receives writes.
    layers: Vec<WriteLayer>,
    events: Vec<Event>,
    // Number of events at the time each nested layer was opened.
    event_marks: Vec<usize>,
}

impl<S: Storage> WorkingSet<S> {
    pub fn new(inner: S) -> Self {
        StateCheckpoint::new(inner).to_revertable()
    }

    pub fn checkpoint(self) -> StateCheckpoint<S> {
        let mut checkpoint = self.checkpoint;
        for layer in self.layers {
            checkpoint.writes.extend(layer);
        }
        checkpoint
    }

    pub fn revert(self) -> StateCheckpoint<S> {
        self.checkpoint
    }

    /// Runs `f` against a fresh nested layer. If `f` returns `Ok`, its writes and events are
    /// kept; if it returns `Err`, everything it wrote or emitted is discarded.
    pub fn with_revertable<T, E>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        self.layers.push(Default::default());
        self.event_marks.push(self.events.len());

        let result = f(self);

        let layer = self.layers.pop().unwrap_or_default();
        let mark = self.event_marks.pop().unwrap_or(self.events.len());
        match result {
            Ok(value) => {
                self.top_layer().extend(layer);
                Ok(value)
            }
            Err(err) => {
                self.events.truncate(mark);
                Err(err)
            }
        }
    }

    /// Depth of nested revertable layers currently open.
    pub fn nesting_depth(&self) -> usize {
        self.layers.len() - 1
    }

    pub(crate) fn get(&mut self, key: &StorageKey) -> Option<StorageValue> {
        for layer in self.layers.iter().rev() {
            if let Some(value) = layer.get(key) {
                return value.clone();
            }
        }
        if let Some(value) = self.checkpoint.writes.get(key) {
            return value.clone();
        }
        self.checkpoint.inner.get(key)
    }

    pub(crate) fn set(&mut self, key: StorageKey, value: StorageValue) {
        self.top_layer().insert(key, Some(value));
    }

    pub(crate) fn delete(&mut self, key: StorageKey) {
        self.top_layer().insert(key, None);
    }

    /// Returns the live entries with `lower <= key < upper` in ascending key order,
    /// merging the backing storage with every pending layer.
    pub(crate) fn range(
        &mut self,
        lower: &[u8],
        upper: Option<&[u8]>,
    ) -> Vec<(StorageKey, StorageValue)> {
        let in_range = |key: &StorageKey| {
            let key = key.as_bytes();
            key >= lower && upper.map_or(true, |upper| key < upper)
        };

        let mut merged: BTreeMap<StorageKey, Option<StorageValue>> = self
            .checkpoint
            .inner
            .range(lower, upper)
            .into_iter()
            .map(|(k, v)| (k, Some(v)))
            .collect();

        let pending = std::iter::once(&self.checkpoint.writes).chain(self.layers.iter());
        for layer in pending {
            for (key, value) in layer.iter().filter(|(key, _)| in_range(key)) {
                merged.insert(key.clone(), value.clone());
            }
        }

        merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect()
    }

    fn top_layer(&mut self) -> &mut WriteLayer {
        if self.layers.is_empty() {
            self.layers.push(Default::default());
        }
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    pub fn add_event(&mut self, key: &str, value: &str) {
        self.events.push(Event::new(key, value));
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn backing(&self) -> &S {
        &self.checkpoint.inner
    }
}

impl<S: Storage> WorkingSet<S> {
    pub(crate) fn set_value<Q, K, V, C>(&mut self, prefix: &Prefix, codec: &C, key: &Q, value: &V)
    where
        Q: ?Sized,
        C: EncodeKeyLike<Q, K> + StateValueCodec<V>,
    {
        let storage_key = StorageKey::new(prefix, key, codec);
        let storage_value = StorageValue::new(value, codec);
        self.set(storage_key, storage_value);
    }

    pub(crate) fn get_value<Q, K, V, C>(&mut self, prefix: &Prefix, codec: &C, key: &Q) -> Option<V>
    where
        Q: ?Sized,
        C: EncodeKeyLike<Q, K> + StateValueCodec<V>,
    {
        let storage_key = StorageKey::new(prefix, key, codec);
        self.get_decoded(codec, &storage_key)
    }

    pub(crate) fn remove_value<Q, K, V, C>(
        &mut self,
        prefix: &Prefix,
        codec: &C,
        key: &Q,
    ) -> Option<V>
    where
        Q: ?Sized,
        C: EncodeKeyLike<Q, K> + StateValueCodec<V>,
    {
        let storage_key = StorageKey::new(prefix, key, codec);
        let value = self.get_decoded(codec, &storage_key)?;
        self.delete(storage_key);
        Some(value)
    }

    pub(crate) fn delete_value<Q, K, C>(&mut self, prefix: &Prefix, codec: &C, key: &Q)
    where
        Q: ?Sized,
        C: EncodeKeyLike<Q, K>,
    {
        let storage_key = StorageKey::new(prefix, key, codec);
        self.delete(storage_key);
    }

    /// Decodes every entry whose full key starts with `prefix` followed by `key_prefix`
    /// and is strictly below `prefix` followed by `key_upper`, when given.
    pub(crate) fn scan_decoded<K, V, C>(
        &mut self,
        prefix: &Prefix,
        codec: &C,
        key_prefix: &[u8],
        key_upper: Option<&[u8]>,
    ) -> Vec<(K, V)>
    where
        C: StateKeyCodec<K> + StateValueCodec<V>,
    {
        let lower = StorageKey::from_parts(prefix, key_prefix);
        let upper = match key_upper {
            Some(key_upper) => Some(StorageKey::from_parts(prefix, key_upper).as_bytes().to_vec()),
            None => prefix_upper_bound(lower.as_bytes()),
        };

        let prefix_len = prefix.len();
        self.range(lower.as_bytes(), upper.as_deref())
            .into_iter()
            .filter(|(key, _)| key.as_bytes().starts_with(lower.as_bytes()))
            .map(|(key, value)| {
                let key = codec.decode_key(&key.as_bytes()[prefix_len..]);
                let value = codec.decode_value(value.value());
                (key, value)
            })
            .collect()
    }

    fn get_decoded<V, C>(&mut self, codec: &C, storage_key: &StorageKey) -> Option<V>
    where
        C: StateValueCodec<V>,
    {
        let storage_value = self.get(storage_key)?;
        // It is ok to panic here. Deserialization problem means that something is terribly wrong.
        Some(codec.decode_value(storage_value.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStorage, StateMap};

    fn map() -> StateMap<u32, u64> {
        StateMap::new(Prefix::new(b"test/map/".to_vec()))
    }

    #[test]
    fn nested_layer_is_discarded_on_error() {
        let map = map();
        let mut ws = WorkingSet::new(MemoryStorage::new());
        map.set(&1, &10, &mut ws);
        ws.add_event("outer", "kept");

        let result: Result<(), &str> = ws.with_revertable(|ws| {
            map.set(&1, &11, ws);
            map.set(&2, &20, ws);
            ws.add_event("inner", "dropped");
            Err("boom")
        });

        assert!(result.is_err());
        assert_eq!(map.get(&1, &mut ws), Some(10));
        assert_eq!(map.get(&2, &mut ws), None);
        assert_eq!(ws.events().len(), 1);
        assert_eq!(ws.nesting_depth(), 0);
    }

    #[test]
    fn nested_layer_is_folded_on_success() {
        let map = map();
        let mut ws = WorkingSet::new(MemoryStorage::new());

        let value: Result<u64, ()> = ws.with_revertable(|ws| {
            map.set(&3, &30, ws);
            ws.with_revertable(|ws| {
                map.delete(&3, ws);
                Err::<(), ()>(())
            })
            .ok();
            Ok(map.get(&3, ws).unwrap_or_default())
        });

        assert_eq!(value, Ok(30));
        assert_eq!(map.get(&3, &mut ws), Some(30));
    }

    #[test]
    fn checkpoint_commits_and_revert_discards() {
        let map = map();
        let storage = MemoryStorage::new();

        let mut ws = WorkingSet::new(storage.clone());
        map.set(&7, &70, &mut ws);
        let storage = ws.checkpoint().commit();
        assert!(!storage.is_empty());

        let mut ws = WorkingSet::new(storage.clone());
        map.set(&7, &71, &mut ws);
        map.delete(&7, &mut ws);
        let _ = ws.revert();

        let mut ws = WorkingSet::new(storage);
        assert_eq!(map.get(&7, &mut ws), Some(70));
    }
}
