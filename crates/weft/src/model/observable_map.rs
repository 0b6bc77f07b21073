//! A keyed collection presented in an explicit key order.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::ops::Range;

use super::collection::{Collection, SpanRemoval};
use super::operation::{IndexRange, ListOp, Mutation, OpKind, Reorder};

/// A hash map paired with the order in which its keys are displayed.
///
/// Position `i` of the collection is the entry whose key is
/// `sorted_keys()[i]`. Every stored entry is displayed exactly once.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use weft::model::{ListOp, ObservableMap};
///
/// let mut map = ObservableMap::from_map(HashMap::from([("b", 2), ("a", 1)]));
/// assert_eq!(map.sorted_keys(), &["a", "b"]);
///
/// let (previous, mutation) = map.insert("c", 3);
/// assert_eq!(previous, None);
/// assert_eq!(mutation.op(), ListOp::add(2, 2));
/// ```
#[derive(Debug, Clone)]
pub struct ObservableMap<K, V> {
    keys: Vec<K>,
    values: HashMap<K, V>,
}

impl<K, V> Default for ObservableMap<K, V> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            values: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone + Ord, V> ObservableMap<K, V> {
    /// Create a map displaying its keys in ascending order.
    pub fn from_map(values: HashMap<K, V>) -> Self {
        let mut keys: Vec<K> = values.keys().cloned().collect();
        keys.sort();
        Self { keys, values }
    }

    /// Sort the display order ascending by key.
    pub fn sort_keys(&mut self) -> Option<Mutation> {
        self.sort_keys_by(|a, _, b, _| a.cmp(b))
    }
}

impl<K: Eq + Hash + Clone, V> ObservableMap<K, V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map displayed in the order given by `key_order`.
    ///
    /// Keys of `key_order` absent from `values` are skipped, and repeated
    /// keys keep their first position. Entries whose key is not listed are
    /// dropped.
    pub fn with_key_order(mut values: HashMap<K, V>, key_order: impl IntoIterator<Item = K>) -> Self {
        let mut kept = HashMap::with_capacity(values.len());
        let mut keys = Vec::with_capacity(values.len());
        for key in key_order {
            if let Some(value) = values.remove(&key) {
                keys.push(key.clone());
                kept.insert(key, value);
            }
        }
        Self { keys, values: kept }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in display order.
    pub fn sorted_keys(&self) -> &[K] {
        &self.keys
    }

    /// The value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.values.get(key)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.values.contains_key(key)
    }

    /// Display position of `key`.
    pub fn index_of(&self, key: &K) -> Option<usize> {
        if !self.values.contains_key(key) {
            return None;
        }
        self.keys.iter().position(|k| k == key)
    }

    /// The key displayed at `index`.
    pub fn key_at(&self, index: usize) -> Option<&K> {
        self.keys.get(index)
    }

    /// The entry displayed at `index`.
    pub fn entry_at(&self, index: usize) -> Option<(&K, &V)> {
        let key = self.keys.get(index)?;
        self.values.get(key).map(|v| (key, v))
    }

    /// Iterate over entries in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.keys
            .iter()
            .filter_map(|k| self.values.get(k).map(|v| (k, v)))
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Store `value` under `key`.
    ///
    /// A new key is appended to the display order. An existing key keeps its
    /// position and the change is a targeted overwrite.
    pub fn insert(&mut self, key: K, value: V) -> (Option<V>, Mutation) {
        match self.values.entry(key) {
            Entry::Occupied(mut entry) => {
                let old = entry.insert(value);
                let index = self.keys.iter().position(|k| k == entry.key()).unwrap_or(0);
                (Some(old), ListOp::set_range(index, index).into())
            }
            Entry::Vacant(entry) => {
                self.keys.push(entry.key().clone());
                entry.insert(value);
                let index = self.keys.len() - 1;
                (None, ListOp::add(index, index).into())
            }
        }
    }

    /// Store `value` under `key`, displaying a new key at `index` (clamped).
    ///
    /// An existing key is overwritten where it already is.
    pub fn insert_at(&mut self, index: usize, key: K, value: V) -> (Option<V>, Mutation) {
        if self.values.contains_key(&key) {
            return self.insert(key, value);
        }
        let index = index.min(self.keys.len());
        self.keys.insert(index, key.clone());
        self.values.insert(key, value);
        (None, ListOp::insert(index, index).into())
    }

    /// Insert every entry of `iter`.
    ///
    /// When all keys are new the change is an append; if any key was
    /// overwritten, no single range describes it and a reset is reported.
    pub fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) -> Option<Mutation> {
        let old_len = self.keys.len();
        let mut touched = false;
        let mut overwrote = false;
        for (key, value) in iter {
            touched = true;
            match self.values.entry(key) {
                Entry::Occupied(mut entry) => {
                    entry.insert(value);
                    overwrote = true;
                }
                Entry::Vacant(entry) => {
                    self.keys.push(entry.key().clone());
                    entry.insert(value);
                }
            }
        }
        if !touched {
            return None;
        }
        if overwrote {
            return Some(ListOp::reset().into());
        }
        let span = IndexRange::with_len(old_len, self.keys.len() - old_len)?;
        Some(ListOp::new(OpKind::Add, Some(span)).into())
    }

    /// Remove the entry under `key`.
    pub fn remove(&mut self, key: &K) -> Option<(V, Mutation)> {
        let value = self.values.remove(key)?;
        let index = self.keys.iter().position(|k| k == key)?;
        self.keys.remove(index);
        Some((value, ListOp::delete(index, index).into()))
    }

    /// Remove the last displayed entry.
    pub fn pop_last(&mut self) -> Option<(K, V, Mutation)> {
        let key = self.keys.pop()?;
        let value = self.values.remove(&key)?;
        let index = self.keys.len();
        Some((key, value, ListOp::delete(index, index).into()))
    }

    /// Remove the entries displayed at positions `range`, clamped to the map.
    pub fn drain(&mut self, range: Range<usize>) -> Option<(Vec<(K, V)>, Mutation)> {
        let end = range.end.min(self.keys.len());
        let start = range.start.min(end);
        let span = IndexRange::with_len(start, end - start)?;
        let removed = self
            .keys
            .drain(start..end)
            .filter_map(|k| self.values.remove(&k).map(|v| (k, v)))
            .collect();
        Some((removed, ListOp::new(OpKind::Delete, Some(span)).into()))
    }

    /// Edit the value under `key` in place.
    pub fn modify<R>(&mut self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<(R, Mutation)> {
        let index = self.index_of(key)?;
        let value = self.values.get_mut(key)?;
        Some((f(value), ListOp::set_range(index, index).into()))
    }

    /// Remove every entry.
    pub fn clear(&mut self) -> Option<Mutation> {
        let span = IndexRange::with_len(0, self.keys.len())?;
        self.keys.clear();
        self.values.clear();
        Some(ListOp::new(OpKind::Clear, Some(span)).into())
    }

    /// Stable-sort the display order with `compare`, which sees keys and values.
    pub fn sort_keys_by<F>(&mut self, mut compare: F) -> Option<Mutation>
    where
        F: FnMut(&K, &V, &K, &V) -> std::cmp::Ordering,
    {
        if self.keys.len() < 2 {
            return None;
        }
        let mut order: Vec<usize> = (0..self.keys.len()).collect();
        let (keys, values) = (&self.keys, &self.values);
        order.sort_by(|&a, &b| match (values.get(&keys[a]), values.get(&keys[b])) {
            (Some(va), Some(vb)) => compare(&keys[a], va, &keys[b], vb),
            _ => std::cmp::Ordering::Equal,
        });

        let mut new_index_of = vec![0; order.len()];
        for (new, &old) in order.iter().enumerate() {
            new_index_of[old] = new;
        }
        self.keys = order.iter().map(|&old| self.keys[old].clone()).collect();
        Some(Mutation::reordered(OpKind::Sort, Reorder::Permuted(new_index_of)))
    }

    /// Reverse the display order.
    pub fn reverse(&mut self) -> Option<Mutation> {
        if self.keys.len() < 2 {
            return None;
        }
        self.keys.reverse();
        Some(Mutation::reordered(
            OpKind::Reverse,
            Reorder::Reversed {
                len: self.keys.len(),
            },
        ))
    }
}

impl<K, V> Collection for ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    type Item = V;
    type Key = K;

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn get(&self, index: usize) -> Option<&V> {
        self.values.get(self.keys.get(index)?)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut V> {
        let key = self.keys.get(index)?;
        self.values.get_mut(key)
    }

    fn key(&self, index: usize) -> Option<K> {
        self.keys.get(index).cloned()
    }
}

impl<K, V> SpanRemoval for ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn remove_span(&mut self, start: usize, end: usize) -> Option<Mutation> {
        self.drain(start..end).map(|(_, mutation)| mutation)
    }

    fn retain_positions(&mut self, keep: &BTreeSet<usize>) -> Option<Mutation> {
        if keep.len() >= self.keys.len() && keep.iter().all(|&i| i < self.keys.len()) {
            return None;
        }
        let old = std::mem::take(&mut self.keys);
        for (i, key) in old.into_iter().enumerate() {
            if keep.contains(&i) {
                self.keys.push(key);
            } else {
                self.values.remove(&key);
            }
        }
        Some(ListOp::reset().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fruit() -> ObservableMap<&'static str, u32> {
        ObservableMap::from_map(HashMap::from([("cherry", 3), ("apple", 1), ("banana", 2)]))
    }

    #[test]
    fn test_from_map_sorts_keys() {
        let map = fruit();
        assert_eq!(map.sorted_keys(), &["apple", "banana", "cherry"]);
        assert_eq!(map.entry_at(1), Some((&"banana", &2)));
        assert_eq!(Collection::get(&map, 2), Some(&3));
        assert_eq!(Collection::key(&map, 3), None);
    }

    #[test]
    fn test_insert_new_and_existing() {
        let mut map = fruit();
        let (old, m) = map.insert("date", 4);
        assert_eq!(old, None);
        assert_eq!(m.op(), ListOp::add(3, 3));

        let (old, m) = map.insert("banana", 20);
        assert_eq!(old, Some(2));
        assert_eq!(m.op(), ListOp::set_range(1, 1));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_insert_at_position() {
        let mut map = fruit();
        let (_, m) = map.insert_at(0, "aardvark", 0);
        assert_eq!(m.op(), ListOp::insert(0, 0));
        assert_eq!(map.sorted_keys()[0], "aardvark");
        assert_eq!(map.index_of(&"apple"), Some(1));
    }

    #[test]
    fn test_extend_reports_append_or_reset() {
        let mut map = fruit();
        let m = map.extend([("date", 4), ("elder", 5)]).unwrap();
        assert_eq!(m.op(), ListOp::add(3, 4));

        let m = map.extend([("fig", 6), ("apple", 10)]).unwrap();
        assert_eq!(m.op(), ListOp::reset());
        assert!(map.extend(Vec::new()).is_none());
    }

    #[test]
    fn test_remove_and_pop_last() {
        let mut map = fruit();
        let (value, m) = map.remove(&"banana").unwrap();
        assert_eq!((value, m.op()), (2, ListOp::delete(1, 1)));
        assert!(map.remove(&"banana").is_none());

        let (key, value, m) = map.pop_last().unwrap();
        assert_eq!((key, value, m.op()), ("cherry", 3, ListOp::delete(1, 1)));
        assert_eq!(map.sorted_keys(), &["apple"]);
    }

    #[test]
    fn test_sort_by_value_records_permutation() {
        let mut map = ObservableMap::from_map(HashMap::from([("a", 3), ("b", 1), ("c", 2)]));
        let m = map.sort_keys_by(|_, va, _, vb| va.cmp(vb)).unwrap();
        assert_eq!(map.sorted_keys(), &["b", "c", "a"]);
        let reorder = m.reorder().unwrap();
        assert_eq!(reorder.new_index(0), Some(2));
        assert_eq!(reorder.new_index(1), Some(0));
        assert_eq!(reorder.new_index(2), Some(1));
    }

    #[test]
    fn test_with_key_order_filters_and_dedups() {
        let values = HashMap::from([(1, "one"), (2, "two"), (3, "three")]);
        let map = ObservableMap::with_key_order(values, [3, 9, 1, 3]);
        assert_eq!(map.sorted_keys(), &[3, 1]);
        assert!(!map.contains_key(&2));
    }

    #[test]
    fn test_drain_and_retain_positions() {
        let mut map = fruit();
        let (removed, m) = map.drain(0..2).unwrap();
        assert_eq!(removed, vec![("apple", 1), ("banana", 2)]);
        assert_eq!(m.op(), ListOp::delete(0, 1));
        assert!(map.drain(3..9).is_none());

        let mut map = fruit();
        let m = map.retain_positions(&BTreeSet::from([2])).unwrap();
        assert_eq!(m.op(), ListOp::reset());
        assert_eq!(map.sorted_keys(), &["cherry"]);
        assert!(!map.contains_key(&"apple"));
    }

    #[test]
    fn test_clear_and_reverse() {
        let mut map = fruit();
        assert_eq!(map.reverse().map(|m| m.op().kind()), Some(OpKind::Reverse));
        assert_eq!(map.sorted_keys(), &["cherry", "banana", "apple"]);
        assert_eq!(map.clear().map(|m| m.op()), Some(ListOp::new(OpKind::Clear, Some(IndexRange::new(0, 2)))));
        assert!(map.clear().is_none());
    }
}
