//! Index-keyed cache of instantiated item views.

use std::collections::BTreeMap;

use super::operation::IndexRange;
use super::view::{ViewHandle, ViewId};

/// Maps collection positions to the views built for them.
///
/// This is a coherence cache, not an LRU: entries leave only when the
/// adapter reconciles a mutation that invalidates them. Every key always
/// equals the [`index`](ViewHandle::index) of the handle stored under it.
pub struct ViewCache<V> {
    views: BTreeMap<usize, ViewHandle<V>>,
}

impl<V> Default for ViewCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ViewCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            views: BTreeMap::new(),
        }
    }

    /// Number of cached views.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// The view cached for `index`.
    pub fn get(&self, index: usize) -> Option<&ViewHandle<V>> {
        self.views.get(&index)
    }

    /// The cached view for `index`, building it with `factory` on a miss.
    ///
    /// A factory returning `Ok(None)` leaves the cache untouched.
    pub fn get_or_create<E>(
        &mut self,
        index: usize,
        factory: impl FnOnce(usize) -> Result<Option<ViewHandle<V>>, E>,
    ) -> Result<Option<ViewHandle<V>>, E> {
        if let Some(view) = self.views.get(&index) {
            return Ok(Some(view.clone()));
        }
        let Some(view) = factory(index)? else {
            return Ok(None);
        };
        view.set_index(index);
        self.views.insert(index, view.clone());
        Ok(Some(view))
    }

    /// Store `view` under `index`, returning whatever was there.
    pub fn insert(&mut self, index: usize, view: ViewHandle<V>) -> Option<ViewHandle<V>> {
        view.set_index(index);
        self.views.insert(index, view)
    }

    /// Remove the entries for `indices`, returning the evicted views.
    pub fn evict(&mut self, indices: impl IntoIterator<Item = usize>) -> Vec<ViewHandle<V>> {
        indices
            .into_iter()
            .filter_map(|i| self.views.remove(&i))
            .collect()
    }

    /// Evict every entry inside `range`.
    pub fn evict_range(&mut self, range: IndexRange) -> Vec<ViewHandle<V>> {
        let keys: Vec<usize> = self.views.range(range.iter()).map(|(k, _)| *k).collect();
        self.evict(keys)
    }

    /// Rewrite every key through `mapping`.
    ///
    /// Entries mapped to `None` are evicted and returned. Surviving handles
    /// have their index updated to the new key.
    pub fn reindex(&mut self, mut mapping: impl FnMut(usize) -> Option<usize>) -> Vec<ViewHandle<V>> {
        let mut dropped = Vec::new();
        let old = std::mem::take(&mut self.views);
        for (index, view) in old {
            match mapping(index) {
                Some(new_index) => {
                    view.set_index(new_index);
                    if let Some(displaced) = self.views.insert(new_index, view) {
                        dropped.push(displaced);
                    }
                }
                None => dropped.push(view),
            }
        }
        if !dropped.is_empty() {
            tracing::trace!(target: "weft::cache", dropped = dropped.len(), "reindex evicted views");
        }
        dropped
    }

    /// Make room for `count` new items at `start`: every entry at or after
    /// `start` moves up by `count`.
    pub fn shift_up(&mut self, start: usize, count: usize) {
        if count == 0 {
            return;
        }
        let tail = self.views.split_off(&start);
        for (index, view) in tail {
            let new_index = index + count;
            view.set_index(new_index);
            self.views.insert(new_index, view);
        }
    }

    /// Close the gap left by deleting `range`: evict entries inside it and
    /// move every later entry down by its length.
    pub fn remove_range(&mut self, range: IndexRange) -> Vec<ViewHandle<V>> {
        let mut tail = self.views.split_off(&range.start());
        let after = tail.split_off(&(range.end() + 1));
        let evicted: Vec<ViewHandle<V>> = tail.into_values().collect();
        for (index, view) in after {
            let new_index = index - range.len();
            view.set_index(new_index);
            self.views.insert(new_index, view);
        }
        evicted
    }

    /// Evict everything.
    pub fn clear(&mut self) -> Vec<ViewHandle<V>> {
        std::mem::take(&mut self.views).into_values().collect()
    }

    /// Position of the cached view with identity `id`.
    pub fn find(&self, id: ViewId) -> Option<usize> {
        self.views
            .iter()
            .find_map(|(index, view)| (view.id() == id).then_some(*index))
    }

    /// Cached positions in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        self.views.keys().copied().collect()
    }

    /// Whether `view` is the handle cached at its own index.
    pub fn holds(&self, view: &ViewHandle<V>) -> bool {
        self.views
            .get(&view.index())
            .is_some_and(|cached| cached.ptr_eq(view))
    }

    /// Whether every key matches its handle's index and lies below `len`.
    pub fn is_coherent(&self, len: usize) -> bool {
        self.views
            .iter()
            .all(|(index, view)| *index < len && view.index() == *index)
    }
}

impl<V> std::fmt::Debug for ViewCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewCache")
            .field("indices", &self.indices())
            .finish()
    }
}
