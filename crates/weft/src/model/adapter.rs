//! Adapters: the bridge between an observable collection and item views.
//!
//! An [`Adapter`] owns a collection, a [`ViewCache`] and the selection. It
//! builds item views lazily on request, and reconciles every mutation of the
//! collection so that cached views keep pointing at the right items and the
//! selection never holds a view whose item is gone.
//!
//! Consumers subscribe to two signals:
//!
//! - [`Adapter::data_changed`] carries the [`ListOp`] of every reconciled
//!   mutation.
//! - [`Adapter::selection_changed`] carries the current selection whenever
//!   it changed, once per top-level operation.
//!
//! # Example
//!
//! ```
//! use weft::model::{ListAdapter, ObservableList, SelectionMode, text_converter};
//!
//! let adapter = ListAdapter::builder(ObservableList::from(vec!["a", "b", "c"]))
//!     .converter(text_converter)
//!     .view_class(|_index, _params| ())
//!     .selection_mode(SelectionMode::SingleSelection)
//!     .allow_empty_selection(false)
//!     .build()
//!     .unwrap();
//!
//! // The first item is selected because the selection may not be empty.
//! assert_eq!(adapter.selected_indices(), vec![0]);
//!
//! adapter.insert(0, "z").unwrap();
//! assert_eq!(adapter.selected_indices(), vec![1]);
//! assert_eq!(adapter.get_view(1).unwrap().unwrap().params().text("text"), Some("a"));
//! ```
//!
//! # Locking
//!
//! Converters, view factories and selection hooks run while the adapter is
//! locked and must not call back into it. Signal slots run after the lock is
//! released and may read from the adapter or change its selection. Slots run
//! by a collection mutation cannot mutate the collection again: the nested
//! call fails with [`WeftError::Reentrancy`].

use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;
use std::ops::RangeBounds;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use weft_core::logging::span_names;
use weft_core::{ConfigError, PerfSpan, ReentrancyGuard, Result, Signal, WeftError};

use super::cache::ViewCache;
use super::collection::{Collection, SpanRemoval};
use super::observable_list::ObservableList;
use super::observable_map::ObservableMap;
use super::operation::{IndexRange, ListOp, Mutation, OpKind, Reorder};
use super::params::ViewParams;
use super::selectable::{Selectable, SelectionFlag};
use super::selection::{
    Selection, SelectionConfig, SelectionHook, SelectionHost, SelectionMode,
};
use super::view::{ItemView, ViewHandle, ViewId};

/// Converts an item and its position into view parameters.
pub type Converter<T> = Arc<dyn Fn(usize, &T) -> ViewParams + Send + Sync>;

/// Converts an item, its position and its key into view parameters.
pub type KeyedConverter<K, T> = Arc<dyn Fn(usize, &K, &T) -> ViewParams + Send + Sync>;

/// Instantiates a view from its position and parameters.
pub type ViewFactory<V> = Arc<dyn Fn(usize, &ViewParams) -> V + Send + Sync>;

/// An adapter over an [`ObservableList`].
pub type ListAdapter<T, V> = Adapter<ObservableList<T>, V>;

/// An adapter over an [`ObservableMap`].
pub type MapAdapter<K, T, V> = Adapter<ObservableMap<K, T>, V>;

enum ParamConverter<K, T> {
    Positional(Converter<T>),
    Keyed(KeyedConverter<K, T>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FactoryKind {
    Class,
    Template,
}

impl FactoryKind {
    fn name(self) -> &'static str {
        match self {
            Self::Class => "view_class",
            Self::Template => "template",
        }
    }
}

fn config_error(err: ConfigError) -> WeftError {
    tracing::warn!(target: "weft::adapter", error = %err, "invalid adapter configuration");
    err.into()
}

// =============================================================================
// View construction
// =============================================================================

struct ViewBuilder<C: Collection, V> {
    converter: ParamConverter<C::Key, C::Item>,
    factory: ViewFactory<V>,
    factory_kind: FactoryKind,
    flag: Option<SelectionFlag<C::Item>>,
    propagate: bool,
    owner: Weak<Adapter<C, V>>,
}

impl<C: Collection, V: ItemView> ViewBuilder<C, V> {
    /// Build the view for `index`, along with the item's selection flag
    /// when selection is propagated to data.
    fn build(&self, data: &C, index: usize) -> Result<Option<(ViewHandle<V>, bool)>> {
        let Some(item) = data.get(index) else {
            return Ok(None);
        };
        let _span = tracing::trace_span!(target: "weft::adapter", span_names::BUILD_VIEW, index).entered();

        let mut params = match &self.converter {
            ParamConverter::Positional(convert) => convert(index, item),
            ParamConverter::Keyed(convert) => {
                let Some(key) = data.key(index) else {
                    return Ok(None);
                };
                convert(index, &key, item)
            }
        };
        params.insert(ViewParams::INDEX, index);

        let flagged = if self.propagate {
            match self.flag.as_ref().and_then(|flag| flag.read(item)) {
                Some(flagged) => flagged,
                None => return Err(config_error(ConfigError::UnselectableItem { index })),
            }
        } else {
            false
        };

        let view = (self.factory)(index, &params);
        let handle = ViewHandle::new(index, params, view);

        let owner = self.owner.clone();
        handle.activated().connect(move |id| {
            let Some(adapter) = owner.upgrade() else {
                return;
            };
            if let Err(err) = adapter.activate(*id) {
                tracing::warn!(target: "weft::adapter", view = %id, error = %err, "activation failed");
            }
        });

        tracing::trace!(
            target: "weft::adapter",
            index,
            view = %handle.id(),
            factory = self.factory_kind.name(),
            "built view"
        );
        Ok(Some((handle, flagged)))
    }
}

/// Gives the selection access to the collection and the cache.
struct Host<'a, C: Collection, V> {
    data: &'a mut C,
    cache: &'a mut ViewCache<V>,
    builder: &'a ViewBuilder<C, V>,
}

impl<C: Collection, V: ItemView> SelectionHost<V> for Host<'_, C, V> {
    fn first_selectable_view(&mut self) -> Result<Option<ViewHandle<V>>> {
        let data: &C = self.data;
        let builder = self.builder;
        let mut unselectable = None;
        for index in 0..data.len() {
            let built = self
                .cache
                .get_or_create(index, |index| Ok(builder.build(data, index)?.map(|(view, _)| view)));
            match built {
                Ok(Some(view)) => return Ok(Some(view)),
                Ok(None) => break,
                Err(err @ WeftError::Config(ConfigError::UnselectableItem { .. })) => {
                    unselectable.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }
        unselectable.map_or(Ok(None), Err)
    }

    fn write_flag(&mut self, index: usize, selected: bool) -> Result<()> {
        let Some(flag) = &self.builder.flag else {
            return Err(config_error(ConfigError::PropagationUnsupported));
        };
        let Some(item) = self.data.get_mut(index) else {
            return Ok(());
        };
        if flag.write(item, selected) {
            Ok(())
        } else {
            Err(config_error(ConfigError::UnselectableItem { index }))
        }
    }
}

struct AdapterState<C, V> {
    data: C,
    cache: ViewCache<V>,
    selection: Selection<V>,
}

// =============================================================================
// Adapter
// =============================================================================

/// Presents a [`Collection`] as lazily built, selectable item views.
///
/// Created through [`Adapter::builder`]; always shared as `Arc<Adapter>` so
/// views can reach it when activated.
pub struct Adapter<C: Collection, V> {
    state: Mutex<AdapterState<C, V>>,
    builder: ViewBuilder<C, V>,
    guard: ReentrancyGuard,

    /// Emitted with the operation descriptor after every reconciled mutation.
    pub data_changed: Signal<ListOp>,

    /// Emitted with the current selection whenever an operation changed it.
    pub selection_changed: Signal<Vec<ViewHandle<V>>>,
}

impl<C: Collection, V: ItemView> Adapter<C, V> {
    /// Start configuring an adapter over `data`.
    pub fn builder(data: C) -> AdapterBuilder<C, V> {
        AdapterBuilder::new(data)
    }

    // =========================================================================
    // Items and views
    // =========================================================================

    /// Number of items in the collection.
    pub fn item_count(&self) -> usize {
        self.state.lock().data.len()
    }

    /// The view for `index`, built on first request.
    ///
    /// Returns `Ok(None)` when `index` is out of range. Fails when selection
    /// is propagated to data and the item has no selection flag. A view
    /// whose item is flagged selected joins the selection when built.
    pub fn get_view(&self, index: usize) -> Result<Option<ViewHandle<V>>> {
        self.with_selection(|selection, host| {
            if let Some(view) = host.cache.get(index) {
                return Ok(Some(view.clone()));
            }
            let Some((view, flagged)) = host.builder.build(host.data, index)? else {
                return Ok(None);
            };
            host.cache.insert(index, view.clone());
            if flagged {
                selection.toggle(&view, host)?;
                if !selection.contains(&view) {
                    // The mode or limit refused it; clear the stale flag.
                    host.write_flag(index, false)?;
                }
            }
            Ok(Some(view))
        })
    }

    /// The view cached for `index`, without building one.
    pub fn cached_view(&self, index: usize) -> Option<ViewHandle<V>> {
        self.state.lock().cache.get(index).cloned()
    }

    /// Positions that currently have a cached view, ascending.
    pub fn cached_indices(&self) -> Vec<usize> {
        self.state.lock().cache.indices()
    }

    /// Read the whole collection.
    pub fn with_data<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.state.lock().data)
    }

    /// Read the item at `index`.
    pub fn with_item<R>(&self, index: usize, f: impl FnOnce(&C::Item) -> R) -> Option<R> {
        self.state.lock().data.get(index).map(f)
    }

    /// A clone of the item at `index`.
    pub fn get_data_item(&self, index: usize) -> Option<C::Item>
    where
        C::Item: Clone,
    {
        self.with_item(index, Clone::clone)
    }

    /// Drop every cached view and reinitialise the selection.
    ///
    /// Consumers are told to rebuild through a reset [`ListOp`].
    pub fn reset_cache(&self) -> Result<()> {
        let _scope = self.guard.enter("reset_cache")?;
        let result = self.with_selection(|selection, host| {
            host.cache.clear();
            selection.forget_all();
            selection.check_for_empty(host)
        });
        self.data_changed.emit(ListOp::reset());
        result
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Mutate the collection and reconcile the resulting operation.
    ///
    /// `f` returns the mutation its call produced, or `None` if nothing
    /// changed. Returns the reconciled operation.
    pub fn mutate(&self, f: impl FnOnce(&mut C) -> Option<Mutation>) -> Result<Option<ListOp>> {
        self.mutate_with(|data| {
            f(data).map(|mutation| {
                let op = mutation.op();
                (op, mutation)
            })
        })
    }

    /// Like [`mutate`](Self::mutate), for mutators that also return a value.
    pub fn mutate_with<R>(&self, f: impl FnOnce(&mut C) -> Option<(R, Mutation)>) -> Result<Option<R>> {
        let scope = self.guard.enter("mutate")?;

        let mut state = self.state.lock();
        let Some((value, mutation)) = f(&mut state.data) else {
            return Ok(None);
        };
        let (op, reorder) = mutation.into_parts();
        scope.set_operation(op.kind().name());

        let before = state.selection.ids();
        let outcome = self.reconcile(&mut state, op, reorder);
        let snapshot = (state.selection.ids() != before).then(|| state.selection.views().to_vec());
        drop(state);

        self.data_changed.emit(op);
        if let Some(views) = snapshot {
            self.selection_changed.emit(views);
        }
        outcome.map(|()| Some(value))
    }

    fn reconcile(&self, state: &mut AdapterState<C, V>, op: ListOp, reorder: Option<Reorder>) -> Result<()> {
        let _perf = PerfSpan::new(span_names::RECONCILE);
        let AdapterState {
            data,
            cache,
            selection,
        } = state;
        tracing::debug!(
            target: "weft::adapter",
            op = %op,
            len = data.len(),
            cached = cache.len(),
            "reconciling mutation"
        );

        let mut refresh = None;
        match (op.kind(), op.range(), reorder) {
            (OpKind::Add, Some(_), _) => {}
            (OpKind::Insert, Some(range), _) => cache.shift_up(range.start(), range.len()),
            (OpKind::Delete, Some(range), _) => {
                selection.drop_deleted(range);
                let evicted = cache.remove_range(range);
                tracing::trace!(target: "weft::cache", evicted = evicted.len(), "evicted deleted views");
            }
            (OpKind::SetRange, Some(range), _) => refresh = Some(range),
            (OpKind::Sort | OpKind::Reverse, _, Some(reorder)) => {
                cache.reindex(|old| reorder.new_index(old));
            }
            _ => {
                cache.clear();
                selection.forget_all();
            }
        }

        let mut host = Host {
            data: &mut *data,
            cache: &mut *cache,
            builder: &self.builder,
        };
        let refreshed = match refresh {
            Some(range) => Self::refresh_range(range, selection, &mut host),
            None => Ok(()),
        };
        let checked = selection.check_for_empty(&mut host);
        let result = refreshed.and(checked);

        debug_assert!(cache.is_coherent(data.len()), "view cache out of step after {op}");
        debug_assert!(
            result.is_err() || selection.is_consistent(data.len(), cache),
            "selection invariant violated after {op}"
        );
        result
    }

    /// Rebuild the views of overwritten items, keeping selected positions selected.
    ///
    /// If a rebuild fails, every evicted view still selected is dropped from
    /// the selection before the error is returned.
    fn refresh_range(range: IndexRange, selection: &mut Selection<V>, host: &mut Host<'_, C, V>) -> Result<()> {
        let evicted = host.cache.evict_range(range);
        let result = Self::rebuild_selected(&evicted, selection, host);
        if result.is_err() {
            for old in &evicted {
                selection.forget(old);
            }
        }
        result
    }

    fn rebuild_selected(
        evicted: &[ViewHandle<V>],
        selection: &mut Selection<V>,
        host: &mut Host<'_, C, V>,
    ) -> Result<()> {
        for old in evicted {
            if !selection.contains(old) {
                continue;
            }
            let index = old.index();
            match host.builder.build(host.data, index)? {
                Some((view, _)) => {
                    host.cache.insert(index, view.clone());
                    selection.replace(old, &view, host)?;
                }
                None => selection.drop_deleted(IndexRange::single(index)),
            }
        }
        Ok(())
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Run a selection operation, then notify once if the selection changed.
    fn with_selection<R>(
        &self,
        f: impl FnOnce(&mut Selection<V>, &mut Host<'_, C, V>) -> Result<R>,
    ) -> Result<R> {
        let (result, snapshot) = {
            let mut state = self.state.lock();
            let AdapterState {
                data,
                cache,
                selection,
            } = &mut *state;
            let before = selection.ids();
            let mut host = Host {
                data: &mut *data,
                cache: &mut *cache,
                builder: &self.builder,
            };
            let result = f(selection, &mut host);
            let snapshot = (selection.ids() != before).then(|| selection.views().to_vec());
            debug_assert!(
                result.is_err() || selection.is_consistent(data.len(), cache),
                "selection invariant violated"
            );
            (result, snapshot)
        };
        if let Some(views) = snapshot {
            self.selection_changed.emit(views);
        }
        result
    }

    /// Toggle the selection of `view`.
    ///
    /// Handles of views that are no longer cached (their item was deleted or
    /// the cache was reset) are ignored.
    pub fn toggle(&self, view: &ViewHandle<V>) -> Result<()> {
        self.with_selection(|selection, host| {
            if !host.cache.holds(view) {
                tracing::debug!(target: "weft::selection", view = %view.id(), "ignoring stale view");
                return Ok(());
            }
            selection.toggle(view, host)
        })
    }

    /// Toggle the selection of the view at `index`, building it if needed.
    pub fn toggle_index(&self, index: usize) -> Result<()> {
        match self.get_view(index)? {
            Some(view) => self.toggle(&view),
            None => Ok(()),
        }
    }

    /// Respond to the activation of the view identified by `id`.
    fn activate(&self, id: ViewId) -> Result<()> {
        self.with_selection(|selection, host| {
            let Some(view) = host.cache.find(id).and_then(|i| host.cache.get(i).cloned()) else {
                return Ok(());
            };
            selection.toggle(&view, host)
        })
    }

    /// Toggle each of `views`, clearing the selection first unless `extend`.
    ///
    /// Views already selected are toggled off, as with [`toggle`](Self::toggle).
    /// Observers see a single notification.
    pub fn select_many(&self, views: &[ViewHandle<V>], extend: bool) -> Result<()> {
        self.with_selection(|selection, host| {
            let live: Vec<_> = views.iter().filter(|v| host.cache.holds(v)).cloned().collect();
            selection.select_many(&live, extend, host)
        })
    }

    /// Deselect each of `views` that is selected. Observers see a single
    /// notification.
    pub fn deselect_many(&self, views: &[ViewHandle<V>]) -> Result<()> {
        self.with_selection(|selection, host| selection.deselect_many(views, host))
    }

    /// Deselect everything. With empty selection disallowed, the first item
    /// is selected again.
    pub fn clear_selection(&self) -> Result<()> {
        self.with_selection(|selection, host| selection.clear(host))
    }

    /// The selected views, in selection order.
    pub fn selection(&self) -> Vec<ViewHandle<V>> {
        self.state.lock().selection.views().to_vec()
    }

    /// Positions of the selected views, in selection order.
    pub fn selected_indices(&self) -> Vec<usize> {
        self.state
            .lock()
            .selection
            .views()
            .iter()
            .map(ViewHandle::index)
            .collect()
    }

    /// The earliest selected view still selected.
    pub fn first_selected(&self) -> Option<ViewHandle<V>> {
        self.state.lock().selection.views().first().cloned()
    }

    /// Whether the view at `index` is selected.
    pub fn is_selected(&self, index: usize) -> bool {
        self.state
            .lock()
            .selection
            .views()
            .iter()
            .any(|v| v.index() == index)
    }

    /// The current selection settings.
    pub fn selection_config(&self) -> SelectionConfig {
        self.state.lock().selection.config()
    }

    /// The current selection mode.
    pub fn selection_mode(&self) -> SelectionMode {
        self.state.lock().selection.mode()
    }

    /// Change the selection mode.
    ///
    /// Switching to [`SelectionMode::NoSelection`] deselects everything;
    /// narrowing keeps the earliest selected views.
    pub fn set_selection_mode(&self, mode: SelectionMode) -> Result<()> {
        self.with_selection(|selection, host| selection.set_mode(mode, host))
    }

    /// Allow or forbid an empty selection.
    pub fn set_allow_empty_selection(&self, allow: bool) -> Result<()> {
        self.with_selection(|selection, host| selection.set_allow_empty(allow, host))
    }

    /// Change the selection limit; `-1` removes it.
    pub fn set_selection_limit(&self, limit: i64) -> Result<()> {
        self.with_selection(|selection, host| selection.set_limit(limit, host))
    }
}

// =============================================================================
// Trimming relative to the selection
// =============================================================================

impl<C: SpanRemoval, V: ItemView> Adapter<C, V> {
    fn selected_bounds(&self) -> Option<(usize, usize)> {
        let indices = self.selected_indices();
        let first = indices.iter().copied().min()?;
        let last = indices.iter().copied().max()?;
        Some((first, last))
    }

    /// Delete every item before the first selected one.
    pub fn trim_left_of_selection(&self) -> Result<Option<ListOp>> {
        let Some((first, _)) = self.selected_bounds() else {
            return Ok(None);
        };
        self.mutate(|data| data.remove_span(0, first))
    }

    /// Delete every item after the last selected one.
    pub fn trim_right_of_selection(&self) -> Result<Option<ListOp>> {
        let Some((_, last)) = self.selected_bounds() else {
            return Ok(None);
        };
        self.mutate(|data| data.remove_span(last + 1, usize::MAX))
    }

    /// Keep only the span from the first to the last selected item.
    pub fn trim_to_selection(&self) -> Result<()> {
        self.trim_right_of_selection()?;
        self.trim_left_of_selection()?;
        Ok(())
    }

    /// Keep only the selected items.
    ///
    /// Unselected items between selected ones go too, so this is reported
    /// as a reset.
    pub fn cut_to_selection(&self) -> Result<Option<ListOp>> {
        let keep: BTreeSet<usize> = self.selected_indices().into_iter().collect();
        if keep.is_empty() {
            return Ok(None);
        }
        self.mutate(|data| data.retain_positions(&keep))
    }
}

// =============================================================================
// List adapters
// =============================================================================

impl<T: Send + Sync + 'static, V: ItemView> Adapter<ObservableList<T>, V> {
    /// Append `item`.
    pub fn push(&self, item: T) -> Result<()> {
        self.mutate(|list| Some(list.push(item))).map(drop)
    }

    /// Insert `item` before `index` (clamped to the length).
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.mutate(|list| Some(list.insert(index, item))).map(drop)
    }

    /// Append every item of `items`.
    pub fn extend(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        self.mutate(|list| list.extend(items)).map(drop)
    }

    /// Remove the item at `index`.
    pub fn remove(&self, index: usize) -> Result<Option<T>> {
        self.mutate_with(|list| list.remove(index))
    }

    /// Remove the last item.
    pub fn pop(&self) -> Result<Option<T>> {
        self.mutate_with(|list| list.pop())
    }

    /// Remove the items in `range`.
    pub fn drain(&self, range: impl RangeBounds<usize>) -> Result<Option<Vec<T>>> {
        self.mutate_with(|list| list.drain(range))
    }

    /// Overwrite the item at `index`, returning the old one.
    pub fn set(&self, index: usize, item: T) -> Result<Option<T>> {
        self.mutate_with(|list| list.set(index, item))
    }

    /// Edit the item at `index` in place.
    pub fn modify<R>(&self, index: usize, f: impl FnOnce(&mut T) -> R) -> Result<Option<R>> {
        self.mutate_with(|list| list.modify(index, f))
    }

    /// Replace the items in `range` with `items`.
    pub fn splice(&self, range: impl RangeBounds<usize>, items: impl IntoIterator<Item = T>) -> Result<Vec<T>> {
        self.mutate_with(|list| Some(list.splice(range, items)))
            .map(Option::unwrap_or_default)
    }

    /// Replace every item.
    pub fn replace_all(&self, items: Vec<T>) -> Result<Vec<T>> {
        self.mutate_with(|list| Some(list.replace_all(items)))
            .map(Option::unwrap_or_default)
    }

    /// Stable-sort the items with `compare`.
    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> std::cmp::Ordering) -> Result<()> {
        self.mutate(|list| list.sort_by(compare)).map(drop)
    }

    /// Stable-sort the items by a key.
    pub fn sort_by_key<K: Ord>(&self, f: impl FnMut(&T) -> K) -> Result<()> {
        self.mutate(|list| list.sort_by_key(f)).map(drop)
    }

    /// Reverse the items.
    pub fn reverse(&self) -> Result<()> {
        self.mutate(|list| list.reverse()).map(drop)
    }

    /// Remove every item.
    pub fn clear(&self) -> Result<Vec<T>> {
        self.mutate_with(|list| list.clear())
            .map(Option::unwrap_or_default)
    }
}

impl<T: Ord + Send + Sync + 'static, V: ItemView> Adapter<ObservableList<T>, V> {
    /// Stable-sort the items ascending.
    pub fn sort(&self) -> Result<()> {
        self.mutate(|list| list.sort()).map(drop)
    }
}

impl<T: PartialEq + Send + Sync + 'static, V: ItemView> Adapter<ObservableList<T>, V> {
    /// Remove the first item equal to `item`.
    pub fn remove_item(&self, item: &T) -> Result<Option<T>> {
        self.mutate_with(|list| list.remove_item(item))
    }
}

// =============================================================================
// Map adapters
// =============================================================================

impl<K, T, V> Adapter<ObservableMap<K, T>, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
    V: ItemView,
{
    /// Keys in display order.
    pub fn sorted_keys(&self) -> Vec<K> {
        self.state.lock().data.sorted_keys().to_vec()
    }

    /// Read the value stored under `key`.
    pub fn with_value<R>(&self, key: &K, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.state.lock().data.get(key).map(f)
    }

    /// The view for the entry under `key`.
    pub fn get_view_by_key(&self, key: &K) -> Result<Option<ViewHandle<V>>> {
        let index = self.state.lock().data.index_of(key);
        match index {
            Some(index) => self.get_view(index),
            None => Ok(None),
        }
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn insert(&self, key: K, value: T) -> Result<Option<T>> {
        self.mutate_with(|map| Some(map.insert(key, value)))
            .map(Option::flatten)
    }

    /// Store `value` under `key`, displaying a new key at `index`.
    pub fn insert_at(&self, index: usize, key: K, value: T) -> Result<Option<T>> {
        self.mutate_with(|map| Some(map.insert_at(index, key, value)))
            .map(Option::flatten)
    }

    /// Insert every entry of `entries`.
    pub fn extend(&self, entries: impl IntoIterator<Item = (K, T)>) -> Result<()> {
        self.mutate(|map| map.extend(entries)).map(drop)
    }

    /// Remove the entry under `key`.
    pub fn remove(&self, key: &K) -> Result<Option<T>> {
        self.mutate_with(|map| map.remove(key))
    }

    /// Remove the last displayed entry.
    pub fn pop_last(&self) -> Result<Option<(K, T)>> {
        self.mutate_with(|map| map.pop_last().map(|(k, v, m)| ((k, v), m)))
    }

    /// Edit the value under `key` in place.
    pub fn modify<R>(&self, key: &K, f: impl FnOnce(&mut T) -> R) -> Result<Option<R>> {
        self.mutate_with(|map| map.modify(key, f))
    }

    /// Stable-sort the display order with `compare`.
    pub fn sort_keys_by(&self, compare: impl FnMut(&K, &T, &K, &T) -> std::cmp::Ordering) -> Result<()> {
        self.mutate(|map| map.sort_keys_by(compare)).map(drop)
    }

    /// Reverse the display order.
    pub fn reverse(&self) -> Result<()> {
        self.mutate(|map| map.reverse()).map(drop)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        self.mutate(|map| map.clear()).map(drop)
    }
}

impl<K, T, V> Adapter<ObservableMap<K, T>, V>
where
    K: Eq + Hash + Clone + Ord + Send + Sync + 'static,
    T: Send + Sync + 'static,
    V: ItemView,
{
    /// Sort the display order ascending by key.
    pub fn sort_keys(&self) -> Result<()> {
        self.mutate(|map| map.sort_keys()).map(drop)
    }
}

impl<C: Collection, V: ItemView> fmt::Debug for Adapter<C, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Adapter")
            .field("item_count", &state.data.len())
            .field("cache", &state.cache)
            .field("selection", &state.selection.views())
            .field("factory", &self.builder.factory_kind.name())
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Configures and creates an [`Adapter`].
///
/// A converter and exactly one of [`view_class`](Self::view_class) or
/// [`template`](Self::template) are required.
pub struct AdapterBuilder<C: Collection, V> {
    data: C,
    converter: Option<ParamConverter<C::Key, C::Item>>,
    view_class: Option<ViewFactory<V>>,
    template: Option<ViewFactory<V>>,
    config: SelectionConfig,
    flag: Option<SelectionFlag<C::Item>>,
    hook: Option<SelectionHook<V>>,
}

impl<C: Collection, V: ItemView> AdapterBuilder<C, V> {
    /// Start configuring an adapter over `data`.
    pub fn new(data: C) -> Self {
        Self {
            data,
            converter: None,
            view_class: None,
            template: None,
            config: SelectionConfig::default(),
            flag: None,
            hook: None,
        }
    }

    /// Convert items with `(index, item)`.
    pub fn converter<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &C::Item) -> ViewParams + Send + Sync + 'static,
    {
        self.converter = Some(ParamConverter::Positional(Arc::new(f)));
        self
    }

    /// Convert items with `(index, key, item)`.
    pub fn keyed_converter<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &C::Key, &C::Item) -> ViewParams + Send + Sync + 'static,
    {
        self.converter = Some(ParamConverter::Keyed(Arc::new(f)));
        self
    }

    /// Instantiate views with a constructor.
    pub fn view_class<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &ViewParams) -> V + Send + Sync + 'static,
    {
        self.view_class = Some(Arc::new(f));
        self
    }

    /// Instantiate views from a template.
    pub fn template<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &ViewParams) -> V + Send + Sync + 'static,
    {
        self.template = Some(Arc::new(f));
        self
    }

    /// Replace all selection settings.
    pub fn selection_config(mut self, config: SelectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the selection mode.
    pub fn selection_mode(mut self, mode: SelectionMode) -> Self {
        self.config.selection_mode = mode;
        self
    }

    /// Allow or forbid an empty selection.
    pub fn allow_empty_selection(mut self, allow: bool) -> Self {
        self.config.allow_empty_selection = allow;
        self
    }

    /// Limit the selection size in multiple mode; `-1` means unlimited.
    pub fn selection_limit(mut self, limit: i64) -> Self {
        self.config.selection_limit = limit;
        self
    }

    /// Write selection changes onto the data items.
    pub fn propagate_selection_to_data(mut self, propagate: bool) -> Self {
        self.config.propagate_selection_to_data = propagate;
        self
    }

    /// How to read and write item selection flags.
    pub fn selection_flag(mut self, flag: SelectionFlag<C::Item>) -> Self {
        self.flag = Some(flag);
        self
    }

    /// Called after every select or deselect of a view.
    pub fn selection_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ViewHandle<V>, bool) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Validate the configuration and create the adapter.
    ///
    /// When an empty selection is not allowed, the first item is selected
    /// before this returns.
    pub fn build(self) -> Result<Arc<Adapter<C, V>>> {
        let (factory, factory_kind) = match (self.view_class, self.template) {
            (Some(_), Some(_)) => return Err(config_error(ConfigError::ConflictingViewFactories)),
            (None, None) => return Err(config_error(ConfigError::MissingViewFactory)),
            (Some(class), None) => (class, FactoryKind::Class),
            (None, Some(template)) => (template, FactoryKind::Template),
        };
        let converter = self
            .converter
            .ok_or_else(|| config_error(ConfigError::MissingConverter))?;
        if self.config.propagate_selection_to_data && self.flag.is_none() {
            return Err(config_error(ConfigError::PropagationUnsupported));
        }
        let selection = Selection::new(&self.config, self.hook).map_err(|err| {
            tracing::warn!(target: "weft::adapter", error = %err, "invalid selection configuration");
            err
        })?;
        let propagate = self.config.propagate_selection_to_data;
        let data = self.data;

        let adapter = Arc::new_cyclic(|owner| Adapter {
            state: Mutex::new(AdapterState {
                data,
                cache: ViewCache::new(),
                selection,
            }),
            builder: ViewBuilder {
                converter,
                factory,
                factory_kind,
                flag: self.flag,
                propagate,
                owner: owner.clone(),
            },
            guard: ReentrancyGuard::new("Adapter"),
            data_changed: Signal::new(),
            selection_changed: Signal::new(),
        });
        adapter.with_selection(|selection, host| selection.check_for_empty(host))?;

        tracing::debug!(
            target: "weft::adapter",
            items = adapter.item_count(),
            factory = factory_kind.name(),
            mode = ?adapter.selection_mode(),
            "adapter created"
        );
        Ok(adapter)
    }
}

impl<C: Collection, V: ItemView> AdapterBuilder<C, V>
where
    C::Item: Selectable,
{
    /// Use the items' own [`Selectable`] flag.
    pub fn selectable_items(self) -> Self {
        self.selection_flag(SelectionFlag::selectable())
    }
}

static_assertions::assert_impl_all!(ListAdapter<String, ()>: Send, Sync);
static_assertions::assert_impl_all!(MapAdapter<u32, String, ()>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::params::text_converter;
    use crate::model::selectable::SelectableDataItem;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn list_adapter(items: &[&'static str]) -> Arc<ListAdapter<&'static str, ()>> {
        ListAdapter::builder(ObservableList::from(items.to_vec()))
            .converter(text_converter)
            .view_class(|_, _| ())
            .build()
            .unwrap()
    }

    fn texts(adapter: &ListAdapter<&'static str, ()>) -> Vec<String> {
        (0..adapter.item_count())
            .map(|i| {
                let view = adapter.get_view(i).unwrap().unwrap();
                view.params().text("text").unwrap_or_default().to_string()
            })
            .collect()
    }

    #[test]
    fn test_builder_rejects_conflicting_factories() {
        let err = ListAdapter::<i32, ()>::builder(ObservableList::default())
            .converter(text_converter)
            .view_class(|_, _| ())
            .template(|_, _| ())
            .build()
            .unwrap_err();
        assert_eq!(err, WeftError::Config(ConfigError::ConflictingViewFactories));
    }

    #[test]
    fn test_builder_requires_factory_and_converter() {
        let err = ListAdapter::<i32, ()>::builder(ObservableList::default())
            .converter(text_converter)
            .build()
            .unwrap_err();
        assert_eq!(err, WeftError::Config(ConfigError::MissingViewFactory));

        let err = ListAdapter::<i32, ()>::builder(ObservableList::default())
            .template(|_, _| ())
            .build()
            .unwrap_err();
        assert_eq!(err, WeftError::Config(ConfigError::MissingConverter));
    }

    #[test]
    fn test_builder_rejects_propagation_without_flag() {
        let err = ListAdapter::<i32, ()>::builder(ObservableList::default())
            .converter(text_converter)
            .view_class(|_, _| ())
            .propagate_selection_to_data(true)
            .build()
            .unwrap_err();
        assert_eq!(err, WeftError::Config(ConfigError::PropagationUnsupported));
    }

    #[test]
    fn test_builder_rejects_bad_limit() {
        let err = ListAdapter::<i32, ()>::builder(ObservableList::default())
            .converter(text_converter)
            .view_class(|_, _| ())
            .selection_limit(-4)
            .build()
            .unwrap_err();
        assert_eq!(err, WeftError::Config(ConfigError::InvalidSelectionLimit(-4)));
    }

    #[test]
    fn test_get_view_is_lazy_and_memoized() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let adapter = ListAdapter::builder(ObservableList::from(vec![1, 2, 3]))
            .converter(text_converter)
            .view_class(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 0);
        let a = adapter.get_view(1).unwrap().unwrap();
        let b = adapter.get_view(1).unwrap().unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(a.params().index(), Some(1));
        assert!(adapter.get_view(3).unwrap().is_none());
        assert_eq!(adapter.cached_indices(), vec![1]);
    }

    #[test]
    fn test_insert_shifts_cached_views() {
        let adapter = list_adapter(&["a", "b", "c"]);
        let b = adapter.get_view(1).unwrap().unwrap();
        adapter.insert(0, "z").unwrap();
        assert_eq!(b.index(), 2);
        assert!(adapter.get_view(2).unwrap().unwrap().ptr_eq(&b));
        assert_eq!(texts(&adapter), vec!["z", "a", "b", "c"]);
    }

    #[test]
    fn test_set_refreshes_selected_view_in_place() {
        let adapter = list_adapter(&["a", "b", "c"]);
        adapter.toggle_index(1).unwrap();
        let old = adapter.get_view(1).unwrap().unwrap();

        assert_eq!(adapter.set(1, "B").unwrap(), Some("b"));
        let new = adapter.get_view(1).unwrap().unwrap();
        assert!(!new.ptr_eq(&old));
        assert!(new.is_selected());
        assert!(!old.is_selected());
        assert_eq!(new.params().text("text"), Some("B"));
        assert_eq!(adapter.selected_indices(), vec![1]);
    }

    #[test]
    fn test_replace_all_drops_cache_and_selection() {
        let adapter = list_adapter(&["a", "b"]);
        adapter.toggle_index(0).unwrap();
        adapter.replace_all(vec!["x", "y", "z"]).unwrap();
        assert!(adapter.cached_indices().is_empty());
        assert!(adapter.selection().is_empty());
        assert_eq!(texts(&adapter), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_propagation_reads_and_writes_item_flags() {
        let items = vec![
            SelectableDataItem::new("a"),
            SelectableDataItem::with_selected("b", true),
            SelectableDataItem::new("c"),
        ];
        let adapter = ListAdapter::builder(ObservableList::from(items))
            .converter(text_converter)
            .view_class(|_, _| ())
            .propagate_selection_to_data(true)
            .selectable_items()
            .build()
            .unwrap();

        // Building the flagged item's view selects it.
        adapter.get_view(1).unwrap();
        assert_eq!(adapter.selected_indices(), vec![1]);

        adapter.toggle_index(2).unwrap();
        let flags: Vec<bool> = adapter.with_data(|l| l.iter().map(|i| i.is_selected).collect());
        assert_eq!(flags, vec![false, false, true]);
    }

    #[test]
    fn test_unselectable_item_is_reported() {
        let flag = SelectionFlag::new(
            |item: &Option<bool>| *item,
            |item: &mut Option<bool>, selected| match item {
                Some(slot) => {
                    *slot = selected;
                    true
                }
                None => false,
            },
        );
        let adapter = ListAdapter::builder(ObservableList::from(vec![Some(false), None]))
            .converter(|_, item: &Option<bool>| ViewParams::new().with("text", format!("{item:?}")))
            .view_class(|_, _| ())
            .propagate_selection_to_data(true)
            .selection_flag(flag)
            .build()
            .unwrap();

        assert!(adapter.get_view(0).unwrap().is_some());
        assert_eq!(adapter.get_view(1).unwrap_err(), WeftError::unselectable(1));
    }

    fn optional_flag() -> SelectionFlag<Option<bool>> {
        SelectionFlag::new(
            |item: &Option<bool>| *item,
            |item: &mut Option<bool>, selected| match item {
                Some(slot) => {
                    *slot = selected;
                    true
                }
                None => false,
            },
        )
    }

    fn flagged_adapter(items: Vec<Option<bool>>, allow_empty: bool) -> Arc<ListAdapter<Option<bool>, ()>> {
        ListAdapter::builder(ObservableList::from(items))
            .converter(|_, item: &Option<bool>| ViewParams::new().with("text", format!("{item:?}")))
            .view_class(|_, _| ())
            .propagate_selection_to_data(true)
            .selection_flag(optional_flag())
            .allow_empty_selection(allow_empty)
            .build()
            .unwrap()
    }

    #[test]
    fn test_failed_refresh_drops_selected_view() {
        let adapter = flagged_adapter(vec![Some(false), Some(false), Some(false)], true);
        adapter.toggle_index(1).unwrap();

        assert_eq!(adapter.set(1, None).unwrap_err(), WeftError::unselectable(1));
        assert!(adapter.cached_view(1).is_none());
        assert!(adapter.selection().is_empty());

        adapter.toggle_index(0).unwrap();
        assert_eq!(adapter.selected_indices(), vec![0]);
        let items = adapter.with_data(|l| l.iter().copied().collect::<Vec<_>>());
        assert_eq!(items, vec![Some(true), None, Some(false)]);
    }

    #[test]
    fn test_failed_refresh_restores_non_empty_selection() {
        let adapter = flagged_adapter(vec![Some(false), Some(false), Some(false)], false);
        assert_eq!(adapter.selected_indices(), vec![0]);

        assert_eq!(adapter.set(0, None).unwrap_err(), WeftError::unselectable(0));
        // The next selectable item takes over.
        assert_eq!(adapter.selected_indices(), vec![1]);
        assert_eq!(adapter.get_data_item(1), Some(Some(true)));
    }

    #[test]
    fn test_delete_reselects_first_selectable_item() {
        let adapter = flagged_adapter(vec![None, Some(false), Some(false)], false);
        assert_eq!(adapter.selected_indices(), vec![1]);

        assert_eq!(adapter.remove(1).unwrap(), Some(Some(true)));
        assert_eq!(adapter.selected_indices(), vec![1]);
        let items = adapter.with_data(|l| l.iter().copied().collect::<Vec<_>>());
        assert_eq!(items, vec![None, Some(true)]);

        // Nothing selectable is left: the rule cannot hold, and says so.
        assert_eq!(adapter.remove(1).unwrap_err(), WeftError::unselectable(0));
        assert!(adapter.selection().is_empty());

        // A selectable arrival restores it.
        adapter.push(Some(false)).unwrap();
        assert_eq!(adapter.selected_indices(), vec![1]);
    }

    #[test]
    fn test_refused_flagged_item_is_unflagged() {
        let items = vec![
            SelectableDataItem::with_selected("a", true),
            SelectableDataItem::with_selected("b", true),
        ];
        let adapter = ListAdapter::builder(ObservableList::from(items))
            .converter(text_converter)
            .view_class(|_, _| ())
            .selection_mode(SelectionMode::MultiSelection)
            .selection_limit(1)
            .propagate_selection_to_data(true)
            .selectable_items()
            .build()
            .unwrap();

        adapter.get_view(0).unwrap();
        adapter.get_view(1).unwrap();
        assert_eq!(adapter.selected_indices(), vec![0]);
        let flags: Vec<bool> = adapter.with_data(|l| l.iter().map(|i| i.is_selected).collect());
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn test_flagged_item_is_unflagged_without_selection() {
        let adapter = ListAdapter::builder(ObservableList::from(vec![SelectableDataItem::with_selected(1, true)]))
            .converter(text_converter)
            .view_class(|_, _| ())
            .selection_mode(SelectionMode::NoSelection)
            .propagate_selection_to_data(true)
            .selectable_items()
            .build()
            .unwrap();

        let view = adapter.get_view(0).unwrap().unwrap();
        assert!(!view.is_selected());
        assert_eq!(adapter.with_item(0, |i| i.is_selected), Some(false));
    }

    #[test]
    fn test_activation_toggles_selection() {
        let adapter = list_adapter(&["a", "b", "c"]);
        let view = adapter.get_view(2).unwrap().unwrap();
        view.activate();
        assert_eq!(adapter.selected_indices(), vec![2]);
        view.activate();
        assert!(adapter.selection().is_empty());
    }

    #[test]
    fn test_stale_view_is_ignored() {
        let adapter = list_adapter(&["a", "b"]);
        let view = adapter.get_view(1).unwrap().unwrap();
        adapter.remove(1).unwrap();
        adapter.toggle(&view).unwrap();
        view.activate();
        assert!(adapter.selection().is_empty());
    }

    #[test]
    fn test_nested_mutation_is_rejected() {
        let adapter = list_adapter(&["a"]);
        let errors = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&adapter);
        let sink = errors.clone();
        adapter.data_changed.connect(move |_| {
            if let Some(adapter) = weak.upgrade() {
                sink.lock().push(adapter.push("nested"));
            }
        });

        adapter.push("b").unwrap();
        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].as_ref().unwrap_err().is_reentrancy());
        assert_eq!(adapter.item_count(), 2);
    }

    #[test]
    fn test_trims_relative_to_selection() {
        let adapter = ListAdapter::builder(ObservableList::from(vec!["a", "b", "c", "d", "e"]))
            .converter(text_converter)
            .view_class(|_, _| ())
            .selection_mode(SelectionMode::MultiSelection)
            .build()
            .unwrap();
        adapter.toggle_index(1).unwrap();
        adapter.toggle_index(3).unwrap();

        adapter.trim_to_selection().unwrap();
        assert_eq!(texts(&adapter), vec!["b", "c", "d"]);
        assert_eq!(adapter.selected_indices(), vec![0, 2]);

        adapter.cut_to_selection().unwrap();
        assert_eq!(texts(&adapter), vec!["b", "d"]);
    }

    #[test]
    fn test_map_adapter_keyed_converter() {
        use std::collections::HashMap;

        let map = ObservableMap::from_map(HashMap::from([("pear", 3), ("fig", 1)]));
        let adapter = MapAdapter::builder(map)
            .keyed_converter(|_, key, count| ViewParams::new().with("text", format!("{key}: {count}")))
            .view_class(|_, _| ())
            .build()
            .unwrap();

        let view = adapter.get_view_by_key(&"pear").unwrap().unwrap();
        assert_eq!(view.params().text("text"), Some("pear: 3"));
        assert_eq!(view.index(), 1);

        adapter.insert("apple", 7).unwrap();
        adapter.sort_keys().unwrap();
        assert_eq!(adapter.sorted_keys(), vec!["apple", "fig", "pear"]);
        assert_eq!(view.index(), 2);

        assert_eq!(adapter.insert("fig", 2).unwrap(), Some(1));
        assert_eq!(adapter.with_value(&"fig", |v| *v), Some(2));
    }
}
