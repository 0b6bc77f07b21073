//! Selection state machine for adapters.
//!
//! The selection is an ordered set of [`ViewHandle`]s, all of them present
//! in the adapter's view cache. Its behaviour is governed by a
//! [`SelectionConfig`]:
//!
//! - [`SelectionMode::NoSelection`] keeps the selection empty.
//! - [`SelectionMode::SingleSelection`] allows at most one selected view.
//! - [`SelectionMode::MultiSelection`] allows several, up to
//!   `selection_limit` when one is set.
//!
//! With `allow_empty_selection = false` the first item is selected
//! automatically whenever the selection would otherwise be empty while the
//! collection is not.
//!
//! # Example
//!
//! ```
//! use weft::model::{SelectionConfig, SelectionMode};
//!
//! let config: SelectionConfig = serde_json::from_str(
//!     r#"{ "selection_mode": "multiple", "selection_limit": 3 }"#,
//! ).unwrap();
//! assert_eq!(config.selection_mode, SelectionMode::MultiSelection);
//! assert_eq!(config.limit().unwrap(), Some(3));
//! assert!(config.allow_empty_selection);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use weft_core::{ConfigError, Result};

use super::cache::ViewCache;
use super::operation::IndexRange;
use super::view::{ItemView, ViewHandle, ViewId};

/// Selection behavior mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    /// No items can be selected.
    #[serde(rename = "none")]
    NoSelection,
    /// Only one item can be selected at a time (default).
    #[default]
    #[serde(rename = "single")]
    SingleSelection,
    /// Several items can be selected.
    #[serde(rename = "multiple")]
    MultiSelection,
}

/// Raw value of `selection_limit` meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// Selection settings of an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// How many views may be selected.
    pub selection_mode: SelectionMode,
    /// Whether the selection may be empty while the collection is not.
    pub allow_empty_selection: bool,
    /// Maximum selection size in multiple mode; [`UNLIMITED`] for none.
    pub selection_limit: i64,
    /// Whether selection changes are written onto the data items.
    pub propagate_selection_to_data: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            selection_mode: SelectionMode::SingleSelection,
            allow_empty_selection: true,
            selection_limit: UNLIMITED,
            propagate_selection_to_data: false,
        }
    }
}

impl SelectionConfig {
    /// The validated selection limit; `None` means unlimited.
    pub fn limit(&self) -> std::result::Result<Option<usize>, ConfigError> {
        let limit = parse_selection_limit(self.selection_limit)?;
        if limit == Some(0) && !self.allow_empty_selection {
            return Err(ConfigError::InvalidSelectionLimit(0));
        }
        Ok(limit)
    }
}

/// Interpret a raw selection limit: `-1` is unlimited, negatives below it
/// are rejected.
pub fn parse_selection_limit(raw: i64) -> std::result::Result<Option<usize>, ConfigError> {
    match raw {
        UNLIMITED => Ok(None),
        n if n < 0 => Err(ConfigError::InvalidSelectionLimit(n)),
        n => usize::try_from(n)
            .map(Some)
            .map_err(|_| ConfigError::InvalidSelectionLimit(n)),
    }
}

/// Called with a view and its new selection state after every select or
/// deselect, for composite views that mirror selection into sub-views.
///
/// Runs while the adapter is locked; it must not call back into the adapter.
pub type SelectionHook<V> = Arc<dyn Fn(&ViewHandle<V>, bool) + Send + Sync>;

/// What the selection state machine needs from its owner.
pub(crate) trait SelectionHost<V> {
    /// The lowest-positioned view whose item can be selected, built if
    /// necessary. `None` if the collection is empty; an error if no item is
    /// selectable.
    fn first_selectable_view(&mut self) -> Result<Option<ViewHandle<V>>>;

    /// Write the selection flag of the item at `index`.
    fn write_flag(&mut self, index: usize, selected: bool) -> Result<()>;
}

/// The selected views plus the rules they obey.
pub(crate) struct Selection<V> {
    mode: SelectionMode,
    allow_empty: bool,
    limit: Option<usize>,
    propagate: bool,
    selected: Vec<ViewHandle<V>>,
    hook: Option<SelectionHook<V>>,
    /// Set when the empty-selection rule could not be restored because no
    /// item was selectable. Cleared by the next selection.
    stranded: bool,
}

impl<V: ItemView> Selection<V> {
    pub(crate) fn new(config: &SelectionConfig, hook: Option<SelectionHook<V>>) -> Result<Self> {
        Ok(Self {
            mode: config.selection_mode,
            allow_empty: config.allow_empty_selection,
            limit: config.limit()?,
            propagate: config.propagate_selection_to_data,
            selected: Vec::new(),
            hook,
            stranded: false,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub(crate) fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub(crate) fn config(&self) -> SelectionConfig {
        SelectionConfig {
            selection_mode: self.mode,
            allow_empty_selection: self.allow_empty,
            selection_limit: self
                .limit
                .and_then(|l| i64::try_from(l).ok())
                .unwrap_or(UNLIMITED),
            propagate_selection_to_data: self.propagate,
        }
    }

    pub(crate) fn views(&self) -> &[ViewHandle<V>] {
        &self.selected
    }

    pub(crate) fn ids(&self) -> Vec<ViewId> {
        self.selected.iter().map(ViewHandle::id).collect()
    }

    pub(crate) fn contains(&self, view: &ViewHandle<V>) -> bool {
        self.selected.iter().any(|v| v.ptr_eq(view))
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Select `view` if it is not selected, deselect it otherwise.
    pub(crate) fn toggle(&mut self, view: &ViewHandle<V>, host: &mut impl SelectionHost<V>) -> Result<()> {
        if self.contains(view) {
            self.deselect_view(view, host, true)?;
            return self.check_for_empty(host);
        }

        if matches!(
            self.mode,
            SelectionMode::NoSelection | SelectionMode::SingleSelection
        ) {
            self.deselect_all(host)?;
        }
        match self.mode {
            SelectionMode::NoSelection => Ok(()),
            SelectionMode::SingleSelection => self.select_view(view, host),
            SelectionMode::MultiSelection => {
                if self.limit.is_some_and(|limit| self.selected.len() >= limit) {
                    tracing::trace!(
                        target: "weft::selection",
                        view = %view.id(),
                        limit = self.limit,
                        "selection limit reached"
                    );
                    return Ok(());
                }
                self.select_view(view, host)
            }
        }
    }

    /// Toggle every view of `views`, first clearing the selection unless `extend`.
    pub(crate) fn select_many(
        &mut self,
        views: &[ViewHandle<V>],
        extend: bool,
        host: &mut impl SelectionHost<V>,
    ) -> Result<()> {
        if !extend {
            self.deselect_all(host)?;
        }
        for view in views {
            self.toggle(view, host)?;
        }
        self.check_for_empty(host)
    }

    /// Deselect every selected view of `views`.
    pub(crate) fn deselect_many(
        &mut self,
        views: &[ViewHandle<V>],
        host: &mut impl SelectionHost<V>,
    ) -> Result<()> {
        for view in views {
            if self.contains(view) {
                self.deselect_view(view, host, true)?;
            }
        }
        self.check_for_empty(host)
    }

    /// Deselect everything, then restore the empty-selection rule.
    pub(crate) fn clear(&mut self, host: &mut impl SelectionHost<V>) -> Result<()> {
        self.deselect_all(host)?;
        self.check_for_empty(host)
    }

    /// Select the first view if the rules forbid an empty selection.
    pub(crate) fn check_for_empty(&mut self, host: &mut impl SelectionHost<V>) -> Result<()> {
        if self.mode == SelectionMode::NoSelection || self.allow_empty || !self.selected.is_empty() {
            return Ok(());
        }
        match host.first_selectable_view() {
            Ok(Some(first)) => self.select_view(&first, host),
            Ok(None) => Ok(()),
            Err(err) => {
                self.stranded = true;
                tracing::warn!(target: "weft::selection", error = %err, "no selectable item to keep selected");
                Err(err)
            }
        }
    }

    /// Forget selected views whose items were deleted.
    ///
    /// Must run before the cache shifts the surviving views down, while
    /// handle indices still refer to positions before the delete.
    pub(crate) fn drop_deleted(&mut self, range: IndexRange) {
        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.selected)
            .into_iter()
            .partition(|v| range.contains(v.index()));
        self.selected = kept;
        for view in &gone {
            self.mark_deselected(view);
        }
    }

    /// Forget `view` without touching its item.
    pub(crate) fn forget(&mut self, view: &ViewHandle<V>) {
        if self.contains(view) {
            self.selected.retain(|v| !v.ptr_eq(view));
            self.mark_deselected(view);
        }
    }

    /// Forget every selected view without touching the items.
    ///
    /// Used when the collection was replaced wholesale and the old items
    /// are gone.
    pub(crate) fn forget_all(&mut self) {
        for view in std::mem::take(&mut self.selected) {
            self.mark_deselected(&view);
        }
    }

    /// Put `new` in the place `old` held in the selection.
    pub(crate) fn replace(
        &mut self,
        old: &ViewHandle<V>,
        new: &ViewHandle<V>,
        host: &mut impl SelectionHost<V>,
    ) -> Result<()> {
        let Some(pos) = self.selected.iter().position(|v| v.ptr_eq(old)) else {
            return Ok(());
        };
        if self.propagate {
            host.write_flag(new.index(), true)?;
        }
        self.selected[pos] = new.clone();
        self.mark_deselected(old);
        self.mark_selected(new);
        Ok(())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub(crate) fn set_mode(&mut self, mode: SelectionMode, host: &mut impl SelectionHost<V>) -> Result<()> {
        self.mode = mode;
        match mode {
            SelectionMode::NoSelection => return self.deselect_all(host),
            SelectionMode::SingleSelection => self.truncate(1, host)?,
            SelectionMode::MultiSelection => {
                if let Some(limit) = self.limit {
                    self.truncate(limit, host)?;
                }
            }
        }
        self.check_for_empty(host)
    }

    pub(crate) fn set_allow_empty(&mut self, allow: bool, host: &mut impl SelectionHost<V>) -> Result<()> {
        if !allow && self.limit == Some(0) {
            return Err(ConfigError::InvalidSelectionLimit(0).into());
        }
        self.allow_empty = allow;
        self.check_for_empty(host)
    }

    pub(crate) fn set_limit(&mut self, raw: i64, host: &mut impl SelectionHost<V>) -> Result<()> {
        let limit = SelectionConfig {
            selection_limit: raw,
            ..self.config()
        }
        .limit()?;
        self.limit = limit;
        if let (SelectionMode::MultiSelection, Some(limit)) = (self.mode, limit) {
            self.truncate(limit, host)?;
        }
        Ok(())
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    /// Whether the selection is consistent with its rules, the collection
    /// length and the cache.
    pub(crate) fn is_consistent(&self, len: usize, cache: &ViewCache<V>) -> bool {
        let within_mode = match self.mode {
            SelectionMode::NoSelection => self.selected.is_empty(),
            SelectionMode::SingleSelection => self.selected.len() <= 1,
            SelectionMode::MultiSelection => self.limit.is_none_or(|l| self.selected.len() <= l),
        };
        let not_empty = self.mode == SelectionMode::NoSelection
            || self.allow_empty
            || self.stranded
            || len == 0
            || !self.selected.is_empty();
        let valid_views = self
            .selected
            .iter()
            .all(|v| v.index() < len && v.is_selected() && cache.holds(v));
        within_mode && not_empty && valid_views
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn select_view(&mut self, view: &ViewHandle<V>, host: &mut impl SelectionHost<V>) -> Result<()> {
        if self.propagate {
            host.write_flag(view.index(), true)?;
        }
        self.selected.push(view.clone());
        self.stranded = false;
        self.mark_selected(view);
        Ok(())
    }

    fn deselect_view(
        &mut self,
        view: &ViewHandle<V>,
        host: &mut impl SelectionHost<V>,
        write_flag: bool,
    ) -> Result<()> {
        if write_flag && self.propagate {
            host.write_flag(view.index(), false)?;
        }
        self.selected.retain(|v| !v.ptr_eq(view));
        self.mark_deselected(view);
        Ok(())
    }

    fn deselect_all(&mut self, host: &mut impl SelectionHost<V>) -> Result<()> {
        for view in self.selected.clone() {
            self.deselect_view(&view, host, true)?;
        }
        Ok(())
    }

    /// Deselect the most recently selected views until at most `max` remain.
    fn truncate(&mut self, max: usize, host: &mut impl SelectionHost<V>) -> Result<()> {
        while self.selected.len() > max {
            let Some(last) = self.selected.last().cloned() else {
                break;
            };
            self.deselect_view(&last, host, true)?;
        }
        Ok(())
    }

    fn mark_selected(&self, view: &ViewHandle<V>) {
        view.set_selected(true);
        view.view().select();
        tracing::trace!(target: "weft::selection", view = %view.id(), index = view.index(), "selected");
        if let Some(hook) = &self.hook {
            hook(view, true);
        }
    }

    fn mark_deselected(&self, view: &ViewHandle<V>) {
        view.set_selected(false);
        view.view().deselect();
        tracing::trace!(target: "weft::selection", view = %view.id(), index = view.index(), "deselected");
        if let Some(hook) = &self.hook {
            hook(view, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::params::ViewParams;
    use parking_lot::Mutex;
    use weft_core::WeftError;

    /// A host over `len` items with optional flags, building views lazily.
    struct FakeHost {
        cache: ViewCache<()>,
        flags: Vec<Option<bool>>,
    }

    impl FakeHost {
        fn new(len: usize) -> Self {
            Self {
                cache: ViewCache::new(),
                flags: vec![Some(false); len],
            }
        }

        fn view(&mut self, index: usize) -> ViewHandle<()> {
            self.cache
                .get_or_create::<()>(index, |i| Ok(Some(ViewHandle::new(i, ViewParams::new(), ()))))
                .unwrap()
                .unwrap()
        }
    }

    impl SelectionHost<()> for FakeHost {
        fn first_selectable_view(&mut self) -> Result<Option<ViewHandle<()>>> {
            if self.flags.is_empty() {
                return Ok(None);
            }
            match self.flags.iter().position(Option::is_some) {
                Some(index) => Ok(Some(self.view(index))),
                None => Err(WeftError::unselectable(0)),
            }
        }

        fn write_flag(&mut self, index: usize, selected: bool) -> Result<()> {
            match self.flags.get_mut(index) {
                Some(Some(flag)) => {
                    *flag = selected;
                    Ok(())
                }
                _ => Err(WeftError::unselectable(index)),
            }
        }
    }

    fn selection(mode: SelectionMode, allow_empty: bool, limit: i64) -> Selection<()> {
        let config = SelectionConfig {
            selection_mode: mode,
            allow_empty_selection: allow_empty,
            selection_limit: limit,
            propagate_selection_to_data: false,
        };
        Selection::new(&config, None).unwrap()
    }

    fn indices(sel: &Selection<()>) -> Vec<usize> {
        sel.views().iter().map(ViewHandle::index).collect()
    }

    #[test]
    fn test_single_selection_replaces() {
        let mut host = FakeHost::new(5);
        let mut sel = selection(SelectionMode::SingleSelection, true, UNLIMITED);
        for i in [1, 3, 2, 2, 4] {
            let view = host.view(i);
            sel.toggle(&view, &mut host).unwrap();
            assert!(sel.views().len() <= 1);
        }
        assert_eq!(indices(&sel), vec![4]);
        assert!(!host.view(2).is_selected());
    }

    #[test]
    fn test_no_selection_mode_stays_empty() {
        let mut host = FakeHost::new(3);
        let mut sel = selection(SelectionMode::NoSelection, false, UNLIMITED);
        let view = host.view(1);
        sel.toggle(&view, &mut host).unwrap();
        sel.check_for_empty(&mut host).unwrap();
        assert!(sel.views().is_empty());
        assert!(!view.is_selected());
    }

    #[test]
    fn test_multi_selection_limit() {
        let mut host = FakeHost::new(5);
        let mut sel = selection(SelectionMode::MultiSelection, true, 2);
        for i in [0, 1, 2] {
            let view = host.view(i);
            sel.toggle(&view, &mut host).unwrap();
        }
        assert_eq!(indices(&sel), vec![0, 1]);
        assert!(!host.view(2).is_selected());
    }

    #[test]
    fn test_deselect_last_reselects_first_when_empty_disallowed() {
        let mut host = FakeHost::new(3);
        let mut sel = selection(SelectionMode::SingleSelection, false, UNLIMITED);
        let view = host.view(2);
        sel.toggle(&view, &mut host).unwrap();
        sel.toggle(&view, &mut host).unwrap();
        assert_eq!(indices(&sel), vec![0]);
        assert!(!view.is_selected());
    }

    #[test]
    fn test_select_many_without_extend_clears_first() {
        let mut host = FakeHost::new(5);
        let mut sel = selection(SelectionMode::MultiSelection, true, UNLIMITED);
        let v0 = host.view(0);
        sel.toggle(&v0, &mut host).unwrap();

        let batch = vec![host.view(2), host.view(3)];
        sel.select_many(&batch, false, &mut host).unwrap();
        assert_eq!(indices(&sel), vec![2, 3]);

        let more = vec![host.view(4)];
        sel.select_many(&more, true, &mut host).unwrap();
        assert_eq!(indices(&sel), vec![2, 3, 4]);

        sel.deselect_many(&batch, &mut host).unwrap();
        assert_eq!(indices(&sel), vec![4]);
    }

    #[test]
    fn test_propagation_writes_flags() {
        let mut host = FakeHost::new(3);
        let config = SelectionConfig {
            propagate_selection_to_data: true,
            ..SelectionConfig::default()
        };
        let mut sel = Selection::new(&config, None).unwrap();
        let v1 = host.view(1);
        let v2 = host.view(2);
        sel.toggle(&v1, &mut host).unwrap();
        assert_eq!(host.flags, vec![Some(false), Some(true), Some(false)]);
        sel.toggle(&v2, &mut host).unwrap();
        assert_eq!(host.flags, vec![Some(false), Some(false), Some(true)]);
    }

    #[test]
    fn test_propagation_to_item_without_flag_fails() {
        let mut host = FakeHost::new(2);
        host.flags[1] = None;
        let config = SelectionConfig {
            propagate_selection_to_data: true,
            ..SelectionConfig::default()
        };
        let mut sel = Selection::new(&config, None).unwrap();
        let view = host.view(1);
        let err = sel.toggle(&view, &mut host).unwrap_err();
        assert_eq!(err, WeftError::unselectable(1));
        assert!(sel.views().is_empty());
        assert!(!view.is_selected());
    }

    #[test]
    fn test_empty_check_skips_unselectable_items() {
        let mut host = FakeHost::new(3);
        host.flags[0] = None;
        let mut sel = selection(SelectionMode::SingleSelection, false, UNLIMITED);
        sel.check_for_empty(&mut host).unwrap();
        assert_eq!(indices(&sel), vec![1]);

        let mut host = FakeHost::new(2);
        host.flags = vec![None, None];
        let mut sel = selection(SelectionMode::SingleSelection, false, UNLIMITED);
        assert_eq!(sel.check_for_empty(&mut host).unwrap_err(), WeftError::unselectable(0));
        assert!(sel.is_consistent(2, &host.cache));
    }

    #[test]
    fn test_drop_deleted_and_forget_all() {
        let mut host = FakeHost::new(5);
        let mut sel = selection(SelectionMode::MultiSelection, true, UNLIMITED);
        for i in [0, 2, 4] {
            let view = host.view(i);
            sel.toggle(&view, &mut host).unwrap();
        }
        sel.drop_deleted(IndexRange::new(1, 3));
        assert_eq!(indices(&sel), vec![0, 4]);
        sel.forget_all();
        assert!(sel.views().is_empty());
        assert!(!host.view(0).is_selected());
    }

    #[test]
    fn test_mode_changes() {
        let mut host = FakeHost::new(4);
        let mut sel = selection(SelectionMode::MultiSelection, false, UNLIMITED);
        for i in [1, 2, 3] {
            let view = host.view(i);
            sel.toggle(&view, &mut host).unwrap();
        }
        sel.set_mode(SelectionMode::SingleSelection, &mut host).unwrap();
        assert_eq!(indices(&sel), vec![1]);

        sel.set_mode(SelectionMode::NoSelection, &mut host).unwrap();
        assert!(sel.views().is_empty());

        sel.set_mode(SelectionMode::MultiSelection, &mut host).unwrap();
        assert_eq!(indices(&sel), vec![0]);
    }

    #[test]
    fn test_limit_changes() {
        let mut host = FakeHost::new(4);
        let mut sel = selection(SelectionMode::MultiSelection, true, UNLIMITED);
        for i in 0..4 {
            let view = host.view(i);
            sel.toggle(&view, &mut host).unwrap();
        }
        sel.set_limit(2, &mut host).unwrap();
        assert_eq!(indices(&sel), vec![0, 1]);
        assert_eq!(
            sel.set_limit(-2, &mut host).unwrap_err(),
            WeftError::Config(ConfigError::InvalidSelectionLimit(-2))
        );
        assert!(sel.is_consistent(4, &host.cache));
    }

    #[test]
    fn test_hook_sees_every_transition() {
        let mut host = FakeHost::new(3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recv = seen.clone();
        let hook: SelectionHook<()> = Arc::new(move |view, selected| {
            recv.lock().push((view.index(), selected));
        });
        let mut sel = Selection::new(&SelectionConfig::default(), Some(hook)).unwrap();
        let v0 = host.view(0);
        let v1 = host.view(1);
        sel.toggle(&v0, &mut host).unwrap();
        sel.toggle(&v1, &mut host).unwrap();
        assert_eq!(*seen.lock(), vec![(0, true), (0, false), (1, true)]);
    }

    #[test]
    fn test_parse_selection_limit() {
        assert_eq!(parse_selection_limit(-1), Ok(None));
        assert_eq!(parse_selection_limit(0), Ok(Some(0)));
        assert_eq!(parse_selection_limit(7), Ok(Some(7)));
        assert_eq!(parse_selection_limit(-5), Err(ConfigError::InvalidSelectionLimit(-5)));
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = SelectionConfig {
            selection_mode: SelectionMode::NoSelection,
            allow_empty_selection: false,
            selection_limit: 4,
            propagate_selection_to_data: true,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""selection_mode":"none""#));
        let back: SelectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);

        let zero = SelectionConfig {
            allow_empty_selection: false,
            selection_limit: 0,
            ..SelectionConfig::default()
        };
        assert_eq!(zero.limit(), Err(ConfigError::InvalidSelectionLimit(0)));
    }
}
