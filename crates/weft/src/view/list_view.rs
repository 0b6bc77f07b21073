//! A windowed consumer of an [`Adapter`].
//!
//! [`ListView`] keeps widgets only for the rows around its viewport. It
//! listens to [`Adapter::data_changed`], queues every operation, and patches
//! its widget window when [`ListView::process_pending`] runs, which is the
//! host's "next tick".
//!
//! # Example
//!
//! ```
//! use weft::model::{ListAdapter, ObservableList, text_converter};
//! use weft::view::ListView;
//!
//! let items: Vec<u32> = (0..1000).collect();
//! let adapter = ListAdapter::builder(ObservableList::from(items))
//!     .converter(text_converter)
//!     .view_class(|_, _| ())
//!     .build()
//!     .unwrap();
//!
//! let mut view = ListView::new(adapter.clone(), 25.0, 100.0).with_overscan(2);
//! view.process_pending().unwrap();
//! assert_eq!(view.visible_range().map(|r| (r.start(), r.end())), Some((0, 3)));
//! assert_eq!(view.widgets().len(), 6);
//!
//! adapter.insert(0, 9999).unwrap();
//! view.process_pending().unwrap();
//! assert_eq!(view.widget(0).unwrap().params().text("text"), Some("9999"));
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use weft_core::logging::span_names;
use weft_core::{ConnectionId, Result};

use crate::model::{Adapter, Collection, IndexRange, ItemView, ListOp, OpKind, ViewHandle};

/// Rows kept alive on each side of the viewport by default.
pub const DEFAULT_OVERSCAN: usize = 10;

/// Operations received from the adapter but not yet applied.
#[derive(Debug, Default)]
struct Pending {
    ops: VecDeque<ListOp>,
    populate: bool,
}

/// A vertically scrolling list with uniform row height over an [`Adapter`].
pub struct ListView<C: Collection, V: ItemView> {
    adapter: Arc<Adapter<C, V>>,
    connection: ConnectionId,
    pending: Arc<Mutex<Pending>>,

    row_height: f32,
    viewport_height: f32,
    scroll_offset: f32,
    overscan: usize,
    follow_tail: bool,

    widgets: BTreeMap<usize, ViewHandle<V>>,
}

impl<C: Collection, V: ItemView> ListView<C, V> {
    /// Create a view over `adapter` with the given row and viewport heights.
    ///
    /// Nothing is populated until [`process_pending`](Self::process_pending).
    pub fn new(adapter: Arc<Adapter<C, V>>, row_height: f32, viewport_height: f32) -> Self {
        let pending = Arc::new(Mutex::new(Pending {
            ops: VecDeque::new(),
            populate: true,
        }));
        let queue = pending.clone();
        let connection = adapter.data_changed.connect(move |op| {
            queue.lock().ops.push_back(*op);
        });

        Self {
            adapter,
            connection,
            pending,
            row_height: row_height.max(0.0),
            viewport_height: viewport_height.max(0.0),
            scroll_offset: 0.0,
            overscan: DEFAULT_OVERSCAN,
            follow_tail: false,
            widgets: BTreeMap::new(),
        }
    }

    /// Set how many rows are kept beyond each edge of the viewport.
    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self.schedule_populate();
        self
    }

    /// Keep the view scrolled to the end when items are appended.
    pub fn with_follow_tail(mut self, follow: bool) -> Self {
        self.follow_tail = follow;
        self
    }

    /// The adapter this view presents.
    pub fn adapter(&self) -> &Arc<Adapter<C, V>> {
        &self.adapter
    }

    /// Height of every row.
    pub fn row_height(&self) -> f32 {
        self.row_height
    }

    /// Height of the visible area.
    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    /// Distance scrolled from the top.
    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    /// Rows kept populated on each side of the viewport.
    pub fn overscan(&self) -> usize {
        self.overscan
    }

    /// Whether appends scroll the view to the end.
    pub fn follows_tail(&self) -> bool {
        self.follow_tail
    }

    /// Make appends scroll the view to the end, or stop doing so.
    pub fn set_follow_tail(&mut self, follow: bool) {
        self.follow_tail = follow;
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Total height of all rows.
    pub fn content_height(&self) -> f32 {
        self.adapter.item_count() as f32 * self.row_height
    }

    fn max_scroll_offset(&self) -> f32 {
        (self.content_height() - self.viewport_height).max(0.0)
    }

    /// Rows intersecting the viewport, or `None` when there is nothing to show.
    pub fn visible_range(&self) -> Option<IndexRange> {
        let count = self.adapter.item_count();
        if count == 0 || self.row_height <= 0.0 {
            return None;
        }
        let last_index = count - 1;
        let first = ((self.scroll_offset / self.row_height).floor() as usize).min(last_index);
        let bottom = ((self.scroll_offset + self.viewport_height) / self.row_height).ceil() as usize;
        let last = bottom.saturating_sub(1).clamp(first, last_index);
        Some(IndexRange::new(first, last))
    }

    /// Rows that should have widgets: the visible rows plus the overscan.
    pub fn window(&self) -> Option<IndexRange> {
        let visible = self.visible_range()?;
        let last_index = self.adapter.item_count().saturating_sub(1);
        Some(IndexRange::new(
            visible.start().saturating_sub(self.overscan),
            visible.end().saturating_add(self.overscan).min(last_index),
        ))
    }

    /// Move the viewport to `offset`, clamped to the content.
    pub fn set_scroll_offset(&mut self, offset: f32) {
        let clamped = offset.clamp(0.0, self.max_scroll_offset());
        if clamped != self.scroll_offset {
            self.scroll_offset = clamped;
            self.schedule_populate();
        }
    }

    /// Resize the visible area, re-clamping the scroll offset.
    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(0.0);
        self.scroll_offset = self.scroll_offset.min(self.max_scroll_offset());
        self.schedule_populate();
    }

    /// Scroll the least distance that brings row `index` fully into view.
    pub fn scroll_to(&mut self, index: usize) {
        if index >= self.adapter.item_count() {
            return;
        }
        let top = index as f32 * self.row_height;
        let bottom = top + self.row_height;
        if top < self.scroll_offset {
            self.set_scroll_offset(top);
        } else if bottom > self.scroll_offset + self.viewport_height {
            self.set_scroll_offset(bottom - self.viewport_height);
        }
    }

    /// Scroll so the last row is at the bottom of the viewport.
    pub fn scroll_to_end(&mut self) {
        let max = self.max_scroll_offset();
        self.set_scroll_offset(max);
    }

    // =========================================================================
    // Widgets
    // =========================================================================

    /// The widget shown for row `index`.
    pub fn widget(&self, index: usize) -> Option<&ViewHandle<V>> {
        self.widgets.get(&index)
    }

    /// All live widgets, in row order.
    pub fn widgets(&self) -> Vec<ViewHandle<V>> {
        self.widgets.values().cloned().collect()
    }

    /// Activate the widget of row `index`, toggling its selection.
    ///
    /// Returns `false` if the row has no widget.
    pub fn activate_row(&self, index: usize) -> bool {
        match self.widgets.get(&index) {
            Some(view) => {
                view.activate();
                true
            }
            None => false,
        }
    }

    /// Whether operations or a repopulation are waiting.
    pub fn has_pending(&self) -> bool {
        let pending = self.pending.lock();
        pending.populate || !pending.ops.is_empty()
    }

    fn schedule_populate(&mut self) {
        self.pending.lock().populate = true;
    }

    /// Apply queued operations and refill the window.
    ///
    /// Returns `true` if anything was processed.
    pub fn process_pending(&mut self) -> Result<bool> {
        let (ops, mut populate) = {
            let mut pending = self.pending.lock();
            (std::mem::take(&mut pending.ops), std::mem::take(&mut pending.populate))
        };
        if ops.is_empty() && !populate {
            return Ok(false);
        }

        for op in ops {
            populate |= self.apply(op)?;
        }
        if populate {
            self.populate()?;
        }
        Ok(true)
    }

    /// Patch the widgets for one operation. Returns whether the window must
    /// be refilled.
    fn apply(&mut self, op: ListOp) -> Result<bool> {
        tracing::debug!(target: "weft::list_view", op = %op, widgets = self.widgets.len(), "applying operation");

        if op.is_reset() {
            self.widgets.clear();
            self.scroll_offset = self.scroll_offset.min(self.max_scroll_offset());
            return Ok(true);
        }
        let Some(range) = op.range() else {
            return Ok(true);
        };

        match op.kind() {
            OpKind::SetRange => {
                let stale: Vec<usize> = self.widgets.range(range.iter()).map(|(i, _)| *i).collect();
                for index in stale {
                    match self.adapter.get_view(index)? {
                        Some(view) => self.widgets.insert(index, view),
                        None => self.widgets.remove(&index),
                    };
                }
                Ok(false)
            }
            OpKind::Delete | OpKind::Insert => {
                self.rekey();
                self.scroll_offset = self.scroll_offset.min(self.max_scroll_offset());
                Ok(true)
            }
            OpKind::Add => {
                if self.follow_tail {
                    self.scroll_to_end();
                    return Ok(true);
                }
                Ok(self
                    .window()
                    .is_some_and(|window| range.intersects(window.start(), window.end())))
            }
            OpKind::Sort | OpKind::Reverse | OpKind::Clear => {
                self.widgets.clear();
                Ok(true)
            }
        }
    }

    /// Drop widgets whose view the adapter evicted and re-key the rest by
    /// their handles' current index.
    fn rekey(&mut self) {
        let adapter = &self.adapter;
        let old = std::mem::take(&mut self.widgets);
        self.widgets = old
            .into_values()
            .filter(|view| {
                adapter
                    .cached_view(view.index())
                    .is_some_and(|cached| cached.ptr_eq(view))
            })
            .map(|view| (view.index(), view))
            .collect();
    }

    /// Make the widget set match the window exactly.
    fn populate(&mut self) -> Result<()> {
        let _span = tracing::debug_span!(target: "weft::list_view", span_names::POPULATE).entered();
        let Some(window) = self.window() else {
            self.widgets.clear();
            return Ok(());
        };

        self.widgets.retain(|index, _| window.contains(*index));
        for index in window.iter() {
            if self.widgets.contains_key(&index) {
                continue;
            }
            if let Some(view) = self.adapter.get_view(index)? {
                self.widgets.insert(index, view);
            }
        }

        tracing::trace!(
            target: "weft::list_view",
            first = window.start(),
            last = window.end(),
            widgets = self.widgets.len(),
            "populated window"
        );
        Ok(())
    }
}

impl<C: Collection, V: ItemView> Drop for ListView<C, V> {
    fn drop(&mut self) {
        self.adapter.data_changed.disconnect(self.connection);
    }
}

impl<C: Collection, V: ItemView> std::fmt::Debug for ListView<C, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListView")
            .field("row_height", &self.row_height)
            .field("viewport_height", &self.viewport_height)
            .field("scroll_offset", &self.scroll_offset)
            .field("overscan", &self.overscan)
            .field("widgets", &self.widgets.keys().collect::<Vec<_>>())
            .finish()
    }
}
