//! Item views and the handles adapters hand out for them.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use weft_core::Signal;

use super::params::ViewParams;

/// Behaviour an instantiated item view exposes to the selection machinery.
///
/// The adapter calls [`select`](Self::select) and [`deselect`](Self::deselect)
/// whenever the view enters or leaves the selection, so the view can update
/// its appearance. Both default to doing nothing.
pub trait ItemView: Send + Sync + 'static {
    /// The view became selected.
    fn select(&self) {}

    /// The view stopped being selected.
    fn deselect(&self) {}
}

impl ItemView for () {}

/// Process-unique identity of an instantiated view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

struct ViewCell<V> {
    id: ViewId,
    index: AtomicUsize,
    selected: AtomicBool,
    params: ViewParams,
    view: V,
    activated: Signal<ViewId>,
}

/// A shared handle to one instantiated item view.
///
/// Handles are cheap to clone and compare by identity: two handles are equal
/// only if they refer to the same instantiated view. The adapter keeps
/// [`index`](Self::index) and [`is_selected`](Self::is_selected) current
/// as the collection changes.
pub struct ViewHandle<V> {
    cell: Arc<ViewCell<V>>,
}

impl<V> ViewHandle<V> {
    pub(crate) fn new(index: usize, params: ViewParams, view: V) -> Self {
        Self {
            cell: Arc::new(ViewCell {
                id: ViewId::next(),
                index: AtomicUsize::new(index),
                selected: AtomicBool::new(false),
                params,
                view,
                activated: Signal::new(),
            }),
        }
    }

    /// The view's identity.
    pub fn id(&self) -> ViewId {
        self.cell.id
    }

    /// The view's current position in the collection.
    pub fn index(&self) -> usize {
        self.cell.index.load(Ordering::Acquire)
    }

    /// Whether the view is part of the selection.
    pub fn is_selected(&self) -> bool {
        self.cell.selected.load(Ordering::Acquire)
    }

    /// The parameters the view was constructed from.
    pub fn params(&self) -> &ViewParams {
        &self.cell.params
    }

    /// The instantiated view.
    pub fn view(&self) -> &V {
        &self.cell.view
    }

    /// Emitted with the view's id when the view is activated (clicked, tapped).
    pub fn activated(&self) -> &Signal<ViewId> {
        &self.cell.activated
    }

    /// Activate the view, as a click would.
    ///
    /// Views built by an adapter toggle their selection in response. Must not
    /// be called from inside a converter or view factory.
    pub fn activate(&self) {
        self.cell.activated.emit(self.cell.id);
    }

    /// Whether both handles refer to the same view.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn set_index(&self, index: usize) {
        self.cell.index.store(index, Ordering::Release);
    }

    pub(crate) fn set_selected(&self, selected: bool) {
        self.cell.selected.store(selected, Ordering::Release);
    }
}

impl<V> Clone for ViewHandle<V> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<V> PartialEq for ViewHandle<V> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<V> Eq for ViewHandle<V> {}

impl<V> Hash for ViewHandle<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.id.hash(state);
    }
}

impl<V> fmt::Debug for ViewHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewHandle")
            .field("id", &self.cell.id)
            .field("index", &self.index())
            .field("selected", &self.is_selected())
            .finish()
    }
}

static_assertions::assert_impl_all!(ViewHandle<()>: Send, Sync, Clone);
