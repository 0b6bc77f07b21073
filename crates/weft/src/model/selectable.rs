//! Selection flags stored on data items.
//!
//! When an adapter propagates selection to data, every select and deselect
//! is also written onto the underlying item. Items opt in either by
//! implementing [`Selectable`] or through a [`SelectionFlag`] accessor
//! supplied at construction.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An item that carries its own selection flag.
pub trait Selectable {
    /// Whether the item is marked selected.
    fn is_selected(&self) -> bool;

    /// Mark the item selected or not.
    fn set_selected(&mut self, selected: bool);
}

/// A value paired with a selection flag.
///
/// # Example
///
/// ```
/// use weft::model::{Selectable, SelectableDataItem};
///
/// let mut item = SelectableDataItem::new("carrot");
/// assert!(!item.is_selected());
/// item.set_selected(true);
/// assert!(item.is_selected());
/// assert_eq!(item.to_string(), "carrot");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectableDataItem<T> {
    /// The wrapped value.
    pub value: T,
    /// The selection flag.
    #[serde(default)]
    pub is_selected: bool,
}

impl<T> SelectableDataItem<T> {
    /// Wrap `value`, initially not selected.
    pub fn new(value: T) -> Self {
        Self {
            value,
            is_selected: false,
        }
    }

    /// Wrap `value` with an explicit initial flag.
    pub fn with_selected(value: T, is_selected: bool) -> Self {
        Self { value, is_selected }
    }
}

impl<T> Selectable for SelectableDataItem<T> {
    fn is_selected(&self) -> bool {
        self.is_selected
    }

    fn set_selected(&mut self, selected: bool) {
        self.is_selected = selected;
    }
}

impl<T: fmt::Display> fmt::Display for SelectableDataItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

/// Reads the flag; `None` means the item has no flag.
pub type FlagReader<T> = Arc<dyn Fn(&T) -> Option<bool> + Send + Sync>;

/// Writes the flag; returns `false` if the item has no flag.
pub type FlagWriter<T> = Arc<dyn Fn(&mut T, bool) -> bool + Send + Sync>;

/// Accessor pair for the selection flag of items of type `T`.
///
/// Use [`SelectionFlag::selectable`] for items implementing [`Selectable`],
/// or [`SelectionFlag::new`] for items where only some records carry a
/// flag (for instance string-keyed records).
pub struct SelectionFlag<T> {
    read: FlagReader<T>,
    write: FlagWriter<T>,
}

impl<T> SelectionFlag<T> {
    /// Create an accessor from closures.
    pub fn new<R, W>(read: R, write: W) -> Self
    where
        R: Fn(&T) -> Option<bool> + Send + Sync + 'static,
        W: Fn(&mut T, bool) -> bool + Send + Sync + 'static,
    {
        Self {
            read: Arc::new(read),
            write: Arc::new(write),
        }
    }

    /// Read the flag of `item`.
    pub fn read(&self, item: &T) -> Option<bool> {
        (self.read)(item)
    }

    /// Write the flag of `item`. Returns `false` if it has none.
    pub fn write(&self, item: &mut T, selected: bool) -> bool {
        (self.write)(item, selected)
    }
}

impl<T: Selectable + 'static> SelectionFlag<T> {
    /// Accessor for items implementing [`Selectable`].
    pub fn selectable() -> Self {
        Self::new(|item: &T| Some(item.is_selected()), |item: &mut T, selected| {
            item.set_selected(selected);
            true
        })
    }
}

impl<T> Clone for SelectionFlag<T> {
    fn clone(&self) -> Self {
        Self {
            read: Arc::clone(&self.read),
            write: Arc::clone(&self.write),
        }
    }
}

impl<T> fmt::Debug for SelectionFlag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionFlag").finish_non_exhaustive()
    }
}
