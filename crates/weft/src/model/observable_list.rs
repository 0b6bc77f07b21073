//! An ordered sequence that describes every mutation it undergoes.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::{Bound, RangeBounds};

use super::collection::{Collection, SpanRemoval};
use super::operation::{IndexRange, ListOp, Mutation, OpKind, Reorder};

/// A `Vec`-backed list whose mutators return a [`Mutation`].
///
/// Mutators that change nothing (popping an empty list, removing an
/// out-of-range index, sorting fewer than two items ...) return `None`
/// instead of a mutation. Index-addressed accessors never panic.
///
/// # Example
///
/// ```
/// use weft::model::{ListOp, ObservableList};
///
/// let mut list = ObservableList::from(vec!["a", "b"]);
/// let mutation = list.push("c");
/// assert_eq!(mutation.op(), ListOp::add(2, 2));
///
/// let (removed, mutation) = list.remove(0).unwrap();
/// assert_eq!(removed, "a");
/// assert_eq!(mutation.op(), ListOp::delete(0, 0));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservableList<T> {
    items: Vec<T>,
}

impl<T> ObservableList<T> {
    /// Create a list holding `items`.
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The item at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// All items as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Iterate over the items.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Consume the list, returning its items.
    pub fn into_inner(self) -> Vec<T> {
        self.items
    }

    // =========================================================================
    // Growth
    // =========================================================================

    /// Append one item.
    pub fn push(&mut self, item: T) -> Mutation {
        self.items.push(item);
        let last = self.items.len() - 1;
        ListOp::add(last, last).into()
    }

    /// Insert `item` before position `index`, clamped to the list length.
    pub fn insert(&mut self, index: usize, item: T) -> Mutation {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
        ListOp::insert(index, index).into()
    }

    /// Append every item from `iter`. Returns `None` if `iter` was empty.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) -> Option<Mutation> {
        let old_len = self.items.len();
        self.items.extend(iter);
        let range = IndexRange::with_len(old_len, self.items.len() - old_len)?;
        Some(ListOp::new(OpKind::Add, Some(range)).into())
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove and return the item at `index`.
    pub fn remove(&mut self, index: usize) -> Option<(T, Mutation)> {
        if index >= self.items.len() {
            return None;
        }
        let item = self.items.remove(index);
        Some((item, ListOp::delete(index, index).into()))
    }

    /// Remove and return the last item.
    pub fn pop(&mut self) -> Option<(T, Mutation)> {
        let item = self.items.pop()?;
        let index = self.items.len();
        Some((item, ListOp::delete(index, index).into()))
    }

    /// Remove every item in `range`, clamped to the list.
    ///
    /// Returns `None` when the clamped range is empty.
    pub fn drain<R: RangeBounds<usize>>(&mut self, range: R) -> Option<(Vec<T>, Mutation)> {
        let (start, end) = resolve_range(range, self.items.len());
        let span = IndexRange::with_len(start, end - start)?;
        let removed: Vec<T> = self.items.drain(start..end).collect();
        Some((removed, ListOp::new(OpKind::Delete, Some(span)).into()))
    }

    /// Remove all items.
    pub fn clear(&mut self) -> Option<(Vec<T>, Mutation)> {
        let span = IndexRange::with_len(0, self.items.len())?;
        let removed = std::mem::take(&mut self.items);
        Some((removed, ListOp::new(OpKind::Clear, Some(span)).into()))
    }

    // =========================================================================
    // Replacement
    // =========================================================================

    /// Overwrite the item at `index`, returning the old one.
    ///
    /// Out-of-range writes return `None` and drop `item`.
    pub fn set(&mut self, index: usize, item: T) -> Option<(T, Mutation)> {
        let slot = self.items.get_mut(index)?;
        let old = std::mem::replace(slot, item);
        Some((old, ListOp::set_range(index, index).into()))
    }

    /// Edit the item at `index` in place.
    pub fn modify<R>(&mut self, index: usize, f: impl FnOnce(&mut T) -> R) -> Option<(R, Mutation)> {
        let slot = self.items.get_mut(index)?;
        Some((f(slot), ListOp::set_range(index, index).into()))
    }

    /// Replace the items in `range` with `replace_with`.
    ///
    /// When the replacement has as many items as the replaced span, the
    /// change is a targeted overwrite of that span. Any other shape moves
    /// items around unpredictably and is reported as a reset.
    pub fn splice<R, I>(&mut self, range: R, replace_with: I) -> (Vec<T>, Mutation)
    where
        R: RangeBounds<usize>,
        I: IntoIterator<Item = T>,
    {
        let (start, end) = resolve_range(range, self.items.len());
        let old_len = self.items.len();
        let removed: Vec<T> = self.items.splice(start..end, replace_with).collect();
        let op = match IndexRange::with_len(start, removed.len()) {
            Some(span) if self.items.len() == old_len => ListOp::new(OpKind::SetRange, Some(span)),
            _ => ListOp::reset(),
        };
        (removed, op.into())
    }

    /// Replace every item.
    pub fn replace_all(&mut self, items: Vec<T>) -> (Vec<T>, Mutation) {
        let old = std::mem::replace(&mut self.items, items);
        (old, ListOp::reset().into())
    }

    // =========================================================================
    // Reordering
    // =========================================================================

    /// Stable-sort the items with `compare`.
    pub fn sort_by<F>(&mut self, mut compare: F) -> Option<Mutation>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        if self.items.len() < 2 {
            return None;
        }
        let mut tagged: Vec<(usize, T)> = self.items.drain(..).enumerate().collect();
        tagged.sort_by(|a, b| compare(&a.1, &b.1));

        let mut new_index_of = vec![0; tagged.len()];
        for (new, (old, _)) in tagged.iter().enumerate() {
            new_index_of[*old] = new;
        }
        self.items = tagged.into_iter().map(|(_, item)| item).collect();
        Some(Mutation::reordered(OpKind::Sort, Reorder::Permuted(new_index_of)))
    }

    /// Stable-sort the items by the key `f` extracts.
    pub fn sort_by_key<K, F>(&mut self, mut f: F) -> Option<Mutation>
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        self.sort_by(|a, b| f(a).cmp(&f(b)))
    }

    /// Reverse the order of the items.
    pub fn reverse(&mut self) -> Option<Mutation> {
        if self.items.len() < 2 {
            return None;
        }
        self.items.reverse();
        Some(Mutation::reordered(
            OpKind::Reverse,
            Reorder::Reversed {
                len: self.items.len(),
            },
        ))
    }
}

impl<T: Ord> ObservableList<T> {
    /// Stable-sort the items in ascending order.
    pub fn sort(&mut self) -> Option<Mutation> {
        self.sort_by(Ord::cmp)
    }
}

impl<T: PartialEq> ObservableList<T> {
    /// Position of the first item equal to `item`.
    pub fn position(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|x| x == item)
    }

    /// Remove the first item equal to `item`.
    pub fn remove_item(&mut self, item: &T) -> Option<(T, Mutation)> {
        let index = self.position(item)?;
        self.remove(index)
    }
}

impl<T> From<Vec<T>> for ObservableList<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T> FromIterator<T> for ObservableList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T: Send + Sync + 'static> Collection for ObservableList<T> {
    type Item = T;
    type Key = usize;

    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    fn key(&self, index: usize) -> Option<usize> {
        (index < self.items.len()).then_some(index)
    }
}

impl<T: Send + Sync + 'static> SpanRemoval for ObservableList<T> {
    fn remove_span(&mut self, start: usize, end: usize) -> Option<Mutation> {
        self.drain(start..end).map(|(_, mutation)| mutation)
    }

    fn retain_positions(&mut self, keep: &BTreeSet<usize>) -> Option<Mutation> {
        if keep.len() >= self.items.len() && keep.iter().all(|&i| i < self.items.len()) {
            return None;
        }
        let old = std::mem::take(&mut self.items);
        self.items = old
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| keep.contains(&i).then_some(item))
            .collect();
        Some(ListOp::reset().into())
    }
}

/// Clamp `range` to `0..len`, returning an exclusive `(start, end)`.
fn resolve_range<R: RangeBounds<usize>>(range: R, len: usize) -> (usize, usize) {
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e.saturating_add(1),
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };
    let end = end.min(len);
    (start.min(end), end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&'static str]) -> ObservableList<&'static str> {
        ObservableList::from(items.to_vec())
    }

    #[test]
    fn test_append_insert_extend_ranges() {
        let mut l = list(&["a", "b"]);
        assert_eq!(l.push("c").op(), ListOp::add(2, 2));
        assert_eq!(l.insert(1, "x").op(), ListOp::insert(1, 1));
        assert_eq!(l.insert(99, "z").op(), ListOp::insert(4, 4));
        assert_eq!(l.extend(["p", "q", "r"]).map(|m| m.op()), Some(ListOp::add(5, 7)));
        assert_eq!(l.extend(Vec::new()), None);
        assert_eq!(l.as_slice(), &["a", "x", "b", "c", "z", "p", "q", "r"]);
    }

    #[test]
    fn test_remove_variants() {
        let mut l = list(&["a", "b", "c", "d", "e"]);
        let (item, m) = l.remove_item(&"c").unwrap();
        assert_eq!((item, m.op()), ("c", ListOp::delete(2, 2)));

        let (item, m) = l.pop().unwrap();
        assert_eq!((item, m.op()), ("e", ListOp::delete(3, 3)));

        let (removed, m) = l.drain(1..=2).unwrap();
        assert_eq!(removed, vec!["b", "d"]);
        assert_eq!(m.op(), ListOp::delete(1, 2));
        assert_eq!(l.as_slice(), &["a"]);
    }

    #[test]
    fn test_empty_and_out_of_range_are_noops() {
        let mut l: ObservableList<i32> = ObservableList::default();
        assert!(l.pop().is_none());
        assert!(l.remove(0).is_none());
        assert!(l.clear().is_none());
        assert!(l.drain(..).is_none());
        assert!(l.sort().is_none());
        assert!(l.reverse().is_none());
        assert!(l.set(3, 1).is_none());
        assert!(l.modify(0, |v| *v += 1).is_none());
        assert!(l.remove_item(&7).is_none());
    }

    #[test]
    fn test_drain_clamps() {
        let mut l = list(&["a", "b", "c"]);
        let (removed, m) = l.drain(1..10).unwrap();
        assert_eq!(removed, vec!["b", "c"]);
        assert_eq!(m.op(), ListOp::delete(1, 2));
        assert!(l.drain(5..).is_none());
    }

    #[test]
    fn test_set_is_targeted() {
        let mut l = list(&["a", "b"]);
        let (old, m) = l.set(1, "B").unwrap();
        assert_eq!(old, "b");
        assert_eq!(m.op(), ListOp::set_range(1, 1));
        assert!(!m.op().is_reset());
    }

    #[test]
    fn test_splice_same_length_is_targeted() {
        let mut l = list(&["a", "b", "c", "d"]);
        let (removed, m) = l.splice(1..3, ["x", "y"]);
        assert_eq!(removed, vec!["b", "c"]);
        assert_eq!(m.op(), ListOp::set_range(1, 2));
        assert_eq!(l.as_slice(), &["a", "x", "y", "d"]);
    }

    #[test]
    fn test_splice_other_shapes_reset() {
        let mut l = list(&["a", "b", "c"]);
        let (_, m) = l.splice(0..1, ["x", "y"]);
        assert_eq!(m.op(), ListOp::reset());
        let (_, m) = l.replace_all(vec!["q"]);
        assert_eq!(m.op(), ListOp::reset());
    }

    #[test]
    fn test_sort_records_permutation_with_duplicates() {
        let mut l = ObservableList::from(vec![3, 1, 3, 2]);
        let m = l.sort().unwrap();
        assert_eq!(l.as_slice(), &[1, 2, 3, 3]);
        assert_eq!(m.op(), ListOp::new(OpKind::Sort, Some(IndexRange::new(0, 3))));
        let reorder = m.reorder().unwrap();
        // Stable: the first 3 stays ahead of the second.
        assert_eq!(reorder.new_index(0), Some(2));
        assert_eq!(reorder.new_index(1), Some(0));
        assert_eq!(reorder.new_index(2), Some(3));
        assert_eq!(reorder.new_index(3), Some(1));
    }

    #[test]
    fn test_reverse_and_clear() {
        let mut l = list(&["a", "b", "c"]);
        let m = l.reverse().unwrap();
        assert_eq!(m.op().kind(), OpKind::Reverse);
        assert_eq!(l.as_slice(), &["c", "b", "a"]);

        let (removed, m) = l.clear().unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(m.op(), ListOp::new(OpKind::Clear, Some(IndexRange::new(0, 2))));
    }

    #[test]
    fn test_retain_positions_is_a_reset() {
        let mut l = list(&["a", "b", "c", "d"]);
        let keep = BTreeSet::from([1, 3]);
        let m = l.retain_positions(&keep).unwrap();
        assert_eq!(m.op(), ListOp::reset());
        assert_eq!(l.as_slice(), &["b", "d"]);
        assert!(l.retain_positions(&BTreeSet::from([0, 1])).is_none());
        assert_eq!(l.remove_span(0, 1).map(|m| m.op()), Some(ListOp::delete(0, 0)));
    }

    #[test]
    fn test_collection_keys_are_positions() {
        let l = list(&["a", "b"]);
        assert_eq!(Collection::key(&l, 1), Some(1));
        assert_eq!(Collection::key(&l, 2), None);
    }
}
