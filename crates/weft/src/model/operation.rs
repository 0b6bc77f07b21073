//! Operation descriptors produced by observable collections.
//!
//! Every mutating method of [`ObservableList`](super::ObservableList) and
//! [`ObservableMap`](super::ObservableMap) returns a [`Mutation`]: an
//! immutable [`ListOp`] describing what changed, plus the old→new index
//! map when the mutation reordered the collection. Adapters consume each
//! mutation exactly once to bring their view cache and selection up to date.

use std::fmt;

/// The kind of change a mutation made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Items appended at the end.
    Add,
    /// Items inserted before existing ones.
    Insert,
    /// Items removed.
    Delete,
    /// Items overwritten. Without a range, the whole collection must be
    /// treated as replaced.
    SetRange,
    /// Items stably reordered by a comparator.
    Sort,
    /// Item order reversed.
    Reverse,
    /// All items removed.
    Clear,
}

impl OpKind {
    /// A short lowercase name, used in logs and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::SetRange => "set_range",
            Self::Sort => "sort",
            Self::Reverse => "reverse",
            Self::Clear => "clear",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An inclusive span of collection indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRange {
    start: usize,
    end: usize,
}

impl IndexRange {
    /// Create a range covering `start..=end`. The bounds are swapped if needed.
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// A range covering exactly one index.
    pub fn single(index: usize) -> Self {
        Self {
            start: index,
            end: index,
        }
    }

    /// A range covering `count` indices starting at `start`, if `count > 0`.
    pub fn with_len(start: usize, count: usize) -> Option<Self> {
        (count > 0).then(|| Self {
            start,
            end: start + count - 1,
        })
    }

    /// First index in the range.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last index in the range (inclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of indices covered.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Whether `index` falls inside the range.
    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }

    /// Whether this range shares at least one index with `start..=end`.
    pub fn intersects(&self, start: usize, end: usize) -> bool {
        self.start <= end && start <= self.end
    }

    /// Iterate over the covered indices.
    pub fn iter(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Describes a single mutation: its kind and the affected index range.
///
/// A range of `None` means no contiguous range describes the change and
/// consumers must treat it as a structural reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListOp {
    kind: OpKind,
    range: Option<IndexRange>,
}

impl ListOp {
    /// Create a descriptor from its parts.
    pub const fn new(kind: OpKind, range: Option<IndexRange>) -> Self {
        Self { kind, range }
    }

    /// Items appended over `start..=end`.
    pub fn add(start: usize, end: usize) -> Self {
        Self::new(OpKind::Add, Some(IndexRange::new(start, end)))
    }

    /// Items inserted over `start..=end`.
    pub fn insert(start: usize, end: usize) -> Self {
        Self::new(OpKind::Insert, Some(IndexRange::new(start, end)))
    }

    /// Items removed from `start..=end` (indices before the removal).
    pub fn delete(start: usize, end: usize) -> Self {
        Self::new(OpKind::Delete, Some(IndexRange::new(start, end)))
    }

    /// Items overwritten in place over `start..=end`.
    pub fn set_range(start: usize, end: usize) -> Self {
        Self::new(OpKind::SetRange, Some(IndexRange::new(start, end)))
    }

    /// An overwrite with no well-defined range: treat everything as replaced.
    pub const fn reset() -> Self {
        Self::new(OpKind::SetRange, None)
    }

    /// The kind of change.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// The affected range, if one is defined.
    pub fn range(&self) -> Option<IndexRange> {
        self.range
    }

    /// First affected index, if a range is defined.
    pub fn start_index(&self) -> Option<usize> {
        self.range.map(|r| r.start())
    }

    /// Last affected index, if a range is defined.
    pub fn end_index(&self) -> Option<usize> {
        self.range.map(|r| r.end())
    }

    /// Whether consumers must discard everything they derived from the
    /// collection before this operation.
    pub fn is_reset(&self) -> bool {
        match self.kind {
            OpKind::SetRange => self.range.is_none(),
            OpKind::Sort | OpKind::Reverse | OpKind::Clear => true,
            OpKind::Add | OpKind::Insert | OpKind::Delete => false,
        }
    }
}

impl fmt::Display for ListOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            Some(range) => write!(f, "{}({})", self.kind, range),
            None => write!(f, "{}(*)", self.kind),
        }
    }
}

/// How a reordering mutation moved items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reorder {
    /// `new_index_of[old] == new` for every old index.
    Permuted(Vec<usize>),
    /// Order reversed over a collection of `len` items.
    Reversed {
        /// Collection length at the time of the reversal.
        len: usize,
    },
}

impl Reorder {
    /// Where the item formerly at `old` now lives.
    pub fn new_index(&self, old: usize) -> Option<usize> {
        match self {
            Self::Permuted(new_index_of) => new_index_of.get(old).copied(),
            Self::Reversed { len } => (old < *len).then(|| len - 1 - old),
        }
    }

    /// Number of positions covered by the reorder.
    pub fn len(&self) -> usize {
        match self {
            Self::Permuted(new_index_of) => new_index_of.len(),
            Self::Reversed { len } => *len,
        }
    }

    /// Whether the reorder covers no positions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The result of one mutating call on an observable collection.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a mutation must be reconciled by the adapter that owns the collection"]
pub struct Mutation {
    op: ListOp,
    reorder: Option<Reorder>,
}

impl Mutation {
    /// A mutation that did not reorder anything.
    pub fn new(op: ListOp) -> Self {
        Self { op, reorder: None }
    }

    /// A reordering mutation.
    pub fn reordered(kind: OpKind, reorder: Reorder) -> Self {
        let op = ListOp::new(kind, IndexRange::with_len(0, reorder.len()));
        Self {
            op,
            reorder: Some(reorder),
        }
    }

    /// The operation descriptor.
    pub fn op(&self) -> ListOp {
        self.op
    }

    /// The index map, for Sort and Reverse.
    pub fn reorder(&self) -> Option<&Reorder> {
        self.reorder.as_ref()
    }

    pub(crate) fn into_parts(self) -> (ListOp, Option<Reorder>) {
        (self.op, self.reorder)
    }
}

impl From<ListOp> for Mutation {
    fn from(op: ListOp) -> Self {
        Self::new(op)
    }
}
