//! The read surface adapters need from an observable collection.

/// An indexable collection an [`Adapter`](super::Adapter) can present.
///
/// Positions are dense (`0..len()`). Keyed collections additionally report
/// the key stored at each position; positional collections use the index
/// itself as the key.
///
/// Mutation is not part of this trait: every mutating method of a concrete
/// collection returns a [`Mutation`](super::Mutation) that the adapter must
/// reconcile, so adapters expose those methods through
/// [`Adapter::mutate`](super::Adapter::mutate) and its wrappers.
pub trait Collection: Send + Sync + 'static {
    /// The application data stored at each position.
    type Item: Send + Sync;
    /// The key reported for each position.
    type Key: Clone;

    /// Number of items.
    fn len(&self) -> usize;

    /// Whether the collection holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The item at `index`, or `None` when out of range.
    fn get(&self, index: usize) -> Option<&Self::Item>;

    /// Mutable access to the item at `index`.
    ///
    /// Used to write selection flags back into items; structural changes
    /// always go through the collection's own mutators.
    fn get_mut(&mut self, index: usize) -> Option<&mut Self::Item>;

    /// The key at `index`, or `None` when out of range.
    fn key(&self, index: usize) -> Option<Self::Key>;
}

/// Collections that can drop items by position, used by the
/// selection-relative trims of [`Adapter`](super::Adapter).
pub trait SpanRemoval: Collection {
    /// Remove the items at positions `start..end`, clamped to the collection.
    fn remove_span(&mut self, start: usize, end: usize) -> Option<super::Mutation>;

    /// Keep only the items at the listed positions, in their current order.
    fn retain_positions(&mut self, keep: &std::collections::BTreeSet<usize>) -> Option<super::Mutation>;
}
