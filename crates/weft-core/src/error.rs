//! Error types for Weft.

/// The main error type for Weft operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WeftError {
    /// The adapter was configured or used in a way it does not support.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A collection was mutated while a previous mutation was still being reconciled.
    #[error(transparent)]
    Reentrancy(#[from] ReentrancyError),
}

/// Errors caused by invalid adapter configuration or usage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Both a view class and a template were supplied.
    #[error("cannot use both a view class and a template as view factory")]
    ConflictingViewFactories,

    /// Neither a view class nor a template was supplied.
    #[error("a view class or a template is required to build views")]
    MissingViewFactory,

    /// No converter from items to view parameters was supplied.
    #[error("a converter from items to view parameters is required")]
    MissingConverter,

    /// The selection limit was below `-1` (the "unlimited" marker).
    #[error("invalid selection limit {0}: expected -1 (unlimited) or a non-negative count")]
    InvalidSelectionLimit(i64),

    /// Selection propagation was requested but items expose no selection flag.
    #[error("selection propagation requested but no selection flag accessor is configured")]
    PropagationUnsupported,

    /// An individual item did not expose a selection flag.
    #[error("item at index {index} has no selection flag to propagate to")]
    UnselectableItem {
        /// Position of the item in the collection.
        index: usize,
    },
}

/// A nested mutation was attempted while reconciliation was in progress.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{owner}: collection mutated while reconciling a previous `{pending}` mutation")]
pub struct ReentrancyError {
    /// The component whose guard rejected the mutation.
    pub owner: &'static str,
    /// The operation that was still being reconciled.
    pub pending: &'static str,
}

impl WeftError {
    /// Create an [`UnselectableItem`](ConfigError::UnselectableItem) error.
    pub fn unselectable(index: usize) -> Self {
        Self::Config(ConfigError::UnselectableItem { index })
    }

    /// Whether this error reports a configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Whether this error reports a rejected nested mutation.
    pub fn is_reentrancy(&self) -> bool {
        matches!(self, Self::Reentrancy(_))
    }
}

/// Result type for Weft operations.
pub type Result<T> = std::result::Result<T, WeftError>;
