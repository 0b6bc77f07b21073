//! Prelude module for Weft.
//!
//! ```ignore
//! use weft::prelude::*;
//! ```

// ============================================================================
// Core
// ============================================================================

pub use crate::{ConfigError, ConnectionId, Result, Signal, WeftError};

// ============================================================================
// Collections and Operations
// ============================================================================

pub use crate::model::{Collection, ListOp, ObservableList, ObservableMap, OpKind};

// ============================================================================
// Adapters and Selection
// ============================================================================

pub use crate::model::{
    Adapter, AdapterBuilder, ItemView, ListAdapter, MapAdapter, Selectable, SelectableDataItem,
    SelectionConfig, SelectionFlag, SelectionMode, ViewHandle, ViewParams, text_converter,
};

// ============================================================================
// Views
// ============================================================================

pub use crate::view::ListView;
