//! Weft - windowed list adapters for large scrollable collections.
//!
//! Weft sits between an ordered (or keyed) collection of application data
//! and a UI surface that can only afford to instantiate the item views it
//! is currently showing. It provides:
//!
//! - **Observable collections** that describe every mutation with an
//!   operation descriptor
//! - **Adapters** that build item views lazily, cache them by position and
//!   keep that cache coherent under insert, delete, sort and reverse
//! - **Selection** in none, single or multiple mode, optionally written
//!   back onto the data items
//! - **A windowed list view** that keeps widgets only for the rows around
//!   its viewport and patches them incrementally
//!
//! The signal, error and logging primitives come from `weft-core` and are
//! re-exported here.
//!
//! # Example
//!
//! ```
//! use weft::prelude::*;
//!
//! let adapter = ListAdapter::builder(ObservableList::from(vec!["A", "B", "C", "D", "E"]))
//!     .converter(text_converter)
//!     .view_class(|_index, _params| ())
//!     .allow_empty_selection(false)
//!     .build()?;
//!
//! adapter.toggle_index(2)?;
//! adapter.drain(1..=3)?;
//!
//! // The selected item was deleted, so the first remaining one is selected.
//! assert_eq!(adapter.selected_indices(), vec![0]);
//! # Ok::<(), weft::WeftError>(())
//! ```

pub use weft_core::*;

pub mod model;
pub mod prelude;
pub mod view;
