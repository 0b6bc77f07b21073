//! The list/selection engine.
//!
//! Data flows one way through this module:
//!
//! ```text
//! ┌──────────────────┐  Mutation  ┌───────────┐  ListOp   ┌──────────────┐
//! │ ObservableList / │───────────>│  Adapter  │──────────>│   consumer   │
//! │ ObservableMap    │            │ ┌───────┐ │           │  (ListView)  │
//! └──────────────────┘            │ │ cache │ │  views    │              │
//!                                 │ ├───────┤ │<──────────│ get_view(i)  │
//!                                 │ │ sel.  │ │           └──────────────┘
//!                                 │ └───────┘ │
//!                                 └───────────┘
//! ```
//!
//! - [`ObservableList`] and [`ObservableMap`] describe each mutation with a
//!   [`ListOp`] instead of recording it on the side.
//! - [`Adapter`] owns a collection, builds [`ViewHandle`]s lazily from a
//!   converter and a view factory, and reconciles its view cache and
//!   selection after every mutation.
//! - The selection obeys a [`SelectionConfig`]: mode, empty-selection rule,
//!   limit, and optional propagation of the selected state onto items.

mod adapter;
mod cache;
mod collection;
mod observable_list;
mod observable_map;
mod operation;
mod params;
mod selectable;
mod selection;
mod view;

pub use adapter::{
    Adapter, AdapterBuilder, Converter, KeyedConverter, ListAdapter, MapAdapter, ViewFactory,
};
pub use collection::{Collection, SpanRemoval};
pub use observable_list::ObservableList;
pub use observable_map::ObservableMap;
pub use operation::{IndexRange, ListOp, Mutation, OpKind, Reorder};
pub use params::{DEFAULT_ROW_HEIGHT, ParamValue, ViewParams, text_converter};
pub use selectable::{FlagReader, FlagWriter, Selectable, SelectableDataItem, SelectionFlag};
pub use selection::{
    SelectionConfig, SelectionHook, SelectionMode, UNLIMITED, parse_selection_limit,
};
pub use view::{ItemView, ViewHandle, ViewId};
