//! Consumers that display an adapter's views.

mod list_view;

pub use list_view::{DEFAULT_OVERSCAN, ListView};
