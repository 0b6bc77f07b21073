//! Core primitives for Weft.
//!
//! This crate provides the building blocks the Weft list engine is made of:
//!
//! - **Signal/Slot System**: Type-safe, synchronous change notification
//! - **Reentrancy Guard**: Rejects nested mutation during reconciliation
//! - **Errors**: The configuration and reentrancy error taxonomy
//! - **Logging**: `tracing` targets, span names and helpers
//!
//! # Signal/Slot Example
//!
//! ```
//! use weft_core::Signal;
//!
//! let count_changed = Signal::<usize>::new();
//! let conn_id = count_changed.connect(|count| {
//!     println!("collection now holds {count} items");
//! });
//!
//! count_changed.emit(3);
//! count_changed.disconnect(conn_id);
//! ```

pub mod error;
pub mod logging;
pub mod reentrancy;
pub mod signal;

pub use error::{ConfigError, ReentrancyError, Result, WeftError};
pub use logging::PerfSpan;
pub use reentrancy::{ReentrancyGuard, ReentrancyScope};
pub use signal::{ConnectionId, Signal};
