//! Reentrancy checks for collection mutation.
//!
//! Adapters reconcile every mutation synchronously and then notify their
//! subscribers. A subscriber that mutates the same collection from inside
//! that window would observe (and corrupt) half-reconciled state, so the
//! attempt is rejected instead of being processed.
//!
//! # Usage
//!
//! ```
//! use weft_core::reentrancy::ReentrancyGuard;
//!
//! let guard = ReentrancyGuard::new("ListAdapter");
//!
//! let scope = guard.enter("append").unwrap();
//! assert!(guard.is_active());
//! // A nested attempt fails while the scope is alive.
//! assert!(guard.enter("delete").is_err());
//! drop(scope);
//!
//! assert!(guard.enter("delete").is_ok());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::ReentrancyError;

/// Tracks whether a mutation is currently being reconciled.
#[derive(Debug)]
pub struct ReentrancyGuard {
    owner: &'static str,
    active: AtomicBool,
    pending: Mutex<&'static str>,
}

impl ReentrancyGuard {
    /// Create an idle guard. `owner` names the component in error messages.
    pub fn new(owner: &'static str) -> Self {
        Self {
            owner,
            active: AtomicBool::new(false),
            pending: Mutex::new(""),
        }
    }

    /// Mark the start of a mutation named `operation`.
    ///
    /// Fails if another mutation is still in progress. The returned scope
    /// releases the guard when dropped.
    pub fn enter(&self, operation: &'static str) -> Result<ReentrancyScope<'_>, ReentrancyError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let pending = *self.pending.lock();
            crate::weft_warn!(
                owner = self.owner,
                attempted = operation,
                pending,
                "rejected nested mutation"
            );
            return Err(ReentrancyError {
                owner: self.owner,
                pending,
            });
        }
        *self.pending.lock() = operation;
        Ok(ReentrancyScope { guard: self })
    }

    /// Whether a mutation is in progress.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// The component name used in error messages.
    pub fn owner(&self) -> &'static str {
        self.owner
    }
}

/// RAII scope returned by [`ReentrancyGuard::enter`].
#[derive(Debug)]
pub struct ReentrancyScope<'a> {
    guard: &'a ReentrancyGuard,
}

impl ReentrancyScope<'_> {
    /// Rename the operation in progress once its kind is known.
    pub fn set_operation(&self, operation: &'static str) {
        *self.guard.pending.lock() = operation;
    }
}

impl Drop for ReentrancyScope<'_> {
    fn drop(&mut self) {
        *self.guard.pending.lock() = "";
        self.guard.active.store(false, Ordering::Release);
    }
}
