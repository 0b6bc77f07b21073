//! Signal/slot notification for Weft.
//!
//! A [`Signal<Args>`] keeps a set of connected slots (closures) and invokes
//! each of them, synchronously and on the emitting thread, when the signal is
//! emitted. Adapters use signals to announce data and selection changes to
//! the views that consume them.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The signal type for emitting notifications
//! - [`ConnectionId`] - Identifier returned when connecting a slot
//!
//! # Reentrancy
//!
//! The connection table is not locked while slots run. A slot may connect or
//! disconnect slots (including itself) or emit other signals. Changes to the
//! connection table made during an emission take effect on the next emission.
//!
//! # Example
//!
//! ```
//! use weft_core::Signal;
//!
//! let changed = Signal::<i32>::new();
//! let id = changed.connect(|value| println!("value is now {value}"));
//! changed.emit(42);
//! changed.disconnect(id);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Unique identifier for a signal-slot connection.
    ///
    /// Returned by [`Signal::connect`] and accepted by [`Signal::disconnect`].
    /// Identifiers are never reused by the same signal.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// Slots are invoked in connection order. Use `()` for signals without
/// arguments, or a tuple for several arguments.
pub struct Signal<Args> {
    /// Slots tagged with their connection sequence number.
    connections: Mutex<SlotMap<ConnectionId, (u64, Slot<Args>)>>,
    next_seq: AtomicU64,
    blocked: AtomicBool,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
    /// Create a signal with nothing connected.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            next_seq: AtomicU64::new(0),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect `slot`; it runs on every later emission until disconnected.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().insert((seq, Arc::new(slot)))
    }

    /// Remove the slot connected under `id`. Returns `false` if it was
    /// already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Remove every slot.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// While blocked, [`emit`](Self::emit) drops its arguments without
    /// calling any slot.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Whether emission is blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Call every connected slot with `args`.
    #[tracing::instrument(skip_all, target = "weft_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: "weft_core::signal", "blocked");
            return;
        }

        // Snapshot the slots so none of them runs under the connection lock.
        // Freed slotmap entries are reused, so order by sequence instead.
        let mut slots: Vec<(u64, Slot<Args>)> = self.connections.lock().values().cloned().collect();
        slots.sort_unstable_by_key(|(seq, _)| *seq);
        tracing::trace!(target: "weft_core::signal", slots = slots.len(), "emit");

        for (_, slot) in &slots {
            slot(&args);
        }
    }
}

impl<Args> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connection_count())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

static_assertions::assert_impl_all!(Signal<()>: Send, Sync);
static_assertions::assert_impl_all!(Signal<Vec<usize>>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_signal_emit_reaches_every_slot_in_order() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let first = received.clone();
        signal.connect(move |v| first.lock().push(("first", *v)));
        let second = received.clone();
        signal.connect(move |v| second.lock().push(("second", *v)));

        signal.emit(7);

        assert_eq!(*received.lock(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_signal_keeps_connection_order_after_disconnect() {
        let signal = Signal::<()>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let log = |name: &'static str| {
            let received = received.clone();
            move |_: &()| received.lock().push(name)
        };
        let a = signal.connect(log("a"));
        signal.connect(log("b"));
        signal.disconnect(a);
        // Takes over the slot freed by "a".
        signal.connect(log("c"));

        signal.emit(());
        assert_eq!(*received.lock(), vec!["b", "c"]);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal = Signal::<()>::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let id = signal.connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(signal.connection_count(), 1);

        signal.emit(());
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_signal_blocked() {
        let signal = Signal::<i32>::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        signal.connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        signal.set_blocked(true);
        signal.emit(1);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        signal.set_blocked(false);
        signal.emit(2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_signal_slot_may_connect_during_emit() {
        let signal = Arc::new(Signal::<()>::new());
        let count = Arc::new(AtomicUsize::new(0));

        let sig = signal.clone();
        let c = count.clone();
        signal.connect(move |_| {
            let inner = c.clone();
            sig.connect(move |_| {
                inner.fetch_add(1, Ordering::SeqCst);
            });
        });

        signal.emit(());
        // The slot added during the first emission only sees the second one.
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(signal.connection_count(), 2);

        signal.emit(());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_signal_disconnect_all() {
        let signal = Signal::<String>::new();
        signal.connect(|_| {});
        signal.connect(|_| {});
        signal.disconnect_all();
        assert_eq!(signal.connection_count(), 0);
    }
}
