//! Signal/slot primitive used for change notification.
//!
//! A [`Signal`] holds a set of connected slots (closures) and invokes each of
//! them, synchronously and on the emitting thread, when the signal is
//! emitted. The layer tree uses a single `Signal<PropertyChange>` as its
//! event stream; scoped listeners are ordinary slots with a filter in front.
//!
//! # Re-entrancy
//!
//! Slots are snapshotted before invocation and the connection lock is
//! released while they run. A slot may therefore connect, disconnect, or
//! cause the same signal to be emitted again without deadlocking. Slots
//! connected during an emission are not invoked for that emission.
//!
//! # Example
//!
//! ```
//! use earthsci_core::Signal;
//!
//! let name_changed = Signal::<String>::new();
//! let id = name_changed.connect(|name| println!("renamed to {name}"));
//! name_changed.emit("Bathymetry".to_string());
//! name_changed.disconnect(id);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// Identifier of a single signal-slot connection.
    ///
    /// Returned by [`Signal::connect`] and accepted by [`Signal::disconnect`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A notification channel with any number of connected slots.
///
/// `Signal<Args>` is `Send + Sync`; slots must be `Send + Sync` as well since
/// emission can happen on any thread (for example a resolver worker thread
/// delivering a load result).
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    blocked: AtomicBool,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// A signal nobody listens to yet.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Register `slot`; the returned id disconnects it again.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connections.lock().insert(Arc::new(slot));
        tracing::trace!(target: targets::SIGNAL, ?id, "slot connected");
        id
    }

    /// Remove the slot registered under `id`.
    ///
    /// Returns `true` if the connection was found and removed.
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

    /// While blocked, `emit` drops its argument without calling any slot.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Whether emission is blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking every connected slot in connection order.
    pub fn emit(&self, args: Args) {
        self.emit_ref(&args);
    }

    /// Emit the signal by reference.
    pub fn emit_ref(&self, args: &Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");

        for slot in slots {
            slot(args);
        }
    }
}
