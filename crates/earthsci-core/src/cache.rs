//! Lazily computed, explicitly invalidated values.
//!
//! [`Cached<T>`] is the slot behind each of a layer node's derived
//! aggregates. It holds the last computed value plus a validity flag; the
//! value is computed on first access and again after every
//! [`invalidate`](Cached::invalidate). It carries no lock of its own: the
//! layer tree keeps the three slots of a node together behind one mutex.
//!
//! # Example
//!
//! ```
//! use earthsci_core::cache::Cached;
//!
//! let mut doubled = Cached::new();
//! assert_eq!(*doubled.get_or_compute(|| 21 * 2), 42);
//!
//! // Served from cache: the closure is not called.
//! assert_eq!(*doubled.get_or_compute(|| unreachable!()), 42);
//!
//! doubled.invalidate();
//! assert_eq!(*doubled.get_or_compute(|| 7), 7);
//! ```

use std::fmt;

/// A cached value with a validity flag.
pub struct Cached<T> {
    value: Option<T>,
    valid: bool,
}

impl<T> Cached<T> {
    /// Create an empty, invalid slot.
    pub const fn new() -> Self {
        Self {
            value: None,
            valid: false,
        }
    }

    /// Return the cached value, computing it first if the slot is invalid.
    pub fn get_or_compute<F>(&mut self, compute: F) -> &T
    where
        F: FnOnce() -> T,
    {
        let value = match self.value.take() {
            Some(value) if self.valid => value,
            _ => compute(),
        };
        self.valid = true;
        self.value.insert(value)
    }

    /// Like [`get_or_compute`](Self::get_or_compute) with a fallible rebuild.
    ///
    /// On error the slot stays invalid and the error is returned.
    pub fn try_get_or_compute<E, F>(&mut self, compute: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let value = match self.value.take() {
            Some(value) if self.valid => value,
            stale => match compute() {
                Ok(value) => value,
                Err(err) => {
                    self.value = stale;
                    return Err(err);
                }
            },
        };
        self.valid = true;
        Ok(self.value.insert(value))
    }

    /// Mark the slot as stale so the next access recomputes.
    ///
    /// The stale value is kept until then; it is never handed out.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Whether the next access will recompute.
    pub fn is_dirty(&self) -> bool {
        !self.valid
    }

    /// Whether a value has ever been computed.
    pub fn is_initialized(&self) -> bool {
        self.value.is_some()
    }
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Cached<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cached")
            .field("valid", &self.valid)
            .field("value", &self.value)
            .finish()
    }
}
