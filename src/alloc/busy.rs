//! Per-thread re-entrancy flag.
//!
//! While a thread is inside the registry, any allocation it makes (logging,
//! report formatting, reading the environment during start-up) must go straight
//! to the system allocator. Otherwise the hook would try to take the registry
//! lock it is already holding.

use std::cell::Cell;

thread_local! {
    static BUSY: Cell<bool> = const { Cell::new(false) };
}

/// Is the current thread already inside the registry? Treated as `true` once
/// the thread-local is gone, so late allocations just pass through.
#[inline]
pub(crate) fn is_busy() -> bool {
    BUSY.try_with(Cell::get).unwrap_or(true)
}

/// Marks the current thread busy until dropped, restoring whatever was there
/// before (so guards nest).
pub(crate) struct BusyGuard {
    previous: bool,
}

impl BusyGuard {
    pub(crate) fn hold() -> Self {
        let previous = BUSY.try_with(|busy| busy.replace(true)).unwrap_or(true);
        Self { previous }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let _ = BUSY.try_with(|busy| busy.set(self.previous));
    }
}
