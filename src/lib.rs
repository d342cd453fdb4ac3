//! Leak detection for the Rust global allocator.
//!
//! Install [`LeakTracker`] as the global allocator and every live heap
//! allocation gets a record in a process-wide [`Registry`]. When the process
//! exits, anything still recorded is written to stderr:
//!
//! ```plaintext
//! memory leak detected, count:2
//! addr:0x55d0c8a4fb10 file:src/alloc/global.rs line:40
//! addr:0x55d0c8a4fb30 file:src/main.rs line:12
//! ```
//!
//! ```no_run
//! use memleak::LeakTracker;
//!
//! #[global_allocator]
//! static GLOBAL: LeakTracker = LeakTracker;
//!
//! fn main() {
//!     let boxed = memleak::track!(Box::new(5));
//!     std::mem::forget(boxed);
//! }
//! ```
//!
//! Allocations made through the hook are attributed to the hook itself. Wrap
//! an allocation in [`track!`] to attribute it to the caller instead.

pub mod alloc;
pub mod config;
mod lazy_lock;
pub mod report;
mod serialize;
pub mod util;

pub use crate::alloc::{
    global::LeakTracker,
    ledger::{Ledger, Record},
    manual::{Malloc, RawAlloc},
    registry::Registry,
    track::Tracked,
};
pub use crate::config::{Config, ReportFormat};
pub use crate::report::{LeakRecord, LeakReport};

#[cfg(feature = "global")]
#[global_allocator]
static GLOBAL: LeakTracker = LeakTracker;

/// Attribute the allocation behind a value to the current source location.
///
/// Evaluates to the value itself, so it can wrap a constructor in place:
///
/// ```no_run
/// let names: Vec<String> = memleak::track!(Vec::with_capacity(8));
/// ```
#[macro_export]
macro_rules! track {
    ($value:expr) => {
        $crate::alloc::track::tracked(::core::file!(), ::core::line!(), $value)
    };
}
