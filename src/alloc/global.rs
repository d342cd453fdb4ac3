use std::alloc::{GlobalAlloc, Layout, System};

use super::{busy::is_busy, registry::Registry};
use crate::util::assert::non_null;

/// The global allocation hooks: forwards everything to [`System`], and
/// reports every live block to [`Registry::instance()`].
///
/// ```no_run
/// #[global_allocator]
/// static GLOBAL: memleak::LeakTracker = memleak::LeakTracker;
///
/// fn main() {}
/// ```
///
/// Every block is recorded against this file, not against whoever asked for
/// it. Use [`track!`](crate::track) to pin a block on its real call site.
#[derive(Clone, Copy, Debug, Default)]
pub struct LeakTracker;

/// Report a fresh block. Allocations made from inside the registry itself are
/// left alone.
#[inline]
fn record(file: &'static str, line: u32, data: *mut u8) {
    if non_null(data) && !is_busy() {
        Registry::instance().alloc(file, line, data);
    }
}

#[inline]
fn forget(data: *mut u8) {
    if non_null(data) && !is_busy() {
        Registry::instance().release(data);
    }
}

unsafe impl GlobalAlloc for LeakTracker {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let data = unsafe { System.alloc(layout) };
        record(file!(), line!(), data);
        data
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let data = unsafe { System.alloc_zeroed(layout) };
        record(file!(), line!(), data);
        data
    }

    unsafe fn dealloc(&self, data: *mut u8, layout: Layout) {
        // Forget before freeing, so the address can't be handed out (and
        // recorded) again in between
        forget(data);
        unsafe { System.dealloc(data, layout) }
    }

    unsafe fn realloc(&self, data: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // Same as `dealloc()`: the old address may be reused the moment
        // `realloc()` lets go of it
        forget(data);
        let new_data = unsafe { System.realloc(data, layout, new_size) };
        if non_null(new_data) {
            record(file!(), line!(), new_data);
        } else {
            // On failure the old block is untouched and still live
            record(file!(), line!(), data);
        }
        new_data
    }
}
