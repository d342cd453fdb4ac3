//! Call-site forwarding for [`track!`](crate::track).
//!
//! The hook can only ever name itself as the origin of an allocation. These
//! helpers let a caller claim an already recorded block, so its leak line
//! shows the caller's `file!()`/`line!()` instead.

use std::mem;

use super::registry::Registry;

/// Something that owns a heap block the global allocator handed out.
pub trait Tracked {
    /// Start of the heap block, or `None` if there isn't one (an empty `Vec`,
    /// a zero-sized `Box`, ...)
    fn heap_address(&self) -> Option<*const u8>;
}

impl<T> Tracked for Box<T> {
    fn heap_address(&self) -> Option<*const u8> {
        (mem::size_of::<T>() != 0).then(|| &**self as *const T as *const u8)
    }
}

impl<T> Tracked for Vec<T> {
    fn heap_address(&self) -> Option<*const u8> {
        (self.capacity() != 0 && mem::size_of::<T>() != 0).then(|| self.as_ptr() as *const u8)
    }
}

impl Tracked for String {
    fn heap_address(&self) -> Option<*const u8> {
        (self.capacity() != 0).then(|| self.as_ptr())
    }
}

impl<T> Tracked for *const T {
    fn heap_address(&self) -> Option<*const u8> {
        (!self.is_null()).then_some(*self as *const u8)
    }
}

impl<T> Tracked for *mut T {
    fn heap_address(&self) -> Option<*const u8> {
        (!self.is_null()).then_some(*self as *const u8)
    }
}

/// What [`track!`](crate::track) expands to. Re-attributes the block behind
/// `value` to `file:line` in the process-wide registry; blocks the registry
/// never saw are left alone.
pub fn tracked<T>(file: &'static str, line: u32, value: T) -> T
where
    T: Tracked,
{
    if let Some(address) = value.heap_address() {
        Registry::instance().retag(file, line, address);
    }
    value
}
