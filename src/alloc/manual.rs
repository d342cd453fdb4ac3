use std::{
    alloc::{handle_alloc_error, Layout},
    mem,
    ptr::{self, NonNull},
};

use crate::util::assert::aligned_to;

/// The raw allocate/release capability that bookkeeping memory comes from.
///
/// This must *never* route through the global allocator, otherwise the ledger
/// would end up recording its own nodes (and recursing into the hook that
/// called it).
///
/// # Safety
///
/// - `allocate()` must return either null or a block of at least `size` bytes
///   aligned for any fundamental type (what `malloc()` promises)
/// - `release()` must accept every non-null pointer returned by `allocate()`
pub unsafe trait RawAlloc {
    fn allocate(&self, size: usize) -> *mut u8;

    /// # Safety
    ///
    /// `data` must have come from `allocate()` on this allocator and must not
    /// be used afterwards.
    unsafe fn release(&self, data: *mut u8);
}

/// libc `malloc()`/`free()`, straight from the C runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct Malloc;

// SAFETY: `malloc()` guarantees alignment suitable for any fundamental type,
//         and `free()` accepts anything `malloc()` handed out.
unsafe impl RawAlloc for Malloc {
    fn allocate(&self, size: usize) -> *mut u8 {
        // SAFETY: `malloc()` has no preconditions
        unsafe { libc::malloc(size as libc::size_t) as *mut u8 }
    }

    unsafe fn release(&self, data: *mut u8) {
        unsafe { libc::free(data as *mut libc::c_void) }
    }
}

// SAFETY: Forwards to `A`, which upholds the contract
unsafe impl<A> RawAlloc for &A
where
    A: RawAlloc + ?Sized,
{
    fn allocate(&self, size: usize) -> *mut u8 {
        (**self).allocate(size)
    }

    unsafe fn release(&self, data: *mut u8) {
        unsafe { (**self).release(data) }
    }
}

/// An initialized, owning pointer to a `T`, that has no RAII -- you must free
/// it yourself, using [`xfree()`], with the same allocator it came from.
pub struct Raw<T> {
    data: NonNull<T>,
}

impl<T> Raw<T> {
    /// # Safety
    ///
    /// - You must create an owning pointer here. Many of [`Raw`]'s methods'
    ///   soundness rely on the fact that it is unique.
    /// - The pointer must be initialized
    pub unsafe fn new(data: NonNull<T>) -> Self {
        Self { data }
    }

    pub const fn as_ptr(&self) -> *mut T {
        self.data.as_ptr()
    }

    /// Give up ownership, leaving the caller responsible for the block
    pub fn into_raw(self) -> NonNull<T> {
        self.data
    }
}

/// Allocate and initialize a `T` from `alloc`. Running out of memory here
/// goes to [`handle_alloc_error()`], which does not return.
pub fn xalloc<T, A>(alloc: &A, val: T) -> Raw<T>
where
    A: RawAlloc + ?Sized,
{
    let layout = Layout::new::<T>();
    let data = alloc.allocate(layout.size());
    let Some(data) = NonNull::new(data as *mut T) else {
        handle_alloc_error(layout);
    };
    debug_assert!(aligned_to(data.as_ptr(), mem::align_of::<T>()));
    // SAFETY:
    //   - `data` is the only pointer to this location
    //   - `RawAlloc` promises at least `size_of::<T>()` bytes, suitably aligned
    unsafe {
        ptr::write(data.as_ptr(), val);
    }
    // SAFETY:
    //   - `data` is unique
    //   - `data` is init
    unsafe { Raw::new(data) }
}

/// Drop the `T` behind `data` and hand its block back to `alloc`.
///
/// # Safety
///
/// `data` must have been allocated by `alloc` (see [`xalloc()`]).
pub unsafe fn xfree<T, A>(alloc: &A, data: Raw<T>)
where
    A: RawAlloc + ?Sized,
{
    let data = data.as_ptr();
    // SAFETY:
    //   - Pointer is unique and init, so dropping in place is fine
    //   - Caller asserts the block belongs to `alloc`
    unsafe {
        ptr::drop_in_place(data);
        alloc.release(data as *mut u8);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{Malloc, RawAlloc};

    /// `Malloc`, but counting how many blocks are currently out
    #[derive(Default)]
    pub struct CountingMalloc {
        live: AtomicUsize,
        total: AtomicUsize,
    }

    impl CountingMalloc {
        pub fn live(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }

        pub fn total(&self) -> usize {
            self.total.load(Ordering::SeqCst)
        }
    }

    unsafe impl RawAlloc for CountingMalloc {
        fn allocate(&self, size: usize) -> *mut u8 {
            self.live.fetch_add(1, Ordering::SeqCst);
            self.total.fetch_add(1, Ordering::SeqCst);
            Malloc.allocate(size)
        }

        unsafe fn release(&self, data: *mut u8) {
            self.live.fetch_sub(1, Ordering::SeqCst);
            unsafe { Malloc.release(data) }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{testing::CountingMalloc, xalloc, xfree, Malloc};

    #[test]
    fn xalloc_writes_the_value_and_xfree_hands_the_block_back() {
        let alloc = CountingMalloc::default();
        let data = xalloc(&alloc, [7u64; 4]);
        assert_eq!(unsafe { *data.as_ptr() }, [7u64; 4]);
        assert_eq!(alloc.live(), 1);
        unsafe { xfree(&alloc, data) };
        assert_eq!(alloc.live(), 0);
    }

    #[test]
    fn xfree_drops_the_value_in_place() {
        let shared = Rc::new(());
        let data = xalloc(&Malloc, Rc::clone(&shared));
        assert_eq!(Rc::strong_count(&shared), 2);
        unsafe { xfree(&Malloc, data) };
        assert_eq!(Rc::strong_count(&shared), 1);
    }
}
