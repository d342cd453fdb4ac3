use std::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    ops::Deref,
    sync::{
        atomic::{AtomicU8, Ordering},
        Mutex, PoisonError,
    },
};

use crate::util::hint::cold;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LazyLockState {
    /// Signifies this lock is uninitialized
    Uninit,
    /// Signifies this lock is initialized
    Init,
    /// Signifies this lock is mid initialization. This is only really useful
    /// when checking the state inside the initializer...
    Initializing,
}

impl LazyLockState {
    fn from_u8(state: u8) -> Self {
        match state {
            0 => Self::Uninit,
            1 => Self::Init,
            _ => Self::Initializing,
        }
    }
}

/// A LazyLock that let's you poll its initialization state (including
/// mid-init) without kicking off the initializer. Unlike `std`'s, it never
/// allocates, so it can sit behind a global allocator.
pub struct LazyLock<T, F = fn() -> T> {
    cell: UnsafeCell<MaybeUninit<T>>,
    lock: Mutex<()>,
    state: AtomicU8,
    init: F,
}

// SAFETY: The value is written exactly once, under `lock`, before `state`
//         becomes `Init` (release), and only read after observing `Init`
//         (acquire).
unsafe impl<T, F> Sync for LazyLock<T, F>
where
    T: Send + Sync,
    F: Sync,
{
}

impl<T, F> LazyLock<T, F>
where
    F: Fn() -> T,
{
    pub const fn new(init: F) -> Self {
        Self {
            cell: UnsafeCell::new(MaybeUninit::uninit()),
            lock: Mutex::new(()),
            state: AtomicU8::new(LazyLockState::Uninit as u8),
            init,
        }
    }

    pub fn state(lock: &Self) -> LazyLockState {
        LazyLockState::from_u8(lock.state.load(Ordering::Acquire))
    }

    /// The value, if somebody already initialized it
    pub fn get(lock: &Self) -> Option<&T> {
        match LazyLock::state(lock) {
            // SAFETY: `Init` is only published after the write
            LazyLockState::Init => Some(unsafe { lock.assume_init() }),
            _ => None,
        }
    }

    /// # Safety
    ///
    /// The state must be [`LazyLockState::Init`]
    pub unsafe fn assume_init(&self) -> &T {
        // This borrow is not needless
        #[allow(clippy::needless_borrow)]
        (&*self.cell.get()).assume_init_ref()
    }

    pub fn initialize(&self) -> &T {
        if LazyLock::state(self) != LazyLockState::Init {
            cold(|| {
                let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
                // Somebody else may have won the race while we waited
                if LazyLock::state(self) == LazyLockState::Init {
                    return;
                }
                self.state
                    .store(LazyLockState::Initializing as u8, Ordering::Relaxed);
                // SAFETY: We hold `lock` and the state is not `Init`, so
                //         nobody can be reading the cell.
                unsafe { *self.cell.get() = MaybeUninit::new((self.init)()) };
                self.state
                    .store(LazyLockState::Init as u8, Ordering::Release);
            })
        }
        // SAFETY: Either we saw `Init`, or we just got through the
        //         initializer (which stores `Init` before leaving).
        unsafe { self.assume_init() }
    }
}

impl<T, F> Deref for LazyLock<T, F>
where
    F: Fn() -> T,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.initialize()
    }
}
