//! Reference-count cells for [`SharedPtr`](super::SharedPtr).

use crate::sync::{fence, AtomicUsize, Ordering};
use core::cell::Cell;
use std::process;

/// A strong count kept in its own allocation next to the shared object.
///
/// # Safety
///
/// `decrement` must return the count left after this call's own decrement. The handle
/// destroys the object exactly when that value is zero, so an implementation that reports
/// zero twice, or reads the count in a separate step, causes a double free.
pub unsafe trait RefCount {
    /// A count of one.
    fn one() -> Self;

    /// Adds one holder.
    fn increment(&self);

    /// Drops one holder and returns how many remain.
    fn decrement(&self) -> usize;

    /// Current count. Only a snapshot under concurrency.
    fn get(&self) -> usize;
}

/// Plain counter for handles that never leave their thread.
#[derive(Debug)]
pub struct LocalCount(Cell<usize>);

// SAFETY: single-threaded; the returned value is the stored value.
unsafe impl RefCount for LocalCount {
    #[inline]
    fn one() -> Self {
        Self(Cell::new(1))
    }

    #[inline]
    fn increment(&self) {
        let n = self.0.get();
        if n == usize::MAX {
            process::abort();
        }
        self.0.set(n + 1);
    }

    #[inline]
    fn decrement(&self) -> usize {
        let n = self.0.get() - 1;
        self.0.set(n);
        n
    }

    #[inline]
    fn get(&self) -> usize {
        self.0.get()
    }
}

// Leaves headroom so racing increments past the check cannot wrap.
const MAX_ATOMIC_COUNT: usize = isize::MAX as usize;

/// Atomic counter for handles shared between threads.
#[derive(Debug)]
pub struct AtomicCount(AtomicUsize);

// SAFETY: the result of `decrement` comes from the same `fetch_sub` that performed it.
unsafe impl RefCount for AtomicCount {
    #[inline]
    fn one() -> Self {
        Self(AtomicUsize::new(1))
    }

    #[inline]
    fn increment(&self) {
        // A new holder can only come from an existing one, so no ordering is needed here.
        let old = self.0.fetch_add(1, Ordering::Relaxed);
        if old > MAX_ATOMIC_COUNT {
            process::abort();
        }
    }

    #[inline]
    fn decrement(&self) -> usize {
        let old = self.0.fetch_sub(1, Ordering::Release);
        if old == 1 {
            // Synchronize with every earlier release before the object is destroyed.
            fence(Ordering::Acquire);
        }
        old - 1
    }

    #[inline]
    fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}
