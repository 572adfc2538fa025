//! Resources that place single objects in a [`LazyAllocator`].

use super::lazy::LazyAllocator;
use super::page::Slot;
use super::resource::{ArrayResource, Resource};
use super::system::SystemArrayResource;
use crate::error::Result;
use core::fmt;
use core::ptr::{self, NonNull};
use parking_lot::Mutex;

/// Routes single-object allocations into a borrowed arena.
///
/// Copies of the resource share the arena, so a handle can be deallocated through any copy.
/// Not `Sync`: the arena itself is single-threaded.
pub struct MonotonicResource<
    'a,
    T,
    const CAPACITY: usize = 256,
    const DROP_LIVE: bool = true,
    A: ArrayResource<Slot<T>> + Clone = SystemArrayResource,
> {
    arena: &'a LazyAllocator<T, CAPACITY, DROP_LIVE, A>,
}

impl<'a, T, const CAPACITY: usize, const DROP_LIVE: bool, A> MonotonicResource<'a, T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    /// Wraps a borrowed arena.
    #[inline]
    pub const fn new(arena: &'a LazyAllocator<T, CAPACITY, DROP_LIVE, A>) -> Self {
        Self { arena }
    }

    /// The arena behind this resource.
    #[inline]
    pub const fn arena(&self) -> &'a LazyAllocator<T, CAPACITY, DROP_LIVE, A> {
        self.arena
    }
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> Clone for MonotonicResource<'_, T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> Copy for MonotonicResource<'_, T, CAPACITY, DROP_LIVE, A> where
    A: ArrayResource<Slot<T>> + Clone
{
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> fmt::Debug for MonotonicResource<'_, T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MonotonicResource").field(self.arena).finish()
    }
}

// SAFETY: arena slots are aligned for `T` and initialized with the allocated value.
unsafe impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> Resource<T> for MonotonicResource<'_, T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    #[inline]
    fn allocate(&self, value: T) -> Result<NonNull<T>> {
        self.arena.alloc(value)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<T>) {
        let result = self.arena.dealloc(ptr);
        debug_assert!(result.is_ok(), "arena rejected a handle it issued: {result:?}");
    }

    #[inline]
    unsafe fn deallocate_raw(&self, ptr: NonNull<T>) {
        let result = self.arena.dealloc_raw(ptr);
        debug_assert!(result.is_ok(), "arena rejected a handle it issued: {result:?}");
    }
}

/// Routes single-object allocations into an arena shared between threads.
///
/// Every arena operation runs under the mutex. Destructors run outside it, so a value whose
/// drop releases other objects from the same arena does not deadlock.
pub struct ConcurrentMonotonicResource<
    'a,
    T,
    const CAPACITY: usize = 256,
    const DROP_LIVE: bool = true,
    A: ArrayResource<Slot<T>> + Clone = SystemArrayResource,
> {
    arena: &'a Mutex<LazyAllocator<T, CAPACITY, DROP_LIVE, A>>,
}

impl<'a, T, const CAPACITY: usize, const DROP_LIVE: bool, A> ConcurrentMonotonicResource<'a, T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    /// Wraps a borrowed, mutex-guarded arena.
    #[inline]
    pub const fn new(arena: &'a Mutex<LazyAllocator<T, CAPACITY, DROP_LIVE, A>>) -> Self {
        Self { arena }
    }

    /// The guarded arena behind this resource.
    #[inline]
    pub const fn arena(&self) -> &'a Mutex<LazyAllocator<T, CAPACITY, DROP_LIVE, A>> {
        self.arena
    }
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> Clone
    for ConcurrentMonotonicResource<'_, T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> Copy
    for ConcurrentMonotonicResource<'_, T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> fmt::Debug
    for ConcurrentMonotonicResource<'_, T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.arena.try_lock() {
            Some(arena) => f
                .debug_tuple("ConcurrentMonotonicResource")
                .field(&arena.stats())
                .finish(),
            None => f.write_str("ConcurrentMonotonicResource(<locked>)"),
        }
    }
}

/// Returns a slot to the guarded arena on drop, so a panicking destructor does not strand it.
struct ReleaseSlot<'r, 'a, T, const CAPACITY: usize, const DROP_LIVE: bool, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    resource: &'r ConcurrentMonotonicResource<'a, T, CAPACITY, DROP_LIVE, A>,
    ptr: NonNull<T>,
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> Drop for ReleaseSlot<'_, '_, T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    fn drop(&mut self) {
        // SAFETY: the value is dropped (or was dropped while unwinding) and the slot is ours.
        unsafe { self.resource.deallocate_raw(self.ptr) };
    }
}

// SAFETY: as for `MonotonicResource`; the mutex serializes all arena state changes.
unsafe impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> Resource<T>
    for ConcurrentMonotonicResource<'_, T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    fn allocate(&self, value: T) -> Result<NonNull<T>> {
        let result = self.arena.lock().alloc_or_return(value);
        result.map_err(|(err, value)| {
            drop(value);
            err
        })
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>) {
        let release = ReleaseSlot { resource: self, ptr };
        ptr::drop_in_place(ptr.as_ptr());
        drop(release);
    }

    unsafe fn deallocate_raw(&self, ptr: NonNull<T>) {
        let result = self.arena.lock().dealloc_raw(ptr);
        debug_assert!(result.is_ok(), "arena rejected a handle it issued: {result:?}");
    }
}
