//! Paged arena with free-slot recycling.

use super::page::{Page, Slot};
use super::resource::ArrayResource;
use super::system::SystemArrayResource;
use crate::collections::Vector;
use crate::error::{Error, Result};
use crate::trace::trace_event;
use core::cell::UnsafeCell;
use core::fmt;
use core::mem;
use core::ptr::{self, NonNull};
use serde::{Deserialize, Serialize};

/// Point-in-time counters of a [`LazyAllocator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaStats {
    /// Pages currently owned.
    pub pages: usize,
    /// Slots per page.
    pub slot_capacity: usize,
    /// Objects allocated and not yet returned.
    pub live: usize,
    /// Slots waiting on the free list.
    pub free_slots: usize,
    /// Slots ever reserved from pages since the last reset.
    pub high_water: usize,
}

struct ArenaState<T, const CAPACITY: usize, const DROP_LIVE: bool, A: ArrayResource<Slot<T>>> {
    pages: Vector<Page<T, CAPACITY, DROP_LIVE, A>>,
    free_head: Option<NonNull<Slot<T>>>,
    free_len: usize,
    live: usize,
    high_water: usize,
}

/// Puts a dead slot on the free list when dropped, including while unwinding out of a
/// panicking destructor.
struct Recycle<'a, T, const CAPACITY: usize, const DROP_LIVE: bool, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    arena: &'a LazyAllocator<T, CAPACITY, DROP_LIVE, A>,
    slot: NonNull<Slot<T>>,
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> Drop for Recycle<'_, T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    fn drop(&mut self) {
        // SAFETY: the slot is marked dead and its value has been dropped, even if that drop
        // panicked.
        unsafe { self.arena.push_free(self.slot) };
    }
}

/// A single-threaded arena of same-typed objects.
///
/// Storage is acquired one page of `CAPACITY` slots at a time from the page resource `A`,
/// and only when the first allocation needs it. Returned slots go to a free list and are
/// handed out again, most recently freed first, before any new page slot is touched.
///
/// Objects still live when the arena is dropped or [`reset`](Self::reset) are dropped with
/// it when `DROP_LIVE` is set, and leaked otherwise.
///
/// The page resource must not call back into the arena it serves. Destructors of `T` may:
/// they run with no internal borrow held.
pub struct LazyAllocator<
    T,
    const CAPACITY: usize = 256,
    const DROP_LIVE: bool = true,
    A: ArrayResource<Slot<T>> + Clone = SystemArrayResource,
> {
    state: UnsafeCell<ArenaState<T, CAPACITY, DROP_LIVE, A>>,
    alloc: A,
}

// SAFETY: the arena owns its `T`s and page storage; moving it moves both.
unsafe impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> Send
    for LazyAllocator<T, CAPACITY, DROP_LIVE, A>
where
    T: Send,
    A: ArrayResource<Slot<T>> + Clone + Send,
{
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool> LazyAllocator<T, CAPACITY, DROP_LIVE> {
    /// Creates an empty arena backed by the platform allocator. No memory is acquired yet.
    #[must_use]
    pub fn new() -> Self {
        Self::new_in(SystemArrayResource)
    }
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool> Default
    for LazyAllocator<T, CAPACITY, DROP_LIVE>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> LazyAllocator<T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    const NON_EMPTY_PAGE: () = assert!(CAPACITY > 0, "arena page capacity must be non-zero");

    /// Creates an empty arena whose pages come from `alloc`.
    pub fn new_in(alloc: A) -> Self {
        let () = Self::NON_EMPTY_PAGE;
        Self {
            state: UnsafeCell::new(ArenaState {
                pages: Vector::new(),
                free_head: None,
                free_len: 0,
                live: 0,
                high_water: 0,
            }),
            alloc,
        }
    }

    /// # Safety
    /// The returned borrow must end before any user code runs.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    unsafe fn state_mut(&self) -> &mut ArenaState<T, CAPACITY, DROP_LIVE, A> {
        &mut *self.state.get()
    }

    #[inline]
    fn state(&self) -> &ArenaState<T, CAPACITY, DROP_LIVE, A> {
        // SAFETY: no `&mut` to the state escapes the methods that create one.
        unsafe { &*self.state.get() }
    }

    /// Stores `value` in the arena and returns its address.
    ///
    /// Reuses the most recently freed slot when there is one, otherwise takes the next slot
    /// of the open page, acquiring a new page if the last one is full.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`] when a new page cannot be acquired. `value` is dropped.
    pub fn alloc(&self, value: T) -> Result<NonNull<T>> {
        self.alloc_or_return(value).map_err(|(err, _value)| err)
    }

    /// Like [`alloc`](Self::alloc), but hands `value` back on failure so the caller decides
    /// where it is dropped.
    pub(crate) fn alloc_or_return(&self, value: T) -> core::result::Result<NonNull<T>, (Error, T)> {
        match self.reserve_slot() {
            // SAFETY: the slot was just reserved and holds no value.
            Ok(slot) => Ok(unsafe { Slot::fill(slot, value) }),
            Err(err) => Err((err, value)),
        }
    }

    fn reserve_slot(&self) -> Result<NonNull<Slot<T>>> {
        // SAFETY: the borrow ends before this function returns; only arena code runs under it.
        let state = unsafe { self.state_mut() };

        if let Some(slot) = state.free_head {
            // SAFETY: free-list entries are retired slots carrying a link.
            state.free_head = unsafe { Slot::next_free(slot) };
            state.free_len -= 1;
            state.live += 1;
            return Ok(slot);
        }

        if state.pages.back().map_or(true, Page::is_full) {
            let page = Page::new(self.alloc.clone())?;
            state.pages.push_back(page)?;
            trace_event!(
                DEBUG,
                pages = state.pages.len(),
                capacity = CAPACITY,
                "arena page acquired"
            );
        }

        let slot = state
            .pages
            .back_mut()
            .and_then(Page::bump)
            .ok_or_else(|| Error::alloc("arena page refused a slot"))?;
        state.live += 1;
        state.high_water += 1;
        Ok(slot)
    }

    /// Drops the object at `ptr` and puts its slot on the free list.
    ///
    /// # Errors
    /// [`Error::InvalidOperation`] if the arena has no live objects. Nothing is touched.
    ///
    /// # Safety
    /// `ptr` must have come from [`alloc`](Self::alloc) on this arena and must not have been
    /// returned since.
    pub unsafe fn dealloc(&self, ptr: NonNull<T>) -> Result<()> {
        self.check_live(ptr)?;
        let slot = Slot::from_value(ptr);
        Slot::mark_dead(slot);
        let recycle = Recycle { arena: self, slot };
        ptr::drop_in_place(ptr.as_ptr());
        drop(recycle);
        Ok(())
    }

    /// Puts the slot at `ptr` back on the free list without dropping its value.
    ///
    /// # Errors
    /// [`Error::InvalidOperation`] if the arena has no live objects.
    ///
    /// # Safety
    /// As for [`dealloc`](Self::dealloc); the value must already be dropped or moved out.
    pub unsafe fn dealloc_raw(&self, ptr: NonNull<T>) -> Result<()> {
        self.check_live(ptr)?;
        let slot = Slot::from_value(ptr);
        Slot::mark_dead(slot);
        self.push_free(slot);
        Ok(())
    }

    fn check_live(&self, ptr: NonNull<T>) -> Result<()> {
        if self.state().live == 0 {
            trace_event!(WARN, "dealloc on an arena with no live objects");
            return Err(Error::invalid("arena dealloc without a matching alloc"));
        }
        debug_assert!(self.owns(ptr), "pointer was not issued by this arena");
        Ok(())
    }

    unsafe fn push_free(&self, slot: NonNull<Slot<T>>) {
        let state = self.state_mut();
        Slot::link(slot, state.free_head);
        state.free_head = Some(slot);
        state.free_len += 1;
        state.live -= 1;
    }

    /// Whether `ptr` lies inside storage this arena has handed out.
    pub fn owns(&self, ptr: NonNull<T>) -> bool {
        self.state()
            .pages
            .iter()
            .any(|page| page.contains(ptr.as_ptr()))
    }

    /// Releases every page and forgets the free list.
    ///
    /// Live objects are dropped with their pages when `DROP_LIVE` is set. Every pointer the
    /// arena issued is dangling afterwards.
    pub fn reset(&mut self) {
        let state = self.state.get_mut();
        trace_event!(
            DEBUG,
            pages = state.pages.len(),
            live = state.live,
            "arena reset"
        );
        let pages = mem::take(&mut state.pages);
        state.free_head = None;
        state.free_len = 0;
        state.live = 0;
        state.high_water = 0;
        drop(pages);
    }

    /// Objects allocated and not yet returned.
    #[inline]
    pub fn live(&self) -> usize {
        self.state().live
    }

    /// Slots waiting on the free list.
    #[inline]
    pub fn free_slots(&self) -> usize {
        self.state().free_len
    }

    /// Pages currently owned.
    #[inline]
    pub fn page_count(&self) -> usize {
        self.state().pages.len()
    }

    /// Slots per page.
    #[inline]
    pub const fn slot_capacity(&self) -> usize {
        CAPACITY
    }

    /// Snapshot of the arena's counters.
    pub fn stats(&self) -> ArenaStats {
        let state = self.state();
        ArenaStats {
            pages: state.pages.len(),
            slot_capacity: CAPACITY,
            live: state.live,
            free_slots: state.free_len,
            high_water: state.high_water,
        }
    }
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A> fmt::Debug
    for LazyAllocator<T, CAPACITY, DROP_LIVE, A>
where
    A: ArrayResource<Slot<T>> + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyAllocator")
            .field("stats", &self.stats())
            .field("drop_live", &DROP_LIVE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_page_until_first_alloc() {
        let arena: LazyAllocator<u64, 4> = LazyAllocator::new();
        assert_eq!(arena.page_count(), 0);
        arena.alloc(1).unwrap();
        assert_eq!(arena.page_count(), 1);
    }

    #[test]
    fn test_free_list_is_lifo() {
        let arena: LazyAllocator<u64, 8> = LazyAllocator::new();
        let a = arena.alloc(1).unwrap();
        let b = arena.alloc(2).unwrap();
        unsafe {
            arena.dealloc(a).unwrap();
            arena.dealloc(b).unwrap();
        }
        assert_eq!(arena.free_slots(), 2);
        assert_eq!(arena.alloc(3).unwrap(), b);
        assert_eq!(arena.alloc(4).unwrap(), a);
        assert_eq!(arena.free_slots(), 0);
        assert_eq!(arena.stats().high_water, 2);
    }

    #[test]
    fn test_dealloc_with_nothing_live_is_rejected() {
        let arena: LazyAllocator<u64, 8> = LazyAllocator::new();
        let a = arena.alloc(1).unwrap();
        unsafe { arena.dealloc(a).unwrap() };
        let err = unsafe { arena.dealloc_raw(a) }.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert_eq!(arena.free_slots(), 1);
    }

    #[test]
    fn test_panicking_destructor_still_recycles_slot() {
        struct Bomb;

        impl Drop for Bomb {
            fn drop(&mut self) {
                panic!("bomb");
            }
        }

        let arena: LazyAllocator<Bomb, 4> = LazyAllocator::new();
        let p = arena.alloc(Bomb).unwrap();
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| unsafe {
            arena.dealloc(p)
        }));
        assert!(unwound.is_err());
        assert_eq!(arena.live(), 0);
        assert_eq!(arena.free_slots(), 1);

        let q = arena.alloc(Bomb).unwrap();
        assert_eq!(q, p);
        unsafe { arena.dealloc_raw(q).unwrap() };
        assert_eq!(arena.live(), 0);
    }

    #[test]
    fn test_reset_releases_pages() {
        let mut arena: LazyAllocator<String, 2> = LazyAllocator::new();
        for i in 0..5 {
            arena.alloc(i.to_string()).unwrap();
        }
        assert_eq!(arena.page_count(), 3);
        arena.reset();
        assert_eq!(arena.stats(), ArenaStats { slot_capacity: 2, ..ArenaStats::default() });
        let p = arena.alloc("again".to_owned()).unwrap();
        assert_eq!(unsafe { p.as_ref() }, "again");
    }
}
