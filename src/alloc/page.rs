//! Fixed-capacity pages of arena slots.

use super::resource::ArrayResource;
use crate::error::Result;
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop};
use core::ptr::{self, NonNull};

/// One slot of arena storage.
///
/// While occupied the slot holds a `T`; once freed the same bytes hold the link to the next
/// free slot. The value sits at offset zero, so a `*mut T` handed out by the arena and the
/// slot pointer are the same address.
#[repr(C)]
pub struct Slot<T> {
    data: SlotData<T>,
    live: bool,
}

#[repr(C)]
union SlotData<T> {
    value: ManuallyDrop<T>,
    next: Option<NonNull<Slot<T>>>,
}

impl<T> Slot<T> {
    /// Writes `value` into a reserved slot and marks it live.
    ///
    /// # Safety
    /// `slot` must be reserved storage that holds no live value.
    #[inline]
    pub(crate) unsafe fn fill(slot: NonNull<Self>, value: T) -> NonNull<T> {
        slot.as_ptr().write(Slot {
            data: SlotData {
                value: ManuallyDrop::new(value),
            },
            live: true,
        });
        slot.cast()
    }

    #[inline]
    pub(crate) fn from_value(ptr: NonNull<T>) -> NonNull<Self> {
        ptr.cast()
    }

    /// # Safety
    /// `slot` must point into an arena page.
    #[inline]
    pub(crate) unsafe fn mark_dead(slot: NonNull<Self>) {
        ptr::addr_of_mut!((*slot.as_ptr()).live).write(false);
    }

    /// Turns a dead slot into a free-list link.
    ///
    /// # Safety
    /// The value must already be dropped or moved out.
    #[inline]
    pub(crate) unsafe fn link(slot: NonNull<Self>, next: Option<NonNull<Self>>) {
        (*slot.as_ptr()).data.next = next;
    }

    /// # Safety
    /// `slot` must be on a free list.
    #[inline]
    pub(crate) unsafe fn next_free(slot: NonNull<Self>) -> Option<NonNull<Self>> {
        (*slot.as_ptr()).data.next
    }
}

/// A page holds `CAPACITY` slots and hands them out front to back.
///
/// The page is open while `offset < CAPACITY` and full afterwards; a full page never takes
/// another allocation and stays around until it is dropped. Dropping the page drops every
/// slot in `[0, offset)` that is still live when `DROP_LIVE` is set.
pub(crate) struct Page<T, const CAPACITY: usize, const DROP_LIVE: bool, A: ArrayResource<Slot<T>>> {
    buffer: NonNull<Slot<T>>,
    offset: usize,
    alloc: A,
    _owns: PhantomData<T>,
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A: ArrayResource<Slot<T>>>
    Page<T, CAPACITY, DROP_LIVE, A>
{
    pub(crate) fn new(alloc: A) -> Result<Self> {
        let buffer = alloc.allocate(CAPACITY)?;
        Ok(Self {
            buffer,
            offset: 0,
            alloc,
            _owns: PhantomData,
        })
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.offset >= CAPACITY
    }

    /// Reserves the next slot, or `None` once the page is full.
    #[inline]
    pub(crate) fn bump(&mut self) -> Option<NonNull<Slot<T>>> {
        if self.is_full() {
            return None;
        }
        // SAFETY: offset < CAPACITY, inside the buffer.
        let slot = unsafe { NonNull::new_unchecked(self.buffer.as_ptr().add(self.offset)) };
        // SAFETY: the slot is ours; a page teardown before `fill` must see it as dead.
        unsafe { Slot::mark_dead(slot) };
        self.offset += 1;
        Some(slot)
    }

    pub(crate) fn contains(&self, ptr: *const T) -> bool {
        let start = self.buffer.as_ptr() as usize;
        let end = start + self.offset * mem::size_of::<Slot<T>>();
        let addr = ptr as usize;
        addr >= start && addr < end
    }
}

impl<T, const CAPACITY: usize, const DROP_LIVE: bool, A: ArrayResource<Slot<T>>> Drop
    for Page<T, CAPACITY, DROP_LIVE, A>
{
    fn drop(&mut self) {
        if DROP_LIVE && mem::needs_drop::<T>() {
            for i in 0..self.offset {
                // SAFETY: every slot below offset was reserved and is either live or retired.
                unsafe {
                    let slot = self.buffer.as_ptr().add(i);
                    if (*slot).live {
                        ManuallyDrop::drop(&mut (*slot).data.value);
                    }
                }
            }
        }
        // SAFETY: the buffer came from this resource with CAPACITY slots.
        unsafe { self.alloc.deallocate(self.buffer, CAPACITY) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::SystemArrayResource;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counted(Rc<Cell<usize>>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_page_fills_then_reports_full() {
        let mut page: Page<u32, 2, true, _> = Page::new(SystemArrayResource).unwrap();
        assert!(!page.is_full());
        let a = page.bump().unwrap();
        let b = page.bump().unwrap();
        assert!(page.is_full());
        assert!(page.bump().is_none());
        unsafe {
            let a = Slot::fill(a, 1);
            let b = Slot::fill(b, 2);
            assert_eq!(*a.as_ptr() + *b.as_ptr(), 3);
            assert!(page.contains(a.as_ptr()));
        }
    }

    #[test]
    fn test_page_drops_only_live_slots() {
        let drops = Rc::new(Cell::new(0));
        {
            let mut page: Page<Counted, 4, true, _> = Page::new(SystemArrayResource).unwrap();
            let first = unsafe { Slot::fill(page.bump().unwrap(), Counted(drops.clone())) };
            unsafe { Slot::fill(page.bump().unwrap(), Counted(drops.clone())) };

            // Retire the first slot by hand, as the arena does.
            unsafe {
                let slot = Slot::from_value(first);
                Slot::mark_dead(slot);
                ptr::drop_in_place(first.as_ptr());
                Slot::link(slot, None);
            }
            assert_eq!(drops.get(), 1);
        }
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn test_page_without_drop_live_leaks_values() {
        let drops = Rc::new(Cell::new(0));
        {
            let mut page: Page<Counted, 2, false, _> = Page::new(SystemArrayResource).unwrap();
            unsafe { Slot::fill(page.bump().unwrap(), Counted(drops.clone())) };
        }
        assert_eq!(drops.get(), 0);
        // One strong count leaked inside the released page.
        assert_eq!(Rc::strong_count(&drops), 2);
    }
}
