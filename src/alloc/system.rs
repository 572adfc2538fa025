//! Resources backed by the platform allocator (`std::alloc`).

use super::resource::{array_layout, ArrayResource, Resource};
use crate::error::{Error, Result};
use crate::trace::trace_event;
use core::alloc::Layout;
use core::mem;
use core::ptr::{self, NonNull};
use std::alloc::{alloc, dealloc, realloc};

/// Single-object resource over the global allocator.
///
/// Types without drop glue skip the destructor call on release; everything else is
/// dropped in place before its storage is returned.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemResource;

/// Array resource over the global allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemArrayResource;

#[inline]
fn raw_alloc(layout: Layout) -> Result<NonNull<u8>> {
    if layout.size() == 0 {
        // Zero-sized requests never reach the allocator.
        // SAFETY: an alignment is never zero, and the address keeps it.
        return Ok(unsafe { NonNull::new_unchecked(layout.align() as *mut u8) });
    }

    // SAFETY: layout has a non-zero size.
    let ptr = unsafe { alloc(layout) };
    NonNull::new(ptr).ok_or_else(|| {
        trace_event!(WARN, size = layout.size(), align = layout.align(), "platform allocation failed");
        Error::alloc("platform allocator returned null")
    })
}

unsafe impl<T> Resource<T> for SystemResource {
    fn allocate(&self, value: T) -> Result<NonNull<T>> {
        let ptr = raw_alloc(Layout::new::<T>())?.cast::<T>();
        // SAFETY: freshly reserved storage for one T.
        unsafe { ptr.as_ptr().write(value) };
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>) {
        if mem::needs_drop::<T>() {
            ptr::drop_in_place(ptr.as_ptr());
        }
        <Self as Resource<T>>::deallocate_raw(self, ptr);
    }

    unsafe fn deallocate_raw(&self, ptr: NonNull<T>) {
        let layout = Layout::new::<T>();
        if layout.size() != 0 {
            dealloc(ptr.as_ptr().cast(), layout);
        }
    }
}

unsafe impl<T> ArrayResource<T> for SystemArrayResource {
    fn allocate(&self, n: usize) -> Result<NonNull<T>> {
        Ok(raw_alloc(array_layout::<T>(n)?)?.cast())
    }

    unsafe fn reallocate(&self, ptr: NonNull<T>, old_len: usize, new_len: usize) -> Result<NonNull<T>> {
        let old_layout = array_layout::<T>(old_len)?;
        let new_layout = match array_layout::<T>(new_len) {
            Ok(layout) => layout,
            Err(err) => {
                <Self as ArrayResource<T>>::deallocate(self, ptr, old_len);
                return Err(err);
            }
        };

        if old_layout.size() == 0 {
            return <Self as ArrayResource<T>>::allocate(self, new_len);
        }
        if new_layout.size() == 0 {
            <Self as ArrayResource<T>>::deallocate(self, ptr, old_len);
            return Ok(raw_alloc(new_layout)?.cast());
        }

        if !mem::needs_drop::<T>() {
            let resized = realloc(ptr.as_ptr().cast(), old_layout, new_layout.size());
            if let Some(resized) = NonNull::new(resized) {
                return Ok(resized.cast());
            }
            // `realloc` leaves the old block untouched on failure; try a fresh block below.
        }

        // Moves are bitwise, so relocating the slots is a plain copy and the originals are
        // simply forgotten.
        let fresh = match raw_alloc(new_layout) {
            Ok(fresh) => fresh.cast::<T>(),
            Err(err) => {
                <Self as ArrayResource<T>>::deallocate(self, ptr, old_len);
                return Err(err);
            }
        };
        ptr::copy_nonoverlapping(ptr.as_ptr(), fresh.as_ptr(), old_len.min(new_len));
        <Self as ArrayResource<T>>::deallocate(self, ptr, old_len);
        Ok(fresh)
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>, len: usize) {
        if let Ok(layout) = Layout::array::<T>(len) {
            if layout.size() != 0 {
                dealloc(ptr.as_ptr().cast(), layout);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct DropFlag(Rc<Cell<usize>>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_system_resource_roundtrip() {
        let ptr = SystemResource.allocate(0xdead_beef_u64).unwrap();
        unsafe {
            assert_eq!(*ptr.as_ptr(), 0xdead_beef);
            SystemResource.deallocate(ptr);
        }
    }

    #[test]
    fn test_system_resource_runs_destructor() {
        let drops = Rc::new(Cell::new(0));
        let ptr = SystemResource.allocate(DropFlag(drops.clone())).unwrap();
        unsafe { SystemResource.deallocate(ptr) };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_deallocate_raw_skips_destructor() {
        let drops = Rc::new(Cell::new(0));
        let ptr = SystemResource.allocate(DropFlag(drops.clone())).unwrap();
        let value = unsafe { ptr::read(ptr.as_ptr()) };
        unsafe { SystemResource.deallocate_raw(ptr) };
        assert_eq!(drops.get(), 0);
        drop(value);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_zero_sized_allocation() {
        let ptr = SystemResource.allocate(()).unwrap();
        unsafe { SystemResource.deallocate(ptr) };

        let arr: NonNull<u32> = SystemArrayResource.allocate(0).unwrap();
        unsafe { SystemArrayResource.deallocate(arr, 0) };
    }

    #[test]
    fn test_array_reallocate_trivial_preserves_prefix() {
        unsafe {
            let ptr: NonNull<u32> = SystemArrayResource.allocate(4).unwrap();
            for i in 0..4 {
                ptr.as_ptr().add(i).write(i as u32 * 10);
            }
            let grown = SystemArrayResource.reallocate(ptr, 4, 64).unwrap();
            for i in 0..4 {
                assert_eq!(*grown.as_ptr().add(i), i as u32 * 10);
            }
            let shrunk = SystemArrayResource.reallocate(grown, 64, 2).unwrap();
            assert_eq!(*shrunk.as_ptr().add(1), 10);
            SystemArrayResource.deallocate(shrunk, 2);
        }
    }

    #[test]
    fn test_array_reallocate_moves_non_trivial() {
        unsafe {
            let ptr: NonNull<String> = SystemArrayResource.allocate(2).unwrap();
            ptr.as_ptr().write(String::from("left"));
            ptr.as_ptr().add(1).write(String::from("right"));

            let grown = SystemArrayResource.reallocate(ptr, 2, 16).unwrap();
            assert_eq!(&*grown.as_ptr(), "left");
            assert_eq!(&*grown.as_ptr().add(1), "right");

            ptr::drop_in_place(core::ptr::slice_from_raw_parts_mut(grown.as_ptr(), 2));
            SystemArrayResource.deallocate(grown, 16);
        }
    }

    #[test]
    fn test_array_allocate_overflow() {
        let err = ArrayResource::<u64>::allocate(&SystemArrayResource, usize::MAX).unwrap_err();
        assert!(err.is_alloc_failure());
    }
}
