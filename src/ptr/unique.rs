//! Exclusive ownership of a resource-allocated object.

use crate::alloc::{Resource, SystemResource};
use crate::error::Result;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

/// Owns one `T` placed by the resource `A`, or nothing.
///
/// Dropping the handle destroys the value through the same resource. The null state is a
/// regular state: it is what [`take`](Self::take) and [`release`](Self::release) leave
/// behind, and dropping it does nothing.
pub struct UniquePtr<T, A: Resource<T> = SystemResource> {
    ptr: Option<NonNull<T>>,
    alloc: A,
    _owns: PhantomData<T>,
}

// SAFETY: the handle owns its `T` outright, like `Box<T>`.
unsafe impl<T: Send, A: Resource<T> + Send> Send for UniquePtr<T, A> {}
// SAFETY: shared access only ever yields `&T`.
unsafe impl<T: Sync, A: Resource<T> + Sync> Sync for UniquePtr<T, A> {}

impl<T> UniquePtr<T> {
    /// Moves `value` to the platform heap.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`](crate::Error::AllocationFailure) if the allocator fails.
    pub fn new(value: T) -> Result<Self> {
        Self::new_in(value, SystemResource)
    }

    /// A handle that owns nothing.
    #[must_use]
    pub fn null() -> Self {
        Self::null_in(SystemResource)
    }
}

impl<T, A: Resource<T>> UniquePtr<T, A> {
    /// Moves `value` into storage from `alloc`.
    ///
    /// # Errors
    /// Whatever `alloc` reports; `value` is dropped.
    pub fn new_in(value: T, alloc: A) -> Result<Self> {
        let ptr = alloc.allocate(value)?;
        Ok(Self {
            ptr: Some(ptr),
            alloc,
            _owns: PhantomData,
        })
    }

    /// A handle that owns nothing but will release through `alloc` once reset.
    pub fn null_in(alloc: A) -> Self {
        Self {
            ptr: None,
            alloc,
            _owns: PhantomData,
        }
    }

    /// Whether the handle owns nothing.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// The owned value, if any.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: a held pointer is live and exclusively ours.
        self.ptr.map(|p| unsafe { &*p.as_ptr() })
    }

    /// Mutable access to the owned value, if any.
    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: as above, and `&mut self` makes the borrow unique.
        self.ptr.map(|p| unsafe { &mut *p.as_ptr() })
    }

    /// The held pointer without giving up ownership.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// The resource this handle releases through.
    #[inline]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Gives up ownership without destroying anything. The handle becomes null.
    ///
    /// The caller is now responsible for releasing the pointer through a matching resource.
    #[must_use = "the released pointer leaks unless it is deallocated"]
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.ptr.take()
    }

    /// Destroys the held object, if any, and takes ownership of `ptr`.
    ///
    /// # Safety
    /// `ptr` must be null or come from `allocate` on this handle's resource, and nothing
    /// else may own it.
    pub unsafe fn reset(&mut self, ptr: Option<NonNull<T>>) {
        let old = core::mem::replace(&mut self.ptr, ptr);
        if let Some(old) = old {
            self.alloc.deallocate(old);
        }
    }

    /// Moves ownership into a new handle, leaving this one null.
    #[must_use]
    pub fn take(&mut self) -> Self
    where
        A: Clone,
    {
        Self {
            ptr: self.ptr.take(),
            alloc: self.alloc.clone(),
            _owns: PhantomData,
        }
    }

    /// Moves the value out and frees its storage. `None` for a null handle.
    pub fn into_inner(mut self) -> Option<T> {
        let ptr = self.ptr.take()?;
        // SAFETY: the pointer is live and ours; after the read only the storage remains.
        unsafe {
            let value = ptr.as_ptr().read();
            self.alloc.deallocate_raw(ptr);
            Some(value)
        }
    }
}

#[cold]
#[track_caller]
fn null_deref() -> ! {
    panic!("dereferenced a null UniquePtr")
}

impl<T, A: Resource<T>> Deref for UniquePtr<T, A> {
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => null_deref(),
        }
    }
}

impl<T, A: Resource<T>> DerefMut for UniquePtr<T, A> {
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        match self.get_mut() {
            Some(value) => value,
            None => null_deref(),
        }
    }
}

impl<T, A: Resource<T> + Default> Default for UniquePtr<T, A> {
    fn default() -> Self {
        Self::null_in(A::default())
    }
}

impl<T, A: Resource<T>> Drop for UniquePtr<T, A> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: the handle owned the pointer and came from this resource.
            unsafe { self.alloc.deallocate(ptr) };
        }
    }
}

impl<T: fmt::Debug, A: Resource<T>> fmt::Debug for UniquePtr<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UniquePtr").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_leaves_null() {
        let mut a = UniquePtr::new(String::from("owned")).unwrap();
        let b = a.take();
        assert!(a.is_null());
        assert_eq!(b.as_str(), "owned");
    }

    #[test]
    fn test_into_inner() {
        let p = UniquePtr::new(vec![1, 2, 3]).unwrap();
        assert_eq!(p.into_inner(), Some(vec![1, 2, 3]));
        assert_eq!(UniquePtr::<u8>::null().into_inner(), None);
    }

    #[test]
    #[should_panic(expected = "null UniquePtr")]
    fn test_null_deref_panics() {
        let p: UniquePtr<u32> = UniquePtr::default();
        let _ = *p;
    }
}
