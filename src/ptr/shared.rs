//! Reference-counted shared ownership.

use super::count::{AtomicCount, LocalCount, RefCount};
use crate::alloc::{Resource, SystemResource};
use crate::error::Result;
use crate::trace::trace_event;
use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::NonNull;

struct Shared<T, C> {
    value: NonNull<T>,
    count: NonNull<C>,
}

impl<T, C> Clone for Shared<T, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, C> Copy for Shared<T, C> {}

/// Shared ownership of one `T`, with the count kept in a separate cell.
///
/// The object is placed by `A` and the count cell by `CA`. The last handle to go away
/// destroys both, each through its own resource. With [`LocalCount`] the handle stays on
/// its thread; [`ConcurrentPtr`] uses [`AtomicCount`] and may be cloned and dropped from
/// any thread.
///
/// A null handle owns nothing: cloning it yields another null handle and dropping it is a
/// no-op.
pub struct SharedPtr<
    T,
    C: RefCount = LocalCount,
    A: Resource<T> = SystemResource,
    CA: Resource<C> = SystemResource,
> {
    inner: Option<Shared<T, C>>,
    alloc: A,
    count_alloc: CA,
    _owns: PhantomData<(T, C)>,
}

/// A [`SharedPtr`] with an atomic count, shareable across threads.
pub type ConcurrentPtr<T> = SharedPtr<T, AtomicCount>;

// SAFETY: the count is atomic, so handles on different threads agree on who destroys the
// object. The object itself is reachable from several threads at once, hence `T: Sync`.
unsafe impl<T, A, CA> Send for SharedPtr<T, AtomicCount, A, CA>
where
    T: Send + Sync,
    A: Resource<T> + Send,
    CA: Resource<AtomicCount> + Send,
{
}

// SAFETY: `&SharedPtr` permits cloning, which only touches the atomic count.
unsafe impl<T, A, CA> Sync for SharedPtr<T, AtomicCount, A, CA>
where
    T: Send + Sync,
    A: Resource<T> + Send + Sync,
    CA: Resource<AtomicCount> + Send + Sync,
{
}

impl<T, C: RefCount> SharedPtr<T, C> {
    /// Moves `value` to the platform heap with a fresh count of one.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`](crate::Error::AllocationFailure) if either allocation
    /// fails. Nothing is leaked.
    pub fn new(value: T) -> Result<Self> {
        Self::new_in(value, SystemResource, SystemResource)
    }

    /// A heap-backed handle that owns nothing.
    #[must_use]
    pub fn null() -> Self {
        Self::null_in(SystemResource, SystemResource)
    }
}

impl<T, C: RefCount, A: Resource<T>, CA: Resource<C>> SharedPtr<T, C, A, CA> {
    /// Places `value` through `alloc` and its count cell through `count_alloc`.
    ///
    /// # Errors
    /// The first allocation error. If the count cell cannot be placed, the object is
    /// destroyed again before returning.
    pub fn new_in(value: T, alloc: A, count_alloc: CA) -> Result<Self> {
        let value = alloc.allocate(value)?;
        let count = match count_alloc.allocate(C::one()) {
            Ok(count) => count,
            Err(err) => {
                trace_event!(WARN, error = %err, "count cell allocation failed");
                // SAFETY: just allocated and never shared.
                unsafe { alloc.deallocate(value) };
                return Err(err);
            }
        };
        Ok(Self {
            inner: Some(Shared { value, count }),
            alloc,
            count_alloc,
            _owns: PhantomData,
        })
    }

    /// A handle that owns nothing.
    pub fn null_in(alloc: A, count_alloc: CA) -> Self {
        Self {
            inner: None,
            alloc,
            count_alloc,
            _owns: PhantomData,
        }
    }

    /// Whether the handle owns nothing.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Number of handles sharing the object; zero for a null handle.
    #[inline]
    pub fn use_count(&self) -> usize {
        // SAFETY: the count cell lives as long as any handle holding it.
        self.inner.map_or(0, |s| unsafe { s.count.as_ref() }.get())
    }

    /// The shared value, if any.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: the object outlives every handle that holds it.
        self.inner.map(|s| unsafe { &*s.value.as_ptr() })
    }

    /// Address of the shared object, if any.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.inner.map(|s| s.value)
    }

    /// Whether both handles point at the same object. Two null handles compare equal.
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.as_ptr() == other.as_ptr()
    }

    /// Drops this handle's share and leaves it null.
    ///
    /// Destroys the object when this was the last share. Resetting a null handle does
    /// nothing.
    pub fn reset(&mut self) {
        let Some(shared) = self.inner.take() else {
            return;
        };
        // SAFETY: we held a share, so both cells are live until the count says otherwise.
        unsafe {
            if shared.count.as_ref().decrement() == 0 {
                self.alloc.deallocate(shared.value);
                self.count_alloc.deallocate(shared.count);
            }
        }
    }

    /// Moves this handle's share into a new handle, leaving this one null. The count is
    /// unchanged.
    #[must_use]
    pub fn take(&mut self) -> Self
    where
        A: Clone,
        CA: Clone,
    {
        Self {
            inner: self.inner.take(),
            alloc: self.alloc.clone(),
            count_alloc: self.count_alloc.clone(),
            _owns: PhantomData,
        }
    }
}

impl<T, C, A, CA> Clone for SharedPtr<T, C, A, CA>
where
    C: RefCount,
    A: Resource<T> + Clone,
    CA: Resource<C> + Clone,
{
    fn clone(&self) -> Self {
        if let Some(shared) = self.inner {
            // SAFETY: our share keeps the count cell alive.
            unsafe { shared.count.as_ref() }.increment();
        }
        Self {
            inner: self.inner,
            alloc: self.alloc.clone(),
            count_alloc: self.count_alloc.clone(),
            _owns: PhantomData,
        }
    }
}

impl<T, C, A, CA> Drop for SharedPtr<T, C, A, CA>
where
    C: RefCount,
    A: Resource<T>,
    CA: Resource<C>,
{
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T, C, A, CA> Default for SharedPtr<T, C, A, CA>
where
    C: RefCount,
    A: Resource<T> + Default,
    CA: Resource<C> + Default,
{
    fn default() -> Self {
        Self::null_in(A::default(), CA::default())
    }
}

impl<T, C, A, CA> Deref for SharedPtr<T, C, A, CA>
where
    C: RefCount,
    A: Resource<T>,
    CA: Resource<C>,
{
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced a null SharedPtr"),
        }
    }
}

impl<T: PartialEq, C, A, CA> PartialEq for SharedPtr<T, C, A, CA>
where
    C: RefCount,
    A: Resource<T>,
    CA: Resource<C>,
{
    fn eq(&self, other: &Self) -> bool {
        match (self.get(), other.get()) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl<T: Eq, C, A, CA> Eq for SharedPtr<T, C, A, CA>
where
    C: RefCount,
    A: Resource<T>,
    CA: Resource<C>,
{
}

impl<T: fmt::Debug, C, A, CA> fmt::Debug for SharedPtr<T, C, A, CA>
where
    C: RefCount,
    A: Resource<T>,
    CA: Resource<C>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPtr")
            .field("value", &self.get())
            .field("use_count", &self.use_count())
            .finish()
    }
}

impl<T: fmt::Display, C, A, CA> fmt::Display for SharedPtr<T, C, A, CA>
where
    C: RefCount,
    A: Resource<T>,
    CA: Resource<C>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}
