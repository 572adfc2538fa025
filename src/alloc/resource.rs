use crate::error::{Error, Result};
use core::alloc::Layout;
use core::ptr::NonNull;

/// A single-object allocation policy.
///
/// Containers and ownership handles take a `Resource` as a type parameter and route every
/// allocation of a `T` through it. Stateless policies are zero-sized, so holding one costs
/// nothing and every call is statically dispatched.
///
/// # Safety
///
/// Implementors must return pointers that are valid for reads and writes of `T`, properly
/// aligned, and initialized with the value handed to [`allocate`](Resource::allocate).
/// Handles dereference these pointers without further checks.
pub unsafe trait Resource<T> {
    /// Moves `value` into freshly reserved storage and returns a pointer to it.
    ///
    /// # Errors
    /// Returns [`Error::AllocationFailure`] if storage cannot be obtained. The value is
    /// dropped in that case.
    fn allocate(&self, value: T) -> Result<NonNull<T>>;

    /// Drops the value behind `ptr` and releases its storage.
    ///
    /// # Safety
    /// `ptr` must have been returned by `allocate` on this resource (or a copy of it) and
    /// must not have been released yet.
    unsafe fn deallocate(&self, ptr: NonNull<T>);

    /// Releases the storage behind `ptr` without running the destructor of `T`.
    ///
    /// # Safety
    /// Same as [`deallocate`](Resource::deallocate). The value must already have been moved
    /// out or dropped by the caller.
    unsafe fn deallocate_raw(&self, ptr: NonNull<T>);
}

/// A contiguous-array allocation policy.
///
/// Storage handed out by an array resource is uninitialized; constructing and destroying
/// elements is the caller's job.
///
/// # Safety
///
/// `allocate(n)` must return storage valid for `n` properly aligned `T`s, and `reallocate`
/// must preserve the bytes of the first `min(old_len, new_len)` slots.
pub unsafe trait ArrayResource<T> {
    /// Reserves uninitialized storage for `n` elements.
    ///
    /// A request for zero bytes (either `n == 0` or a zero-sized `T`) yields a dangling,
    /// well-aligned pointer.
    ///
    /// # Errors
    /// Returns [`Error::AllocationFailure`] on overflow or allocator failure.
    fn allocate(&self, n: usize) -> Result<NonNull<T>>;

    /// Resizes storage from `old_len` to `new_len` slots.
    ///
    /// # Errors
    /// Returns [`Error::AllocationFailure`]. The original block has been released by the
    /// time the error is returned; `ptr` must not be used again.
    ///
    /// # Safety
    /// `ptr` must come from this resource with a length of exactly `old_len`.
    unsafe fn reallocate(&self, ptr: NonNull<T>, old_len: usize, new_len: usize) -> Result<NonNull<T>>;

    /// Releases storage of `len` slots. Elements are not dropped.
    ///
    /// # Safety
    /// `ptr` must come from this resource with a length of exactly `len`.
    unsafe fn deallocate(&self, ptr: NonNull<T>, len: usize);
}

const NOT_CONFIGURED: &str =
    "default resource not overridden; supply a concrete resource to use this container";

/// The default single-object resource: refuses every allocation.
///
/// Useful as a type-level placeholder that forces callers to pick a real strategy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnconfiguredResource;

unsafe impl<T> Resource<T> for UnconfiguredResource {
    fn allocate(&self, _value: T) -> Result<NonNull<T>> {
        Err(Error::alloc(NOT_CONFIGURED))
    }

    // Nothing can ever have been allocated here.
    unsafe fn deallocate(&self, _ptr: NonNull<T>) {}

    unsafe fn deallocate_raw(&self, _ptr: NonNull<T>) {}
}

/// The default array resource: refuses every allocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnconfiguredArrayResource;

unsafe impl<T> ArrayResource<T> for UnconfiguredArrayResource {
    fn allocate(&self, _n: usize) -> Result<NonNull<T>> {
        Err(Error::alloc(NOT_CONFIGURED))
    }

    unsafe fn reallocate(&self, _ptr: NonNull<T>, _old_len: usize, _new_len: usize) -> Result<NonNull<T>> {
        Err(Error::alloc(NOT_CONFIGURED))
    }

    unsafe fn deallocate(&self, _ptr: NonNull<T>, _len: usize) {}
}

/// Layout of `n` contiguous `T`s, with overflow reported as an allocation failure.
#[inline]
pub(crate) fn array_layout<T>(n: usize) -> Result<Layout> {
    Layout::array::<T>(n).map_err(|_| Error::alloc("capacity overflow"))
}
