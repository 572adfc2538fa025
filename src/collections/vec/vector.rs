//! A growable array over an [`ArrayResource`].
//!
//! Storage is acquired lazily: a fresh vector owns nothing and reports
//! [`Error::UninitializedAccess`] for indexed reads until the first append or reserve.
//! Growth follows the vector's [`GrowthPolicy`]. Popping the last element releases the
//! storage again, so a drained vector is indistinguishable from a new one.

use super::growth::{grow_to_fit, next_capacity, DefaultGrowth, GrowthPolicy};
use crate::alloc::{array_layout, ArrayResource, SystemArrayResource};
use crate::error::{Error, Result};
use crate::trace::trace_event;
use core::alloc::Layout;
use core::fmt;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop};
use core::ops::{Index, IndexMut};
use core::ptr::{self, NonNull};
use core::slice;
use serde::de::{SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::alloc::handle_alloc_error;

/// A contiguous growable array of `T` with pluggable storage and growth.
pub struct Vector<T, A: ArrayResource<T> = SystemArrayResource, G: GrowthPolicy = DefaultGrowth> {
    data: NonNull<T>,
    len: usize,
    capacity: usize,
    initialized: bool,
    alloc: A,
    _marker: PhantomData<(T, fn() -> G)>,
}

// SAFETY: the vector owns its elements like `Vec<T>`.
unsafe impl<T: Send, A: ArrayResource<T> + Send, G: GrowthPolicy> Send for Vector<T, A, G> {}
// SAFETY: `&Vector` only hands out `&T` and clones of `A`.
unsafe impl<T: Sync, A: ArrayResource<T> + Sync, G: GrowthPolicy> Sync for Vector<T, A, G> {}

/// Reports a failed allocation inside an infallible trait impl.
#[cold]
pub(crate) fn alloc_failed<T>(capacity: usize) -> ! {
    match Layout::array::<T>(capacity) {
        Ok(layout) => handle_alloc_error(layout),
        Err(_) => panic!("capacity overflow"),
    }
}

impl<T> Vector<T> {
    /// An empty vector on the platform heap. Allocates nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: NonNull::dangling(),
            len: 0,
            capacity: 0,
            initialized: false,
            alloc: SystemArrayResource,
            _marker: PhantomData,
        }
    }

    /// A vector with room for exactly `capacity` elements.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`] if the storage cannot be acquired.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_in(capacity, SystemArrayResource)
    }
}

impl<T, A: ArrayResource<T>, G: GrowthPolicy> Vector<T, A, G> {
    /// An empty vector that will draw storage from `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self {
            data: NonNull::dangling(),
            len: 0,
            capacity: 0,
            initialized: false,
            alloc,
            _marker: PhantomData,
        }
    }

    /// A vector over `alloc` with room for exactly `capacity` elements.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`] if the storage cannot be acquired.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Result<Self> {
        let mut v = Self::new_in(alloc);
        v.reserve(capacity)?;
        Ok(v)
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Elements the current storage can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `true` when there are no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the vector currently owns storage.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The resource storage comes from.
    #[inline]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// The elements as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `[0, len)` is initialized; `data` is aligned and non-null even when empty.
        unsafe { slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    /// The elements as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above, and `&mut self` is unique.
        unsafe { slice::from_raw_parts_mut(self.data.as_ptr(), self.len) }
    }

    /// Iterator over the elements.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Iterator over mutable elements.
    #[inline]
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// Moves the storage to a block of `new_capacity` slots.
    ///
    /// A capacity whose layout cannot be represented is rejected with the contents intact.
    /// Any other failure leaves the vector empty and uninitialized; elements that were
    /// stored are leaked.
    fn resize_storage(&mut self, new_capacity: usize) -> Result<()> {
        array_layout::<T>(new_capacity)?;
        let result = if self.initialized {
            // SAFETY: `data` came from `alloc` with exactly `capacity` slots.
            unsafe { self.alloc.reallocate(self.data, self.capacity, new_capacity) }
        } else {
            self.alloc.allocate(new_capacity)
        };
        match result {
            Ok(data) => {
                trace_event!(
                    TRACE,
                    from = self.capacity,
                    to = new_capacity,
                    "vector storage resized"
                );
                self.data = data;
                self.capacity = new_capacity;
                self.initialized = true;
                Ok(())
            }
            Err(err) => {
                trace_event!(WARN, error = %err, len = self.len, "vector storage lost");
                self.data = NonNull::dangling();
                self.len = 0;
                self.capacity = 0;
                self.initialized = false;
                Err(err)
            }
        }
    }

    /// Returns storage to the resource. Elements must already be gone.
    fn release_storage(&mut self) {
        debug_assert_eq!(self.len, 0);
        if self.initialized {
            // SAFETY: `data` came from `alloc` with exactly `capacity` slots.
            unsafe { self.alloc.deallocate(self.data, self.capacity) };
            trace_event!(TRACE, capacity = self.capacity, "vector storage released");
        }
        self.data = NonNull::dangling();
        self.capacity = 0;
        self.initialized = false;
    }

    /// Appends the value produced by `f`, constructed directly in its slot.
    ///
    /// The first append acquires `G::INITIAL_CAPACITY` slots; a full vector grows to
    /// `ceil(capacity * G::FACTOR)`. `f` runs only after room is secured.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`] when growing fails. A failed growth leaves the vector
    /// empty and uninitialized.
    pub fn emplace_back<F>(&mut self, f: F) -> Result<&mut T>
    where
        F: FnOnce() -> T,
    {
        if !self.initialized || self.len == self.capacity {
            let new_capacity = next_capacity::<G>(self.capacity)?;
            self.resize_storage(new_capacity)?;
        }
        // SAFETY: len < capacity, so the slot is in bounds and unoccupied.
        unsafe {
            let slot = self.data.as_ptr().add(self.len);
            slot.write(f());
            self.len += 1;
            Ok(&mut *slot)
        }
    }

    /// Appends `value`.
    ///
    /// # Errors
    /// As for [`emplace_back`](Self::emplace_back).
    #[inline]
    pub fn push_back(&mut self, value: T) -> Result<()> {
        self.emplace_back(|| value).map(|_| ())
    }

    /// Drops the last element. Does nothing when empty.
    ///
    /// Removing the final element releases the storage.
    pub fn pop_back(&mut self) {
        if self.len == 0 {
            return;
        }
        self.len -= 1;
        // SAFETY: the slot at the old `len - 1` was initialized and is now outside `len`.
        unsafe { ptr::drop_in_place(self.data.as_ptr().add(self.len)) };
        if self.len == 0 {
            self.release_storage();
        }
    }

    /// Moves the last element out. Storage is kept.
    pub fn pop_back_move(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the slot was initialized and is no longer counted.
        Some(unsafe { self.data.as_ptr().add(self.len).read() })
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if !self.initialized {
            return Err(Error::UninitializedAccess);
        }
        if index >= self.len {
            return Err(Error::out_of_range(index, self.len));
        }
        Ok(())
    }

    /// Bounds-checked access.
    ///
    /// # Errors
    /// [`Error::UninitializedAccess`] before any storage was acquired,
    /// [`Error::IndexOutOfRange`] for `index >= len`.
    pub fn at(&self, index: usize) -> Result<&T> {
        self.check_index(index)?;
        // SAFETY: checked above.
        Ok(unsafe { &*self.data.as_ptr().add(index) })
    }

    /// Bounds-checked mutable access.
    ///
    /// # Errors
    /// As for [`at`](Self::at).
    pub fn ref_at(&mut self, index: usize) -> Result<&mut T> {
        self.check_index(index)?;
        // SAFETY: checked above.
        Ok(unsafe { &mut *self.data.as_ptr().add(index) })
    }

    /// The last element, if any.
    #[inline]
    pub fn back(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// Mutable access to the last element.
    #[inline]
    pub fn back_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().last_mut()
    }

    /// Ensures room for `capacity` elements in total.
    ///
    /// Acquires storage on an uninitialized vector even when `capacity` is zero.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`]; a failed resize leaves the vector empty.
    pub fn reserve(&mut self, capacity: usize) -> Result<()> {
        if self.initialized && capacity <= self.capacity {
            return Ok(());
        }
        self.resize_storage(capacity)
    }

    /// Shrinks storage to the current length.
    ///
    /// An empty vector keeps zero slots and stays initialized, so indexed access reports
    /// [`Error::IndexOutOfRange`] rather than [`Error::UninitializedAccess`].
    ///
    /// # Errors
    /// [`Error::AllocationFailure`]; a failed resize leaves the vector empty.
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        if !self.initialized || self.len == self.capacity {
            return Ok(());
        }
        self.resize_storage(self.len)
    }

    /// Drops every element and keeps the storage.
    pub fn clear(&mut self) {
        let elems = ptr::slice_from_raw_parts_mut(self.data.as_ptr(), self.len);
        self.len = 0;
        // SAFETY: the elements were initialized and are no longer counted.
        unsafe { ptr::drop_in_place(elems) };
    }

    /// Moves everything into a new vector and leaves this one uninitialized.
    #[must_use]
    pub fn take(&mut self) -> Self
    where
        A: Clone,
    {
        let empty = Self::new_in(self.alloc.clone());
        mem::replace(self, empty)
    }

    /// Deep copy into storage of the same capacity.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`] if the copy's storage cannot be acquired.
    pub fn try_clone(&self) -> Result<Self>
    where
        T: Clone,
        A: Clone,
    {
        let mut copy = Self::new_in(self.alloc.clone());
        if !self.initialized {
            return Ok(copy);
        }
        copy.reserve(self.capacity)?;
        for item in self {
            // SAFETY: capacity matches the source, so every slot below `len` is in bounds.
            unsafe { copy.data.as_ptr().add(copy.len).write(item.clone()) };
            copy.len += 1;
        }
        Ok(copy)
    }

    /// Replaces the contents with a block copy of `other`.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`] if more room is needed and cannot be acquired.
    pub fn assign_copy(&mut self, other: &Self) -> Result<()>
    where
        T: Copy,
    {
        self.clear();
        if !other.initialized {
            self.release_storage();
            return Ok(());
        }
        self.reserve(other.capacity)?;
        // SAFETY: both blocks hold at least `other.len` slots and belong to distinct vectors.
        unsafe { ptr::copy_nonoverlapping(other.data.as_ptr(), self.data.as_ptr(), other.len) };
        self.len = other.len;
        Ok(())
    }

    /// Block-copies `src` onto the end, growing along the policy until it fits.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`]; a failed growth leaves the vector empty.
    pub fn extend_copied(&mut self, src: &[T]) -> Result<()>
    where
        T: Copy,
    {
        if src.is_empty() {
            return Ok(());
        }
        let needed = self
            .len
            .checked_add(src.len())
            .ok_or_else(|| Error::alloc("capacity overflow"))?;
        if !self.initialized || needed > self.capacity {
            let new_capacity = grow_to_fit::<G>(self.capacity, needed)?;
            self.resize_storage(new_capacity)?;
        }
        // SAFETY: room for `needed` slots was secured above; `src` cannot alias our storage
        // while `&mut self` is held.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), self.data.as_ptr().add(self.len), src.len());
        }
        self.len = needed;
        Ok(())
    }

    /// Appends every item, stopping at the first allocation failure.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`]; items not yet appended are dropped with the iterator.
    pub fn try_extend<I: IntoIterator<Item = T>>(&mut self, iter: I) -> Result<()> {
        for item in iter {
            self.push_back(item)?;
        }
        Ok(())
    }
}

#[cfg(feature = "parallel")]
impl<T, A: ArrayResource<T>, G: GrowthPolicy> Vector<T, A, G> {
    /// Parallel iterator over the elements.
    pub fn par_iter(&self) -> rayon::slice::Iter<'_, T>
    where
        T: Sync,
    {
        use rayon::prelude::*;
        self.as_slice().par_iter()
    }

    /// Parallel iterator over mutable elements.
    pub fn par_iter_mut(&mut self) -> rayon::slice::IterMut<'_, T>
    where
        T: Send,
    {
        use rayon::prelude::*;
        self.as_mut_slice().par_iter_mut()
    }
}

impl<T, A: ArrayResource<T>, G: GrowthPolicy> Drop for Vector<T, A, G> {
    fn drop(&mut self) {
        self.clear();
        self.release_storage();
    }
}

impl<T, A: ArrayResource<T> + Default, G: GrowthPolicy> Default for Vector<T, A, G> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T: Clone, A: ArrayResource<T> + Clone, G: GrowthPolicy> Clone for Vector<T, A, G> {
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(copy) => copy,
            Err(_) => alloc_failed::<T>(self.capacity),
        }
    }
}

impl<T, A: ArrayResource<T>, G: GrowthPolicy> Index<usize> for Vector<T, A, G> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &T {
        match self.at(index) {
            Ok(item) => item,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T, A: ArrayResource<T>, G: GrowthPolicy> IndexMut<usize> for Vector<T, A, G> {
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.ref_at(index) {
            Ok(item) => item,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T: fmt::Debug, A: ArrayResource<T>, G: GrowthPolicy> fmt::Debug for Vector<T, A, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, A: ArrayResource<T>, G: GrowthPolicy> PartialEq for Vector<T, A, G> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, A: ArrayResource<T>, G: GrowthPolicy> Eq for Vector<T, A, G> {}

impl<T, A: ArrayResource<T>, G: GrowthPolicy> Extend<T> for Vector<T, A, G> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            if self.push_back(item).is_err() {
                alloc_failed::<T>(self.capacity.saturating_add(1));
            }
        }
    }
}

impl<T, A: ArrayResource<T> + Default, G: GrowthPolicy> FromIterator<T> for Vector<T, A, G> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut v = Self::default();
        v.extend(iter);
        v
    }
}

impl<'a, T, A: ArrayResource<T>, G: GrowthPolicy> IntoIterator for &'a Vector<T, A, G> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: ArrayResource<T>, G: GrowthPolicy> IntoIterator for &'a mut Vector<T, A, G> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T, A: ArrayResource<T>, G: GrowthPolicy> IntoIterator for Vector<T, A, G> {
    type Item = T;
    type IntoIter = IntoIter<T, A>;

    fn into_iter(self) -> IntoIter<T, A> {
        let this = ManuallyDrop::new(self);
        IntoIter {
            data: this.data,
            front: 0,
            back: this.len,
            capacity: this.capacity,
            initialized: this.initialized,
            // SAFETY: `this` is never dropped, so the resource is moved exactly once.
            alloc: unsafe { ptr::read(&this.alloc) },
            _owns: PhantomData,
        }
    }
}

/// Owning iterator returned by [`Vector::into_iter`].
pub struct IntoIter<T, A: ArrayResource<T>> {
    data: NonNull<T>,
    front: usize,
    back: usize,
    capacity: usize,
    initialized: bool,
    alloc: A,
    _owns: PhantomData<T>,
}

// SAFETY: same ownership as the vector it came from.
unsafe impl<T: Send, A: ArrayResource<T> + Send> Send for IntoIter<T, A> {}

impl<T, A: ArrayResource<T>> Iterator for IntoIter<T, A> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        // SAFETY: slots in `[front, back)` are initialized and read at most once.
        let item = unsafe { self.data.as_ptr().add(self.front).read() };
        self.front += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }
}

impl<T, A: ArrayResource<T>> DoubleEndedIterator for IntoIter<T, A> {
    fn next_back(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        // SAFETY: as in `next`.
        Some(unsafe { self.data.as_ptr().add(self.back).read() })
    }
}

impl<T, A: ArrayResource<T>> ExactSizeIterator for IntoIter<T, A> {}
impl<T, A: ArrayResource<T>> FusedIterator for IntoIter<T, A> {}

impl<T, A: ArrayResource<T>> Drop for IntoIter<T, A> {
    fn drop(&mut self) {
        let rest = ptr::slice_from_raw_parts_mut(
            // SAFETY: front <= back <= capacity.
            unsafe { self.data.as_ptr().add(self.front) },
            self.back - self.front,
        );
        self.front = self.back;
        // SAFETY: the remaining elements were never yielded.
        unsafe { ptr::drop_in_place(rest) };
        if self.initialized {
            // SAFETY: the block came from `alloc` with exactly `capacity` slots.
            unsafe { self.alloc.deallocate(self.data, self.capacity) };
        }
    }
}

impl<T: Serialize, A: ArrayResource<T>, G: GrowthPolicy> Serialize for Vector<T, A, G> {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

struct VectorVisitor<T, A, G>(PhantomData<fn() -> (T, A, G)>);

impl<'de, T, A, G> Visitor<'de> for VectorVisitor<T, A, G>
where
    T: Deserialize<'de>,
    A: ArrayResource<T> + Default,
    G: GrowthPolicy,
{
    type Value = Vector<T, A, G>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence")
    }

    fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> core::result::Result<Self::Value, S::Error> {
        let mut v = Vector::default();
        while let Some(item) = seq.next_element()? {
            v.push_back(item).map_err(serde::de::Error::custom)?;
        }
        Ok(v)
    }
}

impl<'de, T, A, G> Deserialize<'de> for Vector<T, A, G>
where
    T: Deserialize<'de>,
    A: ArrayResource<T> + Default,
    G: GrowthPolicy,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        deserializer.deserialize_seq(VectorVisitor(PhantomData))
    }
}
