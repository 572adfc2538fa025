//! Fixed-capacity circular buffer.

use crate::alloc::{ArrayResource, SystemArrayResource};
use crate::error::{Error, Result};
use core::fmt;
use core::iter::Chain;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};
use core::slice;

/// Holds the most recent `MAX` elements; appending to a full buffer evicts the oldest.
///
/// Storage for all `MAX` slots is taken from `A` once, at construction. Positions are
/// logical: index 0 is always the oldest element.
pub struct RingBuffer<T, const MAX: usize, A: ArrayResource<T> = SystemArrayResource> {
    data: NonNull<T>,
    head: usize,
    len: usize,
    alloc: A,
    _owns: PhantomData<T>,
}

// SAFETY: the buffer owns its elements.
unsafe impl<T: Send, const MAX: usize, A: ArrayResource<T> + Send> Send for RingBuffer<T, MAX, A> {}

impl<T, const MAX: usize> RingBuffer<T, MAX> {
    /// A buffer on the platform heap.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`] if the `MAX` slots cannot be allocated.
    pub fn new() -> Result<Self> {
        Self::new_in(SystemArrayResource)
    }
}

impl<T, const MAX: usize, A: ArrayResource<T>> RingBuffer<T, MAX, A> {
    const NON_EMPTY: () = assert!(MAX > 0, "ring buffer capacity must be non-zero");

    /// A buffer whose `MAX` slots come from `alloc`.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`] if the slots cannot be allocated.
    pub fn new_in(alloc: A) -> Result<Self> {
        let () = Self::NON_EMPTY;
        let data = alloc.allocate(MAX)?;
        Ok(Self {
            data,
            head: 0,
            len: 0,
            alloc,
            _owns: PhantomData,
        })
    }

    #[inline]
    fn physical(&self, logical: usize) -> usize {
        (self.head + logical) % MAX
    }

    #[inline]
    fn slot(&self, physical: usize) -> *mut T {
        // SAFETY: callers pass indices below MAX.
        unsafe { self.data.as_ptr().add(physical) }
    }

    /// Number of stored elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when nothing is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `true` when the next append evicts.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == MAX
    }

    /// Always `MAX`.
    #[inline]
    pub const fn capacity(&self) -> usize {
        MAX
    }

    /// Physical slot the next append writes to.
    #[inline]
    pub fn pos(&self) -> usize {
        self.physical(self.len)
    }

    /// Appends `value`, returning the evicted oldest element when the buffer was full.
    pub fn push_back(&mut self, value: T) -> Option<T> {
        if self.is_full() {
            let slot = self.slot(self.head);
            // SAFETY: a full buffer has every slot initialized; the old value is moved out
            // before the slot is overwritten.
            let evicted = unsafe { slot.replace(value) };
            self.head = (self.head + 1) % MAX;
            Some(evicted)
        } else {
            // SAFETY: the slot past the newest element is free while not full.
            unsafe { self.slot(self.pos()).write(value) };
            self.len += 1;
            None
        }
    }

    /// Appends the value produced by `f`, dropping the oldest element first if full.
    pub fn emplace_back<F: FnOnce() -> T>(&mut self, f: F) -> &mut T {
        if self.is_full() {
            drop(self.pop_front());
        }
        let slot = self.slot(self.pos());
        // SAFETY: not full, so the slot is free.
        unsafe {
            slot.write(f());
            self.len += 1;
            &mut *slot
        }
    }

    /// Appends clones of `items` in order under the same eviction rule.
    pub fn write(&mut self, items: &[T])
    where
        T: Clone,
    {
        for item in items {
            drop(self.push_back(item.clone()));
        }
    }

    /// Removes the oldest element.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        // SAFETY: the head slot holds the oldest element.
        let value = unsafe { self.slot(self.head).read() };
        self.head = (self.head + 1) % MAX;
        self.len -= 1;
        Some(value)
    }

    /// Element at logical position `index`, 0 being the oldest.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] for `index >= len`.
    pub fn get(&self, index: usize) -> Result<&T> {
        if index >= self.len {
            return Err(Error::out_of_range(index, self.len));
        }
        // SAFETY: logical positions below len are initialized.
        Ok(unsafe { &*self.slot(self.physical(index)) })
    }

    /// Mutable access at logical position `index`.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] for `index >= len`.
    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        if index >= self.len {
            return Err(Error::out_of_range(index, self.len));
        }
        // SAFETY: as in `get`.
        Ok(unsafe { &mut *self.slot(self.physical(index)) })
    }

    /// Truncates to the first `pos` elements, so the next append lands at logical `pos`.
    ///
    /// # Errors
    /// [`Error::InvalidOperation`] if `pos` is past the end.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.len {
            return Err(Error::invalid("seek past the end of the ring buffer"));
        }
        while self.len > pos {
            self.len -= 1;
            // SAFETY: the newest element, no longer counted.
            unsafe { ptr::drop_in_place(self.slot(self.physical(self.len))) };
        }
        Ok(())
    }

    /// Drops every element.
    pub fn flush(&mut self) {
        let (a, b) = self.as_mut_slices();
        let (a, b) = (a as *mut [T], b as *mut [T]);
        self.head = 0;
        self.len = 0;
        // SAFETY: both runs were initialized and are no longer counted.
        unsafe {
            ptr::drop_in_place(a);
            ptr::drop_in_place(b);
        }
    }

    /// The contents as two runs, oldest first.
    pub fn as_slices(&self) -> (&[T], &[T]) {
        let first = self.len.min(MAX - self.head);
        // SAFETY: `[head, head + first)` and `[0, len - first)` are initialized.
        unsafe {
            (
                slice::from_raw_parts(self.slot(self.head), first),
                slice::from_raw_parts(self.data.as_ptr(), self.len - first),
            )
        }
    }

    fn as_mut_slices(&mut self) -> (&mut [T], &mut [T]) {
        let first = self.len.min(MAX - self.head);
        // SAFETY: as in `as_slices`; the two runs are disjoint.
        unsafe {
            (
                slice::from_raw_parts_mut(self.slot(self.head), first),
                slice::from_raw_parts_mut(self.data.as_ptr(), self.len - first),
            )
        }
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> Chain<slice::Iter<'_, T>, slice::Iter<'_, T>> {
        let (a, b) = self.as_slices();
        a.iter().chain(b.iter())
    }
}

impl<T, const MAX: usize, A: ArrayResource<T>> Drop for RingBuffer<T, MAX, A> {
    fn drop(&mut self) {
        self.flush();
        // SAFETY: allocated with MAX slots in `new_in`.
        unsafe { self.alloc.deallocate(self.data, MAX) };
    }
}

impl<T: fmt::Debug, const MAX: usize, A: ArrayResource<T>> fmt::Debug for RingBuffer<T, MAX, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T, const MAX: usize, A: ArrayResource<T>> IntoIterator for &'a RingBuffer<T, MAX, A> {
    type Item = &'a T;
    type IntoIter = Chain<slice::Iter<'a, T>, slice::Iter<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrites_oldest() {
        let mut rb: RingBuffer<u32, 3> = RingBuffer::new().unwrap();
        for i in 0..3 {
            assert_eq!(rb.push_back(i), None);
        }
        assert!(rb.is_full());
        assert_eq!(rb.push_back(3), Some(0));
        assert_eq!(rb.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(rb.get(0), Ok(&1));
        assert_eq!(rb.pos(), 1);
    }

    #[test]
    fn test_seek_truncates() {
        let mut rb: RingBuffer<String, 4> = RingBuffer::new().unwrap();
        rb.write(&["a".to_owned(), "b".to_owned(), "c".to_owned()]);
        rb.seek(1).unwrap();
        assert_eq!(rb.len(), 1);
        rb.push_back("z".to_owned());
        assert_eq!(rb.iter().map(String::as_str).collect::<Vec<_>>(), ["a", "z"]);
        assert!(matches!(rb.seek(5), Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_get_out_of_range() {
        let rb: RingBuffer<u8, 2> = RingBuffer::new().unwrap();
        assert_eq!(rb.get(0), Err(Error::out_of_range(0, 0)));
    }
}
