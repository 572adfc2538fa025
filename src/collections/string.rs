//! Owned UTF-8 strings over an array resource.

use super::vec::{alloc_failed, DefaultGrowth, GrowthPolicy, Vector};
use crate::alloc::{ArrayResource, SystemArrayResource};
use crate::error::{Error, Result};
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::{Add, Deref};
use core::str::{self, FromStr};

/// A growable UTF-8 string whose bytes live in storage from `A`.
///
/// Appends grow the buffer along the policy `G` until the new content fits; storage is
/// only acquired on the first non-empty append or an explicit reserve.
pub struct OwnedString<A: ArrayResource<u8> = SystemArrayResource, G: GrowthPolicy = DefaultGrowth> {
    bytes: Vector<u8, A, G>,
}

impl OwnedString {
    /// An empty string on the platform heap.
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: Vector::new() }
    }

    /// An empty string with room for exactly `capacity` bytes.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`].
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            bytes: Vector::with_capacity(capacity)?,
        })
    }
}

impl<A: ArrayResource<u8>, G: GrowthPolicy> OwnedString<A, G> {
    /// An empty string over `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self {
            bytes: Vector::new_in(alloc),
        }
    }

    /// A copy of `s` in storage from `alloc`.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`].
    pub fn from_str_in(s: &str, alloc: A) -> Result<Self> {
        let mut out = Self::new_in(alloc);
        out.push_str(s)?;
        Ok(out)
    }

    /// Appends `s`.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`]; the string is left empty if growing fails.
    #[inline]
    pub fn push_str(&mut self, s: &str) -> Result<()> {
        self.bytes.extend_copied(s.as_bytes())
    }

    /// Appends one character.
    ///
    /// # Errors
    /// As for [`push_str`](Self::push_str).
    pub fn push(&mut self, ch: char) -> Result<()> {
        let mut buf = [0; 4];
        self.push_str(ch.encode_utf8(&mut buf))
    }

    /// Makes room for exactly `additional` more bytes.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`].
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let total = self
            .len()
            .checked_add(additional)
            .ok_or_else(|| Error::alloc("capacity overflow"))?;
        self.bytes.reserve(total)
    }

    /// Byte at `index`.
    ///
    /// # Errors
    /// [`Error::UninitializedAccess`] if no storage was ever acquired,
    /// [`Error::IndexOutOfRange`] past the end.
    pub fn byte_at(&self, index: usize) -> Result<u8> {
        self.bytes.at(index).copied()
    }

    /// The contents.
    #[inline]
    pub fn as_str(&self) -> &str {
        // SAFETY: only whole `str`s are ever appended.
        unsafe { str::from_utf8_unchecked(self.bytes.as_slice()) }
    }

    /// The contents as raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Bytes the storage can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// `true` for the empty string.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Empties the string and keeps its storage.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// A new string holding `self` followed by `other`.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`].
    pub fn concat(&self, other: &str) -> Result<Self>
    where
        A: Clone,
    {
        let mut out = Self::new_in(self.bytes.allocator().clone());
        let total = self
            .len()
            .checked_add(other.len())
            .ok_or_else(|| Error::alloc("capacity overflow"))?;
        out.bytes.reserve(total)?;
        out.push_str(self.as_str())?;
        out.push_str(other)?;
        Ok(out)
    }
}

impl FromStr for OwnedString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_in(s, SystemArrayResource)
    }
}

impl<A: ArrayResource<u8> + Default, G: GrowthPolicy> Default for OwnedString<A, G> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<A: ArrayResource<u8> + Clone, G: GrowthPolicy> Clone for OwnedString<A, G> {
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
        }
    }
}

impl<A: ArrayResource<u8>, G: GrowthPolicy> Add<&str> for OwnedString<A, G> {
    type Output = Self;

    fn add(mut self, rhs: &str) -> Self {
        if self.push_str(rhs).is_err() {
            alloc_failed::<u8>(self.len().saturating_add(rhs.len()));
        }
        self
    }
}

impl<A: ArrayResource<u8>, G: GrowthPolicy> Deref for OwnedString<A, G> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl<A: ArrayResource<u8>, G: GrowthPolicy> AsRef<str> for OwnedString<A, G> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<A: ArrayResource<u8>, G: GrowthPolicy> PartialEq for OwnedString<A, G> {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl<A: ArrayResource<u8>, G: GrowthPolicy> Eq for OwnedString<A, G> {}

impl<A: ArrayResource<u8>, G: GrowthPolicy> PartialEq<str> for OwnedString<A, G> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl<A: ArrayResource<u8>, G: GrowthPolicy> PartialEq<&str> for OwnedString<A, G> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl<A: ArrayResource<u8>, G: GrowthPolicy> Hash for OwnedString<A, G> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl<A: ArrayResource<u8>, G: GrowthPolicy> fmt::Display for OwnedString<A, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<A: ArrayResource<u8>, G: GrowthPolicy> fmt::Debug for OwnedString<A, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}
