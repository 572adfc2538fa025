//! Error conditions raised by resources, handles and containers.
//!
//! Every fallible operation in the crate returns [`Result`]. Conditions are raised at the
//! point of violation and handed straight back to the caller; nothing in the crate catches,
//! retries or suppresses them.

use std::borrow::Cow;
use thiserror::Error;

/// Conditions signaled by the allocation layer and the containers built on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The backing allocator could not satisfy a request, the requested size overflowed,
    /// or an unconfigured resource was used.
    #[error("allocation failed: {0}")]
    AllocationFailure(Cow<'static, str>),

    /// Indexed access on a container that was never populated or reserved.
    #[error("access to uninitialized storage")]
    UninitializedAccess,

    /// Indexed or positional access past the logical length.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The logical length at the time of the access.
        len: usize,
    },

    /// An argument violated a precondition not covered by the other variants.
    #[error("invalid operation: {0}")]
    InvalidOperation(Cow<'static, str>),
}

impl Error {
    /// Creates an [`Error::AllocationFailure`].
    #[inline]
    pub fn alloc(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::AllocationFailure(msg.into())
    }

    /// Creates an [`Error::InvalidOperation`].
    #[inline]
    pub fn invalid(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Creates an [`Error::IndexOutOfRange`].
    #[inline]
    pub const fn out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Returns `true` for [`Error::AllocationFailure`].
    #[inline]
    pub const fn is_alloc_failure(&self) -> bool {
        matches!(self, Self::AllocationFailure(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
