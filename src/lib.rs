//! # `cairn` - allocation strategies and the containers built on them
//!
//! Every container and ownership handle in this crate takes its allocation strategy as a
//! type parameter. Strategies are statically dispatched: a stateless resource is a
//! zero-sized value, and a stateful one is a reference to the arena it feeds from.
//!
//! ## Layers
//!
//! 1. **Resources** ([`alloc`]): [`Resource`] places single objects, [`ArrayResource`]
//!    places contiguous runs. [`SystemResource`]/[`SystemArrayResource`] use the platform
//!    allocator; the `Unconfigured*` placeholders refuse every request.
//! 2. **Arena** ([`LazyAllocator`]): fixed-capacity pages acquired on demand, with freed
//!    slots recycled most-recent-first. [`MonotonicResource`] and
//!    [`ConcurrentMonotonicResource`] expose an arena as a [`Resource`].
//! 3. **Ownership** ([`ptr`]): [`UniquePtr`] for exclusive ownership, [`SharedPtr`] for
//!    reference counting with a side-allocated count cell, [`ConcurrentPtr`] when the count
//!    must be atomic.
//! 4. **Containers** ([`collections`]): [`Vector`] with a pluggable [`GrowthPolicy`],
//!    [`RingBuffer`], and [`OwnedString`].
//!
//! ## Errors
//!
//! Fallible operations return [`Result`]; see [`Error`] for the conditions. Trait impls that
//! cannot return an error (`Clone`, `Extend`, `FromIterator`, `Add`) report allocation
//! failure through [`std::alloc::handle_alloc_error`], as the standard collections do.
//!
//! ## Example
//!
//! ```
//! use cairn::{LazyAllocator, MonotonicResource, SharedPtr, Vector};
//!
//! # fn main() -> cairn::Result<()> {
//! let mut v: Vector<u32> = Vector::new();
//! v.push_back(7)?;
//! assert_eq!(*v.at(0)?, 7);
//!
//! let arena: LazyAllocator<u64, 64> = LazyAllocator::new();
//! let res = MonotonicResource::new(&arena);
//! let p = cairn::UniquePtr::new_in(42, res)?;
//! assert_eq!(*p, 42);
//! assert_eq!(arena.live(), 1);
//! drop(p);
//! assert_eq!(arena.free_slots(), 1);
//!
//! let a: SharedPtr<&str> = SharedPtr::new("shared")?;
//! let b = a.clone();
//! assert_eq!(b.use_count(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `tracing`: emit structured events for page acquisition, arena resets and allocation
//!   failures.
//! - `parallel`: rayon-backed `par_iter` on [`Vector`].

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod trace;

pub mod alloc;
pub mod collections;
pub mod error;
pub mod ptr;
mod sync;

pub use alloc::{
    ArenaStats, ArrayResource, ConcurrentMonotonicResource, LazyAllocator, MonotonicResource, Resource,
    SystemArrayResource, SystemResource, UnconfiguredArrayResource, UnconfiguredResource,
};
pub use collections::{DefaultGrowth, Doubling, GrowthPolicy, OwnedString, RingBuffer, Vector};
pub use error::{Error, Result};
pub use ptr::{AtomicCount, ConcurrentPtr, LocalCount, RefCount, SharedPtr, UniquePtr};

// Compile-time layout checks.
const _: () = {
    use core::mem;

    // Stateless resources cost nothing to hold.
    assert!(mem::size_of::<SystemResource>() == 0);
    assert!(mem::size_of::<SystemArrayResource>() == 0);

    // A null handle is the niche of the pointer, not an extra flag.
    assert!(mem::size_of::<UniquePtr<u64>>() == mem::size_of::<usize>());
    assert!(mem::size_of::<SharedPtr<u64>>() == 2 * mem::size_of::<usize>());
    assert!(mem::size_of::<ConcurrentPtr<u64>>() == 2 * mem::size_of::<usize>());

    // An arena slot is the value plus the liveness flag, padded to the value's alignment.
    assert!(mem::size_of::<alloc::Slot<usize>>() == 2 * mem::size_of::<usize>());
};
