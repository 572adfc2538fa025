//! Allocation strategies.
//!
//! [`Resource`] places single objects, [`ArrayResource`] places contiguous runs. The
//! system resources go to the platform allocator; the monotonic resources route into a
//! paged [`LazyAllocator`].

mod lazy;
mod monotonic;
mod page;
mod resource;
mod system;

pub use lazy::{ArenaStats, LazyAllocator};
pub use monotonic::{ConcurrentMonotonicResource, MonotonicResource};
pub use page::Slot;
pub(crate) use resource::array_layout;
pub use resource::{ArrayResource, Resource, UnconfiguredArrayResource, UnconfiguredResource};
pub use system::{SystemArrayResource, SystemResource};
