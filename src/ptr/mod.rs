//! Ownership handles over resource-allocated objects.

mod count;
mod shared;
mod unique;

pub use count::{AtomicCount, LocalCount, RefCount};
pub use shared::{ConcurrentPtr, SharedPtr};
pub use unique::UniquePtr;
