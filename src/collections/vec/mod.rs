//! Growable contiguous storage.

mod growth;
mod vector;

pub use growth::{DefaultGrowth, Doubling, GrowthPolicy};
pub use vector::{IntoIter, Vector};

pub(crate) use vector::alloc_failed;
