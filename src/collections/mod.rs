//! Containers parameterized over allocation resources.

mod ring_buffer;
mod string;
mod vec;

pub use ring_buffer::RingBuffer;
pub use string::OwnedString;
pub use vec::{DefaultGrowth, Doubling, GrowthPolicy, IntoIter, Vector};
