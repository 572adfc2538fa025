//! Capacity growth policies.

use crate::error::{Error, Result};
use core::marker::PhantomData;
use num_traits::NumCast;

/// How a container grows when it runs out of room.
///
/// `FACTOR` must be greater than one; using a policy that violates this fails to compile
/// as soon as a container grows with it.
pub trait GrowthPolicy {
    /// Multiplier applied to the current capacity.
    const FACTOR: f64;
    /// Capacity of the first allocation.
    const INITIAL_CAPACITY: usize;
}

/// Grows by 1.8, starting at 25 elements.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefaultGrowth;

impl GrowthPolicy for DefaultGrowth {
    const FACTOR: f64 = 1.8;
    const INITIAL_CAPACITY: usize = 25;
}

/// Doubles, starting at 4 elements.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Doubling;

impl GrowthPolicy for Doubling {
    const FACTOR: f64 = 2.0;
    const INITIAL_CAPACITY: usize = 4;
}

struct Checked<G>(PhantomData<G>);

impl<G: GrowthPolicy> Checked<G> {
    const FACTOR_ABOVE_ONE: () = assert!(G::FACTOR > 1.0, "growth factor must be greater than 1.0");
}

fn overflow() -> Error {
    Error::alloc("capacity overflow")
}

/// Capacity after one growth step from `current`.
///
/// An empty container starts at the policy's initial capacity (at least one). Otherwise the
/// result is `ceil(current * FACTOR)`, and always at least `current + 1`.
pub(crate) fn next_capacity<G: GrowthPolicy>(current: usize) -> Result<usize> {
    let () = Checked::<G>::FACTOR_ABOVE_ONE;
    if current == 0 {
        return Ok(G::INITIAL_CAPACITY.max(1));
    }
    let current_f: f64 = NumCast::from(current).ok_or_else(overflow)?;
    let scaled: usize = NumCast::from((current_f * G::FACTOR).ceil()).ok_or_else(overflow)?;
    let floor = current.checked_add(1).ok_or_else(overflow)?;
    Ok(scaled.max(floor))
}

/// Smallest capacity on the growth path from `current` that holds `needed` elements.
pub(crate) fn grow_to_fit<G: GrowthPolicy>(current: usize, needed: usize) -> Result<usize> {
    let mut cap = current;
    while cap < needed {
        cap = next_capacity::<G>(cap)?;
    }
    Ok(cap)
}
