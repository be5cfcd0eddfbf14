//! Random number sources for `#RANDOM` blocks.
//!
//! [`FixedRng`] replays a list of values and keeps loads reproducible.
//! [`RandRng`] wraps a [`rand`] generator when the `rand` feature is enabled.
//!
//! [`rand`]: https://crates.io/crates/rand

use core::ops::RangeInclusive;

/// A random number generator for `#RANDOM n` control flow.
///
/// The generated number must lie within `range`. Values outside of it select no `#IF` branch.
pub trait Rng {
    /// Generates an integer within `range`.
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64;
}

impl<T: Rng + ?Sized> Rng for Box<T> {
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64 {
        T::generate(self, range)
    }
}

/// Returns the given values in rotation, clamped into the requested range.
///
/// # Examples
///
/// ```rust
/// use rhythm_chart::format::bms::rng::{FixedRng, Rng};
///
/// let mut rng = FixedRng::new(vec![2, 5]);
/// assert_eq!(rng.generate(1..=3), 2);
/// assert_eq!(rng.generate(1..=3), 3);
/// assert_eq!(rng.generate(1..=3), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FixedRng {
    values: Vec<u64>,
    cursor: usize,
}

impl FixedRng {
    /// Creates a generator replaying `values`. An empty list always yields the range start.
    #[must_use]
    pub const fn new(values: Vec<u64>) -> Self {
        Self { values, cursor: 0 }
    }
}

impl Rng for FixedRng {
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64 {
        let Some(&value) = self.values.get(self.cursor) else {
            return *range.start();
        };
        self.cursor = (self.cursor + 1) % self.values.len();
        value.clamp(*range.start(), *range.end())
    }
}

/// A generator backed by any [`rand::RngCore`].
///
/// # Examples
///
/// ```rust
/// use rhythm_chart::format::bms::rng::{RandRng, Rng};
/// use rand::{SeedableRng, rngs::StdRng};
///
/// let mut rng = RandRng(StdRng::seed_from_u64(42));
/// let n = rng.generate(1..=10);
/// assert!((1..=10).contains(&n));
/// ```
#[cfg(feature = "rand")]
#[derive(Debug, Clone)]
pub struct RandRng<R>(pub R);

#[cfg(feature = "rand")]
impl<R: rand::RngCore> Rng for RandRng<R> {
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64 {
        let start = *range.start();
        let end = *range.end();
        if end < start {
            return start;
        }
        match (end - start).checked_add(1) {
            Some(width) => start + self.0.next_u64() % width,
            None => self.0.next_u64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_rng_clamps_and_rotates() {
        let mut rng = FixedRng::new(vec![0, 9]);
        assert_eq!(rng.generate(1..=4), 1);
        assert_eq!(rng.generate(1..=4), 4);
        assert_eq!(rng.generate(1..=4), 1);
    }

    #[test]
    fn empty_fixed_rng_yields_start() {
        let mut rng = FixedRng::new(vec![]);
        assert_eq!(rng.generate(3..=7), 3);
    }
}
