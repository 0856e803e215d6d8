//! Random sampling for jump array rebalancing.
//!
//! [`JumpArray::update_average_beats`](crate::jump::JumpArray::update_average_beats) decides
//! whether to split its buckets by looking at a few randomly chosen ones. This module provides
//! the [`Sampler`] trait it draws from, plus the implementations:
//!
//! - [`SplitMix64`], the small deterministic default every index owns,
//! - [`SamplerMock`], returning predefined values in rotation for tests,
//! - [`RandRng`], adapting any [`rand`] generator (with the `rand` feature).
//!
//! [`rand`]: https://crates.io/crates/rand

use core::ops::RangeInclusive;

/// A source of sample indices.
///
/// # Contract
///
/// The generated number must be within `range` (inclusive). Callers clamp out-of-range values
/// rather than trusting them, so a misbehaving sampler only degrades the rebalancing decision.
pub trait Sampler {
    /// Generates an integer within `range`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chart_timeline::sampler::{Sampler, SamplerMock};
    ///
    /// let mut sampler = SamplerMock([5u64]);
    /// assert_eq!(sampler.generate(1u64..=10u64), 5u64);
    /// ```
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64;
}

impl<T: Sampler + ?Sized> Sampler for Box<T> {
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64 {
        T::generate(self, range)
    }
}

impl<T: Sampler + ?Sized> Sampler for &mut T {
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64 {
        T::generate(self, range)
    }
}

/// A deterministic mock sampler returning values from an array in rotation.
///
/// ```rust
/// use chart_timeline::sampler::{Sampler, SamplerMock};
///
/// let mut sampler = SamplerMock([1u64, 2u64]);
/// assert_eq!(sampler.generate(0u64..=10u64), 1u64);
/// assert_eq!(sampler.generate(0u64..=10u64), 2u64);
/// assert_eq!(sampler.generate(0u64..=10u64), 1u64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SamplerMock<const N: usize>(pub [u64; N]);

impl<const N: usize> Sampler for SamplerMock<N> {
    fn generate(&mut self, _range: RangeInclusive<u64>) -> u64 {
        let Some(first) = self.0.first().copied() else {
            return 0;
        };
        self.0.rotate_left(1);
        first
    }
}

/// The SplitMix64 generator, small and good enough for choosing buckets to inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    const GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

    /// Creates a generator from a seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Returns the next 64 random bits.
    pub const fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(Self::GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

impl Default for SplitMix64 {
    fn default() -> Self {
        Self::new(0x4B50_415F_4A55_4D50)
    }
}

impl Sampler for SplitMix64 {
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64 {
        let start = *range.start();
        let width = range.end().wrapping_sub(start).wrapping_add(1);
        if width == 0 {
            self.next_u64()
        } else {
            start + self.next_u64() % width
        }
    }
}

/// A sampler backed by the [`rand`] crate.
///
/// ```rust
/// # #[cfg(feature = "rand")]
/// # {
/// use chart_timeline::sampler::{RandRng, Sampler};
/// use rand::{SeedableRng, rngs::StdRng};
///
/// let mut sampler = RandRng(StdRng::seed_from_u64(42));
/// let n = sampler.generate(1u64..=10u64);
/// assert!((1..=10).contains(&n));
/// # }
/// ```
///
/// [`rand`]: https://crates.io/crates/rand
#[cfg(feature = "rand")]
pub struct RandRng<R>(pub R);

#[cfg(feature = "rand")]
impl<R: rand::Rng> Sampler for RandRng<R> {
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64 {
        let start = *range.start();
        let width = range.end().wrapping_sub(start).wrapping_add(1);
        if width == 0 {
            self.0.next_u64()
        } else {
            (self.0.next_u64() % width) + start
        }
    }
}
