//! Tuning knobs of the indices.
//!
//! Defaults are what every sequence uses unless told otherwise; charts read [`ChartConfig`] once
//! at construction and hand the jump settings down to every index they build.

use crate::time::RationalTime;

/// Number of minor slots a split bucket is divided into.
pub const MINOR_SLOTS: usize = 16;

/// `log2` of [`MINOR_SLOTS`].
pub(crate) const MINOR_SLOTS_LOG2: i32 = 4;

/// Settings of a [`JumpArray`](crate::jump::JumpArray).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct JumpConfig {
    /// How many buckets [`update_average_beats`](crate::jump::JumpArray::update_average_beats)
    /// inspects.
    pub sample_size: usize,
    /// How many inspected buckets must be split before the bucket width is halved.
    pub split_threshold: usize,
    /// Smallest allowed bucket width, as `log2` of beats.
    pub min_width_log2: i32,
    /// Largest allowed bucket width, as `log2` of beats.
    pub max_width_log2: i32,
    /// Upper bound on the number of buckets.
    pub max_buckets: usize,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            sample_size: 50,
            split_threshold: 30,
            min_width_log2: -8,
            max_width_log2: 16,
            max_buckets: 1 << 16,
        }
    }
}

impl JumpConfig {
    /// Sets the number of buckets sampled when rebalancing.
    #[must_use]
    pub const fn sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Sets the number of split buckets that triggers a rebalance.
    #[must_use]
    pub const fn split_threshold(mut self, split_threshold: usize) -> Self {
        self.split_threshold = split_threshold;
        self
    }

    /// Sets the bucket width bounds, as `log2` of beats.
    #[must_use]
    pub const fn width_log2_bounds(mut self, min: i32, max: i32) -> Self {
        self.min_width_log2 = min;
        self.max_width_log2 = max;
        self
    }

    /// Sets the upper bound on the number of buckets.
    #[must_use]
    pub const fn max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets;
        self
    }
}

/// Settings of a [`Chart`](crate::chart::Chart).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChartConfig {
    /// Settings of every jump array the chart builds.
    pub jump: JumpConfig,
    /// The span indexed when the chart does not define its own duration.
    pub default_effective_beats: RationalTime,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            jump: JumpConfig::default(),
            default_effective_beats: RationalTime::from_beats(480),
        }
    }
}

impl ChartConfig {
    /// Sets the jump array settings.
    #[must_use]
    pub const fn jump(mut self, jump: JumpConfig) -> Self {
        self.jump = jump;
        self
    }

    /// Sets the span indexed by default.
    #[must_use]
    pub const fn default_effective_beats(mut self, beats: RationalTime) -> Self {
        self.default_effective_beats = beats;
        self
    }
}
