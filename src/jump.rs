//! The jump array, a skip index from time to the node governing it.
//!
//! A [`JumpArray`] partitions `[0, span)` into buckets whose width is a power of two. A bucket
//! either points at the single node governing all of it, or is split into [`MINOR_SLOTS`]
//! equal slots, each pointing at the node governing the slot's start. A lookup jumps straight to
//! the slot containing the query and then walks forward through the list until it reaches the
//! node governing the exact query time. Buckets are sized so that this walk touches O(1) nodes
//! on average.
//!
//! The array does not own the list. Everything it needs to know about the list comes through
//! [`JumpSource`], so one implementation serves event sequences, tempo sequences (keyed both by
//! beats and by seconds) and note lists (keyed by start and by hold end).
//!
//! After editing the list, call [`JumpArray::update_range`] over the affected nodes before the
//! next lookup. Nothing checks this: a lookup after an unindexed edit may return a stale node.

use std::fmt;

use log::{debug, trace, warn};

use crate::config::{JumpConfig, MINOR_SLOTS, MINOR_SLOTS_LOG2};
use crate::node_list::NodeId;
use crate::sampler::{Sampler, SplitMix64};
use crate::time::RationalTime;

/// A coordinate a [`JumpArray`] can index.
///
/// Bucket positions are computed as `floor(key * 2^exponent)`; implementations must do this
/// exactly so that a key on a slot boundary lands in the right slot.
pub trait JumpKey: Copy + PartialOrd + fmt::Debug {
    /// The origin of the indexed span.
    const ZERO: Self;

    /// `floor(self * 2^exponent)`.
    fn scaled_floor(self, exponent: i32) -> i64;

    /// `ceil(self * 2^exponent)`.
    fn scaled_ceil(self, exponent: i32) -> i64;

    /// Approximates the key as a float, for sizing buckets only.
    fn approximate(self) -> f64;
}

impl JumpKey for RationalTime {
    const ZERO: Self = Self::ZERO;

    fn scaled_floor(self, exponent: i32) -> i64 {
        Self::scaled_floor(self, exponent)
    }

    fn scaled_ceil(self, exponent: i32) -> i64 {
        Self::scaled_ceil(self, exponent)
    }

    fn approximate(self) -> f64 {
        self.to_scalar_beats()
    }
}

impl JumpKey for f64 {
    const ZERO: Self = 0.0;

    fn scaled_floor(self, exponent: i32) -> i64 {
        (self * 2f64.powi(exponent)).floor() as i64
    }

    fn scaled_ceil(self, exponent: i32) -> i64 {
        (self * 2f64.powi(exponent)).ceil() as i64
    }

    fn approximate(self) -> f64 {
        self
    }
}

/// Which end of its range a node governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    /// A node governs `[previous end, end)`: the last node starting at or before the query.
    LeftClosed,
    /// A node governs `(previous end, end]`: the first node ending at or after the query.
    RightClosed,
}

/// The view of a linked list a [`JumpArray`] indexes.
pub trait JumpSource {
    /// The coordinate indexed.
    type Key: JumpKey;

    /// Which end of its range a node governs.
    const BOUNDARY: Boundary = Boundary::LeftClosed;

    /// The head sentinel.
    fn head(&self) -> NodeId;

    /// The tail sentinel. It governs whatever lies after the last node's range.
    fn tail(&self) -> NodeId;

    /// The end of `node`'s range and the next node to index.
    ///
    /// A `None` end means `node` is the final indexed node and governs everything up to the span.
    /// For the head only the next node matters. Returns `None` altogether if `node` is not live.
    fn end_and_next(&self, node: NodeId) -> Option<(Option<Self::Key>, NodeId)>;

    /// Steps past `node` if it does not govern `target`.
    ///
    /// Returns the next node to try, or `None` if `node` already governs `target`.
    fn advance(&self, node: NodeId, target: Self::Key) -> Option<NodeId>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Bucket {
    Single(NodeId),
    Minor(Box<[NodeId; MINOR_SLOTS]>),
}

impl Bucket {
    fn slot(&self, minor: usize) -> NodeId {
        match self {
            Self::Single(node) => *node,
            Self::Minor(slots) => slots.get(minor).copied().unwrap_or(slots[0]),
        }
    }

    fn fill(&mut self, range: std::ops::Range<usize>, node: NodeId) {
        if range.start == 0 && range.end >= MINOR_SLOTS {
            *self = Self::Single(node);
            return;
        }
        let mut slots = match self {
            Self::Single(previous) => Box::new([*previous; MINOR_SLOTS]),
            Self::Minor(slots) => slots.clone(),
        };
        for slot in slots.iter_mut().take(range.end).skip(range.start) {
            *slot = node;
        }
        *self = if slots.iter().all(|slot| *slot == slots[0]) {
            Self::Single(slots[0])
        } else {
            Self::Minor(slots)
        };
    }
}

/// A skip index from time to the governing node of a linked list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpArray<K: JumpKey> {
    head: NodeId,
    tail: NodeId,
    span: K,
    width_log2: i32,
    buckets: Vec<Bucket>,
    config: JumpConfig,
}

impl<K: JumpKey> JumpArray<K> {
    /// Builds an index over `source` covering `[0, span)`.
    ///
    /// `expected_len` is an estimate of the number of nodes, used to size the buckets. A span of
    /// zero or less builds no buckets at all: every lookup then returns the first node.
    pub fn new<S>(source: &S, span: K, expected_len: usize, config: JumpConfig) -> Self
    where
        S: JumpSource<Key = K>,
    {
        let mut array = Self {
            head: source.head(),
            tail: source.tail(),
            span,
            width_log2: 0,
            buckets: Vec::new(),
            config,
        };
        array.reset(source, span, expected_len);
        array
    }

    /// The indexed span.
    pub const fn span(&self) -> K {
        self.span
    }

    /// `log2` of the bucket width.
    pub const fn width_log2(&self) -> i32 {
        self.width_log2
    }

    /// Number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of buckets split into minor slots.
    pub fn split_bucket_count(&self) -> usize {
        self.buckets
            .iter()
            .filter(|bucket| matches!(bucket, Bucket::Minor(_)))
            .count()
    }

    /// The settings this index was built with.
    pub const fn config(&self) -> &JumpConfig {
        &self.config
    }

    /// Whether the span is empty or unbounded so no buckets exist.
    pub fn is_degenerate(&self) -> bool {
        self.buckets.is_empty()
    }

    fn minor_exponent(&self) -> i32 {
        MINOR_SLOTS_LOG2 - self.width_log2
    }

    fn minor_count(&self) -> i64 {
        (self.buckets.len() * MINOR_SLOTS) as i64
    }

    fn bucket_count_for(span: K, width_log2: i32) -> usize {
        span.scaled_ceil(-width_log2).max(1) as usize
    }

    /// Re-sizes the buckets for a new span and node count estimate, then rebuilds.
    pub fn reset<S>(&mut self, source: &S, span: K, expected_len: usize)
    where
        S: JumpSource<Key = K>,
    {
        self.span = span;
        if !(span > K::ZERO && span.approximate().is_finite()) {
            self.buckets.clear();
            return;
        }
        let average = span.approximate() / expected_len.max(1) as f64;
        let mut width_log2 = (average.log2().floor() as i32)
            .clamp(self.config.min_width_log2, self.config.max_width_log2);
        while Self::bucket_count_for(span, width_log2) > self.config.max_buckets.max(1) {
            width_log2 += 1;
        }
        self.width_log2 = width_log2;
        self.rebuild(source);
    }

    /// Moves the end of the span when the buckets already cover it.
    ///
    /// Returns `false`, leaving the index untouched, if the new span needs a different number of
    /// buckets; [`Self::reset`] it then. Slots past the old span are already filled with the
    /// nodes governing them, so only the nodes that moved need an [`Self::update_range`].
    pub fn set_span(&mut self, span: K) -> bool {
        if self.buckets.is_empty()
            || !(span > K::ZERO && span.approximate().is_finite())
            || Self::bucket_count_for(span, self.width_log2) != self.buckets.len()
        {
            return false;
        }
        self.span = span;
        true
    }

    /// Refills every bucket from scratch.
    pub fn rebuild<S>(&mut self, source: &S)
    where
        S: JumpSource<Key = K>,
    {
        if !(self.span > K::ZERO) {
            self.buckets.clear();
            return;
        }
        let count = Self::bucket_count_for(self.span, self.width_log2);
        self.buckets.clear();
        self.buckets.resize(count, Bucket::Single(self.tail));
        self.update_range(source, self.head, self.tail);
        trace!(
            "rebuilt jump array: {} buckets of 2^{} beats, {} split",
            count,
            self.width_log2,
            self.split_bucket_count()
        );
    }

    fn fill_minor(&mut self, range: std::ops::Range<i64>, node: NodeId) {
        let total = self.minor_count();
        let start = range.start.max(0);
        let end = range.end.min(total);
        if start >= end {
            return;
        }
        let slots = MINOR_SLOTS as i64;
        for bucket_index in start / slots..=(end - 1) / slots {
            let bucket_start = bucket_index * slots;
            let local = (start.max(bucket_start) - bucket_start) as usize
                ..(end.min(bucket_start + slots) - bucket_start) as usize;
            if let Some(bucket) = self.buckets.get_mut(bucket_index as usize) {
                bucket.fill(local, node);
            }
        }
    }

    fn lower_slot<S: JumpSource<Key = K>>(&self, previous_end: K) -> i64 {
        match S::BOUNDARY {
            Boundary::LeftClosed => previous_end.scaled_ceil(self.minor_exponent()),
            Boundary::RightClosed => previous_end
                .scaled_floor(self.minor_exponent())
                .saturating_add(1),
        }
    }

    fn upper_slot<S: JumpSource<Key = K>>(&self, end: K) -> i64 {
        match S::BOUNDARY {
            Boundary::LeftClosed => end.scaled_ceil(self.minor_exponent()),
            Boundary::RightClosed => end.scaled_floor(self.minor_exponent()).saturating_add(1),
        }
    }

    /// Refills the slots governed by the nodes after `first_exclusive` up to `last_inclusive`.
    ///
    /// `first_exclusive` must be the last node whose governed range did not change; pass the
    /// head to refill from the start. Refilling stops at `last_inclusive`, at the final node, or
    /// at the end of the span, whichever comes first.
    pub fn update_range<S>(&mut self, source: &S, first_exclusive: NodeId, last_inclusive: NodeId)
    where
        S: JumpSource<Key = K>,
    {
        if self.buckets.is_empty() {
            return;
        }
        let total = self.minor_count();
        let Some((first_end, first_next)) = source.end_and_next(first_exclusive) else {
            debug!("jump array refill from a detached node {first_exclusive:?}, skipped");
            return;
        };
        let mut previous_end = if first_exclusive == self.head {
            None
        } else {
            match first_end {
                Some(end) => Some(end),
                // The first node is the final one: nothing after it is indexed.
                None => return,
            }
        };
        let mut node = first_next;
        loop {
            let (end, next) = if node == self.tail {
                (None, self.tail)
            } else {
                match source.end_and_next(node) {
                    Some(found) => found,
                    None => {
                        debug!("jump array refill reached a detached node {node:?}, stopped");
                        return;
                    }
                }
            };
            let low = previous_end.map_or(0, |previous| self.lower_slot::<S>(previous));
            let high = end.map_or(total, |end| self.upper_slot::<S>(end).min(total));
            self.fill_minor(low..high, node);
            if node == self.tail || end.is_none() || node == last_inclusive || high >= total {
                return;
            }
            previous_end = end;
            node = next;
        }
    }

    /// Finds the node governing `key`.
    ///
    /// Keys before zero log a warning and return the first node. Keys at or past the span return
    /// the tail sentinel.
    pub fn get_node_at<S>(&self, source: &S, key: K) -> NodeId
    where
        S: JumpSource<Key = K>,
    {
        let first = source
            .end_and_next(self.head)
            .map_or(self.tail, |(_, next)| next);
        if self.buckets.is_empty() {
            return first;
        }
        if key < K::ZERO {
            warn!("jump array queried at negative time {key:?}, returning the first node");
            return first;
        }
        let minor = key.scaled_floor(self.minor_exponent());
        if !(key < self.span) || minor >= self.minor_count() {
            return self.tail;
        }
        let bucket_index = (minor / MINOR_SLOTS as i64) as usize;
        let slot = (minor % MINOR_SLOTS as i64) as usize;
        let Some(bucket) = self.buckets.get(bucket_index) else {
            return self.tail;
        };
        let mut node = bucket.slot(slot);
        while node != self.tail {
            match source.advance(node, key) {
                Some(next) => node = next,
                None => break,
            }
        }
        node
    }

    /// Halves the bucket width if many buckets turned out split, using the built-in sampler.
    ///
    /// Returns whether the index was rebuilt.
    pub fn update_average_beats<S>(&mut self, source: &S) -> bool
    where
        S: JumpSource<Key = K>,
    {
        let seed = ((self.buckets.len() as u64) << 32) | self.split_bucket_count() as u64;
        self.update_average_beats_with(source, &mut SplitMix64::new(seed))
    }

    /// Halves the bucket width if many of the sampled buckets are split.
    ///
    /// About [`JumpConfig::sample_size`] random buckets are inspected, so the check costs the
    /// same whatever the list size. Returns whether the index was rebuilt.
    pub fn update_average_beats_with<S, R>(&mut self, source: &S, sampler: &mut R) -> bool
    where
        S: JumpSource<Key = K>,
        R: Sampler + ?Sized,
    {
        let len = self.buckets.len();
        if len == 0 || self.config.sample_size == 0 {
            return false;
        }
        let samples = self.config.sample_size.min(len);
        let threshold = self.config.split_threshold * samples / self.config.sample_size;
        let split = (0..samples)
            .filter(|_| {
                let index = (sampler.generate(0..=len as u64 - 1) as usize).min(len - 1);
                matches!(self.buckets.get(index), Some(Bucket::Minor(_)))
            })
            .count();
        if split <= threshold || self.width_log2 <= self.config.min_width_log2 {
            return false;
        }
        if Self::bucket_count_for(self.span, self.width_log2 - 1) > self.config.max_buckets {
            return false;
        }
        self.width_log2 -= 1;
        debug!(
            "{split} of {samples} sampled buckets split, bucket width halved to 2^{}",
            self.width_log2
        );
        self.rebuild(source);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_list::NodeList;
    use crate::sampler::SamplerMock;
    use crate::time::beats;

    /// A bare list of times where each node governs `[time, next time)`.
    struct Points(NodeList<RationalTime>);

    impl Points {
        fn new(times: &[RationalTime]) -> Self {
            let mut list = NodeList::new();
            for time in times {
                list.push_back(*time);
            }
            Self(list)
        }

        fn oracle(&self, key: RationalTime) -> NodeId {
            let mut found = self.0.first();
            for (id, time) in self.0.iter() {
                if *time <= key {
                    found = id;
                }
            }
            found
        }
    }

    impl JumpSource for Points {
        type Key = RationalTime;

        fn head(&self) -> NodeId {
            self.0.head()
        }

        fn tail(&self) -> NodeId {
            self.0.tail()
        }

        fn end_and_next(&self, node: NodeId) -> Option<(Option<RationalTime>, NodeId)> {
            let next = self.0.next(node)?;
            Some((self.0.get(next).copied(), next))
        }

        fn advance(&self, node: NodeId, target: RationalTime) -> Option<NodeId> {
            let next = self.0.next(node)?;
            let time = self.0.get(next)?;
            (*time <= target).then_some(next)
        }
    }

    fn check_all(array: &JumpArray<RationalTime>, points: &Points, until: i64) {
        for whole in 0..until {
            for numerator in 0..12 {
                let key = beats(whole, numerator, 12);
                assert_eq!(
                    array.get_node_at(points, key),
                    points.oracle(key),
                    "lookup at {key}"
                );
            }
        }
    }

    #[test]
    fn test_lookup_matches_linear_scan() {
        let points = Points::new(&[
            beats(0, 0, 1),
            beats(0, 1, 3),
            beats(1, 0, 1),
            beats(1, 1, 7),
            beats(1, 2, 7),
            beats(4, 1, 2),
            beats(9, 0, 1),
        ]);
        let array = JumpArray::new(&points, beats(12, 0, 1), 7, JumpConfig::default());
        assert!(array.split_bucket_count() > 0);
        check_all(&array, &points, 12);
    }

    #[test]
    fn test_out_of_range_queries() {
        let points = Points::new(&[beats(0, 0, 1), beats(2, 0, 1)]);
        let array = JumpArray::new(&points, beats(4, 0, 1), 2, JumpConfig::default());
        assert_eq!(array.get_node_at(&points, beats(4, 0, 1)), points.0.tail());
        assert_eq!(array.get_node_at(&points, beats(100, 0, 1)), points.0.tail());
        assert_eq!(array.get_node_at(&points, beats(-1, 0, 1)), points.0.first());
    }

    #[test]
    fn test_degenerate_span() {
        let points = Points::new(&[beats(0, 0, 1)]);
        let array = JumpArray::new(&points, RationalTime::ZERO, 1, JumpConfig::default());
        assert!(array.is_degenerate());
        assert_eq!(array.get_node_at(&points, beats(3, 0, 1)), points.0.first());
    }

    #[test]
    fn test_incremental_update_equals_rebuild() {
        let mut points = Points::new(&[beats(0, 0, 1), beats(2, 0, 1), beats(5, 0, 1)]);
        let mut array = JumpArray::new(&points, beats(8, 0, 1), 3, JumpConfig::default());

        // Insert between 2 and 5.
        let two = points.0.next(points.0.first()).unwrap();
        let inserted = points.0.insert_after(two, beats(3, 1, 3)).unwrap();
        array.update_range(&points, two, inserted);
        let fresh = {
            let mut fresh = array.clone();
            fresh.rebuild(&points);
            fresh
        };
        assert_eq!(array, fresh);
        check_all(&array, &points, 8);

        // Delete the node at 2: the range of the node at 0 grows, so refill from the head.
        points.0.remove(two);
        array.update_range(&points, points.0.head(), inserted);
        let mut fresh = array.clone();
        fresh.rebuild(&points);
        assert_eq!(array, fresh);
        check_all(&array, &points, 8);
    }

    #[test]
    fn test_rebalance_halves_width() {
        let times: Vec<_> = (0..64).map(|i| beats(0, i, 8)).collect();
        let points = Points::new(&times);
        // Pretend the list is tiny so buckets start out wide and crowded.
        let mut array = JumpArray::new(&points, beats(8, 0, 1), 1, JumpConfig::default());
        let before = array.width_log2();
        let mut sampler = SamplerMock([0, 1, 2, 3]);
        let mut rebuilt = false;
        while array.update_average_beats_with(&points, &mut sampler) {
            rebuilt = true;
        }
        assert!(rebuilt);
        assert!(array.width_log2() < before);
        check_all(&array, &points, 8);
    }

    #[test]
    fn test_float_keys() {
        struct Seconds(NodeList<f64>);
        impl JumpSource for Seconds {
            type Key = f64;
            fn head(&self) -> NodeId {
                self.0.head()
            }
            fn tail(&self) -> NodeId {
                self.0.tail()
            }
            fn end_and_next(&self, node: NodeId) -> Option<(Option<f64>, NodeId)> {
                let next = self.0.next(node)?;
                Some((self.0.get(next).copied(), next))
            }
            fn advance(&self, node: NodeId, target: f64) -> Option<NodeId> {
                let next = self.0.next(node)?;
                (*self.0.get(next)? <= target).then_some(next)
            }
        }
        let mut list = NodeList::new();
        let a = list.push_back(0.0);
        let b = list.push_back(0.75);
        let c = list.push_back(2.5);
        let seconds = Seconds(list);
        let array = JumpArray::new(&seconds, 4.0, 3, JumpConfig::default());
        assert_eq!(array.get_node_at(&seconds, 0.5), a);
        assert_eq!(array.get_node_at(&seconds, 0.75), b);
        assert_eq!(array.get_node_at(&seconds, 2.49), b);
        assert_eq!(array.get_node_at(&seconds, 3.0), c);

        let mut array = array;
        assert!(!array.set_span(f64::INFINITY));
        assert!(array.set_span(3.5));
        assert_eq!(array.get_node_at(&seconds, 3.0), c);
        let unbounded = JumpArray::new(&seconds, f64::INFINITY, 3, JumpConfig::default());
        assert!(unbounded.is_degenerate());
        assert_eq!(unbounded.get_node_at(&seconds, 1.0), a);
    }
}
