//! Event node sequences, piecewise interpolated values over beats.
//!
//! A sequence is a linked list laid out as
//!
//! ```text
//! Head, Start₀, End₀, Start₁, End₁, …, Startₙ, Tail
//! ```
//!
//! Each `Startᵢ, Endᵢ` pair is a segment: the value moves from the start node's value to the end
//! node's value along the start node's [`Easing`]. An end node and the following start node share
//! one time, so a value may jump there. The final start node has no end and holds its value
//! forever.
//!
//! Segments govern `[start, end)`. Lookups with `use_previous` treat interior boundaries as
//! `(start, end]` instead, so that a value sampled exactly at a boundary is the end of the
//! segment before it.

pub mod integral;
pub mod records;

use std::fmt;

use log::{debug, warn};

use crate::config::JumpConfig;
use crate::easing::Easing;
use crate::error::SequenceError;
use crate::jump::{JumpArray, JumpSource};
use crate::node_list::{NodeId, NodeList};
use crate::time::RationalTime;

/// A value an event sequence can interpolate.
pub trait EventValue: Clone + fmt::Debug + PartialEq {
    /// The value `fraction` of the way from `start` to `end`.
    ///
    /// `fraction` is the eased progress. It is usually in `[0, 1]` but may leave it for easings
    /// that overshoot.
    fn interpolate(start: &Self, end: &Self, fraction: f64) -> Self;

    /// The value as a number, if it is one. Only numeric sequences cache integrals.
    fn as_scalar(&self) -> Option<f64> {
        None
    }
}

impl EventValue for f64 {
    fn interpolate(start: &Self, end: &Self, fraction: f64) -> Self {
        start + (end - start) * fraction
    }

    fn as_scalar(&self) -> Option<f64> {
        Some(*self)
    }
}

/// Text interpolates like a typewriter: when one string extends the other, characters appear
/// (or disappear) progressively. Unrelated strings switch at the end of the segment.
impl EventValue for String {
    fn interpolate(start: &Self, end: &Self, fraction: f64) -> Self {
        if fraction >= 1.0 {
            return end.clone();
        }
        if fraction <= 0.0 {
            return start.clone();
        }
        let (short, long, growing) = if end.starts_with(start.as_str()) {
            (start, end, true)
        } else if start.starts_with(end.as_str()) {
            (end, start, false)
        } else {
            return start.clone();
        };
        let short_len = short.chars().count();
        let extra = (long.chars().count() - short_len) as f64;
        let shown = if growing {
            (extra * fraction).floor()
        } else {
            (extra * (1.0 - fraction)).ceil()
        };
        long.chars().take(short_len + shown as usize).collect()
    }
}

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb(pub [u8; 3]);

impl EventValue for Rgb {
    fn interpolate(start: &Self, end: &Self, fraction: f64) -> Self {
        let mut channels = [0; 3];
        for ((channel, a), b) in channels.iter_mut().zip(start.0).zip(end.0) {
            let (a, b) = (f64::from(a), f64::from(b));
            *channel = (a + (b - a) * fraction).round().clamp(0.0, 255.0) as u8;
        }
        Self(channels)
    }
}

/// The node opening a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct EventStartNode<V> {
    pub(crate) time: RationalTime,
    pub(crate) value: V,
    pub(crate) easing: Easing,
    pub(crate) cached_integral: f64,
}

impl<V> EventStartNode<V> {
    /// Creates a start node.
    pub const fn new(time: RationalTime, value: V, easing: Easing) -> Self {
        Self {
            time,
            value,
            easing,
            cached_integral: 0.0,
        }
    }

    /// When the segment starts.
    #[must_use]
    pub const fn time(&self) -> RationalTime {
        self.time
    }

    /// The value at the start of the segment.
    #[must_use]
    pub const fn value(&self) -> &V {
        &self.value
    }

    /// How the segment interpolates.
    #[must_use]
    pub const fn easing(&self) -> &Easing {
        &self.easing
    }

    /// The integral of the sequence from beat 0 up to this node.
    ///
    /// Always 0 for sequences of non-numeric values.
    #[must_use]
    pub const fn cached_integral(&self) -> f64 {
        self.cached_integral
    }
}

/// The node closing a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEndNode<V> {
    pub(crate) time: RationalTime,
    pub(crate) value: V,
}

impl<V> EventEndNode<V> {
    /// Creates an end node.
    pub const fn new(time: RationalTime, value: V) -> Self {
        Self { time, value }
    }

    /// When the segment ends.
    #[must_use]
    pub const fn time(&self) -> RationalTime {
        self.time
    }

    /// The value reached at the end of the segment.
    #[must_use]
    pub const fn value(&self) -> &V {
        &self.value
    }
}

/// A node of an event sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum EventNode<V> {
    /// Opens a segment.
    Start(EventStartNode<V>),
    /// Closes a segment.
    End(EventEndNode<V>),
}

impl<V> EventNode<V> {
    /// The node's time.
    #[must_use]
    pub const fn time(&self) -> RationalTime {
        match self {
            Self::Start(start) => start.time,
            Self::End(end) => end.time,
        }
    }

    /// The node's value.
    #[must_use]
    pub const fn value(&self) -> &V {
        match self {
            Self::Start(start) => &start.value,
            Self::End(end) => &end.value,
        }
    }
}

/// An end node and the start node following it at the same time, the unit of insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPair<V> {
    /// Closes the segment being split.
    pub end: EventEndNode<V>,
    /// Opens the new segment.
    pub start: EventStartNode<V>,
}

impl<V> EventPair<V> {
    /// A pair at `time`, ending the split segment at `end_value` and starting the new one at
    /// `start_value`.
    pub const fn new(time: RationalTime, end_value: V, start_value: V, easing: Easing) -> Self {
        Self {
            end: EventEndNode::new(time, end_value),
            start: EventStartNode::new(time, start_value, easing),
        }
    }
}

/// Nodes whose index entries must be refilled after an edit.
///
/// Pass it to [`EventNodeSequence::update_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReindexRange {
    /// The last start node whose governed range did not change, or the head.
    pub first_exclusive: NodeId,
    /// The last start node whose governed range changed.
    pub last_inclusive: NodeId,
}

/// What [`EventNodeSequence::remove_node_pair`] took out.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedPair<V> {
    /// The removed pair.
    pub pair: EventPair<V>,
    /// The part of the index to refill.
    pub reindex: ReindexRange,
}

/// One segment yielded by [`EventNodeSequence::segments`].
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a, V> {
    /// Handle of the start node.
    pub id: NodeId,
    /// The start node.
    pub start: &'a EventStartNode<V>,
    /// The end node, `None` for the final start node.
    pub end: Option<&'a EventEndNode<V>>,
}

impl<V> JumpSource for NodeList<EventNode<V>> {
    type Key = RationalTime;

    fn head(&self) -> NodeId {
        Self::head(self)
    }

    fn tail(&self) -> NodeId {
        Self::tail(self)
    }

    fn end_and_next(&self, node: NodeId) -> Option<(Option<RationalTime>, NodeId)> {
        if self.is_head(node) {
            return Some((None, self.first()));
        }
        let end = self.next(node)?;
        match self.get(end) {
            Some(EventNode::End(end_node)) => Some((Some(end_node.time), self.next(end)?)),
            _ => Some((None, Self::tail(self))),
        }
    }

    fn advance(&self, node: NodeId, target: RationalTime) -> Option<NodeId> {
        let end = self.next(node)?;
        match self.get(end) {
            Some(EventNode::End(end_node)) if end_node.time <= target => self.next(end),
            _ => None,
        }
    }
}

/// A sequence of eased segments with a jump index over beats.
#[derive(Debug, Clone)]
pub struct EventNodeSequence<V> {
    nodes: NodeList<EventNode<V>>,
    jump: JumpArray<RationalTime>,
    effective_beats: RationalTime,
}

impl<V: EventValue> EventNodeSequence<V> {
    /// A sequence holding `value` forever.
    pub fn new(value: V, effective_beats: RationalTime, config: JumpConfig) -> Self {
        let mut nodes = NodeList::new();
        nodes.push_back(EventNode::Start(EventStartNode::new(
            RationalTime::ZERO,
            value,
            Easing::LINEAR,
        )));
        Self::from_nodes(nodes, effective_beats, config)
    }

    /// Wraps a list already laid out as start and end nodes, building the index and integrals.
    pub(crate) fn from_nodes(
        nodes: NodeList<EventNode<V>>,
        effective_beats: RationalTime,
        config: JumpConfig,
    ) -> Self {
        let expected = nodes.len() / 2 + 1;
        let jump = JumpArray::new(&nodes, effective_beats, expected, config);
        let mut sequence = Self {
            nodes,
            jump,
            effective_beats,
        };
        let first = sequence.nodes.first();
        sequence.refresh_integrals_from(first);
        sequence
    }

    /// The underlying list.
    #[must_use]
    pub const fn nodes(&self) -> &NodeList<EventNode<V>> {
        &self.nodes
    }

    pub(crate) const fn nodes_mut(&mut self) -> &mut NodeList<EventNode<V>> {
        &mut self.nodes
    }

    /// The beat index.
    #[must_use]
    pub const fn jump(&self) -> &JumpArray<RationalTime> {
        &self.jump
    }

    /// Number of segments with an end node.
    #[must_use]
    pub const fn segment_count(&self) -> usize {
        self.nodes.len() / 2
    }

    /// Whether the sequence is a single start node holding one value.
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// The span the index covers.
    #[must_use]
    pub const fn effective_beats(&self) -> RationalTime {
        self.effective_beats
    }

    /// Changes the span the index covers and rebuilds it.
    pub fn set_effective_beats(&mut self, effective_beats: RationalTime) {
        self.effective_beats = effective_beats;
        let expected = self.segment_count() + 1;
        self.jump.reset(&self.nodes, effective_beats, expected);
    }

    /// The start node at `id`.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not live or is an end node.
    pub fn start_node(&self, id: NodeId) -> Result<&EventStartNode<V>, SequenceError> {
        match self.nodes.get(id) {
            Some(EventNode::Start(start)) => Ok(start),
            Some(EventNode::End(_)) => Err(SequenceError::NotAStartNode(id)),
            None => Err(SequenceError::DetachedNode(id)),
        }
    }

    /// The end node at `id`.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not live or is a start node.
    pub fn end_node(&self, id: NodeId) -> Result<&EventEndNode<V>, SequenceError> {
        match self.nodes.get(id) {
            Some(EventNode::End(end)) => Ok(end),
            Some(EventNode::Start(_)) => Err(SequenceError::NotAnEndNode(id)),
            None => Err(SequenceError::DetachedNode(id)),
        }
    }

    pub(crate) fn start_node_mut(
        &mut self,
        id: NodeId,
    ) -> Result<&mut EventStartNode<V>, SequenceError> {
        match self.nodes.get_mut(id) {
            Some(EventNode::Start(start)) => Ok(start),
            Some(EventNode::End(_)) => Err(SequenceError::NotAStartNode(id)),
            None => Err(SequenceError::DetachedNode(id)),
        }
    }

    fn time_of(&self, id: NodeId) -> Option<RationalTime> {
        self.nodes.get(id).map(EventNode::time)
    }

    /// The first start node.
    #[must_use]
    pub fn first_start(&self) -> NodeId {
        self.nodes.first()
    }

    /// The final start node, the one without an end.
    #[must_use]
    pub fn last_start(&self) -> NodeId {
        self.nodes.last()
    }

    /// The end node closing the segment opened by `start`.
    #[must_use]
    pub fn end_of(&self, start: NodeId) -> Option<NodeId> {
        let end = self.nodes.next(start)?;
        matches!(self.nodes.get(end), Some(EventNode::End(_))).then_some(end)
    }

    /// The start node opening the segment before the one opened by `start`.
    #[must_use]
    pub fn previous_start(&self, start: NodeId) -> Option<NodeId> {
        let end = self.nodes.previous(start)?;
        let previous = self.nodes.previous(end)?;
        matches!(self.nodes.get(previous), Some(EventNode::Start(_))).then_some(previous)
    }

    /// The start node following the end node `end`.
    #[must_use]
    pub fn start_after(&self, end: NodeId) -> Option<NodeId> {
        let start = self.nodes.next(end)?;
        matches!(self.nodes.get(start), Some(EventNode::Start(_))).then_some(start)
    }

    /// Iterates the start nodes in order.
    pub fn start_nodes(&self) -> impl Iterator<Item = (NodeId, &EventStartNode<V>)> {
        self.nodes.iter().filter_map(|(id, node)| match node {
            EventNode::Start(start) => Some((id, start)),
            EventNode::End(_) => None,
        })
    }

    fn scan_node_at(&self, beats: RationalTime) -> NodeId {
        let mut found = self.first_start();
        if beats < RationalTime::ZERO {
            warn!("event sequence queried at negative time {beats:?}, returning the first node");
            return found;
        }
        for (id, start) in self.start_nodes() {
            if start.time > beats {
                break;
            }
            found = id;
        }
        found
    }

    /// Finds the start node governing `beats`.
    ///
    /// Times before the first node clamp to it and times past the last segment resolve to the
    /// final start node. With `use_previous`, a time exactly on an interior boundary resolves to
    /// the segment ending there.
    #[must_use]
    pub fn get_node_at(&self, beats: RationalTime, use_previous: bool) -> NodeId {
        let first = self.first_start();
        if self.is_constant() {
            return first;
        }
        let mut node = if self.jump.is_degenerate() {
            self.scan_node_at(beats)
        } else {
            self.jump.get_node_at(&self.nodes, beats)
        };
        if self.nodes.is_tail(node) {
            // Segments may extend past the indexed span.
            node = self.last_start();
            while let Some(previous) = self.previous_start(node) {
                if self.time_of(node).is_some_and(|time| time <= beats) {
                    break;
                }
                node = previous;
            }
        } else if !self.nodes.contains(node) {
            debug!("index pointed at a removed node for {beats}, scanning the sequence");
            node = self.scan_node_at(beats);
        }
        if use_previous && node != first && self.time_of(node) == Some(beats) {
            if let Some(previous) = self.previous_start(node) {
                node = previous;
            }
        }
        node
    }

    /// The interpolated value at `beats`.
    ///
    /// See [`Self::get_node_at`] for how boundaries resolve.
    #[must_use]
    pub fn get_value_at(&self, beats: RationalTime, use_previous: bool) -> V {
        let node = self.get_node_at(beats, use_previous);
        let Ok(start) = self.start_node(node) else {
            unreachable!("get_node_at always resolves to a live start node");
        };
        let Some(end) = self.end_of(node).and_then(|end| self.end_node(end).ok()) else {
            return start.value.clone();
        };
        let Some(progress) = beats.progress_in(start.time, end.time) else {
            return end.value.clone();
        };
        let progress = progress.clamp(num::zero(), num::one());
        V::interpolate(&start.value, &end.value, start.easing.ease(progress))
    }

    /// Splices `pair` into the segment opened by `after`, splitting it in two.
    ///
    /// The pair's time must lie strictly inside the segment. The index and the integrals are
    /// refreshed. Returns the new start node.
    ///
    /// # Errors
    ///
    /// Fails if the pair's nodes disagree on time, `after` is not a live start node, the time
    /// is outside the segment, or either half of the split segment is too long to measure
    /// exactly.
    pub fn insert(&mut self, pair: EventPair<V>, after: NodeId) -> Result<NodeId, SequenceError> {
        let time = pair.start.time;
        if pair.end.time != time {
            return Err(SequenceError::MisalignedPair {
                end: pair.end.time,
                start: time,
            });
        }
        let segment_start = self.start_node(after)?.time;
        let segment_end = self.end_of(after).and_then(|end| self.time_of(end));
        if !(segment_start < time && segment_end.is_none_or(|end| time < end)) {
            return Err(SequenceError::OutsideSegment {
                time,
                segment_start,
            });
        }
        time.checked_sub(segment_start)?;
        if let Some(end) = segment_end {
            end.checked_sub(time)?;
        }
        let end = self
            .nodes
            .insert_after(after, EventNode::End(pair.end))
            .ok_or(SequenceError::DetachedNode(after))?;
        let start = self
            .nodes
            .insert_after(end, EventNode::Start(pair.start))
            .ok_or(SequenceError::DetachedNode(after))?;
        self.jump.update_range(&self.nodes, after, start);
        self.jump.update_average_beats(&self.nodes);
        self.refresh_integrals_from(after);
        Ok(start)
    }

    /// Inserts a pair at `time`, into whichever segment governs it.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::insert`], notably if `time` is already a segment boundary.
    pub fn insert_at(&mut self, pair: EventPair<V>) -> Result<NodeId, SequenceError> {
        let after = self.get_node_at(pair.start.time, false);
        self.insert(pair, after)
    }

    /// Unlinks the end node `end` and the start node `start` right after it, merging their
    /// segments.
    ///
    /// The integrals are refreshed but the index is not: pass the returned range to
    /// [`Self::update_range`] before the next lookup.
    ///
    /// # Errors
    ///
    /// Fails if the nodes are not an adjacent end and start node of this sequence.
    pub fn remove_node_pair(
        &mut self,
        end: NodeId,
        start: NodeId,
    ) -> Result<RemovedPair<V>, SequenceError> {
        self.end_node(end)?;
        self.start_node(start)?;
        if self.nodes.next(end) != Some(start) {
            return Err(SequenceError::NotAdjacent { end, start });
        }
        let grown = self
            .nodes
            .previous(end)
            .ok_or(SequenceError::DetachedNode(end))?;
        let first_exclusive = self
            .previous_start(grown)
            .unwrap_or_else(|| self.nodes.head());
        let Some(EventNode::End(end_node)) = self.nodes.remove(end) else {
            return Err(SequenceError::DetachedNode(end));
        };
        let Some(EventNode::Start(start_node)) = self.nodes.remove(start) else {
            return Err(SequenceError::DetachedNode(start));
        };
        self.refresh_integrals_from(grown);
        Ok(RemovedPair {
            pair: EventPair {
                end: end_node,
                start: start_node,
            },
            reindex: ReindexRange {
                first_exclusive,
                last_inclusive: grown,
            },
        })
    }

    /// Refills the index entries of the nodes in `range`.
    pub fn update_range(&mut self, range: ReindexRange) {
        self.jump
            .update_range(&self.nodes, range.first_exclusive, range.last_inclusive);
    }

    /// Rebuilds the whole index.
    pub fn rebuild_jump(&mut self) {
        self.jump.rebuild(&self.nodes);
    }

    /// Narrows the index buckets if they became crowded. Returns whether it rebuilt.
    pub fn update_jump(&mut self) -> bool {
        self.jump.update_average_beats(&self.nodes)
    }

    /// Sets the value a segment starts at.
    ///
    /// # Errors
    ///
    /// Fails if `start` is not a live start node.
    pub fn set_start_value(&mut self, start: NodeId, value: V) -> Result<(), SequenceError> {
        self.start_node_mut(start)?.value = value;
        self.refresh_integrals_from(start);
        Ok(())
    }

    /// Sets the value a segment ends at.
    ///
    /// # Errors
    ///
    /// Fails if `end` is not a live end node.
    pub fn set_end_value(&mut self, end: NodeId, value: V) -> Result<(), SequenceError> {
        match self.nodes.get_mut(end) {
            Some(EventNode::End(node)) => node.value = value,
            Some(EventNode::Start(_)) => return Err(SequenceError::NotAnEndNode(end)),
            None => return Err(SequenceError::DetachedNode(end)),
        }
        if let Some(start) = self.nodes.previous(end) {
            self.refresh_integrals_from(start);
        }
        Ok(())
    }

    /// Sets how a segment interpolates.
    ///
    /// # Errors
    ///
    /// Fails if `start` is not a live start node.
    pub fn set_easing(&mut self, start: NodeId, easing: Easing) -> Result<(), SequenceError> {
        self.start_node_mut(start)?.easing = easing;
        self.refresh_integrals_from(start);
        Ok(())
    }

    /// Moves the boundary formed by `end` and `start` to `time`.
    ///
    /// The pair is taken out and spliced into whichever segment governs `time`, keeping values
    /// and easing. Returns the new start node. On failure the pair is put back where it was.
    ///
    /// # Errors
    ///
    /// Fails if the nodes are not an adjacent pair or `time` cannot be inserted where it lands.
    pub fn set_pair_time(
        &mut self,
        end: NodeId,
        start: NodeId,
        time: RationalTime,
    ) -> Result<NodeId, SequenceError> {
        let removed = self.remove_node_pair(end, start)?;
        self.update_range(removed.reindex);
        let original = removed.pair.start.time;
        let mut pair = removed.pair;
        pair.end.time = time;
        pair.start.time = time;
        match self.insert_at(pair.clone()) {
            Ok(start) => Ok(start),
            Err(err) => {
                pair.end.time = original;
                pair.start.time = original;
                self.insert_at(pair)?;
                Err(err)
            }
        }
    }

    /// Iterates the segments overlapping `[from, to)`, starting with the one governing `from`.
    #[must_use]
    pub fn segments(&self, from: RationalTime, to: RationalTime) -> Segments<'_, V> {
        Segments {
            nodes: &self.nodes,
            cursor: Some(self.get_node_at(from, false)),
            until: to,
            first: true,
        }
    }
}

/// Iterator returned by [`EventNodeSequence::segments`].
pub struct Segments<'a, V> {
    nodes: &'a NodeList<EventNode<V>>,
    cursor: Option<NodeId>,
    until: RationalTime,
    first: bool,
}

impl<'a, V> Iterator for Segments<'a, V> {
    type Item = Segment<'a, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let Some(EventNode::Start(start)) = self.nodes.get(id) else {
            self.cursor = None;
            return None;
        };
        if !self.first && start.time >= self.until {
            self.cursor = None;
            return None;
        }
        self.first = false;
        let end_id = self.nodes.next(id);
        let end = match end_id.and_then(|end| self.nodes.get(end)) {
            Some(EventNode::End(end)) => Some(end),
            _ => None,
        };
        self.cursor = end
            .and(end_id)
            .and_then(|end| self.nodes.next(end));
        Some(Segment { id, start, end })
    }
}
