//! The tempo map: conversion between beats and seconds.
//!
//! A [`BpmSequence`] is an event sequence of constant segments, one per tempo change. Its start
//! nodes cache the elapsed seconds at their own beat instead of the plain integral, and a second
//! [`JumpArray`] keyed by those seconds serves the reverse conversion. Both directions therefore
//! cost one jump plus one linear step.

use std::time::Duration;

use gametime::TimeSpan;
use strict_num_extended::PositiveF64;

use crate::config::JumpConfig;
use crate::easing::Easing;
use crate::error::{SequenceError, TempoError};
use crate::event::{EventEndNode, EventNode, EventNodeSequence, EventPair, EventStartNode};
use crate::jump::{JumpArray, JumpSource};
use crate::node_list::{NodeId, NodeList};
use crate::time::RationalTime;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// A tempo change.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BpmPoint {
    /// Where the tempo takes effect.
    pub time: RationalTime,
    /// Beats per minute from here on.
    pub bpm: PositiveF64,
}

impl BpmPoint {
    /// Validates a raw tempo value.
    ///
    /// # Errors
    ///
    /// Fails with [`TempoError::InvalidBpm`] unless `bpm` is positive and finite.
    pub fn new(time: RationalTime, bpm: f64) -> Result<Self, TempoError> {
        let bpm = PositiveF64::new(bpm)
            .ok()
            .filter(|bpm| bpm.as_f64().is_finite())
            .ok_or(TempoError::InvalidBpm(bpm))?;
        Ok(Self { time, bpm })
    }
}

/// Start nodes keyed by their cached seconds.
struct SecondsView<'a>(&'a NodeList<EventNode<f64>>);

impl SecondsView<'_> {
    fn seconds(&self, id: NodeId) -> Option<f64> {
        match self.0.get(id)? {
            EventNode::Start(start) => Some(start.cached_integral()),
            EventNode::End(_) => None,
        }
    }

    fn next_start(&self, start: NodeId) -> Option<NodeId> {
        let end = self.0.next(start)?;
        match self.0.get(end) {
            Some(EventNode::End(_)) => self.0.next(end),
            _ => None,
        }
    }
}

impl JumpSource for SecondsView<'_> {
    type Key = f64;

    fn head(&self) -> NodeId {
        self.0.head()
    }

    fn tail(&self) -> NodeId {
        self.0.tail()
    }

    fn end_and_next(&self, node: NodeId) -> Option<(Option<f64>, NodeId)> {
        if self.0.is_head(node) {
            return Some((None, self.0.first()));
        }
        self.0.get(node)?;
        match self.next_start(node) {
            Some(next) => Some((self.seconds(next), next)),
            None => Some((None, self.0.tail())),
        }
    }

    fn advance(&self, node: NodeId, target: f64) -> Option<NodeId> {
        let next = self.next_start(node)?;
        (self.seconds(next)? <= target).then_some(next)
    }
}

/// The tempo map of a chart.
#[derive(Debug, Clone)]
pub struct BpmSequence {
    sequence: EventNodeSequence<f64>,
    seconds_jump: JumpArray<f64>,
}

impl BpmSequence {
    /// Builds a tempo map from its changes.
    ///
    /// # Errors
    ///
    /// Fails if there are no points, the first is not at beat 0, or they are not strictly
    /// increasing in time.
    pub fn new(
        points: &[BpmPoint],
        effective_beats: RationalTime,
        config: JumpConfig,
    ) -> Result<Self, TempoError> {
        let Some(first) = points.first() else {
            return Err(TempoError::Empty);
        };
        if first.time != RationalTime::ZERO {
            return Err(TempoError::NotStartingAtZero(first.time));
        }
        let mut nodes = NodeList::new();
        for (index, point) in points.iter().enumerate() {
            let bpm = point.bpm.as_f64();
            nodes.push_back(EventNode::Start(EventStartNode::new(
                point.time,
                bpm,
                Easing::FIXED,
            )));
            if let Some(next) = points.get(index + 1) {
                if next.time <= point.time {
                    return Err(TempoError::Unordered {
                        previous: point.time,
                        next: next.time,
                    });
                }
                nodes.push_back(EventNode::End(EventEndNode::new(next.time, bpm)));
            }
        }
        let sequence = EventNodeSequence::from_nodes(nodes, effective_beats, config);
        let seconds_jump = JumpArray::new(&SecondsView(sequence.nodes()), 0.0, 1, config);
        let mut tempo = Self {
            sequence,
            seconds_jump,
        };
        let first = tempo.sequence.first_start();
        tempo.refresh_seconds_from(first);
        Ok(tempo)
    }

    /// A tempo map with one tempo throughout.
    #[must_use]
    pub fn constant(bpm: PositiveF64, effective_beats: RationalTime, config: JumpConfig) -> Self {
        let sequence = EventNodeSequence::new(bpm.as_f64(), effective_beats, config);
        let seconds_jump = JumpArray::new(&SecondsView(sequence.nodes()), 0.0, 1, config);
        let mut tempo = Self {
            sequence,
            seconds_jump,
        };
        tempo.reindex_seconds();
        tempo
    }

    /// The underlying sequence of tempo values.
    #[must_use]
    pub const fn sequence(&self) -> &EventNodeSequence<f64> {
        &self.sequence
    }

    /// The seconds index.
    #[must_use]
    pub const fn seconds_jump(&self) -> &JumpArray<f64> {
        &self.seconds_jump
    }

    /// The tempo changes, in order.
    #[must_use]
    pub fn points(&self) -> Vec<BpmPoint> {
        self.sequence
            .start_nodes()
            .filter_map(|(_, start)| {
                Some(BpmPoint {
                    time: start.time(),
                    bpm: PositiveF64::new(*start.value()).ok()?,
                })
            })
            .collect()
    }

    /// Recomputes the seconds cached at `start` and every later node, then refills the seconds
    /// index from `start` on.
    fn refresh_seconds_from(&mut self, start: NodeId) {
        let first_exclusive = self
            .sequence
            .previous_start(start)
            .unwrap_or_else(|| self.sequence.nodes().head());
        let mut acc = match self.sequence.previous_start(start) {
            Some(previous) => self.segment_end_seconds(previous),
            None => 0.0,
        };
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let Ok(node) = self.sequence.start_node_mut(id) else {
                break;
            };
            node.cached_integral = acc;
            acc = self.segment_end_seconds(id);
            cursor = self
                .sequence
                .end_of(id)
                .and_then(|end| self.sequence.start_after(end));
        }
        self.update_seconds_index(first_exclusive);
    }

    /// Refills the seconds index after `first_exclusive`, whose own range did not move.
    ///
    /// The buckets are only resized when the span in seconds needs a different number of them.
    fn update_seconds_index(&mut self, first_exclusive: NodeId) {
        let span = self.to_seconds(self.sequence.effective_beats());
        if !self.seconds_jump.set_span(span) {
            self.reindex_seconds();
            return;
        }
        let view = SecondsView(self.sequence.nodes());
        let tail = view.tail();
        self.seconds_jump.update_range(&view, first_exclusive, tail);
        self.seconds_jump.update_average_beats(&view);
    }

    /// Seconds elapsed at the end of the segment opened by `start`.
    fn segment_end_seconds(&self, start: NodeId) -> f64 {
        let Ok(node) = self.sequence.start_node(start) else {
            return 0.0;
        };
        let end = self
            .sequence
            .end_of(start)
            .and_then(|end| self.sequence.end_node(end).ok())
            .map_or(node.time(), EventEndNode::time);
        node.cached_integral() + seconds_per(end.scalar_beats_since(node.time()), *node.value())
    }

    /// Rebuilds the whole seconds index.
    pub fn rebuild_seconds_jump(&mut self) {
        self.seconds_jump
            .rebuild(&SecondsView(self.sequence.nodes()));
    }

    fn reindex_seconds(&mut self) {
        let span = self.to_seconds(self.sequence.effective_beats());
        let expected = self.sequence.segment_count() + 1;
        self.seconds_jump
            .reset(&SecondsView(self.sequence.nodes()), span, expected);
    }

    /// The tempo in effect at `beats`.
    #[must_use]
    pub fn bpm_at(&self, beats: RationalTime) -> f64 {
        self.sequence.get_value_at(beats, false)
    }

    /// Seconds elapsed from beat 0 to `beats`.
    #[must_use]
    pub fn to_seconds(&self, beats: RationalTime) -> f64 {
        let node = self.sequence.get_node_at(beats, false);
        let Ok(start) = self.sequence.start_node(node) else {
            return 0.0;
        };
        start.cached_integral() + seconds_per(beats.scalar_beats_since(start.time()), *start.value())
    }

    fn scan_seconds(&self, seconds: f64) -> NodeId {
        let mut found = self.sequence.first_start();
        for (id, start) in self.sequence.start_nodes() {
            if start.cached_integral() > seconds {
                break;
            }
            found = id;
        }
        found
    }

    /// The beat reached after `seconds`.
    #[must_use]
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        let view = SecondsView(self.sequence.nodes());
        let nodes = self.sequence.nodes();
        let node = if self.sequence.is_constant() {
            self.sequence.first_start()
        } else if self.seconds_jump.is_degenerate() || seconds < 0.0 {
            self.scan_seconds(seconds)
        } else {
            let node = self.seconds_jump.get_node_at(&view, seconds);
            if nodes.is_tail(node) || !nodes.contains(node) {
                self.scan_seconds(seconds)
            } else {
                node
            }
        };
        let Ok(start) = self.sequence.start_node(node) else {
            return 0.0;
        };
        start.time().to_scalar_beats() + (seconds - start.cached_integral()) * start.value() / 60.0
    }

    /// [`Self::to_seconds`] as a time span, clamped at zero.
    #[must_use]
    pub fn time_span_at(&self, beats: RationalTime) -> TimeSpan {
        let nanos = (self.to_seconds(beats) * NANOS_PER_SECOND).round().max(0.0);
        TimeSpan::from_duration(Duration::from_nanos(nanos as u64))
    }

    /// [`Self::seconds_to_beats`] for a time span.
    #[must_use]
    pub fn beats_at_time_span(&self, span: TimeSpan) -> f64 {
        self.seconds_to_beats(span.as_nanos() as f64 / NANOS_PER_SECOND)
    }

    /// Seconds elapsed at the end of the indexed span.
    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.seconds_jump.span()
    }

    /// Changes the indexed span.
    pub fn set_effective_beats(&mut self, effective_beats: RationalTime) {
        self.sequence.set_effective_beats(effective_beats);
        self.reindex_seconds();
    }

    /// Changes the tempo of the change at `start`.
    ///
    /// # Errors
    ///
    /// Fails if `start` is not a tempo change of this map.
    pub fn set_bpm(&mut self, start: NodeId, bpm: PositiveF64) -> Result<(), SequenceError> {
        let bpm = bpm.as_f64();
        self.sequence.set_start_value(start, bpm)?;
        if let Some(end) = self.sequence.end_of(start) {
            self.sequence.set_end_value(end, bpm)?;
        }
        self.refresh_seconds_from(start);
        Ok(())
    }

    /// Adds a tempo change inside an existing tempo's range.
    ///
    /// # Errors
    ///
    /// Fails if a change already exists at that time.
    pub fn insert_point(&mut self, point: BpmPoint) -> Result<NodeId, SequenceError> {
        let after = self.sequence.get_node_at(point.time, false);
        let previous = *self.sequence.start_node(after)?.value();
        let bpm = point.bpm.as_f64();
        let start = self
            .sequence
            .insert(EventPair::new(point.time, previous, bpm, Easing::FIXED), after)?;
        // The split segment's old end now closes the new one.
        if let Some(end) = self.sequence.end_of(start) {
            self.sequence.set_end_value(end, bpm)?;
        }
        self.refresh_seconds_from(after);
        Ok(start)
    }

    /// Removes the tempo change at `start`; the previous tempo extends over its range.
    ///
    /// # Errors
    ///
    /// Fails with [`SequenceError::FirstSegment`] for the change at beat 0.
    pub fn remove_point(&mut self, start: NodeId) -> Result<BpmPoint, SequenceError> {
        if start == self.sequence.first_start() {
            return Err(SequenceError::FirstSegment);
        }
        let end = self
            .sequence
            .nodes()
            .previous(start)
            .ok_or(SequenceError::DetachedNode(start))?;
        let removed = self.sequence.remove_node_pair(end, start)?;
        self.sequence.update_range(removed.reindex);
        let grown = removed.reindex.last_inclusive;
        let bpm = *self.sequence.start_node(grown)?.value();
        if let Some(grown_end) = self.sequence.end_of(grown) {
            self.sequence.set_end_value(grown_end, bpm)?;
        }
        self.refresh_seconds_from(grown);
        Ok(BpmPoint {
            time: removed.pair.start.time(),
            bpm: PositiveF64::new(*removed.pair.start.value())
                .map_err(|_| SequenceError::InvalidBpm(*removed.pair.start.value()))?,
        })
    }
}

fn seconds_per(beats: f64, bpm: f64) -> f64 {
    beats * 60.0 / bpm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::beats;
    use pretty_assertions::assert_eq;

    fn point(time: RationalTime, bpm: f64) -> BpmPoint {
        BpmPoint::new(time, bpm).unwrap()
    }

    fn two_tempos() -> BpmSequence {
        BpmSequence::new(
            &[point(RationalTime::ZERO, 120.0), point(beats(4, 0, 1), 240.0)],
            beats(16, 0, 1),
            JumpConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_beats_to_seconds() {
        let tempo = two_tempos();
        assert_eq!(tempo.to_seconds(RationalTime::ZERO), 0.0);
        assert_eq!(tempo.to_seconds(beats(2, 0, 1)), 1.0);
        assert_eq!(tempo.to_seconds(beats(4, 0, 1)), 2.0);
        assert_eq!(tempo.to_seconds(beats(8, 0, 1)), 3.0);
        assert_eq!(tempo.duration_seconds(), 5.0);
    }

    #[test]
    fn test_seconds_to_beats() {
        let tempo = two_tempos();
        assert_eq!(tempo.seconds_to_beats(1.0), 2.0);
        assert_eq!(tempo.seconds_to_beats(2.0), 4.0);
        assert_eq!(tempo.seconds_to_beats(3.0), 8.0);
        // Past the indexed span the last tempo continues.
        assert_eq!(tempo.seconds_to_beats(6.0), 20.0);
        assert_eq!(tempo.seconds_to_beats(-1.0), -2.0);
    }

    #[test]
    fn test_time_spans() {
        let tempo = two_tempos();
        assert_eq!(
            tempo.time_span_at(beats(8, 0, 1)),
            TimeSpan::from_duration(Duration::from_secs(3))
        );
        assert_eq!(
            tempo.beats_at_time_span(TimeSpan::from_duration(Duration::from_millis(500))),
            1.0
        );
    }

    #[test]
    fn test_invalid_points() {
        assert_eq!(
            BpmSequence::new(&[], beats(4, 0, 1), JumpConfig::default()).err(),
            Some(TempoError::Empty)
        );
        assert_eq!(
            BpmSequence::new(
                &[point(beats(1, 0, 1), 120.0)],
                beats(4, 0, 1),
                JumpConfig::default()
            )
            .err(),
            Some(TempoError::NotStartingAtZero(beats(1, 0, 1)))
        );
        assert!(matches!(
            BpmSequence::new(
                &[
                    point(RationalTime::ZERO, 120.0),
                    point(beats(2, 0, 1), 90.0),
                    point(beats(2, 0, 1), 60.0)
                ],
                beats(4, 0, 1),
                JumpConfig::default()
            ),
            Err(TempoError::Unordered { .. })
        ));
        assert_eq!(
            BpmPoint::new(RationalTime::ZERO, -1.0),
            Err(TempoError::InvalidBpm(-1.0))
        );
        assert!(BpmPoint::new(RationalTime::ZERO, f64::INFINITY).is_err());
    }

    fn assert_seconds_index_fresh(tempo: &BpmSequence) {
        let mut rebuilt = tempo.seconds_jump().clone();
        rebuilt.rebuild(&SecondsView(tempo.sequence().nodes()));
        assert_eq!(tempo.seconds_jump(), &rebuilt);
    }

    #[test]
    fn test_tempo_edits() {
        let mut tempo = two_tempos();
        let second = tempo.sequence().last_start();
        tempo
            .set_bpm(second, PositiveF64::new(60.0).unwrap())
            .unwrap();
        assert_eq!(tempo.to_seconds(beats(5, 0, 1)), 3.0);
        assert_eq!(tempo.seconds_to_beats(3.0), 5.0);
        assert_seconds_index_fresh(&tempo);

        let third = tempo.insert_point(point(beats(8, 0, 1), 120.0)).unwrap();
        assert_eq!(tempo.bpm_at(beats(6, 0, 1)), 60.0);
        assert_eq!(tempo.to_seconds(beats(10, 0, 1)), 7.0);
        assert_eq!(tempo.seconds_to_beats(7.0), 10.0);
        assert_seconds_index_fresh(&tempo);

        let removed = tempo.remove_point(second).unwrap();
        assert_eq!(removed.time, beats(4, 0, 1));
        assert_eq!(tempo.to_seconds(beats(8, 0, 1)), 4.0);
        assert_eq!(tempo.seconds_to_beats(5.0), 10.0);
        assert_seconds_index_fresh(&tempo);
        assert_eq!(
            tempo.remove_point(tempo.sequence().first_start()),
            Err(SequenceError::FirstSegment)
        );
        assert_eq!(tempo.points().len(), 2);
        assert!(tempo.sequence().nodes().contains(third));
    }

    #[test]
    fn test_removing_a_corrupt_tempo() {
        let mut tempo = two_tempos();
        let second = tempo.sequence().last_start();
        tempo.sequence.set_start_value(second, -1.0).unwrap();
        assert_eq!(
            tempo.remove_point(second),
            Err(SequenceError::InvalidBpm(-1.0))
        );
        // The change is gone even though it could not be handed back.
        assert_eq!(tempo.points().len(), 1);
        assert_eq!(tempo.to_seconds(beats(8, 0, 1)), 4.0);
        assert_seconds_index_fresh(&tempo);
    }

    #[test]
    fn test_edit_keeps_seconds_buckets() {
        let mut tempo = two_tempos();
        // 2 s at 120 bpm, then 12 beats at 240 bpm: 5 s in buckets of 2 s.
        assert_eq!(tempo.seconds_jump().bucket_count(), 3);
        let second = tempo.sequence().last_start();
        tempo
            .set_bpm(second, PositiveF64::new(250.0).unwrap())
            .unwrap();
        assert_eq!(tempo.seconds_jump().bucket_count(), 3);
        assert!((tempo.duration_seconds() - 4.88).abs() < 1e-12);
        assert!((tempo.seconds_to_beats(3.0) - (4.0 + 250.0 / 60.0)).abs() < 1e-12);
        assert_seconds_index_fresh(&tempo);
    }

    #[test]
    fn test_constant_tempo() {
        let tempo = BpmSequence::constant(
            PositiveF64::new(150.0).unwrap(),
            beats(4, 0, 1),
            JumpConfig::default(),
        );
        assert_eq!(tempo.to_seconds(beats(5, 0, 1)), 2.0);
        assert_eq!(tempo.seconds_to_beats(2.0), 5.0);
    }
}
