//! Cached integrals of numeric sequences.
//!
//! Every start node caches `∫₀ᵗ value`, the area under the sequence from beat 0 up to its own
//! time. The integral at any beat is then the governing node's cache plus the area of one
//! partial segment, which the easing computes in closed form or by quadrature. Floor positions
//! are integrals of speed sequences.
//!
//! Caches go stale on any upstream edit. The editing methods of
//! [`EventNodeSequence`] refresh them; after editing through other means call
//! [`EventNodeSequence::update_nodes_integral_from`].

use crate::event::{EventEndNode, EventNodeSequence, EventStartNode, EventValue};
use crate::node_list::NodeId;
use crate::time::RationalTime;

fn segment_integral<V: EventValue>(
    start: &EventStartNode<V>,
    end: Option<&EventEndNode<V>>,
    upto: RationalTime,
) -> Option<f64> {
    let from = start.value.as_scalar()?;
    let elapsed = upto.scalar_beats_since(start.time);
    let Some(end) = end else {
        return Some(from * elapsed);
    };
    if upto <= start.time {
        return Some(from * elapsed);
    }
    let to = end.value.as_scalar()?;
    let Some(progress) = upto.progress_in(start.time, end.time) else {
        return Some(0.0);
    };
    let progress = num::ToPrimitive::to_f64(&progress).unwrap_or(1.0).min(1.0);
    let duration = end.time.scalar_beats_since(start.time);
    Some(from * elapsed + (to - from) * duration * start.easing.area(progress))
}

impl<V: EventValue> EventNodeSequence<V> {
    fn full_segment_integral(&self, start: NodeId) -> Option<f64> {
        let node = self.start_node(start).ok()?;
        let end = self.end_node(self.end_of(start)?).ok()?;
        segment_integral(node, Some(end), end.time)
    }

    /// Recomputes the cached integrals from the start node `start` to the end.
    pub(crate) fn refresh_integrals_from(&mut self, start: NodeId) {
        let first = self.first_start();
        if !self
            .start_node(first)
            .is_ok_and(|node| node.value.as_scalar().is_some())
        {
            return;
        }
        let mut acc = match self.previous_start(start) {
            Some(previous) => {
                self.start_node(previous)
                    .map_or(0.0, EventStartNode::cached_integral)
                    + self.full_segment_integral(previous).unwrap_or(0.0)
            }
            None => 0.0,
        };
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let full = self.full_segment_integral(id).unwrap_or(0.0);
            let next = self.end_of(id).and_then(|end| self.start_after(end));
            match self.start_node_mut(id) {
                Ok(node) => node.cached_integral = acc,
                Err(_) => break,
            }
            acc += full;
            cursor = next;
        }
    }

    /// Recomputes the cached integrals from the segment governing `beats` to the end.
    pub fn update_nodes_integral_from(&mut self, beats: RationalTime) {
        let node = self.get_node_at(beats, false);
        self.refresh_integrals_from(node);
    }

    /// `∫₀ᵇᵉᵃᵗˢ value`, the area under the sequence from beat 0.
    ///
    /// The value is held constant before the first node and after the final one. Sequences of
    /// non-numeric values integrate to 0.
    #[must_use]
    pub fn get_integral(&self, beats: RationalTime) -> f64 {
        let node = self.get_node_at(beats, false);
        let Ok(start) = self.start_node(node) else {
            return 0.0;
        };
        let end = self.end_of(node).and_then(|end| self.end_node(end).ok());
        start.cached_integral + segment_integral(start, end, beats).unwrap_or(0.0)
    }

    /// `∫ value` over `[from, to]`.
    #[must_use]
    pub fn integral_between(&self, from: RationalTime, to: RationalTime) -> f64 {
        self.get_integral(to) - self.get_integral(from)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::JumpConfig;
    use crate::easing::{Easing, NormalEasing};
    use crate::event::{EventNodeSequence, EventPair};
    use crate::time::{RationalTime, beats};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Speed 2 over [0, 2), 2 → 6 linearly over [2, 4), then 6.
    fn speeds() -> EventNodeSequence<f64> {
        let mut sequence = EventNodeSequence::new(2.0, beats(16, 0, 1), JumpConfig::default());
        let first = sequence.first_start();
        let second = sequence
            .insert(EventPair::new(beats(2, 0, 1), 2.0, 2.0, Easing::LINEAR), first)
            .unwrap();
        sequence
            .insert(EventPair::new(beats(4, 0, 1), 6.0, 6.0, Easing::LINEAR), second)
            .unwrap();
        sequence
    }

    #[test]
    fn test_integral_of_piecewise_linear() {
        let sequence = speeds();
        assert!(close(sequence.get_integral(RationalTime::ZERO), 0.0));
        assert!(close(sequence.get_integral(beats(1, 0, 1)), 2.0));
        assert!(close(sequence.get_integral(beats(2, 0, 1)), 4.0));
        // 4 + ∫₂³ (2 + 2(t - 2)) dt = 4 + 2 + 1
        assert!(close(sequence.get_integral(beats(3, 0, 1)), 7.0));
        assert!(close(sequence.get_integral(beats(4, 0, 1)), 12.0));
        assert!(close(sequence.get_integral(beats(5, 0, 1)), 18.0));
        assert!(close(sequence.get_integral(beats(-1, 0, 1)), -2.0));
        assert!(close(
            sequence.integral_between(beats(1, 0, 1), beats(3, 0, 1)),
            5.0
        ));
    }

    #[test]
    fn test_integrals_follow_edits() {
        let mut sequence = speeds();
        let first = sequence.first_start();
        sequence.set_start_value(first, 4.0).unwrap();
        // 4 → 2 over [0, 2) is 6, then as before.
        assert!(close(sequence.get_integral(beats(2, 0, 1)), 6.0));
        assert!(close(sequence.get_integral(beats(4, 0, 1)), 14.0));

        let second = sequence.get_node_at(beats(2, 0, 1), false);
        let end = sequence.nodes().previous(second).unwrap();
        let removed = sequence.remove_node_pair(end, second).unwrap();
        sequence.update_range(removed.reindex);
        // 4 → 6 over [0, 4) is 20.
        assert!(close(sequence.get_integral(beats(4, 0, 1)), 20.0));
    }

    #[test]
    fn test_integral_is_monotone_for_positive_values() {
        let mut sequence = speeds();
        let second = sequence.get_node_at(beats(2, 0, 1), false);
        sequence
            .set_easing(second, Easing::Normal(NormalEasing::ElasticOut))
            .unwrap();
        let mut previous = f64::NEG_INFINITY;
        for step in 0..=96 {
            let integral = sequence.get_integral(beats(0, step, 16));
            assert!(integral >= previous, "not monotone at step {step}");
            previous = integral;
        }
    }

    #[test]
    fn test_text_sequences_integrate_to_zero() {
        let sequence =
            EventNodeSequence::new("lyric".to_string(), beats(4, 0, 1), JumpConfig::default());
        assert_eq!(sequence.get_integral(beats(2, 0, 1)), 0.0);
    }
}
