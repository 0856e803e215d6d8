//! Importing sequences from flat event records and exporting them back.
//!
//! Charts store events as independent `(start, end)` records. Importing sorts them, rejects
//! overlaps and fills every gap with a constant segment holding the previous end value, so the
//! resulting sequence is gapless from beat 0.

use crate::config::JumpConfig;
use crate::easing::{Easing, EasingRecord, TemplateEasingLib};
use crate::error::SequenceError;
use crate::event::{EventEndNode, EventNode, EventNodeSequence, EventStartNode, EventValue};
use crate::node_list::NodeList;
use crate::time::RationalTime;

/// One event as stored in a chart file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventRecord<V> {
    /// When the event starts.
    pub start_time: RationalTime,
    /// When the event ends.
    pub end_time: RationalTime,
    /// The value at the start.
    pub start: V,
    /// The value at the end.
    pub end: V,
    /// How the value moves.
    #[cfg_attr(feature = "serde", serde(default))]
    pub easing: EasingRecord,
}

/// A whole sequence as stored in a chart file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SequenceRecord<V> {
    /// The events, in any order.
    pub events: Vec<EventRecord<V>>,
    /// The value held after the last event, if it differs from the last end value.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub final_value: Option<V>,
}

impl<V> SequenceRecord<V> {
    /// A record holding `value` forever.
    pub const fn constant(value: V) -> Self {
        Self {
            events: Vec::new(),
            final_value: Some(value),
        }
    }
}

impl<V: EventValue> EventNodeSequence<V> {
    /// Builds a sequence from its records, resolving template easings in `library`.
    ///
    /// # Errors
    ///
    /// Fails if an event is reversed, two events overlap, an easing does not resolve, or there is
    /// neither an event nor a final value.
    pub fn from_records(
        record: &SequenceRecord<V>,
        library: &TemplateEasingLib,
        effective_beats: RationalTime,
        config: JumpConfig,
    ) -> Result<Self, SequenceError> {
        let mut events: Vec<_> = record.events.iter().collect();
        events.sort_by_key(|event| event.start_time);
        let Some(first) = events.first() else {
            return record
                .final_value
                .clone()
                .map(|value| Self::new(value, effective_beats, config))
                .ok_or(SequenceError::Empty);
        };

        let mut nodes = NodeList::new();
        if first.start_time > RationalTime::ZERO {
            nodes.push_back(EventNode::Start(EventStartNode::new(
                RationalTime::ZERO,
                first.start.clone(),
                Easing::LINEAR,
            )));
            nodes.push_back(EventNode::End(EventEndNode::new(
                first.start_time,
                first.start.clone(),
            )));
        }
        let mut previous_end: Option<(RationalTime, V)> = None;
        for event in events {
            if event.end_time < event.start_time {
                return Err(SequenceError::ReversedEvent {
                    start: event.start_time,
                    end: event.end_time,
                });
            }
            event.end_time.checked_sub(event.start_time)?;
            if let Some((end_time, end_value)) = previous_end.take() {
                if event.start_time < end_time {
                    return Err(SequenceError::OverlappingEvents {
                        end: end_time,
                        next_start: event.start_time,
                    });
                }
                nodes.push_back(EventNode::End(EventEndNode::new(
                    end_time,
                    end_value.clone(),
                )));
                if event.start_time > end_time {
                    nodes.push_back(EventNode::Start(EventStartNode::new(
                        end_time,
                        end_value.clone(),
                        Easing::LINEAR,
                    )));
                    nodes.push_back(EventNode::End(EventEndNode::new(
                        event.start_time,
                        end_value,
                    )));
                }
            }
            nodes.push_back(EventNode::Start(EventStartNode::new(
                event.start_time,
                event.start.clone(),
                Easing::from_record(&event.easing, library)?,
            )));
            previous_end = Some((event.end_time, event.end.clone()));
        }
        if let Some((end_time, end_value)) = previous_end {
            nodes.push_back(EventNode::End(EventEndNode::new(
                end_time,
                end_value.clone(),
            )));
            nodes.push_back(EventNode::Start(EventStartNode::new(
                end_time,
                record.final_value.clone().unwrap_or(end_value),
                Easing::LINEAR,
            )));
        }
        Ok(Self::from_nodes(nodes, effective_beats, config))
    }

    /// Exports the sequence as records, one per segment.
    #[must_use]
    pub fn to_record(&self) -> SequenceRecord<V> {
        let mut events: Vec<EventRecord<V>> = Vec::new();
        let mut final_value = None;
        for (id, start) in self.start_nodes() {
            match self.end_of(id).and_then(|end| self.end_node(end).ok()) {
                Some(end) => events.push(EventRecord {
                    start_time: start.time,
                    end_time: end.time,
                    start: start.value.clone(),
                    end: end.value.clone(),
                    easing: start.easing.to_record(),
                }),
                None => {
                    if events.last().map(|event| &event.end) != Some(&start.value) {
                        final_value = Some(start.value.clone());
                    }
                }
            }
        }
        SequenceRecord {
            events,
            final_value,
        }
    }
}
