//! Error types of the timeline engine.
//!
//! Only malformed input is an error here. Out-of-range queries are clamped and degenerate
//! sequences take explicit short-circuit paths, so neither shows up in these enums.

use thiserror::Error;

use crate::chart::EventKind;
use crate::node_list::NodeId;
use crate::time::RationalTime;

/// An error on constructing a [`RationalTime`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum TimeError {
    /// The denominator was zero.
    #[error("malformed time {whole}+{numerator}/0: denominator must not be zero")]
    ZeroDenominator {
        /// The whole part given.
        whole: i64,
        /// The numerator given.
        numerator: i64,
    },
    /// The result of time arithmetic does not fit in `i64` parts.
    #[error("time arithmetic overflowed: the result does not fit in i64 parts")]
    Overflow,
}

/// An error on editing an event node sequence.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequenceError {
    /// The handle does not point at a live node of this sequence.
    #[error("node {0:?} is not in this sequence")]
    DetachedNode(NodeId),
    /// The handle points at an end node where a start node is required.
    #[error("node {0:?} is not a start node")]
    NotAStartNode(NodeId),
    /// The handle points at a start node where an end node is required.
    #[error("node {0:?} is not an end node")]
    NotAnEndNode(NodeId),
    /// The end and start node of a pair do not share one time.
    #[error("pair is not back-to-back: end at {end}, start at {start}")]
    MisalignedPair {
        /// Time of the end node.
        end: RationalTime,
        /// Time of the start node.
        start: RationalTime,
    },
    /// The pair to insert does not fall strictly inside the target segment.
    #[error("time {time} is outside the segment starting at {segment_start}")]
    OutsideSegment {
        /// Time of the pair being inserted.
        time: RationalTime,
        /// Start time of the target segment.
        segment_start: RationalTime,
    },
    /// The end and start node given for removal are not adjacent.
    #[error("nodes {end:?} and {start:?} are not an adjacent end/start pair")]
    NotAdjacent {
        /// The end node given.
        end: NodeId,
        /// The start node given.
        start: NodeId,
    },
    /// The first segment of a sequence cannot be removed.
    #[error("the first segment of a sequence cannot be removed")]
    FirstSegment,
    /// Two events overlap in time.
    #[error("events overlap: one ends at {end}, the next starts at {next_start}")]
    OverlappingEvents {
        /// End time of the earlier event.
        end: RationalTime,
        /// Start time of the later event.
        next_start: RationalTime,
    },
    /// An event ends before it starts.
    #[error("event ends at {end} before it starts at {start}")]
    ReversedEvent {
        /// Start time of the event.
        start: RationalTime,
        /// End time of the event.
        end: RationalTime,
    },
    /// No events were given and no initial value either.
    #[error("a sequence needs at least one event or an initial value")]
    Empty,
    /// The selection to encapsulate is not a contiguous run of segments.
    #[error("selection from {from:?} to {to:?} is not a contiguous run of segments")]
    NotContiguous {
        /// The first start node of the selection.
        from: NodeId,
        /// The last end node of the selection.
        to: NodeId,
    },
    /// The selection to encapsulate starts and ends at the same value, so it cannot be normalized.
    #[error("selection starts and ends at the same value {0}, cannot normalize")]
    FlatSelection(f64),
    /// The segment to expand is not driven by a template easing.
    #[error("segment at {0:?} is not driven by a template easing")]
    NotTemplated(NodeId),
    /// A tempo value is not a positive finite number.
    #[error("bpm must be positive and finite, got {0}")]
    InvalidBpm(f64),
    /// A time of the edit could not be computed exactly.
    #[error(transparent)]
    Time(#[from] TimeError),
    /// An easing could not be built or registered.
    #[error(transparent)]
    Easing(#[from] EasingError),
}

/// An error on constructing or parsing an easing.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EasingError {
    /// The normal easing id is not in the table.
    #[error("unknown normal easing id {0}")]
    UnknownNormal(u8),
    /// The parametric expression failed to parse.
    #[error("invalid parametric expression `{expression}`: {message}")]
    Expression {
        /// The source text.
        expression: String,
        /// The parser's explanation.
        message: String,
    },
    /// A segmented easing's range is not inside `[0, 1]` or is empty.
    #[error("segment range {left}..{right} is not a non-empty part of 0..1")]
    SegmentRange {
        /// Left edge.
        left: String,
        /// Right edge.
        right: String,
    },
    /// A template easing name is not registered.
    #[error("unknown template easing `{0}`")]
    UnknownTemplate(String),
    /// A template easing with this name is already registered.
    #[error("template easing `{0}` is already registered")]
    DuplicateTemplate(String),
}

/// An error on constructing a tempo sequence.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TempoError {
    /// No tempo points were given.
    #[error("a tempo list needs at least one point")]
    Empty,
    /// The first tempo point is not at beat zero.
    #[error("the first tempo point must be at beat 0, got {0}")]
    NotStartingAtZero(RationalTime),
    /// A tempo value is not a positive finite number.
    #[error("bpm must be positive and finite, got {0}")]
    InvalidBpm(f64),
    /// Tempo points are not strictly increasing in time.
    #[error("tempo points must be strictly increasing, {previous} then {next}")]
    Unordered {
        /// The earlier point's time.
        previous: RationalTime,
        /// The later point's time.
        next: RationalTime,
    },
}

/// An error on building a chart from its document.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ChartError {
    /// A time was malformed.
    #[error("time: {0}")]
    Time(#[from] TimeError),
    /// An event sequence was malformed.
    #[error("sequence: {0}")]
    Sequence(#[from] SequenceError),
    /// An easing was malformed.
    #[error("easing: {0}")]
    Easing(#[from] EasingError),
    /// The tempo list was malformed.
    #[error("tempo: {0}")]
    Tempo(#[from] TempoError),
    /// A note ends before it starts.
    #[error("note ends at {end} before it starts at {start}")]
    ReversedNote {
        /// Start time of the note.
        start: RationalTime,
        /// End time of the note.
        end: RationalTime,
    },
    /// A judge line index is out of range.
    #[error("judge line {0} does not exist")]
    UnknownLine(usize),
    /// A judge line has no such layer, or the layer does not animate the property.
    #[error("judge line {line} has no {kind:?} sequence in layer {layer}")]
    UnknownLayer {
        /// Index of the judge line.
        line: usize,
        /// Index of the layer.
        layer: usize,
        /// The animated property asked for.
        kind: EventKind,
    },
    /// The document could not be deserialized.
    #[cfg(feature = "json")]
    #[error("json: {0}")]
    Json(#[from] serde_path_to_error::Error<serde_json::Error>),
}

/// Result of chart-level operations.
pub type Result<T> = std::result::Result<T, ChartError>;
