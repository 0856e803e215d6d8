//! Prelude module for the crate.
//!
//! Re-exports the types most callers need, so `use chart_timeline::prelude::*;` is enough to
//! build and query a chart.

pub use crate::bpm::{BpmPoint, BpmSequence};
pub use crate::chart::{Chart, ChartMeta, EventKind, EventLayer, JudgeLine};
pub use crate::config::{ChartConfig, JumpConfig};
#[cfg(feature = "serde")]
pub use crate::document::{
    BpmRecord, ChartDocument, EventLayerRecord, JudgeLineRecord, NoteRecord, TemplateRecord,
};
pub use crate::easing::{
    BezierEasing, Easing, EasingRecord, NormalEasing, ParametricEasing, SegmentedEasing,
    TemplateEasing, TemplateEasingLib,
};
pub use crate::error::{ChartError, EasingError, SequenceError, TempoError, TimeError};
pub use crate::event::records::{EventRecord, SequenceRecord};
pub use crate::event::{
    EventEndNode, EventNode, EventNodeSequence, EventPair, EventStartNode, EventValue,
    ReindexRange, RemovedPair, Rgb, Segment,
};
pub use crate::jump::{Boundary, JumpArray, JumpKey, JumpSource};
pub use crate::node_list::{NodeId, NodeKind, NodeList};
pub use crate::note::{
    HNList, NNList, NNNList, NNNNode, Note, NoteId, NoteListKey, NoteNode, NoteNodeRef,
    NoteType, RemovedNote,
};
#[cfg(feature = "rand")]
pub use crate::sampler::RandRng;
pub use crate::sampler::{Sampler, SamplerMock, SplitMix64};
pub use crate::time::RationalTime;
