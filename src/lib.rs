//! Time-indexed node sequences for rhythm game charts.
//!
//! A chart is a timeline of animation curves, tempo changes and notes, queried many times per
//! frame ("what is the value of this curve now?", "which notes are on screen?") while it is
//! edited and scrubbed back and forth. This crate keeps every such timeline as a linked list of
//! nodes and lays a skip index, the [`JumpArray`](jump::JumpArray), over it so that finding the
//! node governing a time costs O(1) on average, even right after an edit.
//!
//! # Layout
//!
//! - [`time`] defines [`RationalTime`](time::RationalTime), exact beat positions.
//! - [`node_list`] is the arena-backed linked list every index is built on.
//! - [`jump`] is the skip index, generic over what it indexes.
//! - [`easing`] defines how a curve segment moves, including template easings built from other
//!   curves.
//! - [`event`] defines [`EventNodeSequence`](event::EventNodeSequence), a piecewise curve with
//!   cached integrals.
//! - [`bpm`] converts between beats and seconds.
//! - [`note`] groups notes by start time, per line and chart-wide.
//! - [`chart`] ties judge lines, notes and the tempo map together, and `document` (with the
//!   `serde` feature) stores them.
//!
//! # Conventions
//!
//! A curve segment governs `[start, end)`. Queries passing `use_previous` see interior
//! boundaries as `(start, end]` instead. Queries at or past the indexed span, the
//! effective beats, are answered by walking back from the end of the list; queries before zero
//! are clamped and logged through [`log`].
//!
//! Nothing here reads a clock, renders or decides which edits are legal. The crate is
//! single-threaded: template easings are shared through [`Rc`](std::rc::Rc).
//!
//! # Example
//!
//! ```
//! use chart_timeline::prelude::*;
//!
//! let span = RationalTime::from_beats(8);
//! let tempo = BpmSequence::new(
//!     &[
//!         BpmPoint::new(RationalTime::ZERO, 120.0)?,
//!         BpmPoint::new(RationalTime::from_beats(4), 240.0)?,
//!     ],
//!     span,
//!     JumpConfig::default(),
//! )?;
//! assert_eq!(tempo.to_seconds(RationalTime::from_beats(4)), 2.0);
//! assert_eq!(tempo.to_seconds(RationalTime::from_beats(8)), 3.0);
//! # Ok::<(), chart_timeline::error::TempoError>(())
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bpm;
pub mod chart;
pub mod config;
#[cfg(feature = "serde")]
pub mod document;
pub mod easing;
pub mod error;
pub mod event;
pub mod jump;
pub mod node_list;
pub mod note;
pub mod prelude;
pub mod sampler;
pub mod time;
