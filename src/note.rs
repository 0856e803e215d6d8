//! Notes and the node lists grouping them by start time.
//!
//! A [`NoteNode`] holds every note of one list starting at the same beat. Per judge line and per
//! `(speed, y offset)` pair there is an [`NNList`] for taps, flicks and drags and an [`HNList`]
//! for holds. The chart-wide [`NNNList`] groups the note nodes of all lines by start time.

pub mod list;
pub mod nnn;

use std::cmp::Ordering;

use log::warn;

use crate::jump::{Boundary, JumpSource};
use crate::node_list::{NodeId, NodeList};
use crate::time::RationalTime;

pub use self::list::{HNList, NNList, RemovedNote};
pub use self::nnn::{NNNList, NNNNode, NoteNodeRef};

/// The kind of a note. The discriminants are the note type ids of RPE charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NoteType {
    /// Hit once.
    #[default]
    Tap = 1,
    /// Held until its end time.
    Hold = 2,
    /// Swiped.
    Flick = 3,
    /// Touched while passing.
    Drag = 4,
}

/// A chart-wide note handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoteId(pub u64);

/// A note.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Assigned by the chart when the note is added.
    pub id: NoteId,
    /// The kind of note.
    pub note_type: NoteType,
    /// When the note is hit.
    pub start_time: RationalTime,
    /// When a hold is released. Equal to `start_time` for other kinds.
    pub end_time: RationalTime,
    /// Horizontal position along the line.
    pub position_x: f64,
    /// Whether the note falls from above the line.
    pub above: bool,
    /// Speed multiplier.
    pub speed: f64,
    /// Vertical offset from the line.
    pub y_offset: f64,
    /// Width multiplier.
    pub size: f64,
    /// Opacity, 0 to 255.
    pub alpha: u8,
    /// Fake notes are drawn but not judged.
    pub is_fake: bool,
    /// Seconds before its time the note becomes visible.
    pub visible_time: f64,
}

impl Note {
    /// A plain note of `note_type` at `start_time`, ending at `end_time`.
    #[must_use]
    pub const fn new(note_type: NoteType, start_time: RationalTime, end_time: RationalTime) -> Self {
        Self {
            id: NoteId(0),
            note_type,
            start_time,
            end_time,
            position_x: 0.0,
            above: true,
            speed: 1.0,
            y_offset: 0.0,
            size: 1.0,
            alpha: 255,
            is_fake: false,
            visible_time: 999_999.0,
        }
    }

    /// A tap at `time`.
    #[must_use]
    pub const fn tap(time: RationalTime) -> Self {
        Self::new(NoteType::Tap, time, time)
    }

    /// A hold over `[start, end]`.
    #[must_use]
    pub const fn hold(start: RationalTime, end: RationalTime) -> Self {
        Self::new(NoteType::Hold, start, end)
    }

    /// Whether this is a hold.
    #[must_use]
    pub fn is_hold(&self) -> bool {
        self.note_type == NoteType::Hold
    }

    /// The key of the lists this note belongs in.
    #[must_use]
    pub const fn list_key(&self) -> NoteListKey {
        NoteListKey::new(self.speed, self.y_offset)
    }
}

/// Identifies the note lists of a judge line: notes sharing speed and y offset.
#[derive(Debug, Clone, Copy)]
pub struct NoteListKey {
    speed: f64,
    y_offset: f64,
}

impl NoteListKey {
    /// A key for notes with `speed` and `y_offset`.
    #[must_use]
    pub const fn new(speed: f64, y_offset: f64) -> Self {
        Self { speed, y_offset }
    }

    /// The speed multiplier.
    #[must_use]
    pub const fn speed(self) -> f64 {
        self.speed
    }

    /// The y offset.
    #[must_use]
    pub const fn y_offset(self) -> f64 {
        self.y_offset
    }
}

impl PartialEq for NoteListKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NoteListKey {}

impl PartialOrd for NoteListKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NoteListKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.speed
            .total_cmp(&other.speed)
            .then(self.y_offset.total_cmp(&other.y_offset))
    }
}

/// The notes of one list starting at one beat.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteNode {
    start_time: RationalTime,
    notes: Vec<Note>,
    reach: RationalTime,
}

impl NoteNode {
    pub(crate) const fn new(start_time: RationalTime) -> Self {
        Self {
            start_time,
            notes: Vec::new(),
            reach: start_time,
        }
    }

    /// When the notes start.
    #[must_use]
    pub const fn start_time(&self) -> RationalTime {
        self.start_time
    }

    /// The notes. Holds are ordered by end time, latest first.
    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// In hold lists, the latest end time of this node and every node before it.
    #[must_use]
    pub const fn reach(&self) -> RationalTime {
        self.reach
    }

    /// The latest end time among this node's notes.
    #[must_use]
    pub fn max_end(&self) -> RationalTime {
        self.notes
            .iter()
            .map(|note| note.end_time)
            .max()
            .unwrap_or(self.start_time)
    }

    pub(crate) fn push(&mut self, note: Note) {
        if note.is_hold() {
            let index = self
                .notes
                .iter()
                .position(|other| other.end_time < note.end_time)
                .unwrap_or(self.notes.len());
            self.notes.insert(index, note);
        } else {
            self.notes.push(note);
        }
    }

    pub(crate) fn take(&mut self, id: NoteId) -> Option<Note> {
        let index = self.notes.iter().position(|note| note.id == id)?;
        Some(self.notes.remove(index))
    }

    pub(crate) fn set_reach(&mut self, reach: RationalTime) -> bool {
        let changed = self.reach != reach;
        self.reach = reach;
        changed
    }
}

/// Nodes positioned at a start time.
pub(crate) trait StartKeyed {
    fn start_time(&self) -> RationalTime;
}

impl StartKeyed for NoteNode {
    fn start_time(&self) -> RationalTime {
        self.start_time
    }
}

/// A list of [`StartKeyed`] nodes indexed so that a query finds the first node starting at or
/// after it.
pub(crate) struct ByStart<'a, T>(pub(crate) &'a NodeList<T>);

impl<T: StartKeyed> JumpSource for ByStart<'_, T> {
    type Key = RationalTime;

    const BOUNDARY: Boundary = Boundary::RightClosed;

    fn head(&self) -> NodeId {
        self.0.head()
    }

    fn tail(&self) -> NodeId {
        self.0.tail()
    }

    fn end_and_next(&self, node: NodeId) -> Option<(Option<RationalTime>, NodeId)> {
        if self.0.is_head(node) {
            return Some((None, self.0.first()));
        }
        let start = self.0.get(node)?.start_time();
        Some((Some(start), self.0.next(node)?))
    }

    fn advance(&self, node: NodeId, target: RationalTime) -> Option<NodeId> {
        if self.0.get(node)?.start_time() < target {
            self.0.next(node)
        } else {
            None
        }
    }
}

impl<T: StartKeyed> ByStart<'_, T> {
    /// The first node starting at or after `beats`, by walking the list.
    pub(crate) fn scan(&self, beats: RationalTime) -> NodeId {
        if beats < RationalTime::ZERO {
            warn!("note list queried at negative time {beats:?}, returning the first node");
            return self.0.first();
        }
        self.0
            .iter()
            .find(|(_, node)| node.start_time() >= beats)
            .map_or(self.0.tail(), |(id, _)| id)
    }

    /// Steps back from the tail over nodes past the indexed span that still start at or after
    /// `beats`.
    pub(crate) fn back_from_tail(&self, beats: RationalTime) -> NodeId {
        let mut node = self.0.tail();
        while let Some(previous) = self.0.previous(node) {
            match self.0.get(previous) {
                Some(found) if found.start_time() >= beats => node = previous,
                _ => break,
            }
        }
        node
    }
}
