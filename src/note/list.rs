//! Per-line note lists.

use log::{debug, warn};

use crate::config::JumpConfig;
use crate::jump::{JumpArray, JumpSource};
use crate::node_list::{NodeId, NodeList};
use crate::note::{ByStart, Note, NoteId, NoteNode};
use crate::time::RationalTime;

/// What [`NNList::remove_note`] took out.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedNote {
    /// The note.
    pub note: Note,
    /// The node it was in.
    pub node: NodeId,
    /// Whether the node became empty and was unlinked.
    pub node_removed: bool,
}

/// Note nodes of one list, ordered by start time, with a jump index over start times.
#[derive(Debug, Clone)]
pub struct NNList {
    nodes: NodeList<NoteNode>,
    jump: JumpArray<RationalTime>,
    effective_beats: RationalTime,
}

impl NNList {
    /// An empty list indexing `[0, effective_beats)`.
    #[must_use]
    pub fn new(effective_beats: RationalTime, config: JumpConfig) -> Self {
        let nodes = NodeList::new();
        let jump = JumpArray::new(&ByStart(&nodes), effective_beats, 1, config);
        Self {
            nodes,
            jump,
            effective_beats,
        }
    }

    /// The underlying list.
    #[must_use]
    pub const fn nodes(&self) -> &NodeList<NoteNode> {
        &self.nodes
    }

    /// The start time index.
    #[must_use]
    pub const fn jump(&self) -> &JumpArray<RationalTime> {
        &self.jump
    }

    /// The node at `id`.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NoteNode> {
        self.nodes.get(id)
    }

    /// Number of note nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the list has no notes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of notes.
    #[must_use]
    pub fn note_count(&self) -> usize {
        self.nodes.iter().map(|(_, node)| node.notes().len()).sum()
    }

    /// The span the index covers.
    #[must_use]
    pub const fn effective_beats(&self) -> RationalTime {
        self.effective_beats
    }

    /// Changes the span the index covers and rebuilds it.
    pub fn set_effective_beats(&mut self, effective_beats: RationalTime) {
        self.effective_beats = effective_beats;
        let expected = self.nodes.len();
        self.jump
            .reset(&ByStart(&self.nodes), effective_beats, expected);
    }

    /// Rebuilds the whole index.
    pub fn rebuild_jump(&mut self) {
        self.jump.rebuild(&ByStart(&self.nodes));
    }

    /// The first node starting at or after `beats`, or the tail if there is none.
    #[must_use]
    pub fn get_node_at(&self, beats: RationalTime) -> NodeId {
        let view = ByStart(&self.nodes);
        if self.jump.is_degenerate() {
            return view.scan(beats);
        }
        let node = self.jump.get_node_at(&view, beats);
        if self.nodes.is_tail(node) {
            view.back_from_tail(beats)
        } else if !self.nodes.contains(node) {
            debug!("note index pointed at a removed node for {beats}, scanning the list");
            view.scan(beats)
        } else {
            node
        }
    }

    /// The node starting exactly at `time`, created if missing.
    ///
    /// Returns the node and whether it was created.
    pub fn get_node_of(&mut self, time: RationalTime) -> (NodeId, bool) {
        let node = self.get_node_at(time);
        if self
            .nodes
            .get(node)
            .is_some_and(|found| found.start_time() == time)
        {
            return (node, false);
        }
        let created = match self.nodes.insert_before(node, NoteNode::new(time)) {
            Some(created) => created,
            None => self.nodes.push_back(NoteNode::new(time)),
        };
        let previous = self
            .nodes
            .previous(created)
            .unwrap_or_else(|| self.nodes.head());
        let view = ByStart(&self.nodes);
        self.jump.update_range(&view, previous, created);
        self.jump.update_average_beats(&view);
        (created, true)
    }

    /// Adds a note to the node at its start time.
    ///
    /// Returns the node and whether it was created.
    pub fn add_note(&mut self, note: Note) -> (NodeId, bool) {
        let (node, created) = self.get_node_of(note.start_time);
        if let Some(found) = self.nodes.get_mut(node) {
            found.push(note);
        }
        (node, created)
    }

    /// Removes the note `id` starting at `time`. An emptied node is unlinked.
    pub fn remove_note(&mut self, id: NoteId, time: RationalTime) -> Option<RemovedNote> {
        let node = self.get_node_at(time);
        let found = self.nodes.get_mut(node)?;
        if found.start_time() != time {
            return None;
        }
        let note = found.take(id)?;
        let node_removed = found.notes().is_empty();
        if node_removed {
            self.unlink(node);
        }
        Some(RemovedNote {
            note,
            node,
            node_removed,
        })
    }

    /// Unlinks `node` and gives its range to the node after it. Returns that node.
    fn unlink(&mut self, node: NodeId) -> Option<NodeId> {
        let previous = self.nodes.previous(node)?;
        let next = self.nodes.next(node)?;
        self.nodes.remove(node)?;
        self.jump
            .update_range(&ByStart(&self.nodes), previous, next);
        Some(next)
    }

    /// Iterates the nodes starting in `[from, to)`.
    pub fn nodes_between(
        &self,
        from: RationalTime,
        to: RationalTime,
    ) -> impl Iterator<Item = (NodeId, &NoteNode)> {
        self.nodes
            .iter_from(self.get_node_at(from))
            .take_while(move |(_, node)| node.start_time() < to)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut NoteNode> {
        self.nodes.get_mut(id)
    }
}

/// Hold nodes keyed by the running maximum of their end times.
struct ByReach<'a>(&'a NodeList<NoteNode>);

impl JumpSource for ByReach<'_> {
    type Key = RationalTime;

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
        let reach = self.0.get(node)?.reach();
        Some((Some(reach), self.0.next(node)?))
    }

    fn advance(&self, node: NodeId, target: RationalTime) -> Option<NodeId> {
        if self.0.get(node)?.reach() <= target {
            self.0.next(node)
        } else {
            None
        }
    }
}

impl ByReach<'_> {
    fn scan(&self, beats: RationalTime) -> NodeId {
        if beats < RationalTime::ZERO {
            warn!("hold list queried at negative time {beats:?}, returning the first node");
            return self.0.first();
        }
        self.0
            .iter()
            .find(|(_, node)| node.reach() > beats)
            .map_or(self.0.tail(), |(id, _)| id)
    }

    fn back_from_tail(&self, beats: RationalTime) -> NodeId {
        let mut node = self.0.tail();
        while let Some(previous) = self.0.previous(node) {
            match self.0.get(previous) {
                Some(found) if found.reach() > beats => node = previous,
                _ => break,
            }
        }
        node
    }
}

/// Hold nodes of one list, with a second index answering which holds are still down.
#[derive(Debug, Clone)]
pub struct HNList {
    list: NNList,
    hold_tail_jump: JumpArray<RationalTime>,
}

impl HNList {
    /// An empty list indexing `[0, effective_beats)`.
    #[must_use]
    pub fn new(effective_beats: RationalTime, config: JumpConfig) -> Self {
        let list = NNList::new(effective_beats, config);
        let hold_tail_jump = JumpArray::new(&ByReach(&list.nodes), effective_beats, 1, config);
        Self {
            list,
            hold_tail_jump,
        }
    }

    /// The nodes by start time.
    #[must_use]
    pub const fn list(&self) -> &NNList {
        &self.list
    }

    /// The hold end index.
    #[must_use]
    pub const fn hold_tail_jump(&self) -> &JumpArray<RationalTime> {
        &self.hold_tail_jump
    }

    /// Changes the span both indices cover and rebuilds them.
    pub fn set_effective_beats(&mut self, effective_beats: RationalTime) {
        self.list.set_effective_beats(effective_beats);
        let expected = self.list.len();
        self.hold_tail_jump
            .reset(&ByReach(&self.list.nodes), effective_beats, expected);
    }

    /// Finds a hold node around `beats`.
    ///
    /// Without `before_end` this is [`NNList::get_node_at`]. With it, the result is the first
    /// node holding a note still down after `beats`, so drawing from there covers every hold
    /// visible at `beats`.
    #[must_use]
    pub fn get_node_at(&self, beats: RationalTime, before_end: bool) -> NodeId {
        if !before_end {
            return self.list.get_node_at(beats);
        }
        let nodes = &self.list.nodes;
        let view = ByReach(nodes);
        if self.hold_tail_jump.is_degenerate() {
            return view.scan(beats);
        }
        let node = self.hold_tail_jump.get_node_at(&view, beats);
        if nodes.is_tail(node) {
            view.back_from_tail(beats)
        } else if !nodes.contains(node) {
            debug!("hold index pointed at a removed node for {beats}, scanning the list");
            view.scan(beats)
        } else {
            node
        }
    }

    /// The node starting exactly at `time`, created if missing.
    pub fn get_node_of(&mut self, time: RationalTime) -> (NodeId, bool) {
        let (node, created) = self.list.get_node_of(time);
        if created {
            self.refresh_reach_from(node);
        }
        (node, created)
    }

    /// Adds a hold to the node at its start time.
    pub fn add_note(&mut self, note: Note) -> (NodeId, bool) {
        let (node, created) = self.list.add_note(note);
        self.refresh_reach_from(node);
        self.hold_tail_jump
            .update_average_beats(&ByReach(&self.list.nodes));
        (node, created)
    }

    /// Removes the hold `id` starting at `time`. An emptied node is unlinked.
    pub fn remove_note(&mut self, id: NoteId, time: RationalTime) -> Option<RemovedNote> {
        let node = self.list.get_node_at(time);
        let found = self.list.node_mut(node)?;
        if found.start_time() != time {
            return None;
        }
        let note = found.take(id)?;
        let node_removed = found.notes().is_empty();
        if node_removed {
            let next = self.list.unlink(node)?;
            self.refresh_reach_from(next);
        } else {
            self.refresh_reach_from(node);
        }
        Some(RemovedNote {
            note,
            node,
            node_removed,
        })
    }

    /// Recomputes running reaches from `node` on, until they stop changing, and refills the hold
    /// index over the affected nodes.
    fn refresh_reach_from(&mut self, node: NodeId) {
        let nodes = &mut self.list.nodes;
        let first_exclusive = nodes.previous(node).unwrap_or_else(|| nodes.head());
        let mut reach = nodes.get(first_exclusive).map(NoteNode::reach);
        let mut last_changed = None;
        let mut cursor = node;
        while let Some(current) = nodes.get_mut(cursor) {
            let max_end = current.max_end();
            let new_reach = reach.map_or(max_end, |reach| reach.max(max_end));
            if current.set_reach(new_reach) || cursor == node {
                last_changed = Some(cursor);
            } else {
                break;
            }
            reach = Some(new_reach);
            match nodes.next(cursor) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        let last_inclusive = last_changed
            .and_then(|changed| nodes.next(changed))
            .unwrap_or(node);
        self.hold_tail_jump
            .update_range(&ByReach(nodes), first_exclusive, last_inclusive);
    }

    /// Iterates the nodes starting in `[from, to)`.
    pub fn nodes_between(
        &self,
        from: RationalTime,
        to: RationalTime,
    ) -> impl Iterator<Item = (NodeId, &NoteNode)> {
        self.list.nodes_between(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::beats;
    use pretty_assertions::assert_eq;

    fn with_id(mut note: Note, id: u64) -> Note {
        note.id = NoteId(id);
        note
    }

    fn starts(list: &NNList) -> Vec<RationalTime> {
        list.nodes()
            .iter()
            .map(|(_, node)| node.start_time())
            .collect()
    }

    #[test]
    fn test_get_node_of_creates_once() {
        let mut list = NNList::new(beats(8, 0, 1), JumpConfig::default());
        let (a, created_a) = list.add_note(with_id(Note::tap(beats(2, 0, 1)), 1));
        let (b, created_b) = list.add_note(with_id(Note::tap(beats(2, 0, 1)), 2));
        let (_, created_c) = list.add_note(with_id(Note::tap(beats(1, 0, 1)), 3));
        assert!(created_a && !created_b && created_c);
        assert_eq!(a, b);
        assert_eq!(starts(&list), vec![beats(1, 0, 1), beats(2, 0, 1)]);
        assert_eq!(list.note_count(), 3);
    }

    #[test]
    fn test_get_node_at_finds_first_at_or_after() {
        let mut list = NNList::new(beats(8, 0, 1), JumpConfig::default());
        for (id, time) in [beats(1, 0, 1), beats(3, 1, 2), beats(6, 0, 1)]
            .into_iter()
            .enumerate()
        {
            list.add_note(with_id(Note::tap(time), id as u64));
        }
        let start_at = |time| list.node(list.get_node_at(time)).map(NoteNode::start_time);
        assert_eq!(start_at(RationalTime::ZERO), Some(beats(1, 0, 1)));
        assert_eq!(start_at(beats(1, 0, 1)), Some(beats(1, 0, 1)));
        assert_eq!(start_at(beats(1, 1, 64)), Some(beats(3, 1, 2)));
        assert_eq!(start_at(beats(3, 1, 2)), Some(beats(3, 1, 2)));
        assert_eq!(start_at(beats(5, 0, 1)), Some(beats(6, 0, 1)));
        assert_eq!(list.get_node_at(beats(7, 0, 1)), list.nodes().tail());
    }

    #[test]
    fn test_remove_unlinks_empty_nodes() {
        let mut list = NNList::new(beats(8, 0, 1), JumpConfig::default());
        list.add_note(with_id(Note::tap(beats(1, 0, 1)), 1));
        list.add_note(with_id(Note::tap(beats(2, 0, 1)), 2));
        list.add_note(with_id(Note::tap(beats(2, 0, 1)), 3));
        let removed = list.remove_note(NoteId(2), beats(2, 0, 1)).unwrap();
        assert!(!removed.node_removed);
        let removed = list.remove_note(NoteId(1), beats(1, 0, 1)).unwrap();
        assert!(removed.node_removed);
        assert_eq!(list.remove_note(NoteId(1), beats(1, 0, 1)), None);
        assert_eq!(starts(&list), vec![beats(2, 0, 1)]);
        // The survivor now governs everything up to its start.
        assert_eq!(
            list.get_node_at(RationalTime::ZERO),
            list.get_node_at(beats(2, 0, 1))
        );
        let mut fresh = list.jump().clone();
        fresh.rebuild(&ByStart(list.nodes()));
        assert_eq!(list.jump(), &fresh);
    }

    #[test]
    fn test_nodes_past_the_span() {
        let mut list = NNList::new(beats(4, 0, 1), JumpConfig::default());
        list.add_note(with_id(Note::tap(beats(2, 0, 1)), 1));
        list.add_note(with_id(Note::tap(beats(10, 0, 1)), 2));
        let node = list.get_node_at(beats(5, 0, 1));
        assert_eq!(list.node(node).map(NoteNode::start_time), Some(beats(10, 0, 1)));
        let between: Vec<_> = list
            .nodes_between(RationalTime::ZERO, beats(20, 0, 1))
            .map(|(_, node)| node.start_time())
            .collect();
        assert_eq!(between, vec![beats(2, 0, 1), beats(10, 0, 1)]);
    }

    #[test]
    fn test_unindexed_lists_clamp_negative_time() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut list = NNList::new(RationalTime::ZERO, JumpConfig::default());
        let (first, _) = list.add_note(with_id(Note::tap(beats(1, 0, 1)), 1));
        list.add_note(with_id(Note::tap(beats(3, 0, 1)), 2));
        assert!(list.jump().is_degenerate());
        assert_eq!(list.get_node_at(beats(-2, 0, 1)), first);
        assert_eq!(list.get_node_at(beats(4, 0, 1)), list.nodes().tail());

        let mut holds = HNList::new(RationalTime::ZERO, JumpConfig::default());
        let (hold, _) = holds.add_note(with_id(Note::hold(beats(2, 0, 1), beats(5, 0, 1)), 3));
        assert!(holds.hold_tail_jump().is_degenerate());
        assert_eq!(holds.get_node_at(beats(-2, 0, 1), true), hold);
        assert_eq!(holds.get_node_at(beats(-2, 0, 1), false), hold);
        assert_eq!(holds.get_node_at(beats(5, 0, 1), true), holds.list().nodes().tail());
    }

    #[test]
    fn test_hold_still_down() {
        let mut holds = HNList::new(beats(16, 0, 1), JumpConfig::default());
        let (long, _) = holds.add_note(with_id(Note::hold(beats(2, 0, 1), beats(6, 0, 1)), 1));
        let (short, _) = holds.add_note(with_id(Note::hold(beats(3, 0, 1), beats(4, 0, 1)), 2));
        let (late, _) = holds.add_note(with_id(Note::hold(beats(8, 0, 1), beats(9, 0, 1)), 3));

        assert_eq!(holds.get_node_at(beats(4, 0, 1), true), long);
        assert_eq!(holds.get_node_at(beats(4, 0, 1), false), holds.list().get_node_at(beats(8, 0, 1)));
        assert_eq!(holds.get_node_at(beats(1, 0, 1), true), long);
        assert_eq!(holds.get_node_at(beats(6, 0, 1), true), late);
        assert_eq!(holds.get_node_at(beats(9, 0, 1), true), holds.list().nodes().tail());
        assert_eq!(holds.list().node(short).map(NoteNode::reach), Some(beats(6, 0, 1)));

        // Without the long hold, the short one is the first still down at 3 1/2.
        let removed = holds.remove_note(NoteId(1), beats(2, 0, 1)).unwrap();
        assert!(removed.node_removed);
        assert_eq!(holds.get_node_at(beats(3, 1, 2), true), short);
        assert_eq!(holds.get_node_at(beats(4, 0, 1), true), late);
        let mut fresh = holds.hold_tail_jump().clone();
        fresh.rebuild(&ByReach(holds.list().nodes()));
        assert_eq!(holds.hold_tail_jump(), &fresh);
    }
}
