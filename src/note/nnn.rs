//! The chart-wide note node list.

use log::debug;

use crate::config::JumpConfig;
use crate::jump::JumpArray;
use crate::node_list::{NodeId, NodeList};
use crate::note::{ByStart, NoteListKey, StartKeyed};
use crate::time::RationalTime;

/// Points at one [`NoteNode`](crate::note::NoteNode) of some judge line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteNodeRef {
    /// Index of the judge line.
    pub line: usize,
    /// The list of the line the node is in.
    pub key: NoteListKey,
    /// Whether the node is in the hold list.
    pub hold: bool,
    /// The node.
    pub node: NodeId,
}

/// Every note node of the chart starting at one beat.
#[derive(Debug, Clone, PartialEq)]
pub struct NNNNode {
    start_time: RationalTime,
    refs: Vec<NoteNodeRef>,
}

impl NNNNode {
    /// When the grouped nodes start.
    #[must_use]
    pub const fn start_time(&self) -> RationalTime {
        self.start_time
    }

    /// The grouped nodes, in the order they were added.
    #[must_use]
    pub fn refs(&self) -> &[NoteNodeRef] {
        &self.refs
    }
}

impl StartKeyed for NNNNode {
    fn start_time(&self) -> RationalTime {
        self.start_time
    }
}

/// Note nodes of every line grouped by start time.
#[derive(Debug, Clone)]
pub struct NNNList {
    nodes: NodeList<NNNNode>,
    jump: JumpArray<RationalTime>,
    effective_beats: RationalTime,
}

impl NNNList {
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
    pub const fn nodes(&self) -> &NodeList<NNNNode> {
        &self.nodes
    }

    /// The node at `id`.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NNNNode> {
        self.nodes.get(id)
    }

    /// Number of distinct start times.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no note node is registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
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
            debug!("chart note index pointed at a removed node for {beats}, scanning the list");
            view.scan(beats)
        } else {
            node
        }
    }

    /// The node starting exactly at `time`, created if missing.
    pub fn get_node_of(&mut self, time: RationalTime) -> NodeId {
        let node = self.get_node_at(time);
        if self
            .nodes
            .get(node)
            .is_some_and(|found| found.start_time == time)
        {
            return node;
        }
        let fresh = NNNNode {
            start_time: time,
            refs: Vec::new(),
        };
        let created = match self.nodes.insert_before(node, fresh.clone()) {
            Some(created) => created,
            None => self.nodes.push_back(fresh),
        };
        let previous = self
            .nodes
            .previous(created)
            .unwrap_or_else(|| self.nodes.head());
        let view = ByStart(&self.nodes);
        self.jump.update_range(&view, previous, created);
        self.jump.update_average_beats(&view);
        created
    }

    /// Registers a line's note node starting at `time`.
    pub fn add_ref(&mut self, time: RationalTime, note_ref: NoteNodeRef) -> NodeId {
        let node = self.get_node_of(time);
        if let Some(found) = self.nodes.get_mut(node) {
            if !found.refs.contains(&note_ref) {
                found.refs.push(note_ref);
            }
        }
        node
    }

    /// Unregisters a line's note node starting at `time`. An emptied node is unlinked.
    ///
    /// Returns whether the reference was found.
    pub fn remove_ref(&mut self, time: RationalTime, note_ref: &NoteNodeRef) -> bool {
        let node = self.get_node_at(time);
        let Some(found) = self.nodes.get_mut(node) else {
            return false;
        };
        if found.start_time != time {
            return false;
        }
        let Some(index) = found.refs.iter().position(|other| other == note_ref) else {
            return false;
        };
        found.refs.remove(index);
        if found.refs.is_empty() {
            if let (Some(previous), Some(next)) = (self.nodes.previous(node), self.nodes.next(node))
            {
                self.nodes.remove(node);
                self.jump
                    .update_range(&ByStart(&self.nodes), previous, next);
            }
        }
        true
    }

    /// Iterates every node in start order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NNNNode)> {
        self.nodes.iter()
    }

    /// Iterates the nodes starting in `[from, to)`.
    pub fn nodes_between(
        &self,
        from: RationalTime,
        to: RationalTime,
    ) -> impl Iterator<Item = (NodeId, &NNNNode)> {
        self.nodes
            .iter_from(self.get_node_at(from))
            .take_while(move |(_, node)| node.start_time < to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::beats;
    use pretty_assertions::assert_eq;

    fn note_ref(line: usize, hold: bool) -> NoteNodeRef {
        let mut lines = NodeList::new();
        NoteNodeRef {
            line,
            key: NoteListKey::new(1.0, 0.0),
            hold,
            node: lines.push_back(()),
        }
    }

    #[test]
    fn test_refs_group_by_start() {
        let mut list = NNNList::new(beats(8, 0, 1), JumpConfig::default());
        let a = list.add_ref(beats(2, 0, 1), note_ref(0, false));
        let b = list.add_ref(beats(2, 0, 1), note_ref(1, true));
        let c = list.add_ref(beats(1, 0, 1), note_ref(1, false));
        assert_eq!(a, b);
        assert_ne!(a, c);
        let starts: Vec<_> = list.iter().map(|(_, node)| node.start_time()).collect();
        assert_eq!(starts, vec![beats(1, 0, 1), beats(2, 0, 1)]);
        assert_eq!(list.node(a).map(|node| node.refs().len()), Some(2));
    }

    #[test]
    fn test_unindexed_list_clamps_negative_time() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut list = NNNList::new(RationalTime::ZERO, JumpConfig::default());
        let first = list.add_ref(beats(1, 0, 1), note_ref(0, false));
        assert_eq!(list.get_node_at(beats(-1, 0, 1)), first);
        assert_eq!(list.get_node_at(beats(1, 0, 1)), first);
    }

    #[test]
    fn test_remove_ref_unlinks_empty_nodes() {
        let mut list = NNNList::new(beats(8, 0, 1), JumpConfig::default());
        list.add_ref(beats(1, 0, 1), note_ref(0, false));
        let later = list.add_ref(beats(3, 0, 1), note_ref(0, false));
        assert!(list.remove_ref(beats(1, 0, 1), &note_ref(0, false)));
        assert!(!list.remove_ref(beats(1, 0, 1), &note_ref(0, false)));
        assert_eq!(list.len(), 1);
        assert_eq!(list.get_node_at(RationalTime::ZERO), later);
        let between: Vec<_> = list
            .nodes_between(beats(3, 0, 1), beats(4, 0, 1))
            .map(|(id, _)| id)
            .collect();
        assert_eq!(between, vec![later]);
        assert_eq!(list.nodes_between(RationalTime::ZERO, beats(3, 0, 1)).count(), 0);
    }
}
