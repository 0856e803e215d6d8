//! An arena-backed doubly linked list with sentinel nodes.
//!
//! Every indexed collection of the engine has the same shape: a `Head` sentinel, an ordered run
//! of middle nodes and a `Tail` sentinel. Nodes live in slots of one arena and are addressed by
//! generational [`NodeId`] handles.
//!
//! The forward `next` link is authoritative. The backward `previous` link is only a hint for
//! local navigation: [`NodeList::previous`] validates it against the forward link before
//! returning it, and a handle to a removed node never resolves again because its slot's
//! generation has moved on.

use std::fmt;

/// A generational handle to a node of a [`NodeList`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

/// What a slot of the list holds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind<T> {
    /// The sentinel before the first node.
    Head,
    /// A node carrying data.
    Middle(T),
    /// The sentinel after the last node.
    Tail,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    kind: NodeKind<T>,
    next: Option<NodeId>,
    previous: Option<NodeId>,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

/// A doubly linked list of `T` between two sentinels.
#[derive(Debug, Clone)]
pub struct NodeList<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    head: NodeId,
    tail: NodeId,
    len: usize,
}

impl<T> Default for NodeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeList<T> {
    /// Creates a list holding only its two sentinels.
    #[must_use]
    pub fn new() -> Self {
        let head = NodeId {
            index: 0,
            generation: 0,
        };
        let tail = NodeId {
            index: 1,
            generation: 0,
        };
        let slots = vec![
            Slot {
                generation: 0,
                entry: Some(Entry {
                    kind: NodeKind::Head,
                    next: Some(tail),
                    previous: None,
                }),
            },
            Slot {
                generation: 0,
                entry: Some(Entry {
                    kind: NodeKind::Tail,
                    next: None,
                    previous: Some(head),
                }),
            },
        ];
        Self {
            slots,
            free: Vec::new(),
            head,
            tail,
            len: 0,
        }
    }

    /// The head sentinel.
    #[must_use]
    pub const fn head(&self) -> NodeId {
        self.head
    }

    /// The tail sentinel.
    #[must_use]
    pub const fn tail(&self) -> NodeId {
        self.tail
    }

    /// Number of middle nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the list has no middle nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn entry(&self, id: NodeId) -> Option<&Entry<T>> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: NodeId) -> Option<&mut Entry<T>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Whether `id` points at a live node or sentinel of this list.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_some()
    }

    /// Whether `id` is the head sentinel.
    #[must_use]
    pub fn is_head(&self, id: NodeId) -> bool {
        id == self.head
    }

    /// Whether `id` is the tail sentinel.
    #[must_use]
    pub fn is_tail(&self, id: NodeId) -> bool {
        id == self.tail
    }

    /// The kind of node `id` points at, or `None` if it is not live.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind<T>> {
        self.entry(id).map(|entry| &entry.kind)
    }

    /// The data of a live middle node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&T> {
        match &self.entry(id)?.kind {
            NodeKind::Middle(value) => Some(value),
            NodeKind::Head | NodeKind::Tail => None,
        }
    }

    /// The mutable data of a live middle node.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        match &mut self.entry_mut(id)?.kind {
            NodeKind::Middle(value) => Some(value),
            NodeKind::Head | NodeKind::Tail => None,
        }
    }

    /// The node after `id`. `None` for the tail or a dead handle.
    #[must_use]
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id)?.next
    }

    /// The node before `id`. `None` for the head, a dead handle, or a stale back-reference.
    #[must_use]
    pub fn previous(&self, id: NodeId) -> Option<NodeId> {
        let previous = self.entry(id)?.previous?;
        (self.next(previous) == Some(id)).then_some(previous)
    }

    /// The first middle node, or the tail if the list is empty.
    #[must_use]
    pub fn first(&self) -> NodeId {
        self.next(self.head).unwrap_or(self.tail)
    }

    /// The last middle node, or the head if the list is empty.
    #[must_use]
    pub fn last(&self) -> NodeId {
        self.previous(self.tail).unwrap_or(self.head)
    }

    fn allocate(&mut self, entry: Entry<T>) -> NodeId {
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.entry = Some(entry);
                return NodeId {
                    index,
                    generation: slot.generation,
                };
            }
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Links a new node right after `anchor`. Returns `None` if `anchor` is the tail or dead.
    pub fn insert_after(&mut self, anchor: NodeId, value: T) -> Option<NodeId> {
        if self.is_tail(anchor) {
            return None;
        }
        let next = self.next(anchor)?;
        let id = self.allocate(Entry {
            kind: NodeKind::Middle(value),
            next: Some(next),
            previous: Some(anchor),
        });
        if let Some(entry) = self.entry_mut(anchor) {
            entry.next = Some(id);
        }
        if let Some(entry) = self.entry_mut(next) {
            entry.previous = Some(id);
        }
        self.len += 1;
        Some(id)
    }

    /// Links a new node right before `anchor`. Returns `None` if `anchor` is the head or dead.
    pub fn insert_before(&mut self, anchor: NodeId, value: T) -> Option<NodeId> {
        let previous = self.previous(anchor)?;
        self.insert_after(previous, value)
    }

    /// Links a new node before the tail.
    pub fn push_back(&mut self, value: T) -> NodeId {
        let last = self.last();
        match self.insert_after(last, value) {
            Some(id) => id,
            None => unreachable!("the last node of a list is always live"),
        }
    }

    /// Unlinks a middle node and returns its data. Its handle never resolves again.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        self.get(id)?;
        let previous = self.previous(id)?;
        let next = self.next(id)?;
        if let Some(entry) = self.entry_mut(previous) {
            entry.next = Some(next);
        }
        if let Some(entry) = self.entry_mut(next) {
            entry.previous = Some(previous);
        }
        let slot = self.slots.get_mut(id.index as usize)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        match entry.kind {
            NodeKind::Middle(value) => Some(value),
            NodeKind::Head | NodeKind::Tail => None,
        }
    }

    /// Iterates middle nodes from first to last.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.first(),
        }
    }

    /// Iterates middle nodes from `start` (inclusive) to the last one.
    #[must_use]
    pub fn iter_from(&self, start: NodeId) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: start,
        }
    }
}

/// Iterator over the middle nodes of a [`NodeList`].
pub struct Iter<'a, T> {
    list: &'a NodeList<T>,
    cursor: NodeId,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor;
        let value = self.list.get(current)?;
        self.cursor = self.list.next(current)?;
        Some((current, value))
    }
}

impl<'a, T> IntoIterator for &'a NodeList<T> {
    type Item = (NodeId, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
