//! B-tree nodes and the arena that owns them.
//!
//! Nodes never point at each other directly. A node lists its children as
//! `NodeId` handles into the `NodeArena`, and the arena owns every node. Code
//! that needs to walk upward keeps the path it took on the way down.

use std::cmp::Ordering;

use crate::storage::btree::order::KeyOrder;

/// Stable handle to a node slot in a `NodeArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Slot index inside the arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A B-tree node.
///
/// `keys` and `values` are parallel. An interior node has exactly
/// `keys.len() + 1` children; `children[i]` holds entries ordered before
/// `keys[i]` and `children[i + 1]` entries ordered after it. A leaf has none.
#[derive(Debug)]
pub struct Node<K, V> {
    pub keys: Vec<K>,
    pub values: Vec<V>,
    pub children: Vec<NodeId>,
}

impl<K, V> Node<K, V> {
    /// Create an empty leaf with room for `capacity` entries.
    #[must_use]
    pub fn leaf(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            children: Vec::new(),
        }
    }

    /// Create an interior node holding one separator between two children.
    #[must_use]
    pub fn with_children(left: NodeId, key: K, value: V, right: NodeId) -> Self {
        Self {
            keys: vec![key],
            values: vec![value],
            children: vec![left, right],
        }
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::is_empty() is not const-stable
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::len() is not const-stable
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::is_empty() is not const-stable
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Index of the first key that is not ordered before `key`.
    ///
    /// When several keys compare equal, this is the leftmost of them.
    #[must_use]
    pub fn lower_bound<C: KeyOrder<K>>(&self, order: &C, key: &K) -> usize {
        self.keys
            .partition_point(|probe| order.compare(probe, key) == Ordering::Less)
    }

    /// Index of the first key ordered strictly after `key`.
    #[must_use]
    pub fn upper_bound<C: KeyOrder<K>>(&self, order: &C, key: &K) -> usize {
        self.keys
            .partition_point(|probe| order.compare(probe, key) != Ordering::Greater)
    }

    /// Whether `keys[index]` exists and compares equal to `key`.
    #[must_use]
    pub fn key_matches<C: KeyOrder<K>>(&self, order: &C, index: usize, key: &K) -> bool {
        self.keys
            .get(index)
            .is_some_and(|probe| order.compare(probe, key) == Ordering::Equal)
    }

    /// Insert an entry at `index`, with `right` as the child that follows it.
    pub fn insert_entry(&mut self, index: usize, key: K, value: V, right: Option<NodeId>) {
        self.keys.insert(index, key);
        self.values.insert(index, value);
        if let Some(child) = right {
            self.children.insert(index + 1, child);
        }
    }

    /// Remove and return the entry at `index`.
    pub fn remove_entry(&mut self, index: usize) -> (K, V) {
        (self.keys.remove(index), self.values.remove(index))
    }

    /// Move every entry from `at` onward, and every child from `at` onward,
    /// into a new right-hand node.
    ///
    /// For an interior node this leaves the left half one child short; the
    /// caller hands one back when it settles where the separator goes.
    #[must_use]
    pub fn split_off(&mut self, at: usize) -> Self {
        let keys = self.keys.split_off(at);
        let values = self.values.split_off(at);
        let children = if self.is_leaf() {
            Vec::new()
        } else {
            self.children.split_off(at)
        };
        Self {
            keys,
            values,
            children,
        }
    }

    /// Append `separator` and all of `right` onto this node.
    pub fn absorb(&mut self, separator: (K, V), right: Self) {
        self.keys.push(separator.0);
        self.values.push(separator.1);
        self.keys.extend(right.keys);
        self.values.extend(right.values);
        self.children.extend(right.children);
    }
}

/// Owns every node of one tree.
///
/// Released slots are recycled before the arena grows. Looking up a released
/// or never-allocated handle is a structural bug and panics.
#[derive(Debug)]
pub struct NodeArena<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<NodeId>,
}

impl<K, V> Default for NodeArena<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> NodeArena<K, V> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Store a node and return its handle.
    pub fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.slots[id.0] = Some(node);
            id
        } else {
            self.slots.push(Some(node));
            NodeId(self.slots.len() - 1)
        }
    }

    /// Take a node out of the arena, returning its slot to the free list.
    pub fn release(&mut self, id: NodeId) -> Node<K, V> {
        let node = self
            .slots
            .get_mut(id.0)
            .and_then(Option::take)
            .unwrap_or_else(|| dangling(id));
        self.free.push(id);
        node
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> &Node<K, V> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| dangling(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| dangling(id))
    }

    /// Number of nodes currently allocated.
    #[must_use]
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

#[cold]
fn dangling(id: NodeId) -> ! {
    panic!("B-tree structure corrupted: node {id} is not allocated")
}
