//! In-memory B-tree engine.
//!
//! The tree is generic over its key order and owns all nodes through a
//! `NodeArena`. Every structural operation mutates the tree in place; the
//! root handle changes when the root splits or collapses, but callers only
//! ever hold the `BTree` itself.
//!
//! # Shape
//!
//! With minimum branching factor `b`:
//! - every node holds at most `2b - 1` keys
//! - every node except the root holds at least `b - 1` keys
//! - an interior node with `n` keys has `n + 1` children
//! - all leaves sit at the same depth
//!
//! Keys that compare equal may appear more than once when the caller inserts
//! with duplicates allowed. Their relative order is whatever splits and
//! merges left behind.

use std::mem;
use std::ops::Bound;

use crate::config::{ConfigError, MIN_BRANCHING_FACTOR};
use crate::storage::btree::cursor::Cursor;
use crate::storage::btree::node::{Node, NodeArena, NodeId};
use crate::storage::btree::order::{KeyOrder, NaturalOrder};

/// Result of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The entry was added.
    Inserted,
    /// Duplicates were disallowed and an equal key already exists; nothing changed.
    DuplicateIgnored,
}

impl InsertOutcome {
    /// Whether the tree changed.
    #[must_use]
    pub const fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Ancestors of a node, root first, each paired with the child slot taken.
type Path = Vec<(NodeId, usize)>;

/// An ordered multimap backed by a B-tree.
#[derive(Debug)]
pub struct BTree<K, V, C = NaturalOrder> {
    nodes: NodeArena<K, V>,
    root: NodeId,
    len: usize,
    min_degree: usize,
    order: C,
}

impl<K: Ord, V> BTree<K, V, NaturalOrder> {
    /// Create an empty tree ordered by `K`'s `Ord`.
    pub fn with_branching_factor(branching_factor: usize) -> Result<Self, ConfigError> {
        Self::new(branching_factor, NaturalOrder)
    }
}

impl<K, V, C: KeyOrder<K>> BTree<K, V, C> {
    /// Create an empty tree.
    ///
    /// `branching_factor` is the minimum branching factor `b` and must be at
    /// least 2.
    pub fn new(branching_factor: usize, order: C) -> Result<Self, ConfigError> {
        if branching_factor < MIN_BRANCHING_FACTOR {
            return Err(ConfigError::BranchingFactorTooSmall(branching_factor));
        }
        let mut nodes = NodeArena::new();
        let root = nodes.alloc(Node::leaf(2 * branching_factor - 1));
        Ok(Self {
            nodes,
            root,
            len: 0,
            min_degree: branching_factor,
            order,
        })
    }

    /// The minimum branching factor `b`.
    #[must_use]
    pub const fn branching_factor(&self) -> usize {
        self.min_degree
    }

    /// Maximum keys per node (`2b - 1`).
    #[must_use]
    pub const fn max_keys(&self) -> usize {
        2 * self.min_degree - 1
    }

    /// Minimum keys per non-root node (`b - 1`).
    #[must_use]
    pub const fn min_keys(&self) -> usize {
        self.min_degree - 1
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn order(&self) -> &C {
        &self.order
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node<K, V> {
        self.nodes.get(id)
    }

    #[cfg(test)]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        self.nodes.get_mut(id)
    }

    pub(crate) const fn arena(&self) -> &NodeArena<K, V> {
        &self.nodes
    }

    /// Number of levels, counting the root. An empty tree has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut id = self.root;
        while let Some(&child) = self.nodes.get(id).children.first() {
            depth += 1;
            id = child;
        }
        depth
    }

    /// Look up a value by key.
    ///
    /// With duplicate keys, returns one of the matching values.
    #[must_use]
    pub fn search(&self, key: &K) -> Option<&V> {
        let mut id = self.root;
        loop {
            let node = self.nodes.get(id);
            let index = node.lower_bound(&self.order, key);
            if node.key_matches(&self.order, index, key) {
                return Some(&node.values[index]);
            }
            if node.is_leaf() {
                return None;
            }
            id = node.children[index];
        }
    }

    /// Whether an entry with an equal key exists.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_some()
    }

    /// Insert an entry.
    ///
    /// With `allow_duplicates` false, an existing equal key turns the call
    /// into a no-op. Otherwise the entry goes before any equal keys already in
    /// its leaf.
    pub fn insert(&mut self, key: K, value: V, allow_duplicates: bool) -> InsertOutcome {
        let mut path = Path::new();
        let mut id = self.root;
        loop {
            let node = self.nodes.get(id);
            let index = node.lower_bound(&self.order, &key);
            if !allow_duplicates && node.key_matches(&self.order, index, &key) {
                return InsertOutcome::DuplicateIgnored;
            }
            path.push((id, index));
            if node.is_leaf() {
                break;
            }
            id = node.children[index];
        }

        self.insert_along(path, key, value);
        self.len += 1;
        InsertOutcome::Inserted
    }

    /// Put an entry at the end of `path`, splitting full nodes upward.
    fn insert_along(&mut self, mut path: Path, key: K, value: V) {
        let max_keys = self.max_keys();
        let center = self.min_degree;

        let Some((mut id, mut index)) = path.pop() else {
            corrupted("insert path is empty");
        };
        let mut pending = (key, value, None);

        loop {
            let (key, value, right) = pending;
            let node = self.nodes.get_mut(id);
            if node.len() < max_keys {
                node.insert_entry(index, key, value, right);
                return;
            }

            let (separator, right_node) = split_full(node, center, index, (key, value, right));
            let right_id = self.nodes.alloc(right_node);

            match path.pop() {
                Some((parent, child_index)) => {
                    id = parent;
                    index = child_index;
                    pending = (separator.0, separator.1, Some(right_id));
                }
                None => {
                    let new_root = Node::with_children(id, separator.0, separator.1, right_id);
                    self.root = self.nodes.alloc(new_root);
                    tracing::trace!(root = %self.root, depth = self.depth(), "root split");
                    return;
                }
            }
        }
    }

    /// Remove one entry whose key equals `key`, returning its value.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        let mut path = self.path_to_first(key)?;
        let Some(&(id, index)) = path.last() else {
            corrupted("delete path is empty");
        };

        let (leaf, removed) = if self.nodes.get(id).is_leaf() {
            path.pop();
            let (_, value) = self.nodes.get_mut(id).remove_entry(index);
            (id, value)
        } else {
            // Overwrite the interior entry with its predecessor, then take the
            // predecessor out of its leaf.
            let mut leaf = self.nodes.get(id).children[index];
            loop {
                let node = self.nodes.get(leaf);
                if node.is_leaf() {
                    break;
                }
                let last = node.children.len() - 1;
                path.push((leaf, last));
                leaf = node.children[last];
            }

            let node = self.nodes.get_mut(leaf);
            let (Some(pred_key), Some(pred_value)) = (node.keys.pop(), node.values.pop()) else {
                corrupted("predecessor leaf is empty");
            };
            let holder = self.nodes.get_mut(id);
            holder.keys[index] = pred_key;
            let removed = mem::replace(&mut holder.values[index], pred_value);
            (leaf, removed)
        };

        self.len -= 1;
        self.rebalance(leaf, path);
        Some(removed)
    }

    /// Restore occupancy from `id` upward after a removal.
    fn rebalance(&mut self, mut id: NodeId, mut path: Path) {
        let min_keys = self.min_keys();

        while let Some((parent, child_index)) = path.pop() {
            if self.nodes.get(id).len() >= min_keys {
                return;
            }

            let parent_node = self.nodes.get(parent);
            let right = parent_node.children.get(child_index + 1).copied();
            let left = child_index
                .checked_sub(1)
                .map(|i| parent_node.children[i]);

            if right.is_some_and(|r| self.nodes.get(r).len() > min_keys) {
                self.borrow_from_right(parent, child_index);
                return;
            }
            if left.is_some_and(|l| self.nodes.get(l).len() > min_keys) {
                self.borrow_from_left(parent, child_index);
                return;
            }

            if child_index > 0 {
                self.merge_children(parent, child_index - 1);
            } else {
                self.merge_children(parent, child_index);
            }
            id = parent;
        }

        let root = self.nodes.get(self.root);
        if root.is_empty() && !root.is_leaf() {
            let old_root = self.root;
            self.root = root.children[0];
            drop(self.nodes.release(old_root));
            tracing::trace!(root = %self.root, "root collapsed");
        }
    }

    /// Rotate the first entry of the right sibling through the parent into
    /// `children[child_index]`.
    fn borrow_from_right(&mut self, parent: NodeId, child_index: usize) {
        let parent_node = self.nodes.get(parent);
        let target = parent_node.children[child_index];
        let lender = parent_node.children[child_index + 1];

        let lender_node = self.nodes.get_mut(lender);
        let (key, value) = lender_node.remove_entry(0);
        let child = (!lender_node.is_leaf()).then(|| lender_node.children.remove(0));

        let parent_node = self.nodes.get_mut(parent);
        let sep_key = mem::replace(&mut parent_node.keys[child_index], key);
        let sep_value = mem::replace(&mut parent_node.values[child_index], value);

        let target_node = self.nodes.get_mut(target);
        target_node.keys.push(sep_key);
        target_node.values.push(sep_value);
        if let Some(child) = child {
            target_node.children.push(child);
        }
    }

    /// Rotate the last entry of the left sibling through the parent into
    /// `children[child_index]`.
    fn borrow_from_left(&mut self, parent: NodeId, child_index: usize) {
        let parent_node = self.nodes.get(parent);
        let target = parent_node.children[child_index];
        let lender = parent_node.children[child_index - 1];

        let lender_node = self.nodes.get_mut(lender);
        let (Some(key), Some(value)) = (lender_node.keys.pop(), lender_node.values.pop()) else {
            corrupted("left sibling has no entry to lend");
        };
        let child = if lender_node.is_leaf() {
            None
        } else {
            lender_node.children.pop()
        };

        let parent_node = self.nodes.get_mut(parent);
        let sep_key = mem::replace(&mut parent_node.keys[child_index - 1], key);
        let sep_value = mem::replace(&mut parent_node.values[child_index - 1], value);

        let target_node = self.nodes.get_mut(target);
        target_node.keys.insert(0, sep_key);
        target_node.values.insert(0, sep_value);
        if let Some(child) = child {
            target_node.children.insert(0, child);
        }
    }

    /// Fold `children[separator + 1]` and the separator into `children[separator]`.
    fn merge_children(&mut self, parent: NodeId, separator: usize) {
        let parent_node = self.nodes.get_mut(parent);
        let left = parent_node.children[separator];
        let right = parent_node.children.remove(separator + 1);
        let entry = parent_node.remove_entry(separator);

        let right_node = self.nodes.release(right);
        self.nodes.get_mut(left).absorb(entry, right_node);
    }

    /// Replace the value of the first entry equal to `key`.
    ///
    /// Returns the previous value, or hands `value` back when no entry matches.
    /// The tree's shape never changes.
    pub fn update(&mut self, key: &K, value: V) -> Result<V, V> {
        match self.seek_first(key) {
            Some((id, index)) => Ok(mem::replace(
                &mut self.nodes.get_mut(id).values[index],
                value,
            )),
            None => Err(value),
        }
    }

    /// Value of the first entry, in key order, equal to `key`.
    #[must_use]
    pub fn first_match(&self, key: &K) -> Option<&V> {
        self.seek_first(key)
            .map(|(id, index)| &self.nodes.get(id).values[index])
    }

    /// Position of the first entry, in key order, equal to `key`.
    fn seek_first(&self, key: &K) -> Option<(NodeId, usize)> {
        let mut candidate = None;
        let mut id = self.root;
        loop {
            let node = self.nodes.get(id);
            let index = node.lower_bound(&self.order, key);
            if index < node.len() {
                candidate = Some((id, index));
            }
            if node.is_leaf() {
                break;
            }
            id = node.children[index];
        }
        candidate.filter(|&(id, index)| self.nodes.get(id).key_matches(&self.order, index, key))
    }

    /// Path from the root to the first entry equal to `key`, with the entry's
    /// own node and index as the last element.
    fn path_to_first(&self, key: &K) -> Option<Path> {
        let mut path = Path::new();
        let mut found = None;
        let mut id = self.root;
        loop {
            let node = self.nodes.get(id);
            let index = node.lower_bound(&self.order, key);
            path.push((id, index));
            if index < node.len() {
                found = Some(path.len());
            }
            if node.is_leaf() {
                break;
            }
            id = node.children[index];
        }

        path.truncate(found?);
        let &(id, index) = path.last()?;
        self.nodes
            .get(id)
            .key_matches(&self.order, index, key)
            .then_some(path)
    }

    /// Smallest entry.
    #[must_use]
    pub fn first_entry(&self) -> Option<(&K, &V)> {
        let mut node = self.nodes.get(self.root);
        while let Some(&child) = node.children.first() {
            node = self.nodes.get(child);
        }
        node.keys.first().zip(node.values.first())
    }

    /// Largest entry.
    #[must_use]
    pub fn last_entry(&self) -> Option<(&K, &V)> {
        let mut node = self.nodes.get(self.root);
        while let Some(&child) = node.children.last() {
            node = self.nodes.get(child);
        }
        node.keys.last().zip(node.values.last())
    }

    /// Entries between two bounds, in key order.
    #[must_use]
    pub fn range<'a>(&'a self, lower: Bound<&'a K>, upper: Bound<&'a K>) -> Cursor<'a, K, V, C> {
        Cursor::new(self, lower, upper)
    }

    /// All entries in key order.
    #[must_use]
    pub fn iter(&self) -> Cursor<'_, K, V, C> {
        Cursor::new(self, Bound::Unbounded, Bound::Unbounded)
    }

    /// Drop every entry, leaving an empty leaf root.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = self.nodes.alloc(Node::leaf(self.max_keys()));
        self.len = 0;
    }
}

impl<'a, K, V, C: KeyOrder<K>> IntoIterator for &'a BTree<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Cursor<'a, K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Split a full node while placing one more entry into it.
///
/// `center` is `b`. The node keeps the left half and the new right half is
/// returned with the separator to promote. The left half always ends with
/// `b` keys and the right with `b - 1`.
fn split_full<K, V>(
    node: &mut Node<K, V>,
    center: usize,
    index: usize,
    (key, value, right_child): (K, V, Option<NodeId>),
) -> ((K, V), Node<K, V>) {
    if index == center {
        // The new entry lands exactly between the halves and is promoted itself.
        let mut right = node.split_off(center);
        if let Some(child) = right_child {
            let handed_back = mem::replace(&mut right.children[0], child);
            node.children.push(handed_back);
        }
        return ((key, value), right);
    }

    let split_at = if index < center { center - 1 } else { center };
    let mut right = node.split_off(split_at + 1);
    let (Some(sep_key), Some(sep_value)) = (node.keys.pop(), node.values.pop()) else {
        corrupted("split of an empty node");
    };

    if index < center {
        node.insert_entry(index, key, value, right_child);
    } else {
        right.insert_entry(index - (split_at + 1), key, value, right_child);
    }
    ((sep_key, sep_value), right)
}

#[cold]
fn corrupted(what: &str) -> ! {
    panic!("B-tree structure corrupted: {what}")
}
