//! Forward-only range traversal.
//!
//! A cursor remembers the path from the root to its current entry as a stack
//! of `(node, index)` frames. In a leaf frame the index names the entry to
//! yield next; in an interior frame it names the separator to yield once the
//! child below it is exhausted. Climbing out of a finished node is a pop.

use std::cmp::Ordering;
use std::iter::FusedIterator;
use std::ops::Bound;

use crate::storage::btree::node::NodeId;
use crate::storage::btree::order::KeyOrder;
use crate::storage::btree::tree::BTree;

/// Iterator over the entries of a `BTree` between two bounds.
///
/// Single pass: once it returns `None` it stays exhausted. Build a new one to
/// run the query again.
pub struct Cursor<'a, K, V, C> {
    tree: &'a BTree<K, V, C>,
    stack: Vec<(NodeId, usize)>,
    upper: Bound<&'a K>,
}

impl<'a, K, V, C: KeyOrder<K>> Cursor<'a, K, V, C> {
    /// Position a cursor on the first entry satisfying `lower`.
    #[must_use]
    pub fn new(tree: &'a BTree<K, V, C>, lower: Bound<&'a K>, upper: Bound<&'a K>) -> Self {
        let order = tree.order();
        let mut stack = Vec::with_capacity(tree.depth());
        let mut id = tree.root();
        loop {
            let node = tree.node(id);
            let index = match lower {
                Bound::Included(key) => node.lower_bound(order, key),
                Bound::Excluded(key) => node.upper_bound(order, key),
                Bound::Unbounded => 0,
            };
            stack.push((id, index));
            if node.is_leaf() {
                break;
            }
            id = node.children[index];
        }

        let mut cursor = Self { tree, stack, upper };
        cursor.settle();
        cursor
    }

    /// Key of the entry `next` would consider, ignoring the upper bound.
    #[must_use]
    pub fn peek_key(&self) -> Option<&'a K> {
        self.stack
            .last()
            .map(|&(id, index)| &self.tree.node(id).keys[index])
    }

    fn within_upper(&self, key: &K) -> bool {
        let order = self.tree.order();
        match self.upper {
            Bound::Included(max) => order.compare(key, max) != Ordering::Greater,
            Bound::Excluded(max) => order.compare(key, max) == Ordering::Less,
            Bound::Unbounded => true,
        }
    }

    /// Step past the entry at the top of the stack.
    fn advance(&mut self) {
        let Some(top) = self.stack.last_mut() else {
            return;
        };
        top.1 += 1;
        let (id, index) = *top;

        let node = self.tree.node(id);
        if !node.is_leaf() {
            // Descend to the smallest entry of the subtree after the separator.
            let mut child = node.children[index];
            loop {
                self.stack.push((child, 0));
                let child_node = self.tree.node(child);
                match child_node.children.first() {
                    Some(&next) => child = next,
                    None => break,
                }
            }
        }
        self.settle();
    }

    /// Pop frames whose node has no entries left.
    fn settle(&mut self) {
        while let Some(&(id, index)) = self.stack.last() {
            if index < self.tree.node(id).len() {
                break;
            }
            self.stack.pop();
        }
    }
}

impl<'a, K, V, C: KeyOrder<K>> Iterator for Cursor<'a, K, V, C> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let &(id, index) = self.stack.last()?;
        let node = self.tree.node(id);
        let key = &node.keys[index];
        if !self.within_upper(key) {
            self.stack.clear();
            return None;
        }
        let value = &node.values[index];
        self.advance();
        Some((key, value))
    }
}

impl<K, V, C: KeyOrder<K>> FusedIterator for Cursor<'_, K, V, C> {}

impl<K: std::fmt::Debug, V, C> std::fmt::Debug for Cursor<'_, K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("stack", &self.stack)
            .field("upper", &self.upper)
            .finish_non_exhaustive()
    }
}

/// The values of a `Cursor`, in key order.
#[derive(Debug)]
pub struct Values<'a, K, V, C>(Cursor<'a, K, V, C>);

impl<'a, K, V, C: KeyOrder<K>> Values<'a, K, V, C> {
    #[must_use]
    pub const fn new(cursor: Cursor<'a, K, V, C>) -> Self {
        Self(cursor)
    }

    /// Yield `(key, value)` pairs instead.
    #[must_use]
    pub fn with_keys(self) -> Cursor<'a, K, V, C> {
        self.0
    }
}

impl<'a, K, V, C: KeyOrder<K>> Iterator for Values<'a, K, V, C> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, value)| value)
    }
}

impl<K, V, C: KeyOrder<K>> FusedIterator for Values<'_, K, V, C> {}
