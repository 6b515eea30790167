//! Structural self-checks.
//!
//! The engine panics on corruption it trips over while operating. This walk
//! looks for everything else, and tests call it after every mutation.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::storage::btree::node::NodeId;
use crate::storage::btree::order::KeyOrder;
use crate::storage::btree::tree::BTree;

/// The first structural problem found by `BTree::check_invariants`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A node's key and value vectors differ in length.
    LengthMismatch {
        node: NodeId,
        keys: usize,
        values: usize,
    },
    /// A node holds more than `2b - 1` keys.
    Overfull { node: NodeId, keys: usize, max: usize },
    /// A non-root node holds fewer than `b - 1` keys.
    Underfull { node: NodeId, keys: usize, min: usize },
    /// An interior node does not have exactly one more child than keys.
    ChildCount {
        node: NodeId,
        keys: usize,
        children: usize,
    },
    /// `keys[index]` is out of order with its neighbour or its subtree bounds.
    OutOfOrder { node: NodeId, index: usize },
    /// A leaf sits at a different depth than the first leaf found.
    UnevenLeaves {
        node: NodeId,
        depth: usize,
        expected: usize,
    },
    /// A node is referenced by more than one parent.
    SharedNode(NodeId),
    /// The recorded entry count does not match the entries reachable.
    EntryCount { reachable: usize, recorded: usize },
    /// The arena holds nodes that are not reachable from the root.
    LeakedNodes { reachable: usize, live: usize },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthMismatch { node, keys, values } => {
                write!(f, "node {node} has {keys} keys but {values} values")
            }
            Self::Overfull { node, keys, max } => {
                write!(f, "node {node} has {keys} keys (maximum {max})")
            }
            Self::Underfull { node, keys, min } => {
                write!(f, "node {node} has {keys} keys (minimum {min})")
            }
            Self::ChildCount {
                node,
                keys,
                children,
            } => write!(f, "node {node} has {keys} keys but {children} children"),
            Self::OutOfOrder { node, index } => {
                write!(f, "key {index} of node {node} is out of order")
            }
            Self::UnevenLeaves {
                node,
                depth,
                expected,
            } => write!(f, "leaf {node} is at depth {depth}, expected {expected}"),
            Self::SharedNode(node) => write!(f, "node {node} is reachable twice"),
            Self::EntryCount {
                reachable,
                recorded,
            } => write!(f, "{reachable} entries reachable but length is {recorded}"),
            Self::LeakedNodes { reachable, live } => {
                write!(f, "{reachable} nodes reachable but {live} allocated")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

struct Walk {
    seen: HashSet<NodeId>,
    leaf_depth: Option<usize>,
    entries: usize,
}

impl<K, V, C: KeyOrder<K>> BTree<K, V, C> {
    /// Verify the whole structure, returning the first violation found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut walk = Walk {
            seen: HashSet::new(),
            leaf_depth: None,
            entries: 0,
        };
        self.check_node(self.root(), 1, None, None, &mut walk)?;

        if walk.entries != self.len() {
            return Err(InvariantViolation::EntryCount {
                reachable: walk.entries,
                recorded: self.len(),
            });
        }
        let live = self.arena().live();
        if walk.seen.len() != live {
            return Err(InvariantViolation::LeakedNodes {
                reachable: walk.seen.len(),
                live,
            });
        }
        Ok(())
    }

    fn check_node(
        &self,
        id: NodeId,
        depth: usize,
        lower: Option<&K>,
        upper: Option<&K>,
        walk: &mut Walk,
    ) -> Result<(), InvariantViolation> {
        if !walk.seen.insert(id) {
            return Err(InvariantViolation::SharedNode(id));
        }

        let node = self.node(id);
        let keys = node.keys.len();
        if node.values.len() != keys {
            return Err(InvariantViolation::LengthMismatch {
                node: id,
                keys,
                values: node.values.len(),
            });
        }
        if keys > self.max_keys() {
            return Err(InvariantViolation::Overfull {
                node: id,
                keys,
                max: self.max_keys(),
            });
        }
        if id != self.root() && keys < self.min_keys() {
            return Err(InvariantViolation::Underfull {
                node: id,
                keys,
                min: self.min_keys(),
            });
        }

        let order = self.order();
        let not_after = |a: &K, b: &K| order.compare(a, b) != Ordering::Greater;
        for (index, key) in node.keys.iter().enumerate() {
            let previous = index.checked_sub(1).map(|i| &node.keys[i]).or(lower);
            let in_order = previous.is_none_or(|p| not_after(p, key))
                && upper.is_none_or(|u| not_after(key, u));
            if !in_order {
                return Err(InvariantViolation::OutOfOrder { node: id, index });
            }
        }
        walk.entries += keys;

        if node.is_leaf() {
            let expected = *walk.leaf_depth.get_or_insert(depth);
            if depth != expected {
                return Err(InvariantViolation::UnevenLeaves {
                    node: id,
                    depth,
                    expected,
                });
            }
            return Ok(());
        }

        if node.children.len() != keys + 1 {
            return Err(InvariantViolation::ChildCount {
                node: id,
                keys,
                children: node.children.len(),
            });
        }
        for (i, &child) in node.children.iter().enumerate() {
            let child_lower = i.checked_sub(1).map(|j| &node.keys[j]).or(lower);
            let child_upper = node.keys.get(i).or(upper);
            self.check_node(child, depth + 1, child_lower, child_upper, walk)?;
        }
        Ok(())
    }
}
