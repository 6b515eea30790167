//! In-memory B-tree.
//!
//! # Structure
//!
//! - `node`: nodes and the arena that owns them
//! - `tree`: search, insert with split, delete with rebalance, update
//! - `cursor`: bounded forward traversal
//! - `order`: pluggable key comparators
//! - `invariants`: structural self-check used by tests and diagnostics
//!
//! # Usage
//!
//! ```
//! use std::ops::Bound;
//! use indexstore::storage::btree::BTree;
//!
//! let mut tree = BTree::with_branching_factor(2).unwrap();
//! for k in [5, 33, 29, 7, 18] {
//!     tree.insert(k, k * 10, false);
//! }
//!
//! let found: Vec<i32> = tree
//!     .range(Bound::Included(&7), Bound::Excluded(&33))
//!     .map(|(k, _)| *k)
//!     .collect();
//! assert_eq!(found, vec![7, 18, 29]);
//! ```

mod cursor;
mod invariants;
mod node;
mod order;
mod tree;

pub use cursor::{Cursor, Values};
pub use invariants::InvariantViolation;
pub use node::{Node, NodeId};
pub use order::{CaseInsensitive, KeyOrder, NaturalOrder, Reverse};
pub use tree::{BTree, InsertOutcome};
