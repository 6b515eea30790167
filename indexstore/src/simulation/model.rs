//! Reference model for simulation runs.
//!
//! Equal keys behave like a stack in the tree: a new duplicate is placed
//! before the ones already there, and delete and update both act on the
//! first one in key order. The model keeps each key's values in a `Vec`
//! whose last element is that first entry.

use std::collections::BTreeMap;
use std::mem;
use std::ops::Bound;

type Entries = BTreeMap<i64, Vec<u64>>;

/// What a store should contain, both in memory and after a reopen.
#[derive(Debug, Default)]
pub struct Model {
    /// Every mutation the store accepted.
    memory: Entries,
    /// Only the mutations whose log append succeeded.
    durable: Entries,
}

impl Model {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: i64) -> bool {
        self.memory.contains_key(&key)
    }

    /// Value of the first entry equal to `key`.
    #[must_use]
    pub fn first(&self, key: i64) -> Option<u64> {
        self.memory.get(&key).and_then(|values| values.last().copied())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.memory.values().map(Vec::len).sum()
    }

    /// Record an insert. `durable` says whether it reached the log.
    pub fn insert(&mut self, key: i64, value: u64, durable: bool) {
        push(&mut self.memory, key, value);
        if durable {
            push(&mut self.durable, key, value);
        }
    }

    /// Record a delete, returning the value the store should have removed.
    pub fn delete(&mut self, key: i64, durable: bool) -> Option<u64> {
        let removed = pop(&mut self.memory, key);
        if durable {
            pop(&mut self.durable, key);
        }
        removed
    }

    /// Record an update, returning the value the store should have replaced.
    pub fn update(&mut self, key: i64, value: u64, durable: bool) -> Option<u64> {
        let replaced = replace(&mut self.memory, key, value);
        if durable {
            replace(&mut self.durable, key, value);
        }
        replaced
    }

    /// Forget everything that never reached the log, as a reopen does.
    pub fn restore(&mut self) {
        self.memory.clone_from(&self.durable);
    }

    /// Entries between two bounds, in the order a cursor yields them.
    #[must_use]
    pub fn entries(&self, lower: Bound<i64>, upper: Bound<i64>) -> Vec<(i64, u64)> {
        if !range_is_valid(lower, upper) {
            return Vec::new();
        }
        self.memory
            .range((lower, upper))
            .flat_map(|(&key, values)| values.iter().rev().map(move |&value| (key, value)))
            .collect()
    }
}

// BTreeMap::range panics on inverted bounds; a cursor just yields nothing.
fn range_is_valid(lower: Bound<i64>, upper: Bound<i64>) -> bool {
    match (lower, upper) {
        (Bound::Included(a), Bound::Included(b)) => a <= b,
        (Bound::Included(a) | Bound::Excluded(a), Bound::Excluded(b))
        | (Bound::Excluded(a), Bound::Included(b)) => a < b,
        _ => true,
    }
}

fn push(entries: &mut Entries, key: i64, value: u64) {
    entries.entry(key).or_default().push(value);
}

fn pop(entries: &mut Entries, key: i64) -> Option<u64> {
    let values = entries.get_mut(&key)?;
    let removed = values.pop();
    if values.is_empty() {
        entries.remove(&key);
    }
    removed
}

fn replace(entries: &mut Entries, key: i64, value: u64) -> Option<u64> {
    entries
        .get_mut(&key)
        .and_then(|values| values.last_mut())
        .map(|slot| mem::replace(slot, value))
}

/// A disagreement between the store and the model.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Index of the operation after which it was detected.
    pub operation_index: usize,
    pub description: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "after operation {}: {}", self.operation_index, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_are_a_stack() {
        let mut model = Model::new();
        model.insert(1, 10, true);
        model.insert(1, 11, true);
        model.insert(2, 20, true);

        assert_eq!(model.first(1), Some(11));
        assert_eq!(
            model.entries(Bound::Unbounded, Bound::Unbounded),
            vec![(1, 11), (1, 10), (2, 20)]
        );

        assert_eq!(model.update(1, 12, true), Some(11));
        assert_eq!(model.delete(1, true), Some(12));
        assert_eq!(model.delete(1, true), Some(10));
        assert_eq!(model.delete(1, true), None);
        assert!(!model.contains(1));
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_restore_drops_changes_that_never_reached_the_log() {
        let mut model = Model::new();
        model.insert(1, 10, true);
        model.insert(2, 20, false);
        model.update(1, 11, false);
        model.delete(1, true);

        assert_eq!(model.entries(Bound::Unbounded, Bound::Unbounded), vec![(2, 20)]);
        model.restore();
        assert_eq!(model.entries(Bound::Unbounded, Bound::Unbounded), Vec::new());
    }

    #[test]
    fn test_inverted_bounds_are_empty() {
        let mut model = Model::new();
        model.insert(5, 50, true);
        assert!(model.entries(Bound::Excluded(5), Bound::Excluded(5)).is_empty());
        assert!(model.entries(Bound::Included(6), Bound::Included(4)).is_empty());
        assert_eq!(model.entries(Bound::Included(5), Bound::Included(5)), vec![(5, 50)]);
    }
}
