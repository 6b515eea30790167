//! Range, before and after queries.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::e2e_tests::helpers::TestDir;

#[test]
fn test_range_matches_filter() {
    let dir = TestDir::with_branching_factor(3);
    let mut store = dir.open::<i64, i64>("Scores");
    let mut rng = StdRng::seed_from_u64(42);
    let mut inserted = Vec::new();
    for _ in 0..300 {
        let key = rng.random_range(-500..500);
        if store.insert(key, key * 10, false).unwrap().is_inserted() {
            inserted.push(key);
        }
    }
    inserted.sort_unstable();

    for _ in 0..50 {
        let a = rng.random_range(-600..600);
        let b = rng.random_range(-600..600);
        let (min, max) = (a.min(b), a.max(b));

        let found: Vec<i64> = store.range(&min, &max).map(|v| v / 10).collect();
        let expected: Vec<i64> = inserted
            .iter()
            .copied()
            .filter(|k| (min..=max).contains(k))
            .collect();
        assert_eq!(found, expected, "range {min}..={max}");

        let before: Vec<i64> = store.before(&min).map(|v| v / 10).collect();
        assert_eq!(before, inserted.iter().copied().filter(|k| *k < min).collect::<Vec<_>>());

        let after: Vec<i64> = store.after(&max).map(|v| v / 10).collect();
        assert_eq!(after, inserted.iter().copied().filter(|k| *k > max).collect::<Vec<_>>());
    }
}

#[test]
fn test_bounds_are_exclusive_for_before_and_after() {
    let dir = TestDir::new();
    let mut store = dir.open::<i64, String>("Bounds");
    for (k, v) in [(1, "a"), (2, "b"), (2, "b2"), (3, "c")] {
        store.insert(k, v.to_string(), true).unwrap();
    }

    assert_eq!(store.before(&2).collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(store.after(&2).collect::<Vec<_>>(), vec!["c"]);
    assert_eq!(store.range(&2, &2).count(), 2);
    assert_eq!(store.range(&3, &1).count(), 0);
    assert_eq!(store.before(&1).count(), 0);
    assert_eq!(store.after(&3).count(), 0);
}

#[test]
fn test_queries_on_empty_store() {
    let dir = TestDir::new();
    let store = dir.open::<i64, i64>("Empty");
    assert_eq!(store.all().count(), 0);
    assert_eq!(store.at(&1).count(), 0);
    assert_eq!(store.range(&0, &10).count(), 0);
    assert_eq!(store.first(&1), None);
}
