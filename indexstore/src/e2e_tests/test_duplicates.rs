//! Duplicate keys behave as a multiset.

use crate::e2e_tests::helpers::{TestDir, keys};

#[test]
fn test_n_duplicates_are_all_returned() {
    let dir = TestDir::with_branching_factor(2);
    let mut store = dir.open::<String, u64>("Tags");
    for key in ["red", "green", "blue"] {
        store.insert(key.to_string(), 0, false).unwrap();
    }
    for n in 1..=12 {
        store.insert("green".to_string(), n, true).unwrap();
    }
    store.tree().check_invariants().unwrap();

    let mut found: Vec<u64> = store.at(&"green".to_string()).copied().collect();
    found.sort_unstable();
    assert_eq!(found, (0..=12).collect::<Vec<_>>());
    assert_eq!(store.at(&"red".to_string()).count(), 1);
    assert_eq!(store.at(&"yellow".to_string()).count(), 0);

    let all = keys(&store);
    assert_eq!(all.len(), 15);
    assert!(all.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_deleting_duplicates_one_at_a_time() {
    let dir = TestDir::with_branching_factor(3);
    let mut store = dir.open::<i64, u64>("Counts");
    for (key, value) in (0..4_i64).cycle().zip(0..20_u64) {
        store.insert(key, value, true).unwrap();
    }

    let mut removed = Vec::new();
    while let Some(value) = store.delete(&2).unwrap() {
        removed.push(value);
        store.tree().check_invariants().unwrap();
    }
    removed.sort_unstable();
    assert_eq!(removed, vec![2, 6, 10, 14, 18]);
    assert_eq!(store.len(), 15);
    assert_eq!(store.at(&2).count(), 0);

    drop(store);
    let reopened = dir.open::<i64, u64>("Counts");
    assert_eq!(reopened.len(), 15);
    assert_eq!(reopened.at(&1).count(), 5);
}

#[test]
fn test_duplicates_survive_reopen_as_a_multiset() {
    let dir = TestDir::new();
    let mut store = dir.open::<i64, String>("Multi");
    for value in ["a", "b", "c"] {
        store.insert(9, value.to_string(), true).unwrap();
    }
    store.update(&9, "z".to_string()).unwrap();
    let mut live: Vec<String> = store.at(&9).cloned().collect();
    drop(store);

    let reopened = dir.open::<i64, String>("Multi");
    let mut replayed: Vec<String> = reopened.at(&9).cloned().collect();
    live.sort();
    replayed.sort();
    assert_eq!(replayed, live);
    assert_eq!(replayed.iter().filter(|v| *v == "z").count(), 1);
}
