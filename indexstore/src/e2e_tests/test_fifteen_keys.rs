//! The fifteen-key scenario with the smallest branching factor.

use crate::e2e_tests::helpers::{TestDir, keys};
use crate::storage::InsertOutcome;

const INSERTED: [i64; 15] = [5, 33, 29, 7, 18, 81, 44, 12, 93, 27, 63, 19, 31, -5, 99];

#[test]
fn test_fifteen_keys_in_order() {
    let dir = TestDir::with_branching_factor(2);
    let mut store = dir.open::<i64, String>("Numbers");

    for key in INSERTED {
        let outcome = store.insert(key, format!("v{key}"), false).unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
    }
    store.tree().check_invariants().unwrap();

    let mut expected = INSERTED.to_vec();
    expected.sort_unstable();
    assert_eq!(keys(&store), expected);
    assert_eq!(
        keys(&store),
        vec![-5, 5, 7, 12, 18, 19, 27, 29, 31, 33, 44, 63, 81, 93, 99]
    );
    for key in INSERTED {
        assert_eq!(store.first(&key), Some(&format!("v{key}")));
    }
}

#[test]
fn test_fifteen_keys_delete_one() {
    let dir = TestDir::with_branching_factor(2);
    let mut store = dir.open::<i64, String>("Numbers");
    for key in INSERTED {
        store.insert(key, format!("v{key}"), false).unwrap();
    }

    assert_eq!(store.delete(&29).unwrap(), Some("v29".to_string()));
    store.tree().check_invariants().unwrap();

    let remaining = keys(&store);
    assert_eq!(remaining.len(), 14);
    assert!(!remaining.contains(&29));
    assert!(remaining.windows(2).all(|w| w[0] < w[1]));

    drop(store);
    let reopened = dir.open::<i64, String>("Numbers");
    assert_eq!(keys(&reopened), remaining);
}

#[test]
fn test_fifteen_keys_reinsert_is_ignored() {
    let dir = TestDir::with_branching_factor(2);
    let mut store = dir.open::<i64, String>("Numbers");
    for key in INSERTED {
        store.insert(key, format!("v{key}"), false).unwrap();
    }
    let log_len = dir.log_bytes("Numbers").len();

    for key in INSERTED {
        let outcome = store.insert(key, "again".to_string(), false).unwrap();
        assert_eq!(outcome, InsertOutcome::DuplicateIgnored);
    }
    assert_eq!(store.len(), 15);
    assert!(store.all().all(|v| v != "again"));
    assert_eq!(dir.log_bytes("Numbers").len(), log_len);
}
