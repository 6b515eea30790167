//! Updates change values in place and are always logged.

use crate::e2e_tests::helpers::{TestDir, entries, keys};

#[test]
fn test_update_absent_key_fails_without_changing_anything() {
    let dir = TestDir::new();
    let mut store = dir.open::<i64, String>("Users");
    store.insert(1, "ann".to_string(), false).unwrap();
    let log = dir.log_bytes("Users");

    assert!(!store.update(&2, "bob".to_string()).unwrap());
    assert_eq!(store.len(), 1);
    assert_eq!(dir.log_bytes("Users"), log);
}

#[test]
fn test_update_changes_value_not_order() {
    let dir = TestDir::with_branching_factor(2);
    let mut store = dir.open::<i64, String>("Users");
    for key in 0..30 {
        store.insert(key, format!("user-{key}"), false).unwrap();
    }
    let before = keys(&store);

    for key in (0..30).step_by(3) {
        assert!(store.update(&key, format!("renamed-{key}")).unwrap());
    }
    assert_eq!(keys(&store), before);
    assert_eq!(store.first(&3), Some(&"renamed-3".to_string()));
    assert_eq!(store.first(&4), Some(&"user-4".to_string()));

    let live = entries(&store);
    drop(store);
    assert_eq!(entries(&dir.open::<i64, String>("Users")), live);
}

#[test]
fn test_update_to_same_value_is_logged() {
    let dir = TestDir::new();
    let mut store = dir.open::<i64, String>("Users");
    store.insert(1, "ann".to_string(), false).unwrap();
    let log_len = dir.log_bytes("Users").len();

    assert!(store.update(&1, "ann".to_string()).unwrap());
    assert!(dir.log_bytes("Users").len() > log_len);
    drop(store);

    let reopened = dir.open::<i64, String>("Users");
    assert_eq!(reopened.recovery().updates, 1);
    assert_eq!(reopened.first(&1), Some(&"ann".to_string()));
}
