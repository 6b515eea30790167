//! Stores over the supported key and value encodings and comparators.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::e2e_tests::helpers::{TestDir, keys};
use crate::storage::{CaseInsensitive, FileLogStorage, NaturalOrder, Reverse, Store};

#[test]
fn test_composite_keys() {
    let dir = TestDir::new();
    let mut store = dir.open::<(u64, String), Option<bool>>("Memberships");
    store.insert((2, "b".to_string()), Some(true), false).unwrap();
    store.insert((1, "z".to_string()), None, false).unwrap();
    store.insert((2, "a".to_string()), Some(false), false).unwrap();
    drop(store);

    let store = dir.open::<(u64, String), Option<bool>>("Memberships");
    assert_eq!(
        keys(&store),
        vec![
            (1, "z".to_string()),
            (2, "a".to_string()),
            (2, "b".to_string())
        ]
    );
    assert_eq!(store.first(&(1, "z".to_string())), Some(&None));
    let low = (2, String::new());
    let high = (2, "~".to_string());
    assert_eq!(store.range(&low, &high).count(), 2);
}

#[test]
fn test_timestamp_keys() {
    let dir = TestDir::with_branching_factor(2);
    let mut store = dir.open::<SystemTime, Vec<u8>>("Messages");
    let at = |ms: u64| UNIX_EPOCH + Duration::from_millis(ms);
    for ms in [1_700_000_000_500, 1_700_000_000_100, 1_700_000_000_300] {
        store.insert(at(ms), ms.to_be_bytes().to_vec(), true).unwrap();
    }
    drop(store);

    let store = dir.open::<SystemTime, Vec<u8>>("Messages");
    let oldest = at(1_700_000_000_100);
    let newer: Vec<&Vec<u8>> = store.after(&oldest).collect();
    assert_eq!(newer.len(), 2);
    assert_eq!(
        store.first(&at(1_700_000_000_300)),
        Some(&1_700_000_000_300_u64.to_be_bytes().to_vec())
    );
}

#[test]
fn test_case_insensitive_file_store() {
    let dir = TestDir::new();
    let open = || {
        let storage = FileLogStorage::open(dir.log_path("Names")).unwrap();
        Store::<String, u64, CaseInsensitive, FileLogStorage>::open_with(
            dir.config.options,
            CaseInsensitive,
            storage,
        )
        .unwrap()
    };

    let mut store = open();
    store.insert("Carol".to_string(), 1, false).unwrap();
    store.insert("alice".to_string(), 2, false).unwrap();
    store.insert("CAROL".to_string(), 3, false).unwrap();
    store.insert("Bob".to_string(), 4, false).unwrap();
    drop(store);

    let store = open();
    let names: Vec<&str> = store.all().with_keys().map(|(k, _)| k.as_str()).collect();
    assert_eq!(names, vec!["alice", "Bob", "Carol"]);
    assert_eq!(store.first(&"carol".to_string()), Some(&1));
}

#[test]
fn test_reverse_order_store() {
    let dir = TestDir::new();
    let storage = FileLogStorage::open(dir.log_path("Descending")).unwrap();
    let mut store: Store<i64, i64, Reverse<NaturalOrder>, FileLogStorage> =
        Store::open_with(dir.config.options, Reverse(NaturalOrder), storage).unwrap();
    for key in [3, 1, 2] {
        store.insert(key, key, false).unwrap();
    }
    assert_eq!(store.all().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
    assert_eq!(store.before(&2).copied().collect::<Vec<_>>(), vec![3]);
}
