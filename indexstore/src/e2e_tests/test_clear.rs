//! Clearing a store empties both the index and its log.

use crate::e2e_tests::helpers::{TestDir, keys};
use crate::storage::{FileLogStorage, HEADER_SIZE, LogFormat};

#[test]
fn test_clear_in_place() {
    let dir = TestDir::new();
    let mut store = dir.open::<i64, i64>("Cache");
    for key in 0..50 {
        store.insert(key, key, false).unwrap();
    }
    store.clear(None).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.all().count(), 0);
    assert_eq!(dir.log_bytes("Cache").len(), HEADER_SIZE);

    store.insert(7, 7, false).unwrap();
    drop(store);
    assert_eq!(keys(&dir.open::<i64, i64>("Cache")), vec![7]);
}

#[test]
fn test_clear_to_another_file() {
    let dir = TestDir::with_format(LogFormat::Legacy);
    let mut store = dir.open::<i64, i64>("Old");
    store.insert(1, 1, false).unwrap();

    let target = FileLogStorage::open(dir.log_path("New")).unwrap();
    store.clear(Some(target)).unwrap();
    assert!(!dir.log_path("Old").exists());
    assert!(store.is_empty());

    store.insert(2, 2, false).unwrap();
    assert!(!dir.log_bytes("New").is_empty());
    drop(store);
    assert_eq!(keys(&dir.open::<i64, i64>("New")), vec![2]);
}
