//! A failed log append keeps the in-memory change and reports the error.

use crate::config::StoreOptions;
use crate::storage::{MemoryLogStorage, NaturalOrder, RecoveryError, Store, StoreError, WalError};

type MemoryStore = Store<i64, String, NaturalOrder, MemoryLogStorage>;

fn open(storage: &MemoryLogStorage) -> Result<MemoryStore, StoreError> {
    Store::open_with(StoreOptions::default(), NaturalOrder, storage.clone())
}

#[test]
fn test_each_mutation_reports_failed_append() {
    let storage = MemoryLogStorage::new();
    let mut store = open(&storage).unwrap();
    store.insert(1, "one".to_string(), false).unwrap();
    store.insert(2, "two".to_string(), false).unwrap();

    storage.fail_next_appends(1);
    let error = store.insert(3, "three".to_string(), false).unwrap_err();
    assert!(matches!(error, StoreError::Wal(WalError::Io(_))));
    assert_eq!(store.len(), 3);

    storage.fail_next_appends(1);
    assert!(store.delete(&1).is_err());
    assert_eq!(store.first(&1), None);

    storage.fail_next_appends(1);
    assert!(store.update(&2, "TWO".to_string()).is_err());
    assert_eq!(store.first(&2), Some(&"TWO".to_string()));

    // Not-found operations append nothing, so they cannot fail.
    storage.fail_next_appends(1);
    assert_eq!(store.delete(&42).unwrap(), None);
    assert!(!store.update(&42, "x".to_string()).unwrap());
    storage.fail_next_appends(0);

    store.insert(4, "four".to_string(), false).unwrap();
    assert_eq!(storage.stats().injected_append_errors, 3);
    drop(store);

    let reopened = open(&storage).unwrap();
    let replayed: Vec<(i64, String)> = reopened
        .all()
        .with_keys()
        .map(|(k, v)| (*k, v.clone()))
        .collect();
    assert_eq!(
        replayed,
        vec![
            (1, "one".to_string()),
            (2, "two".to_string()),
            (4, "four".to_string())
        ]
    );
}

#[test]
fn test_read_failure_during_recovery() {
    let storage = MemoryLogStorage::new();
    drop(open(&storage).unwrap());

    storage.fail_reads(true);
    let error = open(&storage).unwrap_err();
    assert!(matches!(error, StoreError::Recovery(RecoveryError::Io(_))));

    storage.fail_reads(false);
    assert!(open(&storage).is_ok());
}

#[test]
fn test_sync_option_syncs_every_append() {
    let storage = MemoryLogStorage::new();
    let options = StoreOptions::default().with_sync(true);
    let mut store: MemoryStore = Store::open_with(options, NaturalOrder, storage.clone()).unwrap();
    store.insert(1, "one".to_string(), false).unwrap();
    store.delete(&1).unwrap();
    assert!(storage.stats().syncs >= 2);
}
