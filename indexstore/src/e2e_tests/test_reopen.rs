//! Reopening a store replays its log into an identical index.

use crate::e2e_tests::helpers::{TestDir, entries};
use crate::storage::{LOG_MAGIC, LogFormat};

fn mixed_workload(dir: &TestDir, name: &str) -> Vec<(u64, String)> {
    let mut store = dir.open::<u64, String>(name);
    for i in 0..200_u64 {
        let key = (i * 37) % 101;
        store.insert(key, format!("first-{i}"), i % 3 == 0).unwrap();
    }
    for key in (0..101).step_by(4) {
        store.delete(&key).unwrap();
    }
    for key in (1..101).step_by(5) {
        store.update(&key, format!("updated-{key}")).unwrap();
    }
    store.tree().check_invariants().unwrap();
    entries(&store)
}

#[test]
fn test_reopen_reproduces_entries_in_both_formats() {
    for format in [LogFormat::Framed, LogFormat::Legacy] {
        let dir = TestDir::with_format(format);
        let live = mixed_workload(&dir, "Mixed");

        let reopened = dir.open::<u64, String>("Mixed");
        assert_eq!(reopened.format(), format);
        assert_eq!(reopened.recovery().torn_bytes, 0);
        assert_eq!(entries(&reopened), live, "format {format}");
        reopened.tree().check_invariants().unwrap();
    }
}

#[test]
fn test_existing_log_keeps_its_format() {
    let legacy = TestDir::with_format(LogFormat::Legacy);
    let live = mixed_workload(&legacy, "Mixed");
    assert_ne!(&legacy.log_bytes("Mixed")[..LOG_MAGIC.len()], &LOG_MAGIC[..]);

    // Reopen the legacy log with options asking for the framed format.
    let framed = TestDir::with_format(LogFormat::Framed);
    std::fs::write(framed.log_path("Mixed"), legacy.log_bytes("Mixed")).unwrap();
    let mut store = framed.open::<u64, String>("Mixed");
    assert_eq!(store.format(), LogFormat::Legacy);
    assert_eq!(entries(&store), live);

    store.insert(500, "tail".to_string(), false).unwrap();
    drop(store);
    let reopened = framed.open::<u64, String>("Mixed");
    assert_eq!(reopened.format(), LogFormat::Legacy);
    assert_eq!(reopened.len(), live.len() + 1);
}

#[test]
fn test_reopen_twice_replays_the_same_log() {
    let dir = TestDir::new();
    let live = mixed_workload(&dir, "Twice");
    let before = dir.log_bytes("Twice");

    drop(dir.open::<u64, String>("Twice"));
    let reopened = dir.open::<u64, String>("Twice");
    assert_eq!(entries(&reopened), live);
    assert_eq!(dir.log_bytes("Twice"), before);
}

#[test]
fn test_missing_log_starts_empty() {
    let dir = TestDir::new();
    assert!(!dir.log_path("Fresh").exists());
    let store = dir.open::<i64, i64>("Fresh");
    assert!(store.is_empty());
    assert_eq!(store.recovery().records(), 0);
    assert!(dir.log_path("Fresh").exists());
}
