//! A record cut short by a crash is dropped and the log keeps working.

use crate::e2e_tests::helpers::{TestDir, keys};
use crate::storage::LogFormat;

#[test]
fn test_torn_tail_is_discarded_then_appended_over() {
    for format in [LogFormat::Framed, LogFormat::Legacy] {
        let dir = TestDir::with_format(format);
        let mut store = dir.open::<i64, String>("Torn");
        store.insert(1, "one".to_string(), false).unwrap();
        store.insert(2, "two".to_string(), false).unwrap();
        let good = dir.log_bytes("Torn");
        store.insert(3, "three".to_string(), false).unwrap();
        drop(store);

        let mut bytes = dir.log_bytes("Torn");
        bytes.truncate(bytes.len() - 3);
        dir.write_log_bytes("Torn", &bytes);

        let mut store = dir.open::<i64, String>("Torn");
        assert_eq!(keys(&store), vec![1, 2], "format {format}");
        assert_eq!(store.recovery().torn_bytes, (bytes.len() - good.len()) as u64);
        assert_eq!(dir.log_bytes("Torn"), good);

        store.insert(4, "four".to_string(), false).unwrap();
        drop(store);
        let reopened = dir.open::<i64, String>("Torn");
        assert_eq!(keys(&reopened), vec![1, 2, 4]);
        assert_eq!(reopened.recovery().torn_bytes, 0);
    }
}

#[test]
fn test_lone_tag_byte_is_a_torn_legacy_tail() {
    let dir = TestDir::with_format(LogFormat::Legacy);
    let mut store = dir.open::<i64, i64>("Tag");
    store.insert(7, 70, false).unwrap();
    drop(store);

    let mut bytes = dir.log_bytes("Tag");
    bytes.push(1);
    dir.write_log_bytes("Tag", &bytes);

    let store = dir.open::<i64, i64>("Tag");
    assert_eq!(store.first(&7), Some(&70));
    assert_eq!(store.recovery().torn_bytes, 1);
}

#[test]
fn test_torn_header_starts_a_new_log() {
    let dir = TestDir::new();
    dir.write_log_bytes("Header", b"IXL");

    let mut store = dir.open::<i64, i64>("Header");
    assert!(store.is_empty());
    assert_eq!(store.recovery().torn_bytes, 3);
    store.insert(1, 10, false).unwrap();
    drop(store);

    let reopened = dir.open::<i64, i64>("Header");
    assert_eq!(reopened.len(), 1);
}
