//! Damage in the middle of a log refuses to open rather than losing writes.

use crate::e2e_tests::helpers::TestDir;
use crate::storage::{HEADER_SIZE, LogFormat, RecoveryError, Store, StoreError, WalError};

fn open_error(dir: &TestDir, name: &str) -> StoreError {
    Store::<i64, String>::open(&dir.config, name).unwrap_err()
}

fn write_three(dir: &TestDir, name: &str) {
    let mut store = dir.open::<i64, String>(name);
    for key in 1..=3 {
        store.insert(key, format!("value-{key}"), false).unwrap();
    }
}

#[test]
fn test_checksum_mismatch_mid_log() {
    let dir = TestDir::new();
    write_three(&dir, "Broken");
    let mut bytes = dir.log_bytes("Broken");
    bytes[HEADER_SIZE + 7] ^= 0xff;
    dir.write_log_bytes("Broken", &bytes);

    let error = open_error(&dir, "Broken");
    assert!(matches!(
        error,
        StoreError::Recovery(RecoveryError::Corrupt {
            offset,
            error: WalError::ChecksumMismatch { .. },
        }) if offset == HEADER_SIZE as u64
    ));
    // The damaged log is left alone for inspection.
    assert_eq!(dir.log_bytes("Broken"), bytes);
}

#[test]
fn test_length_past_end_mid_log() {
    let dir = TestDir::new();
    write_three(&dir, "Broken");
    let mut bytes = dir.log_bytes("Broken");
    // Top byte of the first record's length field.
    bytes[HEADER_SIZE + 4] = 0x7f;
    dir.write_log_bytes("Broken", &bytes);

    let error = open_error(&dir, "Broken");
    assert!(matches!(
        error,
        StoreError::Recovery(RecoveryError::Corrupt {
            offset,
            error: WalError::Incomplete { .. },
        }) if offset == HEADER_SIZE as u64
    ));
    assert_eq!(dir.log_bytes("Broken"), bytes);
}

#[test]
fn test_invalid_tag_mid_legacy_log() {
    let dir = TestDir::with_format(LogFormat::Legacy);
    write_three(&dir, "Broken");
    let mut bytes = dir.log_bytes("Broken");
    bytes[0] = 9;
    dir.write_log_bytes("Broken", &bytes);

    let error = open_error(&dir, "Broken");
    assert!(matches!(
        error,
        StoreError::Recovery(RecoveryError::Corrupt {
            offset: 0,
            error: WalError::InvalidRecordType(9),
        })
    ));
    assert!(error.to_string().contains("corrupt log at byte 0"));
}

#[test]
fn test_unsupported_log_version() {
    let dir = TestDir::new();
    write_three(&dir, "Future");
    let mut bytes = dir.log_bytes("Future");
    bytes[5] = 99;
    dir.write_log_bytes("Future", &bytes);

    let error = open_error(&dir, "Future");
    assert!(matches!(
        error,
        StoreError::Recovery(RecoveryError::Corrupt {
            error: WalError::BadHeader(_),
            ..
        })
    ));
}
