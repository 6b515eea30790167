//! Rebuilding a tree from its operation log.
//!
//! # Recovery Process
//!
//! 1. Load the whole log from storage
//! 2. Detect its format from the header (or its absence)
//! 3. Decode records in order, applying each through the same tree
//!    operations used live
//! 4. If the final record is cut short (or, when framed, fails its checksum),
//!    drop it and truncate the log back to the last good record
//!
//! A bad record with more data after it is not a torn tail: the log is
//! corrupt and recovery fails rather than silently losing later writes. In
//! a framed log a record that claims more bytes than are left only counts
//! as torn when no valid record starts anywhere after it, since a damaged
//! length field looks exactly like a short write.

use crate::storage::btree::{BTree, KeyOrder};
use crate::storage::codec::Codec;
use crate::storage::io::LogStorage;
use crate::storage::wal::{
    HEADER_SIZE, HeaderCheck, LogFormat, LogRecord, WalError, check_header, decode_record,
    framed_record_len,
};

/// Result of a recovery operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Format of the log as found (or as created, when it was empty).
    pub format: LogFormat,

    /// Number of insert records replayed.
    pub inserts: usize,

    /// Number of delete records replayed.
    pub deletes: usize,

    /// Number of update records replayed.
    pub updates: usize,

    /// Delete and update records whose key was not in the tree.
    pub misses: usize,

    /// Bytes of torn tail dropped from the end of the log.
    pub torn_bytes: u64,

    /// Length of the log after recovery, in bytes.
    pub log_len: u64,
}

impl RecoveryResult {
    const fn empty(format: LogFormat) -> Self {
        Self {
            format,
            inserts: 0,
            deletes: 0,
            updates: 0,
            misses: 0,
            torn_bytes: 0,
            log_len: 0,
        }
    }

    /// Total records replayed.
    #[must_use]
    pub const fn records(&self) -> usize {
        self.inserts + self.deletes + self.updates
    }
}

/// Replay the log in `storage` into `tree`.
///
/// `new_format` is reported when the log is empty; the caller creates the
/// log in that format. Records are applied to whatever `tree` already holds,
/// which is normally nothing.
pub fn recover<K, V, C, S>(
    storage: &mut S,
    tree: &mut BTree<K, V, C>,
    new_format: LogFormat,
) -> Result<RecoveryResult, RecoveryError>
where
    K: Codec,
    V: Codec,
    C: KeyOrder<K>,
    S: LogStorage,
{
    let bytes = storage.load().map_err(RecoveryError::Io)?;
    let total = bytes.len();

    let (format, start) = match check_header(&bytes) {
        Ok(HeaderCheck::Empty) => return Ok(RecoveryResult::empty(new_format)),
        Ok(HeaderCheck::TornHeader) => {
            tracing::warn!(bytes = total, "discarding torn log header");
            storage.truncate(0).map_err(RecoveryError::Io)?;
            let mut result = RecoveryResult::empty(new_format);
            result.torn_bytes = total as u64;
            return Ok(result);
        }
        Ok(HeaderCheck::Framed) => (LogFormat::Framed, HEADER_SIZE),
        Ok(HeaderCheck::Legacy) => (LogFormat::Legacy, 0),
        Err(error) => return Err(RecoveryError::Corrupt { offset: 0, error }),
    };

    let mut result = RecoveryResult::empty(format);
    let mut offset = start;
    while offset < total {
        let rest = &bytes[offset..];
        let (record, used) = match decode_record::<K, V>(format, rest) {
            Ok(decoded) => decoded,
            Err(error) if is_torn_tail::<K, V>(format, rest, &error) => {
                let torn = total - offset;
                tracing::warn!(
                    offset,
                    bytes = torn,
                    %error,
                    "discarding torn record at end of log"
                );
                storage.truncate(offset as u64).map_err(RecoveryError::Io)?;
                result.torn_bytes = torn as u64;
                break;
            }
            Err(error) => {
                return Err(RecoveryError::Corrupt {
                    offset: offset as u64,
                    error,
                });
            }
        };

        match record {
            LogRecord::Insert(key, value) => {
                // Duplicate suppression already happened when the record was written.
                tree.insert(key, value, true);
                result.inserts += 1;
            }
            LogRecord::Delete(key) => {
                result.deletes += 1;
                if tree.delete(&key).is_none() {
                    result.misses += 1;
                }
            }
            LogRecord::Update(key, value) => {
                result.updates += 1;
                if tree.update(&key, value).is_err() {
                    result.misses += 1;
                }
            }
        }
        offset += used;
    }

    result.log_len = offset as u64;
    tracing::debug!(
        format = %result.format,
        records = result.records(),
        misses = result.misses,
        entries = tree.len(),
        "log replayed"
    );
    Ok(result)
}

/// Whether a decode failure at the front of `rest` is a cut-short final append.
fn is_torn_tail<K: Codec, V: Codec>(format: LogFormat, rest: &[u8], error: &WalError) -> bool {
    match (format, error) {
        (LogFormat::Framed, WalError::Incomplete { .. }) => !has_later_record::<K, V>(rest),
        (LogFormat::Legacy, WalError::Incomplete { .. }) => true,
        (LogFormat::Framed, WalError::ChecksumMismatch { .. }) => {
            framed_record_len(rest) == Some(rest.len())
        }
        (LogFormat::Legacy, WalError::InvalidRecordType(_)) => rest.len() == 1,
        _ => false,
    }
}

/// Whether a whole, checksummed record starts somewhere past the front of `rest`.
fn has_later_record<K: Codec, V: Codec>(rest: &[u8]) -> bool {
    (1..rest.len()).any(|start| decode_record::<K, V>(LogFormat::Framed, &rest[start..]).is_ok())
}

/// Errors that can occur during recovery.
#[derive(Debug)]
pub enum RecoveryError {
    /// The log could not be read or repaired.
    Io(std::io::Error),
    /// A record in the middle of the log is unreadable.
    Corrupt { offset: u64, error: WalError },
}

impl std::fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "recovery I/O error: {e}"),
            Self::Corrupt { offset, error } => {
                write!(f, "corrupt log at byte {offset}: {error}")
            }
        }
    }
}

impl std::error::Error for RecoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Corrupt { error, .. } => Some(error),
        }
    }
}

impl From<std::io::Error> for RecoveryError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
