//! Operation log records.
//!
//! Every mutation of a store is appended to its log as one tagged record.
//! Replaying the records in order rebuilds the same ordered multiset of
//! entries.
//!
//! # Framed Format
//!
//! A framed log starts with an 8-byte header:
//! ```text
//! +-------+---------------------------+
//! | 0-4   | magic "IXLOG"             |
//! | 5     | version (1)               |
//! | 6-7   | reserved (zero)           |
//! +-------+---------------------------+
//! ```
//!
//! followed by records:
//! ```text
//! +----------+------------------------------------------------+
//! | 0        | record_type (1 byte)                           |
//! | 1-4      | payload_length (4 bytes, little-endian)        |
//! | 5-N      | payload: encoded key, then value if any        |
//! | N-N+3    | CRC32 over record_type + length + payload      |
//! +----------+------------------------------------------------+
//! ```
//!
//! # Legacy Format
//!
//! Records back to back with no header, length or checksum: the type byte,
//! the encoded key and, for inserts and updates, the encoded value. A log that
//! does not start with the magic is read this way. Record type bytes are 1-3,
//! so a legacy log can never be mistaken for a framed one.

// payload_length is u32 on disk
#![allow(clippy::cast_possible_truncation)]

use crate::storage::codec::{Codec, CodecError};
use crate::storage::io::LogStorage;

/// Magic bytes at the start of a framed log.
pub const LOG_MAGIC: [u8; 5] = *b"IXLOG";

/// Current framed format version.
pub const LOG_VERSION: u8 = 1;

/// Size of the framed log header.
pub const HEADER_SIZE: usize = 8;

/// `record_type` (1) + `payload_length` (4).
const FRAME_HEADER_SIZE: usize = 5;

/// CRC32 checksum size at end of a framed record.
const CHECKSUM_SIZE: usize = 4;

/// Log record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Entry inserted.
    Insert = 0x01,
    /// Entry deleted.
    Delete = 0x02,
    /// Entry value replaced.
    Update = 0x03,
}

impl TryFrom<u8> for LogRecordType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Insert),
            0x02 => Ok(Self::Delete),
            0x03 => Ok(Self::Update),
            _ => Err(value),
        }
    }
}

impl LogRecordType {
    /// Whether records of this type carry a value after the key.
    #[must_use]
    pub const fn has_value(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

/// On-disk encoding of a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Header plus length-prefixed, checksummed records.
    Framed,
    /// Bare records with no header, length or checksum.
    Legacy,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Framed => write!(f, "framed"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

/// A decoded log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord<K, V> {
    Insert(K, V),
    Delete(K),
    Update(K, V),
}

impl<K: Codec, V: Codec> LogRecord<K, V> {
    #[must_use]
    pub const fn record_type(&self) -> LogRecordType {
        match self {
            Self::Insert(..) => LogRecordType::Insert,
            Self::Delete(_) => LogRecordType::Delete,
            Self::Update(..) => LogRecordType::Update,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &K {
        match self {
            Self::Insert(key, _) | Self::Delete(key) | Self::Update(key, _) => key,
        }
    }

    /// Serialize this record in `format`.
    pub fn to_bytes(&self, format: LogFormat) -> Result<Vec<u8>, WalError> {
        let value = match self {
            Self::Insert(_, value) | Self::Update(_, value) => Some(value),
            Self::Delete(_) => None,
        };
        encode_record(format, self.record_type(), self.key(), value)
    }

    fn decode_payload(record_type: LogRecordType, input: &mut &[u8]) -> Result<Self, CodecError> {
        let key = K::decode(input)?;
        Ok(match record_type {
            LogRecordType::Insert => Self::Insert(key, V::decode(input)?),
            LogRecordType::Delete => Self::Delete(key),
            LogRecordType::Update => Self::Update(key, V::decode(input)?),
        })
    }
}

/// Serialize one record from borrowed parts.
///
/// `value` is ignored for deletes.
pub fn encode_record<K: Codec, V: Codec>(
    format: LogFormat,
    record_type: LogRecordType,
    key: &K,
    value: Option<&V>,
) -> Result<Vec<u8>, WalError> {
    let mut payload = Vec::new();
    key.encode(&mut payload);
    if let Some(value) = value.filter(|_| record_type.has_value()) {
        value.encode(&mut payload);
    }

    match format {
        LogFormat::Legacy => {
            let mut bytes = Vec::with_capacity(1 + payload.len());
            bytes.push(record_type as u8);
            bytes.extend_from_slice(&payload);
            Ok(bytes)
        }
        LogFormat::Framed => {
            let length =
                u32::try_from(payload.len()).map_err(|_| WalError::RecordTooLarge(payload.len()))?;
            let mut bytes =
                Vec::with_capacity(FRAME_HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
            bytes.push(record_type as u8);
            bytes.extend_from_slice(&length.to_le_bytes());
            bytes.extend_from_slice(&payload);

            // CRC32 checksum (4 bytes) - computed over everything before it
            let checksum = crc32fast::hash(&bytes);
            bytes.extend_from_slice(&checksum.to_le_bytes());
            Ok(bytes)
        }
    }
}

/// Build the header that starts every framed log.
#[must_use]
pub const fn encode_header() -> [u8; HEADER_SIZE] {
    let [i, x, l, o, g] = LOG_MAGIC;
    [i, x, l, o, g, LOG_VERSION, 0, 0]
}

/// What the first bytes of a log say about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCheck {
    /// Nothing has been written yet.
    Empty,
    /// A write of the header itself was cut short; the log holds no records.
    TornHeader,
    /// A complete framed header; records start at `HEADER_SIZE`.
    Framed,
    /// No header; records start at 0.
    Legacy,
}

/// Detect the format of a log from its contents.
pub fn check_header(bytes: &[u8]) -> Result<HeaderCheck, WalError> {
    if bytes.is_empty() {
        return Ok(HeaderCheck::Empty);
    }
    let header = encode_header();
    if bytes.len() < HEADER_SIZE && header.starts_with(bytes) {
        return Ok(HeaderCheck::TornHeader);
    }
    if !bytes.starts_with(&LOG_MAGIC) {
        return Ok(HeaderCheck::Legacy);
    }
    if bytes.len() < HEADER_SIZE {
        return Err(WalError::BadHeader("header is truncated"));
    }
    if bytes[LOG_MAGIC.len()] != LOG_VERSION {
        return Err(WalError::BadHeader("unsupported log version"));
    }
    if bytes[LOG_MAGIC.len() + 1..HEADER_SIZE] != [0, 0] {
        return Err(WalError::BadHeader("reserved bytes are not zero"));
    }
    Ok(HeaderCheck::Framed)
}

/// Total size of the framed record at the front of `bytes`, if its length
/// field is readable.
#[must_use]
pub fn framed_record_len(bytes: &[u8]) -> Option<usize> {
    let length: [u8; 4] = bytes.get(1..FRAME_HEADER_SIZE)?.try_into().ok()?;
    Some(FRAME_HEADER_SIZE + u32::from_le_bytes(length) as usize + CHECKSUM_SIZE)
}

/// Decode the record at the front of `bytes`.
///
/// Returns the record and the number of bytes it occupied. Running out of
/// input is always `WalError::Incomplete`, whatever field it happened in.
pub fn decode_record<K: Codec, V: Codec>(
    format: LogFormat,
    bytes: &[u8],
) -> Result<(LogRecord<K, V>, usize), WalError> {
    match format {
        LogFormat::Framed => decode_framed(bytes),
        LogFormat::Legacy => decode_legacy(bytes),
    }
}

fn decode_framed<K: Codec, V: Codec>(bytes: &[u8]) -> Result<(LogRecord<K, V>, usize), WalError> {
    let Some(record_len) = framed_record_len(bytes) else {
        return Err(WalError::Incomplete {
            needed: FRAME_HEADER_SIZE,
            available: bytes.len(),
        });
    };
    if bytes.len() < record_len {
        return Err(WalError::Incomplete {
            needed: record_len,
            available: bytes.len(),
        });
    }

    // Verify checksum
    let body_len = record_len - CHECKSUM_SIZE;
    let mut stored = [0u8; CHECKSUM_SIZE];
    stored.copy_from_slice(&bytes[body_len..record_len]);
    let expected = u32::from_le_bytes(stored);
    let actual = crc32fast::hash(&bytes[..body_len]);
    if expected != actual {
        return Err(WalError::ChecksumMismatch { expected, actual });
    }

    let record_type = LogRecordType::try_from(bytes[0]).map_err(WalError::InvalidRecordType)?;
    let mut payload = &bytes[FRAME_HEADER_SIZE..body_len];
    let record = LogRecord::decode_payload(record_type, &mut payload)?;
    if !payload.is_empty() {
        return Err(WalError::TrailingBytes(payload.len()));
    }
    Ok((record, record_len))
}

fn decode_legacy<K: Codec, V: Codec>(bytes: &[u8]) -> Result<(LogRecord<K, V>, usize), WalError> {
    let Some((&tag, rest)) = bytes.split_first() else {
        return Err(WalError::Incomplete {
            needed: 1,
            available: 0,
        });
    };
    let record_type = LogRecordType::try_from(tag).map_err(WalError::InvalidRecordType)?;

    let mut input = rest;
    let record = LogRecord::decode_payload(record_type, &mut input).map_err(|e| match e {
        // Without framing, running out of bytes mid-field is indistinguishable
        // from a cut-short append.
        CodecError::Truncated { needed, available } => WalError::Incomplete { needed, available },
        other => WalError::Codec(other),
    })?;
    Ok((record, bytes.len() - input.len()))
}

/// Appends encoded records to a `LogStorage`.
///
/// The log remembers how many bytes it has committed. An append that fails
/// part way is cut back to that length before anything else is written, so
/// a failed record never sits in front of later ones.
#[derive(Debug)]
pub struct OperationLog<S> {
    storage: S,
    format: LogFormat,
    sync: bool,
    len: u64,
    needs_repair: bool,
}

impl<S: LogStorage> OperationLog<S> {
    /// A log over empty storage.
    #[must_use]
    pub const fn new(storage: S, format: LogFormat, sync: bool) -> Self {
        Self::resume(storage, format, sync, 0)
    }

    /// A log over storage already holding `len` bytes of valid records.
    #[must_use]
    pub const fn resume(storage: S, format: LogFormat, sync: bool, len: u64) -> Self {
        Self {
            storage,
            format,
            sync,
            len,
            needs_repair: false,
        }
    }

    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Bytes committed to the log, header included.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Serialize a record in this log's format without writing it.
    pub fn encode<K: Codec, V: Codec>(
        &self,
        record_type: LogRecordType,
        key: &K,
        value: Option<&V>,
    ) -> Result<Vec<u8>, WalError> {
        encode_record(self.format, record_type, key, value)
    }

    /// Append one encoded record, syncing if configured to.
    pub fn append(&mut self, record: &[u8]) -> Result<(), WalError> {
        self.repair()?;
        self.write_header()?;
        self.write(record)
    }

    /// Write the header a new framed log starts with.
    ///
    /// No-op for legacy logs and for logs that already hold bytes.
    pub fn write_header(&mut self) -> Result<(), WalError> {
        if self.format == LogFormat::Framed && self.len == 0 {
            self.repair()?;
            self.write(&encode_header())?;
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), WalError> {
        if let Err(error) = self.storage.append(bytes) {
            self.needs_repair = true;
            if let Err(repair) = self.repair() {
                tracing::warn!(
                    len = self.len,
                    %repair,
                    "could not cut failed append from log; retrying before next write"
                );
            }
            return Err(error.into());
        }
        self.len += bytes.len() as u64;
        if self.sync {
            self.storage.sync()?;
        }
        Ok(())
    }

    /// Cut off whatever a failed append left past the committed length.
    fn repair(&mut self) -> Result<(), WalError> {
        if self.needs_repair {
            self.storage.truncate(self.len)?;
            self.needs_repair = false;
        }
        Ok(())
    }

    /// Drop every record, leaving the storage empty.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.storage.truncate(0)?;
        self.len = 0;
        self.needs_repair = false;
        Ok(())
    }

    /// Empty the log, leaving it ready for new records.
    pub fn reset(&mut self) -> Result<(), WalError> {
        self.truncate()?;
        self.write_header()
    }

    /// Remove the log from its storage. A later append starts a new log.
    pub fn discard(&mut self) -> Result<(), WalError> {
        self.storage.discard()?;
        self.len = 0;
        self.needs_repair = false;
        Ok(())
    }
}

/// Errors that can occur during log operations.
#[derive(Debug)]
pub enum WalError {
    /// I/O error.
    Io(std::io::Error),
    /// A record's payload could not be decoded.
    Codec(CodecError),
    /// The input ended inside a record.
    Incomplete { needed: usize, available: usize },
    /// Invalid record type byte.
    InvalidRecordType(u8),
    /// Checksum mismatch.
    ChecksumMismatch { expected: u32, actual: u32 },
    /// A framed payload had bytes left over after its key and value.
    TrailingBytes(usize),
    /// The log starts with the magic but the rest of the header is wrong.
    BadHeader(&'static str),
    /// Payload too large for the 32-bit length field.
    RecordTooLarge(usize),
}

impl std::fmt::Display for WalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "log I/O error: {e}"),
            Self::Codec(e) => write!(f, "log record payload is malformed: {e}"),
            Self::Incomplete { needed, available } => write!(
                f,
                "log record is incomplete: need {needed} bytes, have {available}"
            ),
            Self::InvalidRecordType(t) => write!(f, "invalid log record type: 0x{t:02x}"),
            Self::ChecksumMismatch { expected, actual } => {
                write!(
                    f,
                    "log checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}"
                )
            }
            Self::TrailingBytes(n) => write!(f, "log record has {n} trailing bytes"),
            Self::BadHeader(reason) => write!(f, "bad log header: {reason}"),
            Self::RecordTooLarge(size) => write!(f, "log record too large: {size} bytes"),
        }
    }
}

impl std::error::Error for WalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WalError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<CodecError> for WalError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::io::MemoryLogStorage;

    type Record = LogRecord<String, i64>;

    #[test]
    fn test_record_type_conversion() {
        assert_eq!(LogRecordType::try_from(1), Ok(LogRecordType::Insert));
        assert_eq!(LogRecordType::try_from(2), Ok(LogRecordType::Delete));
        assert_eq!(LogRecordType::try_from(3), Ok(LogRecordType::Update));
        assert_eq!(LogRecordType::try_from(0x49), Err(0x49));
        assert!(!LogRecordType::Delete.has_value());
    }

    #[test]
    fn test_framed_layout() {
        let bytes = Record::Insert("a".to_string(), 5).to_bytes(LogFormat::Framed).unwrap();
        // type, length 13 (4 + 1 key bytes, 8 value bytes), payload, crc
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..5], &13u32.to_le_bytes());
        assert_eq!(&bytes[5..10], &[0, 0, 0, 1, b'a']);
        assert_eq!(bytes.len(), 5 + 13 + 4);
        assert_eq!(framed_record_len(&bytes), Some(bytes.len()));

        let (record, used) = decode_record::<String, i64>(LogFormat::Framed, &bytes).unwrap();
        assert_eq!(record, Record::Insert("a".to_string(), 5));
        assert_eq!(used, bytes.len());
    }

    #[test]
    fn test_legacy_layout() {
        let bytes = Record::Delete("ab".to_string()).to_bytes(LogFormat::Legacy).unwrap();
        assert_eq!(bytes, vec![2, 0, 0, 0, 2, b'a', b'b']);

        let mut stream = bytes;
        stream.extend(Record::Update("c".to_string(), -1).to_bytes(LogFormat::Legacy).unwrap());
        let (first, used) = decode_record::<String, i64>(LogFormat::Legacy, &stream).unwrap();
        assert_eq!(first, Record::Delete("ab".to_string()));
        let (second, _) = decode_record::<String, i64>(LogFormat::Legacy, &stream[used..]).unwrap();
        assert_eq!(second, Record::Update("c".to_string(), -1));
    }

    #[test]
    fn test_detects_checksum_mismatch() {
        let mut bytes = Record::Update("k".to_string(), 9).to_bytes(LogFormat::Framed).unwrap();
        bytes[6] ^= 0xff;
        assert!(matches!(
            decode_record::<String, i64>(LogFormat::Framed, &bytes),
            Err(WalError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_incomplete_records() {
        let framed = Record::Insert("key".to_string(), 1).to_bytes(LogFormat::Framed).unwrap();
        for cut in [0, 3, 10, framed.len() - 1] {
            assert!(matches!(
                decode_record::<String, i64>(LogFormat::Framed, &framed[..cut]),
                Err(WalError::Incomplete { .. })
            ));
        }

        let legacy = Record::Insert("key".to_string(), 1).to_bytes(LogFormat::Legacy).unwrap();
        for cut in [0, 2, 8, legacy.len() - 1] {
            assert!(matches!(
                decode_record::<String, i64>(LogFormat::Legacy, &legacy[..cut]),
                Err(WalError::Incomplete { .. })
            ));
        }
    }

    #[test]
    fn test_invalid_record_type() {
        assert!(matches!(
            decode_record::<String, i64>(LogFormat::Legacy, &[7, 0, 0]),
            Err(WalError::InvalidRecordType(7))
        ));
    }

    #[test]
    fn test_header_detection() {
        let header = encode_header();
        assert_eq!(&header, b"IXLOG\x01\x00\x00");
        assert_eq!(check_header(&[]).unwrap(), HeaderCheck::Empty);
        assert_eq!(check_header(&header[..3]).unwrap(), HeaderCheck::TornHeader);
        assert_eq!(check_header(&header).unwrap(), HeaderCheck::Framed);
        assert_eq!(check_header(&[1, 0, 0, 0, 1]).unwrap(), HeaderCheck::Legacy);
        assert!(matches!(
            check_header(b"IXLOG\x02\x00\x00"),
            Err(WalError::BadHeader(_))
        ));
    }

    #[test]
    fn test_operation_log_appends_and_resets() {
        let storage = MemoryLogStorage::new();
        let mut log = OperationLog::new(storage.clone(), LogFormat::Framed, true);
        log.write_header().unwrap();
        let record = log
            .encode(LogRecordType::Insert, &"x".to_string(), Some(&1i64))
            .unwrap();
        log.append(&record).unwrap();
        assert_eq!(storage.bytes().len(), HEADER_SIZE + record.len());
        assert_eq!(storage.stats().syncs, 2);

        log.reset().unwrap();
        assert_eq!(storage.bytes(), encode_header().to_vec());

        let mut legacy = OperationLog::new(MemoryLogStorage::new(), LogFormat::Legacy, false);
        legacy.write_header().unwrap();
        assert!(legacy.storage_mut().bytes().is_empty());
        assert_eq!(legacy.format(), LogFormat::Legacy);
    }

    fn insert_record(log: &OperationLog<MemoryLogStorage>, key: &str) -> Vec<u8> {
        log.encode(LogRecordType::Insert, &key.to_string(), Some(&1i64))
            .unwrap()
    }

    #[test]
    fn test_torn_append_is_cut_back() {
        let storage = MemoryLogStorage::new();
        let mut log = OperationLog::new(storage.clone(), LogFormat::Framed, false);
        let first = insert_record(&log, "a");
        let second = insert_record(&log, "b");
        let third = insert_record(&log, "c");

        // The header goes out with the first record.
        log.append(&first).unwrap();
        let committed = [&encode_header()[..], &first[..]].concat();
        assert_eq!(storage.bytes(), committed);

        storage.tear_next_append(3);
        assert!(matches!(log.append(&second), Err(WalError::Io(_))));
        assert_eq!(storage.bytes(), committed);
        assert_eq!(log.len(), committed.len() as u64);

        log.append(&third).unwrap();
        assert_eq!(storage.bytes(), [&committed[..], &third[..]].concat());
    }

    #[test]
    fn test_failed_cut_back_is_retried_before_next_append() {
        let storage = MemoryLogStorage::new();
        let mut log = OperationLog::new(storage.clone(), LogFormat::Legacy, false);
        let first = insert_record(&log, "a");
        let second = insert_record(&log, "b");
        log.append(&first).unwrap();

        storage.tear_next_append(2);
        storage.fail_truncates(true);
        assert!(log.append(&second).is_err());
        assert_eq!(storage.bytes().len(), first.len() + 2);

        // Still unable to cut: nothing is written behind the partial record.
        assert!(log.append(&second).is_err());
        assert_eq!(storage.bytes().len(), first.len() + 2);

        storage.fail_truncates(false);
        log.append(&second).unwrap();
        assert_eq!(storage.bytes(), [&first[..], &second[..]].concat());
    }

    #[test]
    fn test_resumed_log_cuts_back_to_existing_length() {
        let storage = MemoryLogStorage::with_bytes(encode_header().to_vec());
        let mut log =
            OperationLog::resume(storage.clone(), LogFormat::Framed, false, HEADER_SIZE as u64);
        let record = insert_record(&log, "a");

        storage.tear_next_append(1);
        assert!(log.append(&record).is_err());
        assert_eq!(storage.bytes(), encode_header().to_vec());

        log.append(&record).unwrap();
        assert_eq!(storage.bytes(), [&encode_header()[..], &record[..]].concat());
    }
}
