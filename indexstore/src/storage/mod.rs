//! Durable index storage.
//!
//! Each index is a `Store`: an in-memory B-tree rebuilt on open from an
//! append-only operation log.
//!
//! # Layout
//!
//! - `btree`: the tree engine and range cursor
//! - `codec`: key and value encoding for log records
//! - `wal`: log record formats and the appending log
//! - `recovery`: replay of a log into a tree
//! - `io`: file and in-memory log storage
//! - `store`: the facade tying the tree to its log
//!
//! # Usage
//!
//! ```
//! use indexstore::config::StoreOptions;
//! use indexstore::storage::{MemoryLogStorage, NaturalOrder, Store};
//!
//! let log = MemoryLogStorage::new();
//! let mut store: Store<u64, String, _, _> =
//!     Store::open_with(StoreOptions::default(), NaturalOrder, log.clone()).unwrap();
//! store.insert(7, "seven".to_string(), false).unwrap();
//! drop(store);
//!
//! // Reopening replays the log.
//! let store: Store<u64, String, _, _> =
//!     Store::open_with(StoreOptions::default(), NaturalOrder, log).unwrap();
//! assert_eq!(store.first(&7).map(String::as_str), Some("seven"));
//! ```

pub mod btree;
mod codec;
mod io;
mod recovery;
mod store;
mod wal;

pub use btree::{BTree, CaseInsensitive, InsertOutcome, KeyOrder, NaturalOrder, Reverse, Values};
pub use codec::{Codec, CodecError};
pub use io::{FileLogStorage, LogStorage, MemoryLogStats, MemoryLogStorage};
pub use recovery::{RecoveryError, RecoveryResult, recover};
pub use store::{Store, StoreError};
pub use wal::{
    HEADER_SIZE, LOG_MAGIC, LOG_VERSION, LogFormat, LogRecord, LogRecordType, OperationLog,
    WalError, encode_header, encode_record,
};
