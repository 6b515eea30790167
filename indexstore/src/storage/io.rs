//! Log storage backends.
//!
//! A store's log is a single append-only byte stream. `LogStorage` is the
//! minimal surface the log needs from wherever those bytes live, so the same
//! store code runs over a real file in production and over a shared
//! in-memory buffer in tests.
//!
//! # Design
//!
//! - `load` returns everything written so far (empty when nothing exists)
//! - `append` writes and flushes; `sync` additionally makes it durable
//! - `truncate` cuts a torn tail off, or empties the log for a reset
//! - `discard` removes the log entirely

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Byte-stream storage for one operation log.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - `load` returns exactly the bytes appended since the last `truncate`
/// - an `append` that returns `Ok` is visible to every later `load`
/// - `append` after `discard` starts a new, empty log
pub trait LogStorage {
    /// Read the whole log.
    fn load(&mut self) -> io::Result<Vec<u8>>;

    /// Append bytes to the end of the log and flush them.
    fn append(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Make all appended bytes durable.
    fn sync(&mut self) -> io::Result<()>;

    /// Cut the log down to its first `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Remove the log.
    fn discard(&mut self) -> io::Result<()>;
}

/// A log kept in a file opened for appending.
#[derive(Debug)]
pub struct FileLogStorage {
    path: PathBuf,
    file: Option<File>,
}

impl FileLogStorage {
    /// Open (creating if needed) the log file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let mut storage = Self {
            path: path.into(),
            file: None,
        };
        storage.file()?;
        Ok(storage)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> io::Result<&mut File> {
        match self.file {
            Some(ref mut file) => Ok(file),
            None => {
                let file = OpenOptions::new()
                    .read(true)
                    .append(true)
                    .create(true)
                    .open(&self.path)?;
                Ok(self.file.insert(file))
            }
        }
    }
}

impl LogStorage for FileLogStorage {
    fn load(&mut self) -> io::Result<Vec<u8>> {
        let file = self.file()?;
        file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        let file = self.file()?;
        file.write_all(bytes)?;
        file.flush()
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file()?.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.file()?.set_len(len)
    }

    fn discard(&mut self) -> io::Result<()> {
        self.file = None;
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryLog {
    bytes: Vec<u8>,
    failing_appends: usize,
    torn_append: Option<usize>,
    failing_reads: bool,
    failing_truncates: bool,
    failing_discards: bool,
    stats: MemoryLogStats,
}

/// Counters kept by `MemoryLogStorage`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLogStats {
    pub appends: u64,
    pub syncs: u64,
    pub injected_append_errors: u64,
    pub injected_read_errors: u64,
}

/// An in-memory log.
///
/// Clones share the same buffer, so a test can hand one handle to a store,
/// drop the store, and reopen another store over a second handle to replay
/// what the first one wrote. Faults can be armed on any handle.
#[derive(Debug, Default, Clone)]
pub struct MemoryLogStorage {
    inner: Rc<RefCell<MemoryLog>>,
}

impl MemoryLogStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing log bytes.
    #[must_use]
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        let storage = Self::new();
        storage.inner.borrow_mut().bytes = bytes;
        storage
    }

    /// Current contents of the log.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.borrow().bytes.clone()
    }

    /// Replace the contents of the log, bypassing fault injection.
    pub fn set_bytes(&self, bytes: Vec<u8>) {
        self.inner.borrow_mut().bytes = bytes;
    }

    /// Make the next `count` appends fail without writing anything.
    pub fn fail_next_appends(&self, count: usize) {
        self.inner.borrow_mut().failing_appends = count;
    }

    /// Make the next append write only its first `keep` bytes, then fail.
    pub fn tear_next_append(&self, keep: usize) {
        self.inner.borrow_mut().torn_append = Some(keep);
    }

    /// Make every `load` fail until turned off again.
    pub fn fail_reads(&self, failing: bool) {
        self.inner.borrow_mut().failing_reads = failing;
    }

    /// Make every `truncate` fail until turned off again.
    pub fn fail_truncates(&self, failing: bool) {
        self.inner.borrow_mut().failing_truncates = failing;
    }

    /// Make every `discard` fail until turned off again.
    pub fn fail_discards(&self, failing: bool) {
        self.inner.borrow_mut().failing_discards = failing;
    }

    #[must_use]
    pub fn stats(&self) -> MemoryLogStats {
        self.inner.borrow().stats
    }
}

impl LogStorage for MemoryLogStorage {
    fn load(&mut self) -> io::Result<Vec<u8>> {
        let mut log = self.inner.borrow_mut();
        if log.failing_reads {
            log.stats.injected_read_errors += 1;
            return Err(io::Error::other("injected fault: log read failed"));
        }
        Ok(log.bytes.clone())
    }

    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut log = self.inner.borrow_mut();
        if let Some(keep) = log.torn_append.take() {
            log.bytes.extend_from_slice(&bytes[..keep.min(bytes.len())]);
            log.stats.injected_append_errors += 1;
            return Err(io::Error::other("injected fault: log append torn"));
        }
        if log.failing_appends > 0 {
            log.failing_appends -= 1;
            log.stats.injected_append_errors += 1;
            return Err(io::Error::other("injected fault: log append failed"));
        }
        log.bytes.extend_from_slice(bytes);
        log.stats.appends += 1;
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.inner.borrow_mut().stats.syncs += 1;
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)] // in-memory logs never exceed usize
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        let mut log = self.inner.borrow_mut();
        if log.failing_truncates {
            return Err(io::Error::other("injected fault: log truncate failed"));
        }
        log.bytes.truncate(len as usize);
        Ok(())
    }

    fn discard(&mut self) -> io::Result<()> {
        let mut log = self.inner.borrow_mut();
        if log.failing_discards {
            return Err(io::Error::other("injected fault: log discard failed"));
        }
        log.bytes.clear();
        Ok(())
    }
}
