//! High-level store interface.
//!
//! A `Store` is one durable index: a B-tree plus the log that rebuilds it.
//! Opening a store replays its log; every mutation that changes the tree is
//! then appended to the log before the call returns.

use std::ops::Bound;

use crate::config::{ConfigError, StoreConfig, StoreOptions};
use crate::storage::btree::{BTree, InsertOutcome, KeyOrder, NaturalOrder, Values};
use crate::storage::codec::Codec;
use crate::storage::io::{FileLogStorage, LogStorage};
use crate::storage::recovery::{RecoveryError, RecoveryResult, recover};
use crate::storage::wal::{LogFormat, LogRecordType, OperationLog, WalError};

/// A durable, ordered key/value index.
///
/// Mutations update the tree first and then append to the log. If the append
/// fails the tree keeps the change, the error is returned, and the store
/// remains usable; the change is simply not durable.
#[derive(Debug)]
pub struct Store<K, V, C = NaturalOrder, S = FileLogStorage> {
    tree: BTree<K, V, C>,
    log: OperationLog<S>,
    options: StoreOptions,
    recovery: RecoveryResult,
}

impl<K: Codec + Ord, V: Codec> Store<K, V> {
    /// Open the file-backed store `{directory}/{name}.log`, creating the
    /// directory and log if needed.
    pub fn open(config: &StoreConfig, name: &str) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&config.directory)?;
        let path = config.log_path(name);
        if !path.exists() {
            tracing::warn!(path = %path.display(), "log not found, creating a new one");
        }
        let storage = FileLogStorage::open(&path)?;
        Self::open_with(config.options, NaturalOrder, storage)
    }
}

impl<K, V, C, S> Store<K, V, C, S>
where
    K: Codec,
    V: Codec,
    C: KeyOrder<K>,
    S: LogStorage,
{
    /// Open a store over any comparator and log storage, replaying whatever
    /// the storage already holds.
    pub fn open_with(options: StoreOptions, order: C, mut storage: S) -> Result<Self, StoreError> {
        options.validate()?;
        let mut tree = BTree::new(options.branching_factor, order)?;
        let recovery = recover(&mut storage, &mut tree, options.format)?;

        let mut log =
            OperationLog::resume(storage, recovery.format, options.sync, recovery.log_len);
        log.write_header()?;

        tracing::info!(
            format = %recovery.format,
            records = recovery.records(),
            entries = tree.len(),
            torn_bytes = recovery.torn_bytes,
            "store opened"
        );

        Ok(Self {
            tree,
            log,
            options,
            recovery,
        })
    }

    /// Insert an entry.
    ///
    /// With `allow_duplicates` false and an equal key present, nothing changes
    /// and nothing is logged.
    pub fn insert(
        &mut self,
        key: K,
        value: V,
        allow_duplicates: bool,
    ) -> Result<InsertOutcome, StoreError> {
        if !allow_duplicates && self.tree.contains_key(&key) {
            return Ok(InsertOutcome::DuplicateIgnored);
        }
        // The tree takes ownership, so the record is built first.
        let record = self
            .log
            .encode(LogRecordType::Insert, &key, Some(&value))?;
        let outcome = self.tree.insert(key, value, allow_duplicates);
        if outcome.is_inserted() {
            self.append(&record, LogRecordType::Insert)?;
        }
        Ok(outcome)
    }

    /// Delete one entry equal to `key`, returning its value.
    pub fn delete(&mut self, key: &K) -> Result<Option<V>, StoreError> {
        let removed = self.tree.delete(key);
        if removed.is_some() {
            let record = self.log.encode::<K, V>(LogRecordType::Delete, key, None)?;
            self.append(&record, LogRecordType::Delete)?;
        }
        Ok(removed)
    }

    /// Replace the value of the first entry equal to `key`.
    ///
    /// Returns whether an entry was found. A found entry is always logged,
    /// even when the new value equals the old one.
    pub fn update(&mut self, key: &K, value: V) -> Result<bool, StoreError> {
        let record = self
            .log
            .encode(LogRecordType::Update, key, Some(&value))?;
        if self.tree.update(key, value).is_err() {
            return Ok(false);
        }
        self.append(&record, LogRecordType::Update)?;
        Ok(true)
    }

    fn append(&mut self, record: &[u8], record_type: LogRecordType) -> Result<(), StoreError> {
        self.log.append(record).map_err(|error| {
            tracing::error!(
                ?record_type,
                %error,
                "failed to append log record; in-memory change kept"
            );
            StoreError::Wal(error)
        })
    }

    /// Value of the first entry, in key order, equal to `key`.
    #[must_use]
    pub fn first(&self, key: &K) -> Option<&V> {
        self.tree.first_match(key)
    }

    /// Every value whose key equals `key`.
    #[must_use]
    pub fn at<'a>(&'a self, key: &'a K) -> Values<'a, K, V, C> {
        self.entries(Bound::Included(key), Bound::Included(key))
    }

    /// Values with `min <= key <= max`.
    #[must_use]
    pub fn range<'a>(&'a self, min: &'a K, max: &'a K) -> Values<'a, K, V, C> {
        self.entries(Bound::Included(min), Bound::Included(max))
    }

    /// Every value, in key order.
    #[must_use]
    pub fn all(&self) -> Values<'_, K, V, C> {
        Values::new(self.tree.iter())
    }

    /// Values with keys ordered strictly before `key`.
    #[must_use]
    pub fn before<'a>(&'a self, key: &'a K) -> Values<'a, K, V, C> {
        self.entries(Bound::Unbounded, Bound::Excluded(key))
    }

    /// Values with keys ordered strictly after `key`.
    #[must_use]
    pub fn after<'a>(&'a self, key: &'a K) -> Values<'a, K, V, C> {
        self.entries(Bound::Excluded(key), Bound::Unbounded)
    }

    /// Values between arbitrary bounds.
    #[must_use]
    pub fn entries<'a>(&'a self, lower: Bound<&'a K>, upper: Bound<&'a K>) -> Values<'a, K, V, C> {
        Values::new(self.tree.range(lower, upper))
    }

    /// Drop every entry and start an empty log.
    ///
    /// With no target the current log is emptied in place. With a target the
    /// current log is removed and the store continues on `reset_target`,
    /// which is wiped first.
    ///
    /// If the current log cannot be emptied or removed, nothing changes.
    /// Once it has been, the store is empty even if a later step fails: a
    /// target that cannot be prepared leaves the store on its old, now empty
    /// log, and a header that cannot be written goes out with the next record.
    pub fn clear(&mut self, reset_target: Option<S>) -> Result<(), StoreError> {
        match reset_target {
            None => {
                self.log.truncate()?;
                self.tree.clear();
                self.log.write_header()?;
            }
            Some(target) => {
                self.log.discard()?;
                self.tree.clear();
                match Self::fresh_log(target, self.options) {
                    Ok(fresh) => self.log = fresh,
                    Err(error) => {
                        tracing::error!(%error, "failed to prepare new log; keeping the old one");
                        if let Err(header) = self.log.write_header() {
                            tracing::warn!(%header, "failed to restart old log");
                        }
                        return Err(error.into());
                    }
                }
            }
        }
        tracing::info!(format = %self.log.format(), "store cleared");
        Ok(())
    }

    fn fresh_log(mut storage: S, options: StoreOptions) -> Result<OperationLog<S>, WalError> {
        storage.discard()?;
        let mut log = OperationLog::new(storage, options.format, options.sync);
        log.write_header()?;
        Ok(log)
    }

    /// Force every appended record to durable storage.
    pub fn sync(&mut self) -> Result<(), StoreError> {
        self.log.storage_mut().sync()?;
        Ok(())
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Read access to the underlying tree.
    #[must_use]
    pub const fn tree(&self) -> &BTree<K, V, C> {
        &self.tree
    }

    /// What replaying the log found when the store was opened.
    #[must_use]
    pub const fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    /// Format new records are written in.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.log.format()
    }

    #[must_use]
    pub const fn options(&self) -> &StoreOptions {
        &self.options
    }
}

/// Errors that can occur during store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Invalid options.
    Config(ConfigError),
    /// I/O error outside the log itself.
    Io(std::io::Error),
    /// Log error.
    Wal(WalError),
    /// Replaying the log failed.
    Recovery(RecoveryError),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Wal(e) => write!(f, "log error: {e}"),
            Self::Recovery(e) => write!(f, "recovery error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Wal(e) => Some(e),
            Self::Recovery(e) => Some(e),
        }
    }
}

impl From<ConfigError> for StoreError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<WalError> for StoreError {
    fn from(e: WalError) -> Self {
        Self::Wal(e)
    }
}

impl From<RecoveryError> for StoreError {
    fn from(e: RecoveryError) -> Self {
        Self::Recovery(e)
    }
}
