//! Common helpers for end-to-end tests.

use std::path::PathBuf;

use tempfile::TempDir;

use crate::config::{StoreConfig, StoreOptions};
use crate::storage::{Codec, LogFormat, Store};

/// A directory of stores that is removed on drop.
pub struct TestDir {
    // Held for its drop.
    _dir: TempDir,
    pub config: StoreConfig,
}

impl TestDir {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    #[must_use]
    pub fn with_options(options: StoreOptions) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = StoreConfig {
            directory: dir.path().to_path_buf(),
            options,
        };
        Self { _dir: dir, config }
    }

    #[must_use]
    pub fn with_branching_factor(branching_factor: usize) -> Self {
        Self::with_options(StoreOptions::default().with_branching_factor(branching_factor))
    }

    #[must_use]
    pub fn with_format(format: LogFormat) -> Self {
        Self::with_options(StoreOptions::default().with_format(format))
    }

    /// Open (or reopen) the store called `name`.
    pub fn open<K: Codec + Ord, V: Codec>(&self, name: &str) -> Store<K, V> {
        Store::open(&self.config, name).expect("Failed to open store")
    }

    #[must_use]
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.config.log_path(name)
    }

    pub fn log_bytes(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.log_path(name)).expect("Failed to read log")
    }

    pub fn write_log_bytes(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.log_path(name), bytes).expect("Failed to write log");
    }
}

/// Keys of every entry, in order.
pub fn keys<K: Codec + Ord + Clone, V: Codec>(store: &Store<K, V>) -> Vec<K> {
    store.all().with_keys().map(|(k, _)| k.clone()).collect()
}

/// Every entry, in order.
pub fn entries<K, V>(store: &Store<K, V>) -> Vec<(K, V)>
where
    K: Codec + Ord + Clone,
    V: Codec + Clone,
{
    store
        .all()
        .with_keys()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
