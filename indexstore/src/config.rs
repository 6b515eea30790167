//! Store configuration.
//!
//! Configuration is loaded from environment variables, with a default for
//! every setting.
//!
//! # Environment Variables
//!
//! - `INDEXSTORE_DIRECTORY`: Directory where log files are stored (default: `./data`)
//! - `INDEXSTORE_BRANCHING_FACTOR`: Minimum branching factor `b` of every tree (default: `2`)
//! - `INDEXSTORE_SYNC`: Whether to fsync after every append (default: `false`)
//! - `INDEXSTORE_LOG_FORMAT`: `framed` or `legacy` encoding for new logs (default: `framed`)
//!
//! # Invariants
//!
//! - `branching_factor` is always at least `MIN_BRANCHING_FACTOR`
//! - `directory` is always a valid path (may not exist yet)

use std::path::PathBuf;

use crate::storage::LogFormat;

/// Smallest branching factor for which a B-tree is well defined.
pub const MIN_BRANCHING_FACTOR: usize = 2;

/// Per-store settings.
///
/// Every index the application keeps is a separate store, and each can be
/// opened with its own options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Minimum branching factor `b`. Nodes hold at most `2b - 1` keys.
    pub branching_factor: usize,
    /// Call `fsync` after each append, not just flush.
    pub sync: bool,
    /// Encoding used when a new log is created. Existing logs keep their own.
    pub format: LogFormat,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            branching_factor: StoreConfig::DEFAULT_BRANCHING_FACTOR,
            sync: false,
            format: LogFormat::Framed,
        }
    }
}

impl StoreOptions {
    #[must_use]
    pub const fn with_branching_factor(mut self, branching_factor: usize) -> Self {
        self.branching_factor = branching_factor;
        self
    }

    #[must_use]
    pub const fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Check that the options describe a usable tree.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.branching_factor < MIN_BRANCHING_FACTOR {
            return Err(ConfigError::BranchingFactorTooSmall(self.branching_factor));
        }
        Ok(())
    }
}

/// Process-wide store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding one `{name}.log` file per store.
    pub directory: PathBuf,
    /// Options applied to stores opened through this config.
    pub options: StoreOptions,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
    /// The branching factor is below `MIN_BRANCHING_FACTOR`.
    BranchingFactorTooSmall(usize),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
            Self::BranchingFactorTooSmall(b) => write!(
                f,
                "branching factor {b} is too small (minimum {MIN_BRANCHING_FACTOR})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(Self::DEFAULT_DIRECTORY),
            options: StoreOptions::default(),
        }
    }
}

impl StoreConfig {
    /// Default log directory.
    pub const DEFAULT_DIRECTORY: &'static str = "./data";
    /// Default minimum branching factor.
    pub const DEFAULT_BRANCHING_FACTOR: usize = 2;

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// `from_env` is this with `std::env::var`; tests pass a map instead of
    /// mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let directory = lookup("INDEXSTORE_DIRECTORY")
            .map_or_else(|| PathBuf::from(Self::DEFAULT_DIRECTORY), PathBuf::from);

        let branching_factor = match lookup("INDEXSTORE_BRANCHING_FACTOR") {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "INDEXSTORE_BRANCHING_FACTOR".to_string(),
                    message: format!("'{value}' is not a non-negative integer"),
                })?,
            None => Self::DEFAULT_BRANCHING_FACTOR,
        };

        let sync = match lookup("INDEXSTORE_SYNC") {
            Some(value) => parse_bool("INDEXSTORE_SYNC", &value)?,
            None => false,
        };

        let format = match lookup("INDEXSTORE_LOG_FORMAT") {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "framed" => LogFormat::Framed,
                "legacy" => LogFormat::Legacy,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "INDEXSTORE_LOG_FORMAT".to_string(),
                        message: format!("'{value}' is not one of: framed, legacy"),
                    });
                }
            },
            None => LogFormat::Framed,
        };

        let options = StoreOptions {
            branching_factor,
            sync,
            format,
        };
        options.validate()?;

        Ok(Self { directory, options })
    }

    /// Path of the log file for the store called `name`.
    #[must_use]
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.log"))
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a boolean"),
        }),
    }
}
