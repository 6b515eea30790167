// Test code is allowed to use unwrap() and expect() for convenience.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
//! Durable ordered indexes.
//!
//! Each index is a B-tree kept in memory and made durable by an append-only
//! log of its mutations. Opening an index replays its log.
//!
//! System components:
//!  - B-tree engine with a range cursor (`storage::btree`)
//!  - Operation log and its replay (`storage`)
//!  - Environment configuration (`config`)

pub mod config;
mod e2e_tests;
pub mod storage;

#[cfg(test)]
mod simulation;

pub use config::{ConfigError, StoreConfig, StoreOptions};
pub use storage::{Store, StoreError};
