//! End-to-end tests at the store level.
//!
//! Each test file covers a specific scenario against file-backed stores in
//! a temporary directory, reopening them to check what the log preserved.

#![cfg(test)]

mod helpers;

mod test_clear;
mod test_corruption;
mod test_delete_rebalance;
mod test_duplicates;
mod test_failed_append;
mod test_fifteen_keys;
mod test_key_types;
mod test_range_queries;
mod test_reopen;
mod test_torn_tail;
mod test_update;
