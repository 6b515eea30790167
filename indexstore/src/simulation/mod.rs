//! Deterministic simulation testing for stores.
//!
//! A simulation drives one store with a seeded stream of random operations
//! and checks it against a plain `BTreeMap` model after every step:
//! - The tree passes its structural self-check
//! - Every query returns what the model predicts
//! - Reopening over the same log restores exactly the durable state
//!
//! Log appends can be made to fail at random. The in-memory state keeps the
//! change and the model tracks which changes reached the log, so a reopen
//! after a failure is checked against what was actually made durable.
//!
//! # Usage
//!
//! ```ignore
//! let config = SimulatorConfig::new(12345).with_branching_factor(3);
//! let result = Simulator::new(config).run(1000);
//! assert!(result.passed(), "{:?}", result.violations);
//! ```

mod model;
mod op_gen;
mod simulator;
