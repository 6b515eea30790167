//! Operation generator for deterministic simulation testing.
//!
//! Produces a random but reproducible stream of store operations over a small
//! key pool, so that inserts, deletes and updates keep colliding.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for operation generation.
#[derive(Debug, Clone, Copy)]
pub struct OperationGenConfig {
    /// Keys are drawn from `0..key_pool`.
    pub key_pool: i64,
    /// Probability of an insert.
    pub insert_rate: f64,
    /// Probability of a delete.
    pub delete_rate: f64,
    /// Probability of an update.
    pub update_rate: f64,
    /// Probability of a reopen. Whatever is left over is a range query.
    pub reopen_rate: f64,
    /// Probability that an insert allows duplicate keys.
    pub duplicate_rate: f64,
}

impl Default for OperationGenConfig {
    fn default() -> Self {
        Self {
            key_pool: 200,
            insert_rate: 0.5,
            delete_rate: 0.25,
            update_rate: 0.1,
            reopen_rate: 0.01,
            duplicate_rate: 0.3,
        }
    }
}

/// One step of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert {
        key: i64,
        value: u64,
        allow_duplicates: bool,
    },
    Delete {
        key: i64,
    },
    Update {
        key: i64,
        value: u64,
    },
    /// Query `min..=max`, or the open ranges on either side of `min`.
    Query {
        min: i64,
        max: i64,
    },
    /// Drop the store and open it again over the same log.
    Reopen,
}

/// Generates random operations.
#[derive(Debug)]
pub struct OperationGenerator {
    rng: StdRng,
    config: OperationGenConfig,
}

impl OperationGenerator {
    #[must_use]
    pub fn with_config(seed: u64, config: OperationGenConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    /// Whether an injected fault should fire, at `rate`.
    pub fn chance(&mut self, rate: f64) -> bool {
        rate > 0.0 && self.rng.random::<f64>() < rate
    }

    fn key(&mut self) -> i64 {
        self.rng.random_range(0..self.config.key_pool)
    }

    /// Generate the next operation.
    pub fn next_operation(&mut self) -> Operation {
        let config = self.config;
        let roll = self.rng.random::<f64>();

        if roll < config.insert_rate {
            let allow_duplicates = self.chance(config.duplicate_rate);
            return Operation::Insert {
                key: self.key(),
                value: self.rng.random(),
                allow_duplicates,
            };
        }
        let roll = roll - config.insert_rate;
        if roll < config.delete_rate {
            return Operation::Delete { key: self.key() };
        }
        let roll = roll - config.delete_rate;
        if roll < config.update_rate {
            return Operation::Update {
                key: self.key(),
                value: self.rng.random(),
            };
        }
        let roll = roll - config.update_rate;
        if roll < config.reopen_rate {
            return Operation::Reopen;
        }

        let a = self.key();
        let b = self.key();
        Operation::Query {
            min: a.min(b),
            max: a.max(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_is_deterministic() {
        let config = OperationGenConfig::default();
        let mut a = OperationGenerator::with_config(7, config);
        let mut b = OperationGenerator::with_config(7, config);
        for _ in 0..100 {
            assert_eq!(a.next_operation(), b.next_operation());
        }
    }

    #[test]
    fn test_generator_covers_every_operation() {
        let config = OperationGenConfig {
            reopen_rate: 0.05,
            ..OperationGenConfig::default()
        };
        let mut generator = OperationGenerator::with_config(1, config);
        let mut seen = [false; 5];
        for _ in 0..2000 {
            let slot = match generator.next_operation() {
                Operation::Insert { key, .. } => {
                    assert!((0..config.key_pool).contains(&key));
                    0
                }
                Operation::Delete { .. } => 1,
                Operation::Update { .. } => 2,
                Operation::Query { min, max } => {
                    assert!(min <= max);
                    3
                }
                Operation::Reopen => 4,
            };
            seen[slot] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}
