//! Randomness for fault rolls and correlation ids.
//!
//! Handlers and the dispatcher take a [`RandomSource`] instead of reaching
//! for a process-wide generator, so tests can script the draws.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Length of correlation ids generated by the worker.
pub const CORRELATION_ID_LEN: usize = 6;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Source of uniform random integers.
#[cfg_attr(test, mockall::automock)]
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `[0, upper)`. `upper` is never zero.
    fn below(&self, upper: u32) -> u32;
}

/// Thread-local generator from `rand`. The default for running servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn below(&self, upper: u32) -> u32 {
        rand::rng().random_range(0..upper)
    }
}

/// Seeded generator producing a reproducible sequence.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<SmallRng>,
}

impl SeededRandom {
    /// Create a generator from a fixed seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn below(&self, upper: u32) -> u32 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_range(0..upper)
    }
}

/// Draw a uniform integer in `[0, 100)`.
pub fn roll_percent(rng: &dyn RandomSource) -> u32 {
    rng.below(100)
}

/// Generate a case-mixed alphabetic correlation id of [`CORRELATION_ID_LEN`] characters.
pub fn correlation_id(rng: &dyn RandomSource) -> String {
    (0..CORRELATION_ID_LEN)
        .map(|_| LETTERS[rng.below(LETTERS.len() as u32) as usize] as char)
        .collect()
}
