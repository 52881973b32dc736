//! Explicit, seedable random engine.
//!
//! Every component that needs randomness (the generator's batch shuffler, the
//! in-memory corpus) owns one `RngEngine`. There is no global or thread-local
//! RNG, so a run is fully determined by the seeds it was constructed with.
//!
//! # Checkpointing
//! `StdRng` cannot export its internal state, so the engine is checkpointed by
//! re-seeding: [`RngEngine::checkpoint`] draws a fresh seed from the current
//! stream, re-seeds the engine with it and returns it. Restoring that seed with
//! [`RngEngine::set_state`] reproduces every subsequent draw exactly.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct RngEngine {
    seed: u64,
    rng: StdRng,
}

impl RngEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates an engine from an optional seed, drawing one from the OS when absent.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        Self::new(seed.unwrap_or_else(|| rand::rng().random()))
    }

    /// The seed the engine was last (re-)seeded with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Re-seeds the engine from a seed previously returned by [`checkpoint`](Self::checkpoint).
    pub fn set_state(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    /// Draws a new seed, re-seeds the engine with it and returns it.
    pub fn checkpoint(&mut self) -> u64 {
        let next = self.rng.random();
        self.set_state(next);
        next
    }

    /// Shuffles `items` in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}
