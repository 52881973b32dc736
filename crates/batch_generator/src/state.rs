//! Training-state bookkeeping shared between the training loop and the
//! batch generator.
//!
//! The generator reads the state when a run is resumed (to put the corpus
//! back where it was) and writes its random seeds into it at every epoch
//! boundary through the [`TrainingObserver`] hook.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Progress counters and seeds persisted alongside model checkpoints.
///
/// - `epochs`: current epoch, starting at 1
/// - `batches`: batches consumed over the whole run
/// - `batches_epoch`: batches consumed in the current epoch
/// - `seed_batch`: batch-shuffling seed captured at the last epoch boundary
/// - `seed_corpus`: corpus-shuffling seed captured at the last epoch boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingState {
    pub epochs: usize,
    pub batches: usize,
    pub batches_epoch: usize,
    pub seed_batch: u64,
    pub seed_corpus: u64,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self {
            epochs: 1,
            batches: 0,
            batches_epoch: 0,
            seed_batch: 0,
            seed_corpus: 0,
        }
    }
}

impl TrainingState {
    /// Records that one more batch was consumed.
    pub fn new_batch(&mut self) {
        self.batches += 1;
        self.batches_epoch += 1;
    }

    /// Advances to the next epoch.
    pub fn new_epoch(&mut self) {
        self.epochs += 1;
        self.batches_epoch = 0;
    }

    /// Whether nothing has been trained yet.
    pub fn is_fresh(&self) -> bool {
        self.epochs == 1 && self.batches_epoch == 0
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize training state")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write training state to {}", path.display()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read training state from {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed training state in {}", path.display()))
    }
}

/// Hook invoked by the training loop at epoch boundaries.
pub trait TrainingObserver {
    fn act_after_epoch(&mut self, state: &mut TrainingState);
}

#[cfg(test)]
mod training_state_tests {
    use super::*;

    #[test]
    fn test_counters_follow_epochs() {
        let mut state = TrainingState::default();
        assert!(state.is_fresh());

        state.new_batch();
        state.new_batch();
        assert_eq!((state.batches, state.batches_epoch), (2, 2));
        assert!(!state.is_fresh());

        state.new_epoch();
        assert_eq!((state.epochs, state.batches, state.batches_epoch), (2, 2, 0));
        assert!(!state.is_fresh());
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");

        let state = TrainingState {
            epochs: 3,
            batches: 120,
            batches_epoch: 17,
            seed_batch: 99,
            seed_corpus: u64::MAX,
        };
        state.save(&path)?;
        assert_eq!(TrainingState::load(&path)?, state);

        fs::write(&path, "{ not json")?;
        assert!(TrainingState::load(&path).is_err());
        Ok(())
    }
}
