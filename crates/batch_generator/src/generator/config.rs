//! src/generator/config.rs
//!
//! Configuration for BatchGenerator behaviour
//!
//! The `BatchGeneratorConfig` struct stores the parameters that control how
//! samples are grouped into windows and cut into mini-batches.
//!
//! Example:
//! ```ignore
//! let config = BatchGeneratorConfig::builder()
//!     .mini_batch(64)
//!     .maxi_batch(100)
//!     .maxi_batch_sort(MaxiBatchSort::Trg)
//!     .seed(1234)
//!     .build();
//! ```
//!
//! The same options can be read from JSON with kebab-case keys:
//! ```text
//! { "mini-batch": 64, "maxi-batch": 100, "maxi-batch-sort": "trg" }
//! ```
//!
//! # Performance considerations:
//! - `maxi_batch`: Larger windows group lengths better (less padding) but hold
//!                 `mini_batch * maxi_batch` samples in memory and make each
//!                 background fetch longer.
//! - `mini_batch_words`: Keeps the token count per batch roughly constant,
//!                       which matters more than the sample count for memory.

use crate::maxi_batch::MaxiBatchSort;
use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for BatchGenerator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BatchGeneratorConfig {
    /// Samples per mini-batch for the fixed-count policy
    pub mini_batch: usize,
    /// Window size as a multiple of `mini_batch`
    pub maxi_batch: usize,
    /// Ordering applied inside a window
    pub maxi_batch_sort: MaxiBatchSort,
    /// Token budget per mini-batch, counted on the first stream (0 = disabled)
    pub mini_batch_words: usize,
    /// Size mini-batches from batch statistics when they are available
    pub mini_batch_fit: bool,
    /// Skip corpus restoration when resuming training
    pub no_restore_corpus: bool,
    /// Seed for batch shuffling; drawn at random when absent
    pub seed: Option<u64>,
}

impl Default for BatchGeneratorConfig {
    fn default() -> Self {
        Self {
            mini_batch: 64,
            maxi_batch: 100,
            maxi_batch_sort: MaxiBatchSort::None,
            mini_batch_words: 0,
            mini_batch_fit: false,
            no_restore_corpus: false,
            seed: None,
        }
    }
}

impl BatchGeneratorConfig {
    pub fn builder() -> BatchGeneratorConfigBuilder {
        BatchGeneratorConfigBuilder::default()
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("Failed to parse batch generator configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the sizes are usable.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.mini_batch > 0,
            "mini-batch must be > 0, but got mini-batch={}",
            self.mini_batch
        );
        ensure!(
            self.maxi_batch > 0,
            "maxi-batch must be > 0, but got maxi-batch={}",
            self.maxi_batch
        );
        self.window_size().map(|_| ())
    }

    /// Maximum number of samples in one window: `mini_batch * maxi_batch`.
    pub fn window_size(&self) -> Result<usize> {
        self.mini_batch
            .checked_mul(self.maxi_batch)
            .ok_or_else(|| anyhow!("Window size overflow: {} * {}", self.mini_batch, self.maxi_batch))
    }
}

/// Builder for BatchGeneratorConfig with method chaining
#[derive(Debug, Clone, Default)]
pub struct BatchGeneratorConfigBuilder {
    config: BatchGeneratorConfig,
}

impl BatchGeneratorConfigBuilder {
    /// Set the number of samples per mini-batch (must be > 0)
    pub fn mini_batch(mut self, size: usize) -> Self {
        self.config.mini_batch = size;
        self
    }

    /// Set the window factor (must be > 0)
    pub fn maxi_batch(mut self, factor: usize) -> Self {
        self.config.maxi_batch = factor;
        self
    }

    /// Set the ordering applied inside each window
    pub fn maxi_batch_sort(mut self, sort: MaxiBatchSort) -> Self {
        self.config.maxi_batch_sort = sort;
        self
    }

    /// Set the token budget per mini-batch (0 disables it)
    pub fn mini_batch_words(mut self, words: usize) -> Self {
        self.config.mini_batch_words = words;
        self
    }

    /// Enable sizing from batch statistics.
    pub fn mini_batch_fit(mut self, fit: bool) -> Self {
        self.config.mini_batch_fit = fit;
        self
    }

    /// Disable corpus restoration on resume.
    pub fn no_restore_corpus(mut self, disable: bool) -> Self {
        self.config.no_restore_corpus = disable;
        self
    }

    /// Set the seed for reproducible batch shuffling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> BatchGeneratorConfig {
        self.config
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_defaults_and_builder() -> Result<()> {
        let config = BatchGeneratorConfig::default();
        assert_eq!(config.window_size()?, 6400);
        assert_eq!(config.maxi_batch_sort, MaxiBatchSort::None);

        let config = BatchGeneratorConfig::builder()
            .mini_batch(2)
            .maxi_batch(3)
            .maxi_batch_sort(MaxiBatchSort::Src)
            .no_restore_corpus(true)
            .seed(9)
            .build();
        config.validate()?;
        assert_eq!(config.window_size()?, 6);
        assert!(config.no_restore_corpus);
        assert_eq!(config.seed, Some(9));
        Ok(())
    }

    #[test]
    fn test_rejects_zero_and_overflowing_sizes() {
        assert!(BatchGeneratorConfig::builder().mini_batch(0).build().validate().is_err());
        assert!(BatchGeneratorConfig::builder().maxi_batch(0).build().validate().is_err());
        assert!(BatchGeneratorConfig::builder()
            .mini_batch(usize::MAX)
            .maxi_batch(2)
            .build()
            .validate()
            .is_err());
    }

    #[test]
    fn test_parses_kebab_case_json() -> Result<()> {
        let config = BatchGeneratorConfig::from_json(
            r#"{ "mini-batch": 32, "maxi-batch": 10, "maxi-batch-sort": "trg", "mini-batch-words": 500 }"#,
        )?;
        assert_eq!(config.mini_batch, 32);
        assert_eq!(config.maxi_batch_sort, MaxiBatchSort::Trg);
        assert_eq!(config.mini_batch_words, 500);
        assert!(!config.mini_batch_fit);

        assert!(BatchGeneratorConfig::from_json(r#"{ "maxi-batch-sort": "length" }"#).is_err());
        assert!(BatchGeneratorConfig::from_json(r#"{ "mini-batch": 0 }"#).is_err());
        assert!(BatchGeneratorConfig::from_json(r#"{ "mini-batchs": 4 }"#).is_err());
        Ok(())
    }
}
