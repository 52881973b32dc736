//! src/generator/batch_generator.rs
//!
//! The `BatchGenerator`: serves mini-batches one at a time while the next
//! window is being read, sorted and sliced on a background thread.
//!
//! # Epoch lifecycle
//!
//! ```text
//! prepare(shuffle) ──► fetch #1 submitted
//! next()  ── buffer empty ──► wait #1, install, submit #2, pop front
//! next()  ── buffer non-empty ──► pop front
//! ...
//! next()  ── buffer empty ──► wait #k, window empty ──► Ok(None)
//! ```
//!
//! After `Ok(None)` nothing is outstanding; the next epoch starts with another
//! `prepare()`. Calling `next()` again before that is a sequencing error and
//! panics.
//!
//! # Resuming
//! `restore()` replays the corpus and batch shuffling from the seeds saved in
//! a [`TrainingState`] and skips the batches already trained in the current
//! epoch. The `prepare()` call the training loop makes right afterwards is
//! then a no-op.

use crate::corpus::Corpus;
use crate::rng::RngEngine;
use crate::state::{TrainingObserver, TrainingState};
use crate::stats::BatchStats;
use anyhow::{anyhow, Context, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::BatchGeneratorConfig;
use super::fetch::{FetchOutput, Fetcher};
use super::iterator::BatchIter;
use super::prefetch::PrefetchWorker;

const PREFETCH_THREAD_NAME: &str = "batch-prefetch";

// ================================================================================================
// 1. Core Type
// ================================================================================================
/// Asynchronous mini-batch generator over a [`Corpus`].
///
/// # Type parameters:
/// - `C`: the sample source; its `Batch` type is what `next()` yields.
///
/// # Thread safety:
/// - The generator owns one background thread, named `batch-prefetch`.
/// - The corpus and the batch-shuffling engine are moved to that thread for
///   each fetch and moved back with the result, so they are never shared.
/// - Dropping the generator waits for an outstanding fetch to finish.
pub struct BatchGenerator<C: Corpus> {
    /// `None` while a fetch is outstanding
    fetcher: Option<Fetcher<C>>,
    buffered: VecDeque<C::Batch>,
    worker: PrefetchWorker<Fetcher<C>, FetchOutput<C>>,
    /// Set by `restore()`, consumed by the next `prepare()`
    restored: bool,
    config: BatchGeneratorConfig,
    stats: Option<Arc<BatchStats>>,
}

// ================================================================================================
// 2. Construction
// ================================================================================================
impl<C: Corpus> BatchGenerator<C> {
    /// Creates a generator. No sample is read until [`prepare`](Self::prepare).
    ///
    /// `stats` is only used when `config.mini_batch_fit` is enabled; without
    /// it the generator falls back to the word budget or the fixed count.
    ///
    /// # Errors
    /// - Invalid configuration (zero sizes, window size overflow)
    /// - Worker thread creation failure
    pub fn new(corpus: C, config: BatchGeneratorConfig, stats: Option<Arc<BatchStats>>) -> Result<Self> {
        config
            .validate()
            .context("Invalid batch generator configuration")?;

        if config.mini_batch_fit && stats.as_ref().map_or(true, |s| s.is_empty()) {
            warn!("[data] mini-batch-fit is enabled but no batch statistics were given");
        }

        let rng = RngEngine::from_optional_seed(config.seed);
        debug!(
            "[data] batch generator: mini-batch {}, maxi-batch {}, sort {}, shuffle seed {}",
            config.mini_batch,
            config.maxi_batch,
            config.maxi_batch_sort,
            rng.seed()
        );

        let fetcher = Fetcher::new(corpus, config.clone(), stats.clone(), rng);
        let worker = PrefetchWorker::new(PREFETCH_THREAD_NAME, Fetcher::<C>::run)?;

        Ok(Self {
            fetcher: Some(fetcher),
            buffered: VecDeque::new(),
            worker,
            restored: false,
            config,
            stats,
        })
    }

    pub fn config(&self) -> &BatchGeneratorConfig {
        &self.config
    }

    /// Batches of the current window not yet handed out.
    pub fn buffered(&self) -> usize {
        self.buffered.len()
    }

    /// Whether the next window is being fetched in the background.
    pub fn is_fetching(&self) -> bool {
        self.worker.is_outstanding()
    }

    // ============================================================================================
    // 3. Iteration
    // ============================================================================================

    /// Returns the next mini-batch, or `Ok(None)` at the end of the epoch.
    ///
    /// Blocks only when the current window is used up and the next one is
    /// still being fetched. Errors from the corpus surface here; the
    /// generator can be prepared again afterwards.
    ///
    /// # Panics
    /// If called after the end of an epoch without an intervening
    /// [`prepare`](Self::prepare).
    pub fn next(&mut self) -> Result<Option<C::Batch>> {
        if let Some(batch) = self.buffered.pop_front() {
            return Ok(Some(batch));
        }

        let (fetcher, batches) = self.worker.wait()?;
        self.fetcher = Some(fetcher);
        self.buffered = batches.context("Background batch fetch failed")?;

        if self.buffered.is_empty() {
            return Ok(None);
        }

        self.fetch_async()?;
        Ok(self.buffered.pop_front())
    }

    /// Iterator over the remaining batches of the current epoch.
    pub fn iter(&mut self) -> BatchIter<'_, C> {
        BatchIter::new(self)
    }

    // ============================================================================================
    // 4. Epoch and State Control
    // ============================================================================================

    /// Starts an epoch: reorders the corpus (`shuffle`) or puts it back into
    /// natural order, then starts fetching the first window.
    ///
    /// Right after a successful [`restore`](Self::restore) this does nothing.
    ///
    /// # Panics
    /// If a fetch is still outstanding, i.e. the previous epoch was not read
    /// to its end.
    pub fn prepare(&mut self, shuffle: bool) -> Result<()> {
        if std::mem::take(&mut self.restored) {
            return Ok(());
        }

        let fetcher = self.fetcher_mut()?;
        if shuffle {
            fetcher.corpus.shuffle().context("Failed to shuffle the corpus")?;
        } else {
            fetcher.corpus.reset().context("Failed to reset the corpus")?;
        }
        fetcher.newly_prepared = true;
        fetcher.shuffle = shuffle;

        self.buffered.clear();
        self.fetch_async()
    }

    /// Puts the generator back where `state` says training stopped.
    ///
    /// Returns `false` when there is nothing to restore (no batch trained
    /// yet), restoring is disabled by `no_restore_corpus`, or the epoch has
    /// fewer than `state.batches_epoch` batches. Otherwise the
    /// epoch is prepared and `state.batches_epoch` batches are skipped; the
    /// following `prepare()` call is absorbed.
    pub fn restore(&mut self, state: &TrainingState, shuffle: bool) -> Result<bool> {
        if state.is_fresh() || self.config.no_restore_corpus {
            return Ok(false);
        }

        if state.epochs > 1 {
            let fetcher = self.fetcher_mut()?;
            fetcher
                .corpus
                .restore(state)
                .context("Failed to restore the corpus state")?;
            fetcher.rng.set_state(state.seed_batch);
        }

        info!(
            "[data] Restoring the corpus state to epoch {}, batch {}",
            state.epochs, state.batches
        );

        self.prepare(shuffle)?;
        for skipped in 0..state.batches_epoch {
            if self.next()?.is_none() {
                warn!(
                    "[data] epoch {} ended after {} of {} batches while restoring, starting over",
                    state.epochs, skipped, state.batches_epoch
                );
                return Ok(false);
            }
        }

        self.restored = true;
        Ok(true)
    }

    /// Typical number of target labels in a mini-batch, for learning-rate
    /// and logging heuristics. 0 when the batch size is a plain count.
    pub fn estimate_typical_trg_batch_words(&self) -> usize {
        match &self.stats {
            Some(stats) if self.config.mini_batch_fit && !stats.is_empty() => {
                stats.estimate_typical_trg_words()
            }
            _ => self.config.mini_batch_words,
        }
    }

    // ============================================================================================
    // 5. Private Helpers
    // ============================================================================================

    fn fetch_async(&mut self) -> Result<()> {
        self.worker.assert_idle();
        let fetcher = self
            .fetcher
            .take()
            .ok_or_else(|| anyhow!("Batch generator lost its corpus to a failed fetch"))?;
        self.worker.submit(fetcher)
    }

    /// # Panics
    /// If a fetch is outstanding.
    fn fetcher_mut(&mut self) -> Result<&mut Fetcher<C>> {
        self.worker.assert_idle();
        self.fetcher
            .as_mut()
            .ok_or_else(|| anyhow!("Batch generator lost its corpus to a failed fetch"))
    }
}

// ================================================================================================
// 6. Training Hooks
// ================================================================================================
impl<C: Corpus> TrainingObserver for BatchGenerator<C> {
    /// Saves fresh seeds for batch and corpus shuffling, so that a run resumed
    /// from `state` shuffles the next epoch the same way.
    ///
    /// # Panics
    /// If a fetch is outstanding.
    fn act_after_epoch(&mut self, state: &mut TrainingState) {
        match self.fetcher_mut() {
            Ok(fetcher) => {
                state.seed_batch = fetcher.rng.checkpoint();
                state.seed_corpus = fetcher.corpus.checkpoint_rng();
            }
            Err(e) => warn!("[data] cannot save shuffling seeds: {:#}", e),
        }
    }
}
