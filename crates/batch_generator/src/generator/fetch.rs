//! src/generator/fetch.rs
//!
//! One background fetch cycle: fill a window, cut it into mini-batches,
//! shuffle their order.
//!
//! Everything a cycle touches lives in `Fetcher`. The generator moves the
//! whole value to the prefetch thread with each task and gets it back with
//! the result, so the corpus, the cursor and the random engine only ever have
//! one owner.

use crate::batch::Batch;
use crate::corpus::Corpus;
use crate::generator::BatchGeneratorConfig;
use crate::maxi_batch::fill_window;
use crate::rng::RngEngine;
use crate::slicer::{slice_window, BatchPolicy};
use crate::stats::BatchStats;
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// The fetcher together with the batches of the window it just produced.
pub(crate) type FetchOutput<C> = (Fetcher<C>, Result<VecDeque<<C as Corpus>::Batch>>);

pub(crate) struct Fetcher<C> {
    pub(crate) corpus: C,
    pub(crate) config: BatchGeneratorConfig,
    pub(crate) stats: Option<Arc<BatchStats>>,
    pub(crate) rng: RngEngine,
    /// Shuffle batch order in this epoch
    pub(crate) shuffle: bool,
    /// `prepare()` ran since the last fetch; start from the corpus' first sample
    pub(crate) newly_prepared: bool,
    /// Samples consumed from the corpus in this epoch
    pub(crate) samples_read: usize,
}

impl<C: Corpus> Fetcher<C> {
    pub(crate) fn new(
        corpus: C,
        config: BatchGeneratorConfig,
        stats: Option<Arc<BatchStats>>,
        rng: RngEngine,
    ) -> Self {
        Self {
            corpus,
            config,
            stats,
            rng,
            shuffle: false,
            newly_prepared: true,
            samples_read: 0,
        }
    }

    /// Runs one cycle. An empty result means the epoch is over.
    pub(crate) fn fetch_batches(&mut self) -> Result<VecDeque<C::Batch>> {
        if self.newly_prepared {
            self.corpus.rewind()?;
            self.samples_read = 0;
            self.newly_prepared = false;
        }

        let window = fill_window(
            &mut self.corpus,
            self.config.window_size()?,
            self.config.maxi_batch_sort,
        )?;
        let num_read = window.len();
        self.samples_read += num_read;

        let policy = BatchPolicy::select(&self.config, self.stats.as_deref());
        let mut batches = slice_window(window, policy, &self.corpus)?;

        if self.shuffle {
            self.rng.shuffle(batches.make_contiguous());
        }

        let (total_sentences, total_labels) = batches
            .iter()
            .fold((0, 0), |(s, l), b| (s + b.size(), l + b.words(-1)));
        let denom = batches.len().max(1) as f64;
        debug!(
            "[data] fetched {} batches with {} sentences ({} this epoch). Per batch: {:.1} sentences, {:.1} labels.",
            batches.len(),
            num_read,
            self.samples_read,
            total_sentences as f64 / denom,
            total_labels as f64 / denom
        );

        Ok(batches)
    }

    pub(crate) fn run(mut self) -> FetchOutput<C> {
        let batches = self.fetch_batches();
        (self, batches)
    }
}

#[cfg(test)]
mod fetcher_tests {
    use super::*;
    use crate::batch::CorpusBatch;
    use crate::corpus::InMemoryCorpus;
    use crate::maxi_batch::MaxiBatchSort;

    fn fetcher(n: usize, config: BatchGeneratorConfig) -> Fetcher<InMemoryCorpus> {
        let corpus = InMemoryCorpus::from_streams((0..n).map(|i| vec![vec![1; i % 7 + 1]]).collect(), 0);
        Fetcher::new(corpus, config, None, RngEngine::new(3))
    }

    fn ids(batches: &VecDeque<CorpusBatch>) -> Vec<usize> {
        batches.iter().flat_map(|b| b.sentence_ids().to_vec()).collect()
    }

    #[test]
    fn test_cycles_walk_the_corpus_once() -> Result<()> {
        let config = BatchGeneratorConfig::builder().mini_batch(3).maxi_batch(2).build();
        let mut fetcher = fetcher(14, config);

        let mut seen = Vec::new();
        let mut cycles = 0;
        loop {
            let batches = fetcher.fetch_batches()?;
            if batches.is_empty() {
                break;
            }
            cycles += 1;
            seen.extend(ids(&batches));
        }
        assert_eq!(cycles, 3);
        assert_eq!(seen, (0..14).collect::<Vec<_>>());
        assert_eq!(fetcher.samples_read, 14);
        Ok(())
    }

    #[test]
    fn test_newly_prepared_starts_over() -> Result<()> {
        let config = BatchGeneratorConfig::builder().mini_batch(2).maxi_batch(2).build();
        let mut fetcher = fetcher(6, config);

        let first = ids(&fetcher.fetch_batches()?);
        fetcher.newly_prepared = true;
        assert_eq!(ids(&fetcher.fetch_batches()?), first);
        assert_eq!(fetcher.samples_read, 4);
        Ok(())
    }

    #[test]
    fn test_shuffle_permutes_batches_not_samples() -> Result<()> {
        let config = BatchGeneratorConfig::builder()
            .mini_batch(2)
            .maxi_batch(10)
            .maxi_batch_sort(MaxiBatchSort::Src)
            .build();
        let mut plain = fetcher(20, config.clone());
        let mut shuffled = fetcher(20, config);
        shuffled.shuffle = true;

        let plain = plain.fetch_batches()?;
        let shuffled = shuffled.fetch_batches()?;
        assert_eq!(plain.len(), shuffled.len());

        let mut a: Vec<Vec<usize>> = plain.iter().map(|b| b.sentence_ids().to_vec()).collect();
        let mut b: Vec<Vec<usize>> = shuffled.iter().map(|b| b.sentence_ids().to_vec()).collect();
        assert_ne!(a, b);
        a.sort();
        b.sort();
        assert_eq!(a, b);
        Ok(())
    }
}
