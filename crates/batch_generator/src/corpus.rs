use crate::batch::{Batch, CorpusBatch};
use crate::rng::RngEngine;
use crate::sample::{Sample, Word};
use crate::state::TrainingState;
use anyhow::Result;
use std::sync::Arc;

/// A `Corpus` is the ordered, restartable sample source the batch generator
/// reads from.
///
/// The corpus keeps a read cursor over the current epoch order:
/// - `reset()` restores the natural order, `shuffle()` draws a new one; both
///   leave the cursor at the start.
/// - `rewind()` moves the cursor back to the first sample of the current order.
/// - `next_sample()` returns the sample under the cursor and advances past it.
///
/// The generator moves the corpus to its background thread for each fetch, so
/// implementations must be `Send + 'static`.
pub trait Corpus: Send + 'static {
    /// The batch type produced by [`to_batch`](Self::to_batch).
    type Batch: Batch;

    fn rewind(&mut self) -> Result<()>;

    /// Returns the next sample, or `Ok(None)` at the end of the epoch.
    fn next_sample(&mut self) -> Result<Option<Sample>>;

    fn reset(&mut self) -> Result<()>;

    fn shuffle(&mut self) -> Result<()>;

    /// Puts the corpus' own random state back to what `state` recorded.
    fn restore(&mut self, state: &TrainingState) -> Result<()>;

    /// Turns an ordered group of samples into a batch.
    fn to_batch(&self, samples: Vec<Sample>) -> Result<Self::Batch>;

    /// Returns a seed from which the corpus' shuffling can be replayed.
    /// See [`RngEngine::checkpoint`].
    fn checkpoint_rng(&mut self) -> u64;
}

/// A corpus whose samples are already tokenized and held in memory.
///
/// Samples live in an `Arc<[Sample]>`, so cloning the corpus is cheap and
/// clones share the data but not the epoch order or cursor.
///
/// # Shuffling
/// Each `shuffle()` starts from the natural order and permutes it with the
/// corpus' own [`RngEngine`], so the order of an epoch depends only on the
/// engine state at that point. This is what makes `restore()` exact.
#[derive(Debug, Clone)]
pub struct InMemoryCorpus {
    samples: Arc<[Sample]>,
    order: Vec<usize>,
    position: usize,
    rng: RngEngine,
    pad_id: Word,
}

impl InMemoryCorpus {
    pub fn new(samples: Vec<Sample>, seed: u64) -> Self {
        let order = (0..samples.len()).collect();
        Self {
            samples: samples.into(),
            order,
            position: 0,
            rng: RngEngine::new(seed),
            pad_id: 0,
        }
    }

    /// Builds a corpus from raw streams, numbering samples in the given order.
    pub fn from_streams(streams: Vec<Vec<Vec<Word>>>, seed: u64) -> Self {
        let samples = streams
            .into_iter()
            .enumerate()
            .map(|(id, s)| Sample::new(id, s))
            .collect();
        Self::new(samples, seed)
    }

    /// Sets the token used to pad batches (defaults to `0`).
    pub fn with_pad_id(mut self, pad_id: Word) -> Self {
        self.pad_id = pad_id;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample ids in the current epoch order.
    pub fn epoch_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().map(|&i| self.samples[i].id)
    }
}

impl Corpus for InMemoryCorpus {
    type Batch = CorpusBatch;

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn next_sample(&mut self) -> Result<Option<Sample>> {
        let Some(&index) = self.order.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(self.samples[index].clone()))
    }

    fn reset(&mut self) -> Result<()> {
        self.order = (0..self.samples.len()).collect();
        self.rewind()
    }

    fn shuffle(&mut self) -> Result<()> {
        self.order = (0..self.samples.len()).collect();
        self.rng.shuffle(&mut self.order);
        self.rewind()
    }

    fn restore(&mut self, state: &TrainingState) -> Result<()> {
        self.rng.set_state(state.seed_corpus);
        Ok(())
    }

    fn to_batch(&self, samples: Vec<Sample>) -> Result<CorpusBatch> {
        CorpusBatch::collate(&samples, self.pad_id)
    }

    fn checkpoint_rng(&mut self) -> u64 {
        self.rng.checkpoint()
    }
}
