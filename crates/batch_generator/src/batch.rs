use crate::sample::{Sample, Word};
use anyhow::{anyhow, bail, Result};

/// A `Batch` is the opaque unit handed to the training loop.
///
/// The generator only needs two facts about a batch: how many samples it
/// holds, and how many tokens a given stream contributes (for logging and
/// for dynamic mini-batch scaling). Everything else is up to the corpus that
/// built it via [`Corpus::to_batch`](crate::corpus::Corpus::to_batch).
///
/// Batches move from the background fetch thread to the consumer, so they
/// must be `Send`.
pub trait Batch: Send + 'static {
    /// Number of samples in the batch.
    fn size(&self) -> usize;

    /// Number of (non-padding) tokens in stream `stream`.
    ///
    /// Negative indices count from the end: `-1` is the last stream, which by
    /// convention holds the labels.
    fn words(&self, stream: isize) -> usize;
}

/// Resolves a possibly negative stream index against `sets` streams.
pub(crate) fn resolve_stream(stream: isize, sets: usize) -> Option<usize> {
    let index = if stream < 0 {
        sets.checked_sub(stream.unsigned_abs())?
    } else {
        stream as usize
    };
    (index < sets).then_some(index)
}

/// One stream of a [`CorpusBatch`], padded to a rectangle.
///
/// `data` and `mask` are laid out row-major with shape `[size, width]`, where
/// `width` is the longest sequence of this stream in the batch. Padding
/// positions hold `pad_id` and a mask value of `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubBatch {
    pub data: Vec<Word>,
    pub mask: Vec<f32>,
    pub size: usize,
    pub width: usize,
    pub words: usize,
}

impl SubBatch {
    fn pad(rows: &[&[Word]], pad_id: Word) -> Self {
        let size = rows.len();
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);

        let mut data = vec![pad_id; size * width];
        let mut mask = vec![0.0; size * width];
        let mut words = 0;
        for (b, row) in rows.iter().enumerate() {
            let offset = b * width;
            data[offset..offset + row.len()].copy_from_slice(row);
            mask[offset..offset + row.len()].fill(1.0);
            words += row.len();
        }

        Self {
            data,
            mask,
            size,
            width,
            words,
        }
    }

    /// Returns the padded row of sample `b`.
    pub fn row(&self, b: usize) -> Option<&[Word]> {
        (b < self.size).then(|| &self.data[b * self.width..(b + 1) * self.width])
    }
}

/// The default batch type built by [`InMemoryCorpus`](crate::corpus::InMemoryCorpus).
///
/// Holds one [`SubBatch`] per stream, plus the ids of the samples it was
/// built from in construction order.
///
/// # Examples
/// Three samples with source lengths `[2, 3, 1]` and target lengths
/// `[4, 2, 2]` produce:
/// - stream 0 -> `[3, 3]` rectangle, 6 words
/// - stream 1 -> `[3, 4]` rectangle, 8 words
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusBatch {
    sub_batches: Vec<SubBatch>,
    sentence_ids: Vec<usize>,
}

impl CorpusBatch {
    /// Pads and stacks `samples` stream by stream.
    ///
    /// All samples must have the same number of streams.
    pub fn collate(samples: &[Sample], pad_id: Word) -> Result<Self> {
        if samples.is_empty() {
            bail!("Cannot build a batch from an empty sample list");
        }

        let sets = samples[0].size();
        if let Some(odd) = samples.iter().find(|s| s.size() != sets) {
            bail!(
                "Sample {} has {} streams, but the batch expects {}",
                odd.id,
                odd.size(),
                sets
            );
        }

        let sub_batches = (0..sets)
            .map(|j| {
                let rows: Vec<&[Word]> = samples.iter().map(|s| s.streams[j].as_slice()).collect();
                SubBatch::pad(&rows, pad_id)
            })
            .collect();

        Ok(Self {
            sub_batches,
            sentence_ids: samples.iter().map(|s| s.id).collect(),
        })
    }

    /// Number of streams.
    pub fn sets(&self) -> usize {
        self.sub_batches.len()
    }

    /// Returns the padded sub-batch for stream `stream` (negative indices count from the end).
    pub fn get(&self, stream: isize) -> Result<&SubBatch> {
        resolve_stream(stream, self.sets())
            .map(|j| &self.sub_batches[j])
            .ok_or_else(|| anyhow!("Stream {} not found in batch of {} streams", stream, self.sets()))
    }

    /// Ids of the samples in this batch, in construction order.
    pub fn sentence_ids(&self) -> &[usize] {
        &self.sentence_ids
    }

    /// Padded width of every stream, in stream order.
    pub fn widths(&self) -> Vec<usize> {
        self.sub_batches.iter().map(|sb| sb.width).collect()
    }
}

impl Batch for CorpusBatch {
    fn size(&self) -> usize {
        self.sentence_ids.len()
    }

    fn words(&self, stream: isize) -> usize {
        self.get(stream).map(|sb| sb.words).unwrap_or(0)
    }
}
