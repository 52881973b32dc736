//! Batch-size table used for dynamic ("fit") mini-batch sizing.
//!
//! The table maps a tuple of per-stream maximum lengths to the largest batch
//! size known to fit the resource budget at those lengths. It is usually filled
//! once before training by probing the model with batches of growing size, and
//! then only read by the batch generator.
//!
//! Keys are kept in lexicographic order. A lookup returns the size stored for
//! the first key that is at least as long as the query in *every* stream.

use crate::batch::{Batch, CorpusBatch};

/// Position in a [`BatchStats`] table, used to resume a lookup where the
/// previous one stopped.
///
/// While a mini-batch is being filled its per-stream maxima only grow, so no
/// key before the last match can match again; the slicer keeps one cursor per
/// batch and rewinds it with [`BatchStats::begin`] when the batch closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsCursor(usize);

#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    entries: Vec<(Vec<usize>, usize)>,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(lengths, batch_size)` pairs.
    pub fn from_entries(entries: impl IntoIterator<Item = (Vec<usize>, usize)>) -> Self {
        let mut stats = Self::new();
        for (lengths, batch_size) in entries {
            stats.add(lengths, batch_size);
        }
        stats
    }

    /// Records that `batch_size` samples fit at `lengths`, keeping the
    /// largest size seen for a key.
    pub fn add(&mut self, lengths: Vec<usize>, batch_size: usize) {
        match self.entries.binary_search_by(|(k, _)| k.cmp(&lengths)) {
            Ok(i) => self.entries[i].1 = self.entries[i].1.max(batch_size),
            Err(i) => self.entries.insert(i, (lengths, batch_size)),
        }
    }

    /// Records an observed batch, keyed by its padded stream widths.
    pub fn add_batch(&mut self, batch: &CorpusBatch, multiplier: usize) {
        self.add(batch.widths(), batch.size() * multiplier);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn begin(&self) -> StatsCursor {
        StatsCursor(0)
    }

    /// Cursor past the last key; where a lookup that found no covering key
    /// leaves its cursor.
    pub fn end(&self) -> StatsCursor {
        StatsCursor(self.entries.len())
    }

    /// Cursor at the first key not lexicographically smaller than `lengths`.
    pub fn lower_bound(&self, lengths: &[usize]) -> StatsCursor {
        StatsCursor(self.entries.partition_point(|(k, _)| k.as_slice() < lengths))
    }

    /// Largest batch size known to fit `lengths`, scanning from `cursor`.
    ///
    /// On a match `cursor` is left on the matching key. When no key covers
    /// `lengths` (a sample longer than anything probed), `cursor` is left at
    /// [`end`](Self::end) and the batch size is 1 so that the sample travels
    /// alone.
    pub fn find_batch_size(&self, lengths: &[usize], cursor: &mut StatsCursor) -> usize {
        let covers = |key: &[usize]| {
            key.len() >= lengths.len() && key.iter().zip(lengths).all(|(k, l)| k >= l)
        };

        match self.entries[cursor.0.min(self.entries.len())..]
            .iter()
            .position(|(k, _)| covers(k))
        {
            Some(offset) => {
                cursor.0 += offset;
                self.entries[cursor.0].1.max(1)
            }
            None => {
                *cursor = self.end();
                1
            }
        }
    }

    /// Rough mini-batch size in target labels: the mean over all keys of
    /// `batch_size * max_target_length`. Returns 0 for an empty table.
    pub fn estimate_typical_trg_words(&self) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        let total: usize = self
            .entries
            .iter()
            .map(|(k, size)| size * k.last().copied().unwrap_or(0))
            .sum();
        total / self.entries.len()
    }
}
