//! Cuts a sorted maxi-batch window into mini-batches.
//!
//! Samples are popped from the window shortest-first and appended to the
//! current group. After every append exactly one [`BatchPolicy`] decides
//! whether the group is complete:
//!
//! ```text
//! DynamicFit  count reaches the batch-stats capacity for the group's
//!             per-stream maxima; a sample that pushes the count past the
//!             capacity goes back to the window and opens the next group
//! WordBudget  first-stream tokens of the group exceed the budget
//! FixedCount  count equals the mini-batch size
//! ```
//!
//! Whatever is left when the window runs dry becomes one last, possibly
//! small, batch. With a mean-normalized loss the samples of such a batch
//! weigh more than those of a full batch; they are not carried over into the
//! next window.

use crate::corpus::Corpus;
use crate::generator::BatchGeneratorConfig;
use crate::maxi_batch::{MaxiBatch, Queued};
use crate::sample::Sample;
use crate::stats::{BatchStats, StatsCursor};
use anyhow::{Context, Result};
use std::collections::VecDeque;
use tracing::warn;

/// How the slicer decides that a mini-batch is complete.
#[derive(Debug, Clone, Copy)]
pub enum BatchPolicy<'a> {
    DynamicFit(&'a BatchStats),
    WordBudget(usize),
    FixedCount(usize),
}

impl<'a> BatchPolicy<'a> {
    /// Picks the policy in precedence order: dynamic fit (needs a non-empty
    /// `stats`), then word budget, then fixed count.
    pub fn select(config: &BatchGeneratorConfig, stats: Option<&'a BatchStats>) -> Self {
        match stats {
            Some(stats) if config.mini_batch_fit && !stats.is_empty() => Self::DynamicFit(stats),
            _ if config.mini_batch_words > 0 => Self::WordBudget(config.mini_batch_words),
            _ => Self::FixedCount(config.mini_batch),
        }
    }
}

/// The group being filled, with the trackers its policy needs.
struct Group<'a> {
    policy: BatchPolicy<'a>,
    items: Vec<Queued>,
    words: usize,
    lengths: Vec<usize>,
    cursor: StatsCursor,
    /// An uncovered-lengths warning was logged for this group
    warned: bool,
}

impl<'a> Group<'a> {
    fn new(policy: BatchPolicy<'a>, sets: usize) -> Self {
        Self {
            policy,
            items: Vec::new(),
            words: 0,
            lengths: vec![0; sets],
            cursor: StatsCursor::default(),
            warned: false,
        }
    }

    /// Appends a sample and reports whether the group is complete. Under
    /// dynamic fit the sample may be handed back to `window` instead.
    ///
    /// # Panics
    /// If the batch-stats lookup from the cached cursor and a lookup from
    /// `lower_bound` disagree.
    fn push(&mut self, queued: Queued, window: &mut MaxiBatch) -> bool {
        match self.policy {
            BatchPolicy::DynamicFit(stats) => {
                for (max, len) in self.lengths.iter_mut().zip(queued.sample.lengths()) {
                    *max = (*max).max(len);
                }
                self.items.push(queued);

                let capacity = stats.find_batch_size(&self.lengths, &mut self.cursor);
                if self.cursor == stats.end() && !self.warned {
                    warn!(
                        "[data] no batch size recorded for lengths {:?}, using a batch of 1",
                        self.lengths
                    );
                    self.warned = true;
                }
                let mut fresh = stats.lower_bound(&self.lengths);
                assert_eq!(
                    capacity,
                    stats.find_batch_size(&self.lengths, &mut fresh),
                    "batch-stats lookup from the cached position disagrees with a fresh lookup for lengths {:?}",
                    self.lengths
                );

                let complete = self.items.len() >= capacity;
                // The last sample raised the maxima enough to shrink the
                // capacity below the count: it opens the next group instead.
                if self.items.len() > capacity {
                    if let Some(bumped) = self.items.pop() {
                        window.requeue(bumped);
                    }
                }
                complete
            }
            BatchPolicy::WordBudget(budget) => {
                self.words += queued.sample.streams.first().map_or(0, Vec::len);
                self.items.push(queued);
                self.words > budget
            }
            BatchPolicy::FixedCount(size) => {
                self.items.push(queued);
                self.items.len() >= size
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn take(&mut self) -> Vec<Sample> {
        self.words = 0;
        self.lengths.fill(0);
        self.cursor = StatsCursor::default();
        self.warned = false;
        self.items.drain(..).map(|q| q.sample).collect()
    }
}

/// Slices `window` into batches built by `corpus`, in window order.
pub fn slice_window<C: Corpus>(
    mut window: MaxiBatch,
    policy: BatchPolicy<'_>,
    corpus: &C,
) -> Result<VecDeque<C::Batch>> {
    let mut group = Group::new(policy, window.sets());
    let mut batches = VecDeque::new();

    while let Some(queued) = window.pop() {
        if group.push(queued, &mut window) {
            batches.push_back(build(corpus, group.take())?);
        }
    }

    if !group.is_empty() {
        batches.push_back(build(corpus, group.take())?);
    }

    Ok(batches)
}

fn build<C: Corpus>(corpus: &C, samples: Vec<Sample>) -> Result<C::Batch> {
    let size = samples.len();
    corpus
        .to_batch(samples)
        .with_context(|| format!("Failed to build a batch of {} samples", size))
}
