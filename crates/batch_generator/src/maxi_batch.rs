//! The maxi-batch window: a bounded pool of samples read ahead from the
//! corpus and handed out shortest-first, so that consecutive mini-batches
//! hold samples of similar length and waste little padding.
//!
//! # Sort policies
//! ```text
//! src   per-stream lengths compared lexicographically, first stream first
//! trg   per-stream lengths compared lexicographically, last stream first
//! none  arrival order (the window behaves as a FIFO)
//! ```
//! Length ties are broken by arrival order, so every policy is a total order
//! and a window always pops in the same sequence for the same input.

use crate::corpus::Corpus;
use crate::sample::Sample;
use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

/// How samples are ordered inside a maxi-batch window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxiBatchSort {
    Src,
    Trg,
    #[default]
    None,
}

impl MaxiBatchSort {
    fn order(self, a: &Queued, b: &Queued) -> Ordering {
        match self {
            Self::Src => by_source_length(&a.sample, &b.sample).then_with(|| by_arrival(a, b)),
            Self::Trg => by_target_length(&a.sample, &b.sample).then_with(|| by_arrival(a, b)),
            Self::None => by_arrival(a, b),
        }
    }
}

impl FromStr for MaxiBatchSort {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "src" => Ok(Self::Src),
            "trg" => Ok(Self::Trg),
            "none" => Ok(Self::None),
            other => bail!(
                "Unknown maxi-batch sort policy '{}', expected one of: src, trg, none",
                other
            ),
        }
    }
}

impl fmt::Display for MaxiBatchSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Src => "src",
            Self::Trg => "trg",
            Self::None => "none",
        })
    }
}

fn by_source_length(a: &Sample, b: &Sample) -> Ordering {
    a.streams.iter().map(Vec::len).cmp(b.streams.iter().map(Vec::len))
}

fn by_target_length(a: &Sample, b: &Sample) -> Ordering {
    a.streams
        .iter()
        .rev()
        .map(Vec::len)
        .cmp(b.streams.iter().rev().map(Vec::len))
}

fn by_arrival(a: &Queued, b: &Queued) -> Ordering {
    a.arrival.cmp(&b.arrival)
}

/// A sample waiting in the window, tagged with its arrival position.
#[derive(Debug)]
pub(crate) struct Queued {
    policy: MaxiBatchSort,
    arrival: usize,
    pub(crate) sample: Sample,
}

impl Ord for Queued {
    // Reversed: `BinaryHeap` pops its greatest element and the window must
    // pop the smallest.
    fn cmp(&self, other: &Self) -> Ordering {
        self.policy.order(other, self)
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

/// A filled maxi-batch window.
#[derive(Debug)]
pub struct MaxiBatch {
    policy: MaxiBatchSort,
    heap: BinaryHeap<Queued>,
    arrivals: usize,
    sets: usize,
}

impl MaxiBatch {
    pub fn new(policy: MaxiBatchSort) -> Self {
        Self {
            policy,
            heap: BinaryHeap::new(),
            arrivals: 0,
            sets: 0,
        }
    }

    /// Adds a sample; all samples of a window must have the same arity.
    pub fn push(&mut self, sample: Sample) -> Result<()> {
        if self.arrivals == 0 {
            self.sets = sample.size();
        }
        ensure!(
            sample.size() == self.sets,
            "Sample {} has {} streams, but the corpus started with {}",
            sample.id,
            sample.size(),
            self.sets
        );
        self.heap.push(Queued {
            policy: self.policy,
            arrival: self.arrivals,
            sample,
        });
        self.arrivals += 1;
        Ok(())
    }

    /// Removes the highest-priority (shortest or earliest) sample.
    pub(crate) fn pop(&mut self) -> Option<Queued> {
        self.heap.pop()
    }

    /// Puts a popped sample back; it keeps its original priority.
    pub(crate) fn requeue(&mut self, queued: Queued) {
        self.heap.push(queued);
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of streams per sample (0 for a window that never received one).
    pub fn sets(&self) -> usize {
        self.sets
    }

    /// Drains the window in priority order.
    pub fn into_sorted_samples(mut self) -> Vec<Sample> {
        let mut samples = Vec::with_capacity(self.len());
        while let Some(queued) = self.pop() {
            samples.push(queued.sample);
        }
        samples
    }
}

/// Reads up to `max_size` samples from the corpus into a fresh window.
///
/// The corpus is never read past the sample that fills the window: the next
/// call resumes exactly at the following sample.
pub fn fill_window<C: Corpus>(
    corpus: &mut C,
    max_size: usize,
    policy: MaxiBatchSort,
) -> Result<MaxiBatch> {
    let mut window = MaxiBatch::new(policy);
    while window.len() < max_size {
        match corpus.next_sample()? {
            Some(sample) => window.push(sample)?,
            None => break,
        }
    }
    Ok(window)
}
