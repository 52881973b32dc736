//! End-to-end tests for BatchGenerator.
//!
//! Tests cover:
//! - Arrival order and length sorting on a tiny corpus
//! - Every sample delivered exactly once, for all sort policies and shuffling
//! - Fixed-count, word-budget and dynamic-fit batch sizes
//! - Windows smaller than the corpus resume after the last consumed sample
//! - Seeded batch shuffling is reproducible

mod common;
use common::{corpus_from_lengths, drain_epoch, init_tracing, parallel_corpus};

use anyhow::Result;
use batch_generator::{
    generator::{BatchGenerator, BatchGeneratorConfig},
    maxi_batch::MaxiBatchSort,
    stats::BatchStats,
    Batch,
};
use std::sync::Arc;

const POLICIES: [MaxiBatchSort; 3] = [MaxiBatchSort::None, MaxiBatchSort::Src, MaxiBatchSort::Trg];

// ============================================================================
// Small Corpus
// ============================================================================

#[test]
fn test_unsorted_window_keeps_arrival_order() -> Result<()> {
    let config = BatchGeneratorConfig::builder()
        .mini_batch(2)
        .maxi_batch(3)
        .maxi_batch_sort(MaxiBatchSort::None)
        .build();
    let mut generator = BatchGenerator::new(corpus_from_lengths(&[3, 1, 4, 1, 5], 0), config, None)?;

    generator.prepare(false)?;
    let mut sizes = Vec::new();
    let mut ids = Vec::new();
    while let Some(batch) = generator.next()? {
        sizes.push(batch.size());
        ids.extend_from_slice(batch.sentence_ids());
    }

    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    Ok(())
}

#[test]
fn test_src_sorted_window_pairs_similar_lengths() -> Result<()> {
    let lengths = [3, 1, 4, 1, 5];
    let config = BatchGeneratorConfig::builder()
        .mini_batch(2)
        .maxi_batch(3)
        .maxi_batch_sort(MaxiBatchSort::Src)
        .build();
    let mut generator = BatchGenerator::new(corpus_from_lengths(&lengths, 0), config, None)?;

    generator.prepare(false)?;
    let batch_lengths: Vec<Vec<usize>> = drain_epoch(&mut generator)?
        .iter()
        .map(|ids| ids.iter().map(|&id| lengths[id]).collect())
        .collect();

    assert_eq!(batch_lengths, vec![vec![1, 1], vec![3, 4], vec![5]]);
    Ok(())
}

// ============================================================================
// Coverage
// ============================================================================

#[test]
fn test_every_sample_exactly_once() -> Result<()> {
    init_tracing();

    for policy in POLICIES {
        for shuffle in [false, true] {
            let config = BatchGeneratorConfig::builder()
                .mini_batch(4)
                .maxi_batch(3)
                .maxi_batch_sort(policy)
                .seed(17)
                .build();
            let mut generator = BatchGenerator::new(parallel_corpus(101, 30, 5), config, None)?;

            for _ in 0..2 {
                generator.prepare(shuffle)?;
                let mut ids = drain_epoch(&mut generator)?.concat();
                ids.sort_unstable();
                assert_eq!(
                    ids,
                    (0..101).collect::<Vec<_>>(),
                    "policy={} shuffle={}",
                    policy,
                    shuffle
                );
            }
        }
    }
    Ok(())
}

#[test]
fn test_windows_resume_after_last_consumed_sample() -> Result<()> {
    let lengths: Vec<usize> = (0..23).map(|i| (i * 5) % 9 + 1).collect();
    let config = BatchGeneratorConfig::builder()
        .mini_batch(2)
        .maxi_batch(3)
        .maxi_batch_sort(MaxiBatchSort::Src)
        .build();
    let mut generator = BatchGenerator::new(corpus_from_lengths(&lengths, 0), config, None)?;

    generator.prepare(false)?;
    let ids = drain_epoch(&mut generator)?.concat();
    assert_eq!(ids.len(), 23);

    // Each window of 6 holds exactly the next 6 samples of the corpus.
    for (w, window) in ids.chunks(6).enumerate() {
        let mut window = window.to_vec();
        window.sort_unstable();
        let start = w * 6;
        assert_eq!(window, (start..(start + 6).min(23)).collect::<Vec<_>>());
    }
    Ok(())
}

// ============================================================================
// Batch Sizing Policies
// ============================================================================

#[test]
fn test_fixed_count_sizes() -> Result<()> {
    let config = BatchGeneratorConfig::builder()
        .mini_batch(5)
        .maxi_batch(4)
        .maxi_batch_sort(MaxiBatchSort::Trg)
        .build();
    let mut generator = BatchGenerator::new(parallel_corpus(47, 20, 0), config, None)?;

    generator.prepare(false)?;
    let sizes: Vec<usize> = drain_epoch(&mut generator)?.iter().map(Vec::len).collect();
    // windows of 20, 20 and 7 samples
    assert_eq!(sizes, vec![5, 5, 5, 5, 5, 5, 5, 5, 5, 2]);
    Ok(())
}

#[test]
fn test_word_budget_batches() -> Result<()> {
    let lengths: Vec<usize> = (0..60).map(|i| (i * 11) % 17 + 1).collect();
    let budget = 40;
    let config = BatchGeneratorConfig::builder()
        .mini_batch(10)
        .maxi_batch(3)
        .mini_batch_words(budget)
        .maxi_batch_sort(MaxiBatchSort::Src)
        .build();
    let mut generator = BatchGenerator::new(corpus_from_lengths(&lengths, 0), config, None)?;
    assert_eq!(generator.estimate_typical_trg_batch_words(), budget);

    generator.prepare(false)?;
    let mut seen = 0;
    while let Some(batch) = generator.next()? {
        let last = batch.sentence_ids().last().map_or(0, |&id| lengths[id]);
        assert_eq!(batch.words(0), batch.sentence_ids().iter().map(|&id| lengths[id]).sum::<usize>());
        assert!(batch.words(0) - last <= budget);
        seen += batch.size();
    }
    assert_eq!(seen, 60);
    Ok(())
}

#[test]
fn test_dynamic_fit_respects_capacity() -> Result<()> {
    let stats = Arc::new(BatchStats::from_entries([
        (vec![5, 5], 16),
        (vec![10, 10], 8),
        (vec![15, 20], 4),
        (vec![30, 30], 2),
    ]));
    let config = BatchGeneratorConfig::builder()
        .mini_batch(8)
        .maxi_batch(5)
        .mini_batch_fit(true)
        .maxi_batch_sort(MaxiBatchSort::Trg)
        .seed(3)
        .build();
    let mut generator = BatchGenerator::new(parallel_corpus(200, 30, 1), config, Some(stats.clone()))?;

    generator.prepare(true)?;
    let mut total = 0;
    while let Some(batch) = generator.next()? {
        let capacity = stats.find_batch_size(&batch.widths(), &mut stats.begin());
        assert!(
            batch.size() <= capacity,
            "batch of {} exceeds capacity {} at widths {:?}",
            batch.size(),
            capacity,
            batch.widths()
        );
        total += batch.size();
    }
    assert_eq!(total, 200);
    Ok(())
}

// ============================================================================
// Shuffling
// ============================================================================

#[test]
fn test_seeded_shuffle_is_reproducible() -> Result<()> {
    let run = |seed: u64| -> Result<Vec<Vec<usize>>> {
        let config = BatchGeneratorConfig::builder()
            .mini_batch(3)
            .maxi_batch(10)
            .maxi_batch_sort(MaxiBatchSort::Src)
            .seed(seed)
            .build();
        let mut generator = BatchGenerator::new(parallel_corpus(90, 25, 9), config, None)?;
        generator.prepare(true)?;
        drain_epoch(&mut generator)
    };

    assert_eq!(run(42)?, run(42)?);
    assert_ne!(run(42)?, run(43)?);
    Ok(())
}

#[test]
fn test_unshuffled_epochs_are_identical() -> Result<()> {
    let config = BatchGeneratorConfig::builder()
        .mini_batch(4)
        .maxi_batch(2)
        .maxi_batch_sort(MaxiBatchSort::Src)
        .build();
    let mut generator = BatchGenerator::new(parallel_corpus(30, 12, 0), config, None)?;

    generator.prepare(false)?;
    let first = drain_epoch(&mut generator)?;
    generator.prepare(false)?;
    assert_eq!(drain_epoch(&mut generator)?, first);
    Ok(())
}
