#![allow(dead_code)]

use anyhow::Result;
use batch_generator::{
    corpus::{Corpus, InMemoryCorpus},
    generator::BatchGenerator,
    sample::Word,
};

/// Single-stream corpus whose sample `i` has `lengths[i]` tokens.
pub fn corpus_from_lengths(lengths: &[usize], seed: u64) -> InMemoryCorpus {
    InMemoryCorpus::from_streams(
        lengths
            .iter()
            .enumerate()
            .map(|(i, &len)| vec![vec![i as Word + 1; len]])
            .collect(),
        seed,
    )
}

/// Source/target corpus with pseudo-random lengths in `1..=max_len`.
pub fn parallel_corpus(n: usize, max_len: usize, seed: u64) -> InMemoryCorpus {
    InMemoryCorpus::from_streams(
        (0..n)
            .map(|i| {
                let src = (i * 7 + 3) % max_len + 1;
                let trg = (i * 13 + 5) % max_len + 1;
                vec![vec![1; src], vec![2; trg]]
            })
            .collect(),
        seed,
    )
}

/// Reads the rest of the epoch, returning each batch's sentence ids.
pub fn drain_epoch<C>(generator: &mut BatchGenerator<C>) -> Result<Vec<Vec<usize>>>
where
    C: Corpus<Batch = batch_generator::CorpusBatch>,
{
    let mut batches = Vec::new();
    for batch in generator.iter() {
        batches.push(batch?.sentence_ids().to_vec());
    }
    Ok(batches)
}

/// Installs a test subscriber so `RUST_LOG=debug` shows generator logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
