//! src/generator/mod.rs
//!
//! This module implements the `BatchGenerator`.
//!
//! The `BatchGenerator` reads a `Corpus` window by window, sorts each window by
//! length, cuts it into mini-batches and hands them out one at a time. The next
//! window is prepared on a background thread while the current one is consumed.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌─────────┐
//!                    │ Corpus  │ (ordered, restartable samples)
//!                    └────┬────┘
//!                         │ up to mini_batch * maxi_batch samples
//!                         ↓
//!                  ┌──────────────┐
//!                  │  MaxiBatch   │ (src / trg / none ordering)
//!                  └──────┬───────┘
//!                         │ shortest first
//!                         ↓
//!                  ┌──────────────┐
//!                  │    Slicer    │ ←───── BatchStats (optional, dynamic fit)
//!                  └──────┬───────┘
//!                         │ mini-batches of one window
//!                         ↓
//!                  ┌──────────────┐
//!                  │   Shuffler   │ (batch order only, seeded)
//!                  └──────┬───────┘
//!                         │ runs on the `batch-prefetch` thread
//!                         ↓
//!                 ┌────────────────┐
//!                 │ BatchGenerator │ ←───── Config (sizes, sort, seed)
//!                 └───────┬────────┘
//!                         │ next() / iter()
//!                         ↓
//!                   [Training loop]
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/generator/
//! ├── mod.rs               # Public API exports + module-level architecture docs
//! ├── config.rs            # BatchGeneratorConfig, builder, and validation
//! ├── batch_generator.rs   # BatchGenerator: next, prepare, restore, hooks
//! ├── iterator.rs          # BatchIter
//! ├── fetch.rs             # Fetcher: one sort -> slice -> shuffle cycle
//! └── prefetch.rs          # Single-slot PrefetchWorker<Task, Output>
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! let corpus = InMemoryCorpus::from_streams(tokenized, seed);
//! let config = BatchGeneratorConfig::builder()
//!     .mini_batch(64)
//!     .maxi_batch(100)
//!     .maxi_batch_sort(MaxiBatchSort::Trg)
//!     .seed(seed)
//!     .build();
//!
//! let mut generator = BatchGenerator::new(corpus, config, None)?;
//! let mut state = TrainingState::default();
//! generator.restore(&state, true)?;
//!
//! loop {
//!     generator.prepare(true)?;
//!     for batch in generator.iter() {
//!         let batch = batch?;
//!         // ... train on batch ...
//!         state.new_batch();
//!     }
//!     generator.act_after_epoch(&mut state);
//!     state.new_epoch();
//! }
//! ```

mod batch_generator;
mod config;
mod fetch;
mod iterator;
mod prefetch;

pub use batch_generator::BatchGenerator;
pub use config::{BatchGeneratorConfig, BatchGeneratorConfigBuilder};
pub use iterator::BatchIter;
