pub mod batch;
pub mod corpus;
pub mod generator;
pub mod maxi_batch;
pub mod rng;
pub mod sample;
pub mod slicer;
pub mod state;
pub mod stats;

pub use batch::{Batch, CorpusBatch, SubBatch};
pub use corpus::{Corpus, InMemoryCorpus};
pub use generator::{BatchGenerator, BatchGeneratorConfig, BatchGeneratorConfigBuilder, BatchIter};
pub use maxi_batch::MaxiBatchSort;
pub use rng::RngEngine;
pub use sample::{Sample, Word};
pub use state::{TrainingObserver, TrainingState};
pub use stats::{BatchStats, StatsCursor};
