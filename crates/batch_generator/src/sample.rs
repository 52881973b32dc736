use anyhow::{anyhow, Result};

/// Token id type used by every stream of a [`Sample`].
pub type Word = u32;

/// The `Sample` struct represents a single training example.
///
/// A sample is an ordered tuple of parallel token streams, for example
/// `(source, target)` for translation or `(source, context, target)` for
/// multi-source models. Every sample read from one corpus has the same number
/// of streams (its arity), while the length of each stream varies.
///
/// Internally:
/// - `id`: position of the sample in the corpus' natural (unshuffled) order
/// - `streams`: one `Vec<Word>` per stream
///
/// # Examples:
/// - A translation pair: `streams = [[12, 7, 0], [33, 9, 41, 0]]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub id: usize,
    pub streams: Vec<Vec<Word>>,
}

impl Sample {
    /// Creates a new `Sample` from its streams.
    pub fn new(id: usize, streams: Vec<Vec<Word>>) -> Self {
        Self { id, streams }
    }

    /// Creates a `Sample` with a single stream.
    ///
    /// Chain with [`with_stream`](Self::with_stream) to add more streams.
    pub fn from_single(id: usize, stream: Vec<Word>) -> Self {
        Self {
            id,
            streams: vec![stream],
        }
    }

    /// Appends a stream and returns the modified sample.
    pub fn with_stream(mut self, stream: Vec<Word>) -> Self {
        self.streams.push(stream);
        self
    }

    /// Number of streams (arity) of this sample.
    pub fn size(&self) -> usize {
        self.streams.len()
    }

    /// Returns the tokens of stream `index`.
    pub fn stream(&self, index: usize) -> Result<&[Word]> {
        self.streams
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| anyhow!("Stream {} not found in sample {}", index, self.id))
    }

    /// Per-stream lengths, in stream order.
    pub fn lengths(&self) -> Vec<usize> {
        self.streams.iter().map(Vec::len).collect()
    }
}
