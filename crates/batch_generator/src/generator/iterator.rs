//! src/generator/iterator.rs
//!
//! `Iterator` adapter over [`BatchGenerator::next`].
//!
//! The iterator is fused: it stops for good after the end of the epoch or
//! after the first error, so a `for` loop never calls `next()` past the
//! epoch boundary.

use crate::corpus::Corpus;
use anyhow::Result;

use super::batch_generator::BatchGenerator;

/// Iterator over the remaining batches of the current epoch.
///
/// Created by calling `generator.iter()`.
pub struct BatchIter<'a, C: Corpus> {
    generator: &'a mut BatchGenerator<C>,
    finished: bool,
}

impl<'a, C: Corpus> BatchIter<'a, C> {
    pub(crate) fn new(generator: &'a mut BatchGenerator<C>) -> Self {
        Self {
            generator,
            finished: false,
        }
    }
}

impl<C: Corpus> Iterator for BatchIter<'_, C> {
    type Item = Result<C::Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.generator.next() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl<C: Corpus> std::iter::FusedIterator for BatchIter<'_, C> {}
