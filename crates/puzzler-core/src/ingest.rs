//! Pure pieces of dedup ingestion: batch accumulation and the mapping from a
//! batch of candidates to the puzzles that are actually new.

use std::collections::HashSet;

use crate::{candidate::Candidate, puzzle::Puzzle};

/// Default number of candidates per ingestion batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

// ─── Batcher ─────────────────────────────────────────────────────────────────

/// Fixed-size accumulator. Hands back a full batch as soon as it reaches its
/// size; [`Batcher::finish`] flushes whatever is left.
#[derive(Debug)]
pub struct Batcher<T> {
  size: usize,
  buf:  Vec<T>,
}

impl<T> Batcher<T> {
  /// A batch size of zero is treated as one.
  pub fn new(size: usize) -> Self {
    let size = size.max(1);
    Self { size, buf: Vec::with_capacity(size) }
  }

  pub fn push(&mut self, item: T) -> Option<Vec<T>> {
    self.buf.push(item);
    (self.buf.len() >= self.size)
      .then(|| std::mem::replace(&mut self.buf, Vec::with_capacity(self.size)))
  }

  /// The final partial batch, if any.
  pub fn finish(self) -> Option<Vec<T>> { (!self.buf.is_empty()).then_some(self.buf) }
}

// ─── Batch planning ──────────────────────────────────────────────────────────

/// Candidates of `batch` whose source game is not in `existing`, mapped to
/// their served shape.
pub fn new_puzzles(batch: &[Candidate], existing: &HashSet<String>) -> Vec<Puzzle> {
  batch
    .iter()
    .filter(|c| !existing.contains(&c.source_game_id))
    .map(Puzzle::from_candidate)
    .collect()
}
