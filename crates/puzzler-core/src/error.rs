//! Error types for `puzzler-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("tier {name:?} has ratio {ratio}, expected a value in (0, 1]")]
  InvalidTier { name: String, ratio: f64 },

  #[error("invalid {what} bounds [{min}, {max}]")]
  InvalidBounds {
    what: &'static str,
    min:  usize,
    max:  usize,
  },

  #[error("candidate {0} has no moves")]
  EmptyMoveList(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
