//! Glicko-2 style rating state.
//!
//! Only the prior lives here. Updates from solver outcomes happen elsewhere
//! and never pass through this pipeline.

use serde::{Deserialize, Serialize};

/// Rating, deviation, and volatility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
  pub r: f64,
  pub d: f64,
  pub v: f64,
}

impl Rating {
  /// The prior every puzzle starts from.
  pub const PRIOR: Rating = Rating { r: 1500.0, d: 500.0, v: 0.09 };

  /// Rating state for a puzzle entering the serving store.
  ///
  /// Called exactly once per puzzle, at ingestion time.
  pub fn initial() -> Self { Self::PRIOR }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn initial_is_the_prior() {
    let r = Rating::initial();
    assert_eq!(r.r, 1500.0);
    assert_eq!(r.d, 500.0);
    assert_eq!(r.v, 0.09);
  }
}
