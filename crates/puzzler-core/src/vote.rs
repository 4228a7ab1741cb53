//! Heuristic initial vote from generator metadata.
//!
//! The table is shared by ingestion and the re-scoring job; both must agree
//! on it exactly, including the order of the clauses.

use crate::candidate::SENTINEL_FORCED_MATE;

/// Initial quality score for a candidate.
///
/// Clauses are evaluated top to bottom and the first match wins.
pub fn score(generator_tier: i32, eval_signal: i64) -> i32 {
  if generator_tier < 24 && eval_signal == SENTINEL_FORCED_MATE {
    // mate in one was available and a longer line was picked
    -15
  } else if generator_tier < 13 {
    -10
  } else if generator_tier < 22 {
    -5
  } else if generator_tier < 31 {
    1
  } else {
    2
  }
}

/// Vote-up / vote-down seed counters matching a score, so that
/// `up - down == score` before any crowd vote is cast.
pub fn seeds(score: i32) -> (u32, u32) {
  if score >= 0 {
    (score.unsigned_abs(), 0)
  } else {
    (0, score.unsigned_abs())
  }
}

/// A vote score together with its seed counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTally {
  pub score: i32,
  pub up:    u32,
  pub down:  u32,
}

impl VoteTally {
  pub fn seeded(score: i32) -> Self {
    let (up, down) = seeds(score);
    Self { score, up, down }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const EVAL: i64 = 250;

  #[test]
  fn boundary_12_13() {
    assert_eq!(score(12, EVAL), -10);
    assert_eq!(score(13, EVAL), -5);
  }

  #[test]
  fn boundary_21_22() {
    assert_eq!(score(21, EVAL), -5);
    assert_eq!(score(22, EVAL), 1);
  }

  #[test]
  fn boundary_23_24_with_and_without_sentinel() {
    assert_eq!(score(23, EVAL), 1);
    assert_eq!(score(24, EVAL), 1);
    assert_eq!(score(23, SENTINEL_FORCED_MATE), -15);
    assert_eq!(score(24, SENTINEL_FORCED_MATE), 1);
  }

  #[test]
  fn boundary_30_31() {
    assert_eq!(score(30, EVAL), 1);
    assert_eq!(score(31, EVAL), 2);
    assert_eq!(score(31, SENTINEL_FORCED_MATE), 2);
  }

  #[test]
  fn sentinel_clause_wins_over_low_tier() {
    // Both clause 1 and clause 2 match; clause 1 comes first.
    assert_eq!(score(5, SENTINEL_FORCED_MATE), -15);
    assert_eq!(score(12, SENTINEL_FORCED_MATE), -15);
  }

  #[test]
  fn seeds_balance_to_the_score() {
    assert_eq!(seeds(2), (2, 0));
    assert_eq!(seeds(0), (0, 0));
    assert_eq!(seeds(-15), (0, 15));

    let tally = VoteTally::seeded(-5);
    assert_eq!(tally.up as i64 - tally.down as i64, -5);
  }
}
