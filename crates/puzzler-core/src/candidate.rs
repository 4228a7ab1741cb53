//! Candidate records: raw generator output held in the build store.
//!
//! A candidate becomes a served puzzle once it has at least [`MIN_MOVES`]
//! moves, is admitted by the configured [`ReviewPolicy`], and the dedup
//! ingestor finds no existing puzzle for its source game.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

/// Reserved evaluation signal: a forced mate-in-one existed but a longer or
/// alternate mate line was selected instead.
pub const SENTINEL_FORCED_MATE: i64 = 999_999_999;

/// Minimum move count for a playable puzzle: the solver's move plus at least
/// the opponent's reply.
pub const MIN_MOVES: usize = 2;

// ─── Generator metadata ──────────────────────────────────────────────────────

/// How the candidate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generator {
  /// Search effort tier; higher means more trustworthy.
  pub tier:    i32,
  pub version: i32,
}

// ─── Review ──────────────────────────────────────────────────────────────────

/// Verdict recorded by the interactive review tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
  pub approved: bool,
}

/// Which review states admit a candidate into ingestion.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewPolicy {
  /// Approved or not yet reviewed.
  #[default]
  NotRejected,
  /// Explicitly approved only.
  Approved,
}

// ─── Candidate ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
  pub id:             String,
  pub source_game_id: String,
  pub fen:            String,
  /// UCI moves; the first one is the move that leads into the puzzle.
  pub moves:          Vec<String>,
  pub generator:      Generator,
  /// Centipawn evaluation, or [`SENTINEL_FORCED_MATE`].
  pub eval_signal:    i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub review:         Option<Review>,
}

impl Candidate {
  pub fn first_move(&self) -> Option<&str> { self.moves.first().map(String::as_str) }

  /// Reject records that cannot be stored at all.
  pub fn validate(&self) -> Result<()> {
    if self.moves.is_empty() {
      return Err(Error::EmptyMoveList(self.id.clone()));
    }
    Ok(())
  }

  /// The move line in its served form: moves joined by single spaces.
  pub fn line(&self) -> String { self.moves.join(" ") }
}
