//! Served puzzle records: what the serving store holds and the curriculum
//! builder reads.

use serde::{Deserialize, Serialize};

use crate::{
  candidate::Candidate,
  rating::Rating,
  vote::{self, VoteTally},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
  pub id:             String,
  /// Unique among served puzzles.
  pub source_game_id: String,
  pub fen:            String,
  /// Space-joined move sequence.
  pub line:           String,
  pub themes:         Vec<String>,
  pub rating:         Rating,
  pub vote_score:     i32,
  pub vote_up:        u32,
  pub vote_down:      u32,
  pub plays:          u32,
  /// Raw evaluation signal carried through from the candidate for audit.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub eval_signal:    Option<i64>,
  /// Players of the source game, once enrichment has run.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub players:        Option<Vec<String>>,
}

impl Puzzle {
  /// Map an eligible candidate to its served shape: heuristic vote, rating
  /// prior, flattened move line, no themes, zero plays.
  pub fn from_candidate(candidate: &Candidate) -> Self {
    let tally = VoteTally::seeded(vote::score(
      candidate.generator.tier,
      candidate.eval_signal,
    ));
    Self {
      id:             candidate.id.clone(),
      source_game_id: candidate.source_game_id.clone(),
      fen:            candidate.fen.clone(),
      line:           candidate.line(),
      themes:         Vec::new(),
      rating:         Rating::initial(),
      vote_score:     tally.score,
      vote_up:        tally.up,
      vote_down:      tally.down,
      plays:          0,
      eval_signal:    Some(candidate.eval_signal),
      players:        None,
    }
  }

  /// First move of the line; together with the FEN it identifies a position
  /// reachable by transposition.
  pub fn first_move(&self) -> &str { self.line.split(' ').next().unwrap_or_default() }
}
