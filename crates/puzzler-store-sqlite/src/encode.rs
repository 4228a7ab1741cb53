//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, UUIDs as hyphenated lowercase
//! strings, and list-valued fields (moves, themes, players, path ids) as
//! compact JSON arrays.

use chrono::{DateTime, Utc};
use puzzler_core::{
  blocklist::BlocklistRevision,
  candidate::{Candidate, Generator, Review},
  curriculum::{ANY_THEME, Generation, PuzzlePath},
  puzzle::Puzzle,
  rating::Rating,
  store::GenerationInfo,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── String lists ────────────────────────────────────────────────────────────

pub fn encode_list(items: &[String]) -> Result<String> { Ok(serde_json::to_string(items)?) }

pub fn decode_list(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Review ──────────────────────────────────────────────────────────────────

pub fn encode_review(review: Option<Review>) -> Option<bool> { review.map(|r| r.approved) }

pub fn decode_review(approved: Option<bool>) -> Option<Review> {
  approved.map(|approved| Review { approved })
}

// ─── Theme ───────────────────────────────────────────────────────────────────

pub fn encode_theme(theme: Option<&str>) -> String { theme.unwrap_or(ANY_THEME).to_owned() }

pub fn decode_theme(s: String) -> Option<String> { (s != ANY_THEME).then_some(s) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `candidates` row.
pub struct RawCandidate {
  pub id:                String,
  pub source_game_id:    String,
  pub fen:               String,
  pub moves:             String,
  pub generator_tier:    i32,
  pub generator_version: i32,
  pub eval_signal:       i64,
  pub review_approved:   Option<bool>,
}

pub const CANDIDATE_COLUMNS: &str = "id, source_game_id, fen, moves, generator_tier, \
                                     generator_version, eval_signal, review_approved";

impl RawCandidate {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      source_game_id:    row.get(1)?,
      fen:               row.get(2)?,
      moves:             row.get(3)?,
      generator_tier:    row.get(4)?,
      generator_version: row.get(5)?,
      eval_signal:       row.get(6)?,
      review_approved:   row.get(7)?,
    })
  }

  pub fn into_candidate(self) -> Result<Candidate> {
    Ok(Candidate {
      id:             self.id,
      source_game_id: self.source_game_id,
      fen:            self.fen,
      moves:          decode_list(&self.moves)?,
      generator:      Generator {
        tier:    self.generator_tier,
        version: self.generator_version,
      },
      eval_signal:    self.eval_signal,
      review:         decode_review(self.review_approved),
    })
  }
}

/// Raw values read directly from a `puzzles` row.
pub struct RawPuzzle {
  pub id:             String,
  pub source_game_id: String,
  pub fen:            String,
  pub line:           String,
  pub themes:         String,
  pub rating_r:       f64,
  pub rating_d:       f64,
  pub rating_v:       f64,
  pub vote_score:     i32,
  pub vote_up:        u32,
  pub vote_down:      u32,
  pub plays:          u32,
  pub eval_signal:    Option<i64>,
  pub players:        Option<String>,
}

pub const PUZZLE_COLUMNS: &str = "id, source_game_id, fen, line, themes, rating_r, rating_d, \
                                  rating_v, vote_score, vote_up, vote_down, plays, \
                                  eval_signal, players";

impl RawPuzzle {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      source_game_id: row.get(1)?,
      fen:            row.get(2)?,
      line:           row.get(3)?,
      themes:         row.get(4)?,
      rating_r:       row.get(5)?,
      rating_d:       row.get(6)?,
      rating_v:       row.get(7)?,
      vote_score:     row.get(8)?,
      vote_up:        row.get(9)?,
      vote_down:      row.get(10)?,
      plays:          row.get(11)?,
      eval_signal:    row.get(12)?,
      players:        row.get(13)?,
    })
  }

  pub fn into_puzzle(self) -> Result<Puzzle> {
    Ok(Puzzle {
      id:             self.id,
      source_game_id: self.source_game_id,
      fen:            self.fen,
      line:           self.line,
      themes:         decode_list(&self.themes)?,
      rating:         Rating { r: self.rating_r, d: self.rating_d, v: self.rating_v },
      vote_score:     self.vote_score,
      vote_up:        self.vote_up,
      vote_down:      self.vote_down,
      plays:          self.plays,
      eval_signal:    self.eval_signal,
      players:        self.players.as_deref().map(decode_list).transpose()?,
    })
  }
}

/// Raw values read directly from a `paths` row.
pub struct RawPath {
  pub path_id:       String,
  pub generation_id: String,
  pub tier:          String,
  pub theme:         String,
  pub rating_min:    f64,
  pub rating_max:    f64,
  pub puzzle_ids:    String,
  pub length:        i64,
}

pub const PATH_COLUMNS: &str =
  "path_id, generation_id, tier, theme, rating_min, rating_max, puzzle_ids, length";

impl RawPath {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      path_id:       row.get(0)?,
      generation_id: row.get(1)?,
      tier:          row.get(2)?,
      theme:         row.get(3)?,
      rating_min:    row.get(4)?,
      rating_max:    row.get(5)?,
      puzzle_ids:    row.get(6)?,
      length:        row.get(7)?,
    })
  }

  pub fn into_path(self) -> Result<PuzzlePath> {
    Ok(PuzzlePath {
      id:         self.path_id,
      tier:       self.tier,
      theme:      decode_theme(self.theme),
      rating_min: self.rating_min,
      rating_max: self.rating_max,
      puzzle_ids: decode_list(&self.puzzle_ids)?,
      length:     self.length as usize,
      generation: decode_uuid(&self.generation_id)?,
    })
  }
}

/// Raw values read directly from a `blocklist_revisions` row.
pub struct RawRevision {
  pub revision_id: String,
  pub loaded_at:   String,
  pub source:      String,
  pub digest:      String,
  pub size:        i64,
  pub added:       i64,
  pub removed:     i64,
}

impl RawRevision {
  pub fn into_revision(self) -> Result<BlocklistRevision> {
    Ok(BlocklistRevision {
      revision_id: decode_uuid(&self.revision_id)?,
      loaded_at:   decode_dt(&self.loaded_at)?,
      source:      self.source,
      digest:      self.digest,
      size:        self.size as usize,
      added:       self.added as usize,
      removed:     self.removed as usize,
    })
  }
}

/// Raw values read directly from a `path_generations` row.
pub struct RawGeneration {
  pub generation_id: String,
  pub created_at:    String,
  pub path_count:    i64,
}

impl RawGeneration {
  pub fn into_info(self) -> Result<GenerationInfo> {
    Ok(GenerationInfo {
      generation: Generation {
        id:         decode_uuid(&self.generation_id)?,
        created_at: decode_dt(&self.created_at)?,
      },
      path_count: self.path_count as usize,
    })
  }
}
