//! Store traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g.
//! `puzzler-store-sqlite`). The pipeline jobs depend on this abstraction, not
//! on any concrete backend. One backend usually implements all four traits
//! over the same [`Store::Error`].

use std::{collections::HashSet, future::Future};

use uuid::Uuid;

use crate::{
  blocklist::{Blocklist, BlocklistRevision},
  candidate::{Candidate, ReviewPolicy},
  curriculum::{Generation, PoolEntry, PuzzlePath},
  puzzle::Puzzle,
  vote::VoteTally,
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors a backend may return. Only transient failures (a busy or locked
/// database, a dropped connection) are worth retrying.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn is_transient(&self) -> bool;
}

/// Common root of the store traits.
pub trait Store: Send + Sync {
  type Error: StoreError;
}

// ─── Query and result types ──────────────────────────────────────────────────

/// Result of an unordered bulk insert. Records hitting a unique constraint
/// are skipped, not failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
  pub inserted:   usize,
  pub duplicates: usize,
}

impl InsertOutcome {
  pub fn absorb(&mut self, other: InsertOutcome) {
    self.inserted += other.inserted;
    self.duplicates += other.duplicates;
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateCounts {
  pub total:    usize,
  pub reviewed: usize,
}

/// Keyset page over served puzzles, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct PuzzlePage {
  /// Only ids strictly greater than this.
  pub after:         Option<String>,
  pub limit:         usize,
  /// Restrict to puzzles with zero plays.
  pub unplayed_only: bool,
}

/// A new vote score for one puzzle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteUpdate {
  pub id:    String,
  pub tally: VoteTally,
}

/// Player enrichment for one puzzle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerUpdate {
  pub id:         String,
  pub players:    Vec<String>,
  /// Merged into the existing themes as a set union.
  pub add_themes: Vec<String>,
}

/// Filter for [`PathStore::list_paths`].
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
  pub tier:  Option<String>,
  /// `Some(None)` selects the theme-less catalog.
  pub theme: Option<Option<String>>,
}

/// The live generation with its path count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationInfo {
  pub generation: Generation,
  pub path_count: usize,
}

// ─── Build store ─────────────────────────────────────────────────────────────

/// Candidates produced by the generator, awaiting ingestion.
pub trait BuildStore: Store {
  /// Insert candidates; duplicates by id, source game, or (fen, first move)
  /// are skipped.
  fn insert_candidates(
    &self,
    candidates: Vec<Candidate>,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  fn get_candidate(
    &self,
    id: String,
  ) -> impl Future<Output = Result<Option<Candidate>, Self::Error>> + Send + '_;

  /// Record a review verdict. Returns `false` if the candidate is unknown.
  fn set_review(
    &self,
    id: String,
    approved: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// One page of ingestion-eligible candidates ordered by id: not
  /// blocklisted, admitted by `policy`, and with at least two moves.
  fn eligible_candidates(
    &self,
    policy: ReviewPolicy,
    after: Option<String>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Candidate>, Self::Error>> + Send + '_;

  /// Delete candidates by id; returns how many existed.
  fn delete_candidates(
    &self,
    ids: Vec<String>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn candidate_counts(
    &self,
  ) -> impl Future<Output = Result<CandidateCounts, Self::Error>> + Send + '_;
}

// ─── Serving store ───────────────────────────────────────────────────────────

/// Puzzles served to learners.
pub trait ServingStore: Store {
  /// Which of `source_game_ids` already back a served puzzle.
  fn existing_source_games(
    &self,
    source_game_ids: Vec<String>,
  ) -> impl Future<Output = Result<HashSet<String>, Self::Error>> + Send + '_;

  /// Unordered bulk insert; unique-constraint violations are skipped.
  fn insert_puzzles(
    &self,
    puzzles: Vec<Puzzle>,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  fn get_puzzle(
    &self,
    id: String,
  ) -> impl Future<Output = Result<Option<Puzzle>, Self::Error>> + Send + '_;

  fn puzzles_page(
    &self,
    page: PuzzlePage,
  ) -> impl Future<Output = Result<Vec<Puzzle>, Self::Error>> + Send + '_;

  /// Returns the number of puzzles updated.
  fn update_votes(
    &self,
    updates: Vec<VoteUpdate>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Returns the number of puzzles updated.
  fn apply_player_updates(
    &self,
    updates: Vec<PlayerUpdate>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Puzzles with a vote above `reject_threshold`, optionally restricted to
  /// those tagged with `theme`.
  fn accepted_pool(
    &self,
    reject_threshold: i32,
    theme: Option<String>,
  ) -> impl Future<Output = Result<Vec<PoolEntry>, Self::Error>> + Send + '_;

  /// Delete puzzles by id; returns how many existed.
  fn delete_puzzles(
    &self,
    ids: Vec<String>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn puzzle_count(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

// ─── Blocklist store ─────────────────────────────────────────────────────────

pub trait BlocklistStore: Store {
  /// Replace the persisted set with `blocklist` and append `revision` to the
  /// history, atomically.
  fn replace_blocklist(
    &self,
    blocklist: Blocklist,
    revision: BlocklistRevision,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn blocklist(&self) -> impl Future<Output = Result<Blocklist, Self::Error>> + Send + '_;

  /// Revision history, newest first.
  fn blocklist_revisions(
    &self,
  ) -> impl Future<Output = Result<Vec<BlocklistRevision>, Self::Error>> + Send + '_;
}

// ─── Path store ──────────────────────────────────────────────────────────────

/// Curriculum paths. Readers only ever see the live generation.
pub trait PathStore: Store {
  /// Append `paths` to the staging area under `generation` and return the
  /// number staged for it so far. Leftovers of other generations that never
  /// went live are discarded.
  fn stage_paths(
    &self,
    generation: Generation,
    paths: Vec<PuzzlePath>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Atomically replace the live catalog with a staged generation. Returns
  /// the number of live paths afterwards.
  fn publish_generation(
    &self,
    generation_id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn list_paths(
    &self,
    filter: PathFilter,
  ) -> impl Future<Output = Result<Vec<PuzzlePath>, Self::Error>> + Send + '_;

  /// The generation currently live, if any.
  fn live_generation(
    &self,
  ) -> impl Future<Output = Result<Option<GenerationInfo>, Self::Error>> + Send + '_;
}
