//! JSON-lines imports: generator output into the build store, and legacy
//! served records into the serving store.

use std::path::Path;

use puzzler_core::{
  candidate::{Candidate, Generator, Review},
  ingest::Batcher,
  puzzle::Puzzle,
  rating::Rating,
  store::{BuildStore, InsertOutcome, ServingStore},
  vote,
};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{info, warn};

use crate::{
  Error, Result,
  retry::{RetryPolicy, with_retry},
};

/// Length of generated puzzle ids.
pub const ID_LENGTH: usize = 5;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A random id over `[0-9a-zA-Z]`.
pub fn random_id<R: RngCore>(rng: &mut R) -> String {
  // Largest multiple of the alphabet size that fits in a byte.
  let limit = (u8::MAX as usize / ID_ALPHABET.len()) * ID_ALPHABET.len();
  let mut id = String::with_capacity(ID_LENGTH);
  while id.len() < ID_LENGTH {
    let mut byte = [0u8];
    rng.fill_bytes(&mut byte);
    let b = byte[0] as usize;
    if b < limit {
      id.push(ID_ALPHABET[b % ID_ALPHABET.len()] as char);
    }
  }
  id
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
  /// Non-blank lines read.
  pub read:       usize,
  /// Well-formed records that cannot be stored, e.g. without moves.
  pub invalid:    usize,
  pub inserted:   usize,
  pub duplicates: usize,
}

impl ImportReport {
  fn absorb(&mut self, outcome: InsertOutcome) {
    self.inserted += outcome.inserted;
    self.duplicates += outcome.duplicates;
  }
}

/// Parse `path` as JSON lines. Blank lines are skipped; a malformed line is
/// fatal and reported with its 1-based line number.
async fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
  let text = tokio::fs::read_to_string(path)
    .await
    .map_err(|e| Error::io(path, e))?;

  let mut records = Vec::new();
  for (index, line) in text.lines().enumerate() {
    if line.trim().is_empty() {
      continue;
    }
    let record = serde_json::from_str(line).map_err(|source| Error::Parse {
      path: path.to_path_buf(),
      line: index + 1,
      source,
    })?;
    records.push(record);
  }
  Ok(records)
}

// ─── Candidates ──────────────────────────────────────────────────────────────

/// Generator output as written to the import file; `id` may be absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateLine {
  #[serde(default, alias = "_id")]
  id:             Option<String>,
  #[serde(alias = "gameId")]
  source_game_id: String,
  fen:            String,
  moves:          Vec<String>,
  generator:      Generator,
  #[serde(alias = "cp")]
  eval_signal:    i64,
  #[serde(default)]
  review:         Option<Review>,
}

impl CandidateLine {
  fn into_candidate<R: RngCore>(self, rng: &mut R) -> Candidate {
    Candidate {
      id:             self.id.unwrap_or_else(|| random_id(rng)),
      source_game_id: self.source_game_id,
      fen:            self.fen,
      moves:          self.moves,
      generator:      self.generator,
      eval_signal:    self.eval_signal,
      review:         self.review,
    }
  }
}

/// Load generator output into the build store.
pub async fn import_candidates<S>(
  store: &S,
  path: &Path,
  batch_size: usize,
  retry: &RetryPolicy,
) -> Result<ImportReport>
where
  S: BuildStore,
{
  let lines: Vec<CandidateLine> = read_lines(path).await?;
  let mut report = ImportReport { read: lines.len(), ..ImportReport::default() };
  let mut batcher = Batcher::new(batch_size);
  let mut rng = OsRng;

  for line in lines {
    let candidate = line.into_candidate(&mut rng);
    if let Err(e) = candidate.validate() {
      warn!(error = %e, "skipping candidate");
      report.invalid += 1;
      continue;
    }
    if let Some(batch) = batcher.push(candidate) {
      let outcome =
        with_retry(retry, "insert candidates", || store.insert_candidates(batch.clone()))
          .await?;
      report.absorb(outcome);
    }
  }
  if let Some(batch) = batcher.finish() {
    let outcome =
      with_retry(retry, "insert candidates", || store.insert_candidates(batch.clone()))
        .await?;
    report.absorb(outcome);
  }

  info!(
    path = %path.display(),
    read = report.read,
    invalid = report.invalid,
    inserted = report.inserted,
    duplicates = report.duplicates,
    "candidates imported"
  );
  Ok(report)
}

// ─── Legacy puzzles ──────────────────────────────────────────────────────────

/// A served record in its legacy document shape.
#[derive(Debug, Deserialize)]
struct LegacyPuzzle {
  #[serde(rename = "_id", alias = "id")]
  id:      String,
  #[serde(rename = "gameId", alias = "sourceGameId")]
  game_id: String,
  fen:     String,
  line:    String,
  #[serde(default, alias = "tags")]
  themes:  Vec<String>,
  #[serde(default)]
  glicko:  Option<Rating>,
  #[serde(default)]
  vote:    f64,
  #[serde(default)]
  vu:      Option<u32>,
  #[serde(default)]
  vd:      Option<u32>,
  #[serde(default)]
  plays:   u32,
  #[serde(default, alias = "evalSignal")]
  cp:      Option<i64>,
  #[serde(default, alias = "users")]
  players: Option<Vec<String>>,
}

impl LegacyPuzzle {
  fn into_puzzle(self) -> Option<Puzzle> {
    let line = self.line.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.is_empty() {
      return None;
    }

    let vote_score = self.vote.round() as i32;
    let (vote_up, vote_down) = match (self.vu, self.vd) {
      (None, None) => vote::seeds(vote_score),
      (up, down) => (up.unwrap_or(0), down.unwrap_or(0)),
    };

    Some(Puzzle {
      id: self.id,
      source_game_id: self.game_id,
      fen: self.fen,
      line,
      themes: self.themes,
      rating: self.glicko.unwrap_or(Rating::PRIOR),
      vote_score,
      vote_up,
      vote_down,
      plays: self.plays,
      eval_signal: self.cp,
      players: self.players,
    })
  }
}

/// Normalise legacy served records and insert them with the tolerant bulk
/// insert.
pub async fn migrate_legacy<S>(
  store: &S,
  path: &Path,
  batch_size: usize,
  retry: &RetryPolicy,
) -> Result<ImportReport>
where
  S: ServingStore,
{
  let lines: Vec<LegacyPuzzle> = read_lines(path).await?;
  let mut report = ImportReport { read: lines.len(), ..ImportReport::default() };
  let mut batcher = Batcher::new(batch_size);

  for legacy in lines {
    let id = legacy.id.clone();
    let Some(puzzle) = legacy.into_puzzle() else {
      warn!(puzzle = %id, "skipping legacy puzzle without moves");
      report.invalid += 1;
      continue;
    };
    if let Some(batch) = batcher.push(puzzle) {
      let outcome =
        with_retry(retry, "insert puzzles", || store.insert_puzzles(batch.clone()))
          .await?;
      report.absorb(outcome);
    }
  }
  if let Some(batch) = batcher.finish() {
    let outcome =
      with_retry(retry, "insert puzzles", || store.insert_puzzles(batch.clone()))
        .await?;
    report.absorb(outcome);
  }

  info!(
    path = %path.display(),
    read = report.read,
    invalid = report.invalid,
    inserted = report.inserted,
    duplicates = report.duplicates,
    "legacy puzzles migrated"
  );
  Ok(report)
}
