//! Player enrichment: attach the players of each source game and derive
//! player themes from them.

use std::{
  collections::{HashMap, HashSet},
  path::Path,
};

use puzzler_core::{
  ingest::Batcher,
  players::{PLAYERS_PER_GAME, player_themes},
  puzzle::Puzzle,
  store::{PlayerUpdate, PuzzlePage, ServingStore},
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
  Error, Result,
  retry::{RetryPolicy, with_retry},
};

// ─── Game directory ──────────────────────────────────────────────────────────

/// Resolves a source game to the ids of its players.
pub trait GameDirectory {
  fn players(&self, game_id: &str) -> Option<&[String]>;
}

/// A game directory read from a JSON object `{ "<game id>": ["white", "black"] }`.
#[derive(Debug, Clone, Default)]
pub struct FileGameDirectory {
  games: HashMap<String, Vec<String>>,
}

impl FileGameDirectory {
  pub async fn load(path: &Path) -> Result<Self> {
    let text = tokio::fs::read_to_string(path)
      .await
      .map_err(|e| Error::io(path, e))?;
    let games = serde_json::from_str(&text).map_err(|source| Error::Parse {
      path: path.to_path_buf(),
      line: source.line(),
      source,
    })?;
    Ok(Self { games })
  }
}

impl FromIterator<(String, Vec<String>)> for FileGameDirectory {
  fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
    Self { games: iter.into_iter().collect() }
  }
}

impl GameDirectory for FileGameDirectory {
  fn players(&self, game_id: &str) -> Option<&[String]> {
    self.games.get(game_id).map(Vec::as_slice)
  }
}

// ─── Title lists ─────────────────────────────────────────────────────────────

/// Lowercased player ids that earn themes.
#[derive(Debug, Clone, Default)]
pub struct TitledPlayers {
  pub titled:    HashSet<String>,
  pub super_gms: HashSet<String>,
}

impl TitledPlayers {
  pub fn new(
    titled: impl IntoIterator<Item = String>,
    super_gms: impl IntoIterator<Item = String>,
  ) -> Self {
    Self { titled: lowercase_set(titled), super_gms: lowercase_set(super_gms) }
  }

  /// Read whitespace-separated titled ids from `path`.
  pub async fn load(path: &Path, super_gms: &[String]) -> Result<Self> {
    let text = tokio::fs::read_to_string(path)
      .await
      .map_err(|e| Error::io(path, e))?;
    Ok(Self::new(
      text.split_whitespace().map(str::to_owned),
      super_gms.iter().cloned(),
    ))
  }
}

fn lowercase_set(ids: impl IntoIterator<Item = String>) -> HashSet<String> {
  ids
    .into_iter()
    .map(|id| id.trim().to_lowercase())
    .filter(|id| !id.is_empty())
    .collect()
}

// ─── Job ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
  pub scanned: usize,
  pub updated: usize,
}

/// The update for one puzzle, or `None` when nothing would change.
fn plan_update(
  puzzle: &Puzzle,
  directory: &impl GameDirectory,
  titles: &TitledPlayers,
) -> Result<Option<PlayerUpdate>> {
  let players = directory
    .players(&puzzle.source_game_id)
    .ok_or_else(|| Error::MissingGame {
      puzzle_id: puzzle.id.clone(),
      game_id:   puzzle.source_game_id.clone(),
    })?;
  if players.len() != PLAYERS_PER_GAME {
    return Err(Error::InvalidPlayers {
      puzzle_id: puzzle.id.clone(),
      game_id:   puzzle.source_game_id.clone(),
      count:     players.len(),
    });
  }

  let add_themes: Vec<String> = player_themes(players, &titles.titled, &titles.super_gms)
    .into_iter()
    .map(|theme| theme.as_ref().to_owned())
    .filter(|theme| !puzzle.themes.contains(theme))
    .collect();
  let players_changed = puzzle.players.as_deref() != Some(players);

  Ok((players_changed || !add_themes.is_empty()).then(|| PlayerUpdate {
    id: puzzle.id.clone(),
    players: players.to_vec(),
    add_themes,
  }))
}

/// Enrich every served puzzle. Any game that is missing or does not resolve
/// to exactly two players aborts the run before the pending batch is
/// written.
pub async fn enrich<S, D>(
  store: &S,
  directory: &D,
  titles: &TitledPlayers,
  batch_size: usize,
  retry: &RetryPolicy,
) -> Result<EnrichReport>
where
  S: ServingStore,
  D: GameDirectory,
{
  let mut report = EnrichReport::default();
  let mut batcher = Batcher::new(batch_size);
  let limit = batch_size.max(1);
  let mut after: Option<String> = None;

  loop {
    let page = with_retry(retry, "read puzzles", || {
      store.puzzles_page(PuzzlePage { after: after.clone(), limit, unplayed_only: false })
    })
    .await?;
    let Some(last) = page.last() else {
      break;
    };
    after = Some(last.id.clone());
    let exhausted = page.len() < limit;

    for puzzle in &page {
      report.scanned += 1;
      if let Some(update) = plan_update(puzzle, directory, titles)? {
        if let Some(batch) = batcher.push(update) {
          report.updated += write(store, batch, retry).await?;
        }
      }
    }
    if exhausted {
      break;
    }
  }

  if let Some(batch) = batcher.finish() {
    report.updated += write(store, batch, retry).await?;
  }

  info!(scanned = report.scanned, updated = report.updated, "player enrichment finished");
  Ok(report)
}

async fn write<S: ServingStore>(
  store: &S,
  batch: Vec<PlayerUpdate>,
  retry: &RetryPolicy,
) -> Result<usize> {
  let updated =
    with_retry(retry, "apply player updates", || store.apply_player_updates(batch.clone()))
      .await?;
  debug!(size = batch.len(), updated, "player batch written");
  Ok(updated)
}
