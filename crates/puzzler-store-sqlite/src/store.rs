//! [`SqliteStore`], the SQLite implementation of the pipeline store traits.

use std::{collections::HashSet, path::Path};

use puzzler_core::{
  blocklist::{Blocklist, BlocklistRevision},
  candidate::{Candidate, MIN_MOVES, ReviewPolicy},
  curriculum::{Generation, PoolEntry, PuzzlePath},
  puzzle::Puzzle,
  store::{
    BlocklistStore, BuildStore, CandidateCounts, GenerationInfo, InsertOutcome, PathFilter,
    PathStore, PlayerUpdate, PuzzlePage, ServingStore, Store, VoteUpdate,
  },
};
use rusqlite::{ErrorCode, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  encode::{
    CANDIDATE_COLUMNS, PATH_COLUMNS, PUZZLE_COLUMNS, RawCandidate, RawGeneration, RawPath,
    RawPuzzle, RawRevision, decode_list, encode_dt, encode_list, encode_review, encode_theme,
    encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// All pipeline stores backed by a single SQLite file.
///
/// The inner connection is reference-counted, so clones share it.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Delete rows of `table` by primary key inside one transaction.
  async fn delete_ids(&self, table: &'static str, ids: Vec<String>) -> Result<usize> {
    if ids.is_empty() {
      return Ok(0);
    }
    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
          let mut stmt = tx.prepare(&format!("DELETE FROM {table} WHERE id = ?1"))?;
          for id in &ids {
            deleted += stmt.execute(rusqlite::params![id])?;
          }
        }
        tx.commit()?;
        Ok(deleted)
      })
      .await?;
    Ok(deleted)
  }
}

/// Count one insert attempt, treating a constraint violation as a skipped
/// duplicate rather than a failure.
fn tally_insert(
  outcome: &mut InsertOutcome,
  result: rusqlite::Result<usize>,
) -> rusqlite::Result<()> {
  match result {
    Ok(_) => outcome.inserted += 1,
    Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
      outcome.duplicates += 1;
    }
    Err(e) => return Err(e),
  }
  Ok(())
}

impl Store for SqliteStore {
  type Error = Error;
}

// ─── BuildStore impl ─────────────────────────────────────────────────────────

impl BuildStore for SqliteStore {
  async fn insert_candidates(&self, candidates: Vec<Candidate>) -> Result<InsertOutcome> {
    let rows = candidates
      .into_iter()
      .map(|c| encode_list(&c.moves).map(|moves| (c, moves)))
      .collect::<Result<Vec<_>>>()?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut outcome = InsertOutcome::default();
        {
          let mut stmt = tx.prepare(
            "INSERT INTO candidates (
               id, source_game_id, fen, first_move, moves, move_count,
               generator_tier, generator_version, eval_signal, review_approved
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          )?;
          for (c, moves) in &rows {
            let result = stmt.execute(rusqlite::params![
              c.id,
              c.source_game_id,
              c.fen,
              c.first_move().unwrap_or_default(),
              moves,
              c.moves.len() as i64,
              c.generator.tier,
              c.generator.version,
              c.eval_signal,
              encode_review(c.review),
            ]);
            tally_insert(&mut outcome, result)?;
          }
        }
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(outcome)
  }

  async fn get_candidate(&self, id: String) -> Result<Option<Candidate>> {
    let raw: Option<RawCandidate> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE id = ?1"),
              rusqlite::params![id],
              RawCandidate::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCandidate::into_candidate).transpose()
  }

  async fn set_review(&self, id: String, approved: bool) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE candidates SET review_approved = ?2 WHERE id = ?1",
          rusqlite::params![id, approved],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn eligible_candidates(
    &self,
    policy: ReviewPolicy,
    after: Option<String>,
    limit: usize,
  ) -> Result<Vec<Candidate>> {
    let review_clause = match policy {
      ReviewPolicy::NotRejected => "(c.review_approved IS NULL OR c.review_approved = 1)",
      ReviewPolicy::Approved => "c.review_approved = 1",
    };
    let sql = format!(
      "SELECT {CANDIDATE_COLUMNS}
       FROM candidates c
       WHERE c.move_count >= ?1
         AND NOT EXISTS (SELECT 1 FROM blocklist b WHERE b.id = c.id)
         AND {review_clause}
         AND (?2 IS NULL OR c.id > ?2)
       ORDER BY c.id
       LIMIT ?3"
    );
    let limit_val = limit as i64;

    let raws: Vec<RawCandidate> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![MIN_MOVES as i64, after, limit_val],
            RawCandidate::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCandidate::into_candidate).collect()
  }

  async fn delete_candidates(&self, ids: Vec<String>) -> Result<usize> {
    self.delete_ids("candidates", ids).await
  }

  async fn candidate_counts(&self) -> Result<CandidateCounts> {
    let (total, reviewed): (i64, i64) = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*), COUNT(review_approved) FROM candidates",
          [],
          |r| Ok((r.get(0)?, r.get(1)?)),
        )?)
      })
      .await?;
    Ok(CandidateCounts { total: total as usize, reviewed: reviewed as usize })
  }
}

// ─── ServingStore impl ───────────────────────────────────────────────────────

impl ServingStore for SqliteStore {
  async fn existing_source_games(&self, source_game_ids: Vec<String>) -> Result<HashSet<String>> {
    if source_game_ids.is_empty() {
      return Ok(HashSet::new());
    }
    // One JSON array parameter, so batch size is not bound by SQLite's
    // variable limit.
    let ids = encode_list(&source_game_ids)?;

    let existing = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT source_game_id FROM puzzles
           WHERE source_game_id IN (SELECT value FROM json_each(?1))",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![ids], |r| r.get::<_, String>(0))?
          .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(existing)
  }

  async fn insert_puzzles(&self, puzzles: Vec<Puzzle>) -> Result<InsertOutcome> {
    let rows = puzzles
      .into_iter()
      .map(|p| {
        let themes = encode_list(&p.themes)?;
        let players = p.players.as_deref().map(encode_list).transpose()?;
        Ok((p, themes, players))
      })
      .collect::<Result<Vec<_>>>()?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut outcome = InsertOutcome::default();
        {
          let mut stmt = tx.prepare(
            "INSERT INTO puzzles (
               id, source_game_id, fen, first_move, line, themes,
               rating_r, rating_d, rating_v,
               vote_score, vote_up, vote_down, plays, eval_signal, players
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
          )?;
          for (p, themes, players) in &rows {
            let result = stmt.execute(rusqlite::params![
              p.id,
              p.source_game_id,
              p.fen,
              p.first_move(),
              p.line,
              themes,
              p.rating.r,
              p.rating.d,
              p.rating.v,
              p.vote_score,
              p.vote_up,
              p.vote_down,
              p.plays,
              p.eval_signal,
              players,
            ]);
            tally_insert(&mut outcome, result)?;
          }
        }
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(outcome)
  }

  async fn get_puzzle(&self, id: String) -> Result<Option<Puzzle>> {
    let raw: Option<RawPuzzle> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PUZZLE_COLUMNS} FROM puzzles WHERE id = ?1"),
              rusqlite::params![id],
              RawPuzzle::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPuzzle::into_puzzle).transpose()
  }

  async fn puzzles_page(&self, page: PuzzlePage) -> Result<Vec<Puzzle>> {
    let PuzzlePage { after, limit, unplayed_only } = page;
    let limit_val = limit as i64;

    let raws: Vec<RawPuzzle> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PUZZLE_COLUMNS}
           FROM puzzles
           WHERE (?1 IS NULL OR id > ?1)
             AND (?2 = 0 OR plays = 0)
           ORDER BY id
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![after, unplayed_only, limit_val],
            RawPuzzle::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPuzzle::into_puzzle).collect()
  }

  async fn update_votes(&self, updates: Vec<VoteUpdate>) -> Result<usize> {
    if updates.is_empty() {
      return Ok(0);
    }
    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
          let mut stmt = tx.prepare(
            "UPDATE puzzles SET vote_score = ?2, vote_up = ?3, vote_down = ?4 WHERE id = ?1",
          )?;
          for u in &updates {
            updated +=
              stmt.execute(rusqlite::params![u.id, u.tally.score, u.tally.up, u.tally.down])?;
          }
        }
        tx.commit()?;
        Ok(updated)
      })
      .await?;
    Ok(updated)
  }

  async fn apply_player_updates(&self, updates: Vec<PlayerUpdate>) -> Result<usize> {
    if updates.is_empty() {
      return Ok(0);
    }

    // Themes are merged against the stored list, so read them first.
    let ids: Vec<String> = updates.iter().map(|u| u.id.clone()).collect();
    let current: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare("SELECT id, themes FROM puzzles WHERE id = ?1")?;
        let mut rows = Vec::with_capacity(ids.len());
        for id in &ids {
          if let Some(row) = stmt
            .query_row(rusqlite::params![id], |r| Ok((r.get(0)?, r.get(1)?)))
            .optional()?
          {
            rows.push(row);
          }
        }
        Ok(rows)
      })
      .await?;

    let mut writes = Vec::with_capacity(current.len());
    for (id, themes_json) in current {
      let Some(update) = updates.iter().find(|u| u.id == id) else {
        continue;
      };
      let mut themes = decode_list(&themes_json)?;
      for theme in &update.add_themes {
        if !themes.contains(theme) {
          themes.push(theme.clone());
        }
      }
      writes.push((id, encode_list(&themes)?, encode_list(&update.players)?));
    }

    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
          let mut stmt =
            tx.prepare("UPDATE puzzles SET themes = ?2, players = ?3 WHERE id = ?1")?;
          for (id, themes, players) in &writes {
            updated += stmt.execute(rusqlite::params![id, themes, players])?;
          }
        }
        tx.commit()?;
        Ok(updated)
      })
      .await?;
    Ok(updated)
  }

  async fn accepted_pool(
    &self,
    reject_threshold: i32,
    theme: Option<String>,
  ) -> Result<Vec<PoolEntry>> {
    let pool = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT p.id, p.vote_score, p.rating_r
           FROM puzzles p
           WHERE p.vote_score > ?1
             AND (?2 IS NULL
                  OR EXISTS (SELECT 1 FROM json_each(p.themes) t WHERE t.value = ?2))",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![reject_threshold, theme], |r| {
            Ok(PoolEntry { id: r.get(0)?, vote: r.get(1)?, rating: r.get(2)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(pool)
  }

  async fn delete_puzzles(&self, ids: Vec<String>) -> Result<usize> {
    self.delete_ids("puzzles", ids).await
  }

  async fn puzzle_count(&self) -> Result<usize> {
    let count: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM puzzles", [], |r| r.get(0))?))
      .await?;
    Ok(count as usize)
  }
}

// ─── BlocklistStore impl ─────────────────────────────────────────────────────

impl BlocklistStore for SqliteStore {
  async fn replace_blocklist(
    &self,
    blocklist: Blocklist,
    revision: BlocklistRevision,
  ) -> Result<()> {
    let ids = blocklist.to_vec();
    let revision_id = encode_uuid(revision.revision_id);
    let loaded_at = encode_dt(revision.loaded_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM blocklist", [])?;
        {
          let mut stmt = tx.prepare("INSERT OR IGNORE INTO blocklist (id) VALUES (?1)")?;
          for id in &ids {
            stmt.execute(rusqlite::params![id])?;
          }
        }
        tx.execute(
          "INSERT INTO blocklist_revisions
             (revision_id, loaded_at, source, digest, size, added, removed)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            revision_id,
            loaded_at,
            revision.source,
            revision.digest,
            revision.size as i64,
            revision.added as i64,
            revision.removed as i64,
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn blocklist(&self) -> Result<Blocklist> {
    let ids: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT id FROM blocklist")?;
        let rows = stmt
          .query_map([], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(ids.into_iter().collect())
  }

  async fn blocklist_revisions(&self) -> Result<Vec<BlocklistRevision>> {
    let raws: Vec<RawRevision> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT revision_id, loaded_at, source, digest, size, added, removed
           FROM blocklist_revisions
           ORDER BY loaded_at DESC, rowid DESC",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(RawRevision {
              revision_id: r.get(0)?,
              loaded_at:   r.get(1)?,
              source:      r.get(2)?,
              digest:      r.get(3)?,
              size:        r.get(4)?,
              added:       r.get(5)?,
              removed:     r.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRevision::into_revision).collect()
  }
}

// ─── PathStore impl ──────────────────────────────────────────────────────────

impl PathStore for SqliteStore {
  async fn stage_paths(&self, generation: Generation, paths: Vec<PuzzlePath>) -> Result<usize> {
    let generation_id = encode_uuid(generation.id);
    let created_at = encode_dt(generation.created_at);
    let rows = paths
      .into_iter()
      .map(|p| encode_list(&p.puzzle_ids).map(|ids| (p, ids)))
      .collect::<Result<Vec<_>>>()?;

    let staged: i64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Leftovers from runs that were aborted before going live.
        tx.execute(
          "DELETE FROM paths_staging WHERE generation_id != ?1",
          rusqlite::params![generation_id],
        )?;
        tx.execute(
          "DELETE FROM path_generations WHERE live = 0 AND generation_id != ?1",
          rusqlite::params![generation_id],
        )?;
        tx.execute(
          "INSERT OR IGNORE INTO path_generations (generation_id, created_at, path_count, live)
           VALUES (?1, ?2, 0, 0)",
          rusqlite::params![generation_id, created_at],
        )?;

        {
          let mut stmt = tx.prepare(&format!(
            "INSERT INTO paths_staging ({PATH_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
          ))?;
          for (p, ids) in &rows {
            stmt.execute(rusqlite::params![
              p.id,
              generation_id,
              p.tier,
              encode_theme(p.theme.as_deref()),
              p.rating_min,
              p.rating_max,
              ids,
              p.length as i64,
            ])?;
          }
        }

        let staged: i64 = tx.query_row(
          "SELECT COUNT(*) FROM paths_staging WHERE generation_id = ?1",
          rusqlite::params![generation_id],
          |r| r.get(0),
        )?;
        tx.execute(
          "UPDATE path_generations SET path_count = ?2 WHERE generation_id = ?1",
          rusqlite::params![generation_id, staged],
        )?;

        tx.commit()?;
        Ok(staged)
      })
      .await?;

    Ok(staged as usize)
  }

  async fn publish_generation(&self, generation_id: Uuid) -> Result<usize> {
    let id_str = encode_uuid(generation_id);

    let live: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let live: Option<bool> = tx
          .query_row(
            "SELECT live FROM path_generations WHERE generation_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        match live {
          None => return Ok(None),
          // Already live; its staging rows are gone.
          Some(true) => {}
          Some(false) => {
            tx.execute("DELETE FROM paths", [])?;
            tx.execute(
              &format!(
                "INSERT INTO paths ({PATH_COLUMNS})
                 SELECT {PATH_COLUMNS} FROM paths_staging
                 WHERE generation_id = ?1
                 ORDER BY rowid"
              ),
              rusqlite::params![id_str],
            )?;
            tx.execute(
              "DELETE FROM paths_staging WHERE generation_id = ?1",
              rusqlite::params![id_str],
            )?;
            tx.execute("UPDATE path_generations SET live = 0 WHERE live = 1", [])?;
            tx.execute(
              "UPDATE path_generations SET live = 1 WHERE generation_id = ?1",
              rusqlite::params![id_str],
            )?;
          }
        }

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM paths", [], |r| r.get(0))?;
        tx.commit()?;
        Ok(Some(count))
      })
      .await?;

    live
      .map(|count| count as usize)
      .ok_or(Error::UnknownGeneration(generation_id))
  }

  async fn list_paths(&self, filter: PathFilter) -> Result<Vec<PuzzlePath>> {
    let tier = filter.tier;
    let theme = filter.theme.map(|t| encode_theme(t.as_deref()));

    let raws: Vec<RawPath> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PATH_COLUMNS}
           FROM paths
           WHERE (?1 IS NULL OR tier = ?1)
             AND (?2 IS NULL OR theme = ?2)
           ORDER BY tier, theme, rating_min, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![tier, theme], RawPath::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPath::into_path).collect()
  }

  async fn live_generation(&self) -> Result<Option<GenerationInfo>> {
    let raw: Option<RawGeneration> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT generation_id, created_at, path_count
               FROM path_generations
               WHERE live = 1",
              [],
              |r| {
                Ok(RawGeneration {
                  generation_id: r.get(0)?,
                  created_at:    r.get(1)?,
                  path_count:    r.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawGeneration::into_info).transpose()
  }
}
