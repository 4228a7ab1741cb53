//! Dedup ingestion: build store → serving store.

use puzzler_core::{
  candidate::Candidate,
  ingest::{Batcher, new_puzzles},
  store::{BuildStore, ServingStore},
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
  Result,
  config::IngestConfig,
  retry::{RetryPolicy, with_retry},
};

/// Counters of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
  /// Eligible candidates read from the build store.
  pub scanned:          usize,
  pub batches:          usize,
  pub inserted:         usize,
  /// Skipped because their source game is already served.
  pub skipped_existing: usize,
  /// Rejected by a unique constraint during the bulk insert.
  pub duplicates:       usize,
}

/// Move every eligible candidate that is not served yet into the serving
/// store. Running it twice in a row inserts nothing the second time.
pub async fn ingest<S>(store: &S, config: &IngestConfig, retry: &RetryPolicy) -> Result<IngestReport>
where
  S: BuildStore + ServingStore,
{
  let mut report = IngestReport::default();
  let mut batcher = Batcher::new(config.batch_size);
  let page_size = config.batch_size.max(1);
  let mut after: Option<String> = None;

  loop {
    let page = with_retry(retry, "read eligible candidates", || {
      store.eligible_candidates(config.review_policy, after.clone(), page_size)
    })
    .await?;
    let exhausted = page.len() < page_size;
    after = page.last().map(|c| c.id.clone());

    for candidate in page {
      report.scanned += 1;
      if let Some(batch) = batcher.push(candidate) {
        flush(store, batch, retry, &mut report).await?;
      }
    }

    if exhausted || after.is_none() {
      break;
    }
  }

  if let Some(batch) = batcher.finish() {
    flush(store, batch, retry, &mut report).await?;
  }

  info!(
    scanned = report.scanned,
    batches = report.batches,
    inserted = report.inserted,
    skipped_existing = report.skipped_existing,
    duplicates = report.duplicates,
    "ingestion finished"
  );
  Ok(report)
}

async fn flush<S>(
  store: &S,
  batch: Vec<Candidate>,
  retry: &RetryPolicy,
  report: &mut IngestReport,
) -> Result<()>
where
  S: ServingStore,
{
  report.batches += 1;

  let games: Vec<String> = batch.iter().map(|c| c.source_game_id.clone()).collect();
  let existing = with_retry(retry, "look up served source games", || {
    store.existing_source_games(games.clone())
  })
  .await?;

  let fresh = new_puzzles(&batch, &existing);
  report.skipped_existing += batch.len() - fresh.len();
  if fresh.is_empty() {
    debug!(size = batch.len(), "batch already served");
    return Ok(());
  }

  let outcome =
    with_retry(retry, "insert puzzles", || store.insert_puzzles(fresh.clone())).await?;
  report.inserted += outcome.inserted;
  report.duplicates += outcome.duplicates;

  debug!(
    size = batch.len(),
    inserted = outcome.inserted,
    duplicates = outcome.duplicates,
    "batch flushed"
  );
  Ok(())
}
