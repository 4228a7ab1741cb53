//! Blocklist load, persist, and purge.

use std::path::Path;

use chrono::Utc;
use puzzler_core::{
  blocklist::{Blocklist, BlocklistRevision},
  store::{BlocklistStore, BuildStore, ServingStore},
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::{
  Error, Result,
  config::BlocklistConfig,
  retry::{RetryPolicy, with_retry},
};

/// Ids per delete call during a purge.
const PURGE_CHUNK: usize = 1000;

/// A parsed blocklist together with a label of where it came from.
#[derive(Debug, Clone)]
pub struct LoadedBlocklist {
  pub blocklist: Blocklist,
  pub source:    String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
  pub candidates: usize,
  pub puzzles:    usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
  pub revision: BlocklistRevision,
  pub purged:   PurgeReport,
}

// ─── Load ────────────────────────────────────────────────────────────────────

pub async fn load_file(path: &Path) -> Result<Blocklist> {
  let text = tokio::fs::read_to_string(path)
    .await
    .map_err(|e| Error::io(path, e))?;
  Ok(Blocklist::parse(&text))
}

/// Read the configured file, if any, and merge in the inline ids.
pub async fn load(config: &BlocklistConfig) -> Result<LoadedBlocklist> {
  let mut blocklist: Blocklist = config.ids.iter().cloned().collect();
  let mut sources = Vec::new();

  if let Some(path) = &config.path {
    blocklist.extend(load_file(path).await?);
    sources.push(path.display().to_string());
  }
  if !config.ids.is_empty() || sources.is_empty() {
    sources.push("inline".to_owned());
  }

  Ok(LoadedBlocklist { blocklist, source: sources.join("+") })
}

// ─── Persist ─────────────────────────────────────────────────────────────────

/// Hex SHA-256 over the sorted ids, each followed by a newline.
pub fn digest(blocklist: &Blocklist) -> String {
  let mut hasher = Sha256::new();
  for id in blocklist.iter() {
    hasher.update(id.as_bytes());
    hasher.update(b"\n");
  }
  hex::encode(hasher.finalize())
}

/// Replace the persisted blocklist and record a revision describing the
/// change. A revision is written even when the set did not change.
pub async fn persist<S>(
  store: &S,
  loaded: &LoadedBlocklist,
  retry: &RetryPolicy,
) -> Result<BlocklistRevision>
where
  S: BlocklistStore,
{
  let previous = with_retry(retry, "read blocklist", || store.blocklist()).await?;
  let current = &loaded.blocklist;

  let revision = BlocklistRevision {
    revision_id: Uuid::new_v4(),
    loaded_at:   Utc::now(),
    source:      loaded.source.clone(),
    digest:      digest(current),
    size:        current.len(),
    added:       current.difference(&previous).count(),
    removed:     previous.difference(current).count(),
  };

  with_retry(retry, "replace blocklist", || {
    store.replace_blocklist(current.clone(), revision.clone())
  })
  .await?;

  info!(
    source = %revision.source,
    size = revision.size,
    added = revision.added,
    removed = revision.removed,
    digest = %revision.digest,
    "blocklist persisted"
  );
  Ok(revision)
}

// ─── Purge ───────────────────────────────────────────────────────────────────

/// Delete every blocklisted id from both stores. Ids that are absent are
/// ignored, so purging twice is harmless.
pub async fn purge<S>(store: &S, blocklist: &Blocklist, retry: &RetryPolicy) -> Result<PurgeReport>
where
  S: BuildStore + ServingStore,
{
  let mut report = PurgeReport::default();
  let ids = blocklist.to_vec();

  for chunk in ids.chunks(PURGE_CHUNK) {
    report.candidates +=
      with_retry(retry, "purge candidates", || store.delete_candidates(chunk.to_vec())).await?;
    report.puzzles +=
      with_retry(retry, "purge puzzles", || store.delete_puzzles(chunk.to_vec())).await?;
  }

  info!(candidates = report.candidates, puzzles = report.puzzles, "blocklist purged");
  Ok(report)
}

/// Load, persist, then purge.
pub async fn sync<S>(store: &S, config: &BlocklistConfig, retry: &RetryPolicy) -> Result<SyncReport>
where
  S: BlocklistStore + BuildStore + ServingStore,
{
  let loaded = load(config).await?;
  let revision = persist(store, &loaded, retry).await?;
  let purged = purge(store, &loaded.blocklist, retry).await?;
  Ok(SyncReport { revision, purged })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn digest_ignores_input_order() {
    let a = Blocklist::parse("b a c");
    let b = Blocklist::parse("c\nb\n\na");
    assert_eq!(digest(&a), digest(&b));
    assert_ne!(digest(&a), digest(&Blocklist::parse("a b")));
    assert_eq!(digest(&a).len(), 64);
  }

  #[test]
  fn digest_of_empty_set() {
    assert_eq!(
      digest(&Blocklist::default()),
      "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
  }

  #[tokio::test]
  async fn inline_only_source() {
    let config = BlocklistConfig { path: None, ids: vec!["x".into(), "y".into()] };
    let loaded = load(&config).await.unwrap();
    assert_eq!(loaded.source, "inline");
    assert_eq!(loaded.blocklist.len(), 2);
  }

  #[tokio::test]
  async fn missing_file_is_an_io_error() {
    let config = BlocklistConfig { path: Some("/nonexistent/blocklist.txt".into()), ids: Vec::new() };
    assert!(matches!(load(&config).await, Err(Error::Io { .. })));
  }
}
