//! Review verdicts and a store-wide status snapshot.

use puzzler_core::store::{BlocklistStore, BuildStore, GenerationInfo, PathStore, ServingStore};
use serde::Serialize;
use tracing::info;

use crate::{
  Result,
  retry::{RetryPolicy, with_retry},
};

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
  pub candidates:      usize,
  pub reviewed:        usize,
  pub puzzles:         usize,
  pub blocklisted:     usize,
  pub live_generation: Option<LiveGeneration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveGeneration {
  pub id:         uuid::Uuid,
  pub created_at: chrono::DateTime<chrono::Utc>,
  pub paths:      usize,
}

impl From<GenerationInfo> for LiveGeneration {
  fn from(info: GenerationInfo) -> Self {
    Self {
      id:         info.generation.id,
      created_at: info.generation.created_at,
      paths:      info.path_count,
    }
  }
}

/// Record a review verdict. Returns `false` when the candidate is unknown.
pub async fn review<S>(store: &S, id: &str, approved: bool, retry: &RetryPolicy) -> Result<bool>
where
  S: BuildStore,
{
  let found =
    with_retry(retry, "record review", || store.set_review(id.to_owned(), approved)).await?;
  if found {
    info!(candidate = id, approved, "review recorded");
  }
  Ok(found)
}

pub async fn status<S>(store: &S, retry: &RetryPolicy) -> Result<StatusReport>
where
  S: BuildStore + ServingStore + BlocklistStore + PathStore,
{
  let counts = with_retry(retry, "count candidates", || store.candidate_counts()).await?;
  let puzzles = with_retry(retry, "count puzzles", || store.puzzle_count()).await?;
  let blocklist = with_retry(retry, "read blocklist", || store.blocklist()).await?;
  let live = with_retry(retry, "read live generation", || store.live_generation()).await?;

  Ok(StatusReport {
    candidates:      counts.total,
    reviewed:        counts.reviewed,
    puzzles,
    blocklisted:     blocklist.len(),
    live_generation: live.map(LiveGeneration::from),
  })
}
