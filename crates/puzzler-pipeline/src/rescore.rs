//! Re-scoring of unplayed puzzles after a change of the vote table.

use puzzler_core::{
  store::{BuildStore, PuzzlePage, ServingStore, VoteUpdate},
  vote::{self, VoteTally},
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
  Result,
  retry::{RetryPolicy, with_retry},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RescoreReport {
  pub scanned: usize,
  pub updated: usize,
  /// Puzzles whose build record no longer exists.
  pub missing: usize,
}

/// Recompute the heuristic vote of every puzzle that has not been played
/// yet. Puzzles whose build record is gone keep their vote.
pub async fn rescore<S>(store: &S, page_size: usize, retry: &RetryPolicy) -> Result<RescoreReport>
where
  S: BuildStore + ServingStore,
{
  let mut report = RescoreReport::default();
  let limit = page_size.max(1);
  let mut after: Option<String> = None;

  loop {
    let page = with_retry(retry, "read unplayed puzzles", || {
      store.puzzles_page(PuzzlePage { after: after.clone(), limit, unplayed_only: true })
    })
    .await?;
    let Some(last) = page.last() else {
      break;
    };
    after = Some(last.id.clone());
    let exhausted = page.len() < limit;

    let mut updates = Vec::new();
    for puzzle in &page {
      report.scanned += 1;
      let build = with_retry(retry, "read candidate", || store.get_candidate(puzzle.id.clone()))
        .await?;
      let Some(build) = build else {
        warn!(puzzle = %puzzle.id, "missing build record, vote left unchanged");
        report.missing += 1;
        continue;
      };

      let score = vote::score(build.generator.tier, build.eval_signal);
      if score != puzzle.vote_score {
        updates.push(VoteUpdate { id: puzzle.id.clone(), tally: VoteTally::seeded(score) });
      }
    }

    if !updates.is_empty() {
      report.updated +=
        with_retry(retry, "update votes", || store.update_votes(updates.clone())).await?;
    }
    if exhausted {
      break;
    }
  }

  info!(
    scanned = report.scanned,
    updated = report.updated,
    missing = report.missing,
    "rescore finished"
  );
  Ok(report)
}
