//! Curriculum build: accepted pool → staged generation → atomic publish.
//!
//! Each theme is built in its own task; the tiers of a theme share one pool
//! read. Nothing is written until every task has finished, and the new
//! generation only becomes visible through [`PathStore::publish_generation`].

use puzzler_core::{
  curriculum::{Generation, PathShape, ShapeRules, Tier, TierPaths, build_paths},
  store::{PathStore, ServingStore},
};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Result,
  config::PathsConfig,
  retry::{RetryPolicy, with_retry},
};

/// Summary of one (theme, tier) build.
#[derive(Debug, Clone, Serialize)]
pub struct TierSummary {
  pub theme:    Option<String>,
  pub tier:     String,
  pub total:    usize,
  pub selected: usize,
  pub shape:    Option<PathShape>,
  pub buckets:  usize,
  pub paths:    usize,
}

impl From<&TierPaths> for TierSummary {
  fn from(built: &TierPaths) -> Self {
    Self {
      theme:    built.theme.clone(),
      tier:     built.tier.clone(),
      total:    built.total,
      selected: built.selected,
      shape:    built.shape,
      buckets:  built.buckets,
      paths:    built.paths.len(),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct PathsReport {
  pub generation: Uuid,
  pub tiers:      Vec<TierSummary>,
  /// Live paths after the swap.
  pub published:  usize,
}

/// Everything one theme task needs, owned so the task can be `'static`.
struct ThemeJob<S> {
  store:            S,
  theme:            Option<String>,
  tiers:            Vec<Tier>,
  rules:            ShapeRules,
  reject_threshold: i32,
  generation:       Generation,
  retry:            RetryPolicy,
}

impl<S> ThemeJob<S>
where
  S: ServingStore,
{
  async fn run(self) -> Result<Vec<TierPaths>> {
    let pool = with_retry(&self.retry, "read accepted pool", || {
      self.store.accepted_pool(self.reject_threshold, self.theme.clone())
    })
    .await?;

    let theme = self.theme.as_deref();
    let built = self
      .tiers
      .iter()
      .map(|tier| build_paths(pool.clone(), theme, tier, &self.rules, &self.generation))
      .collect::<Vec<_>>();

    for tier in &built {
      debug!(
        theme = theme.unwrap_or("none"),
        tier = %tier.tier,
        total = tier.total,
        selected = tier.selected,
        paths = tier.paths.len(),
        "tier built"
      );
    }
    Ok(built)
  }
}

/// Build a fresh generation of paths for every configured theme and tier and
/// swap it in as the live catalog.
pub async fn build<S>(store: &S, config: &PathsConfig, retry: &RetryPolicy) -> Result<PathsReport>
where
  S: ServingStore + PathStore + Clone + 'static,
{
  config.validate()?;
  let generation = Generation::new();
  let rules = config.shape_rules();
  let targets = config.theme_targets();

  let mut tasks = JoinSet::new();
  for (index, theme) in targets.iter().enumerate() {
    let job = ThemeJob {
      store: store.clone(),
      theme: theme.clone(),
      tiers: config.tiers.clone(),
      rules: rules.clone(),
      reject_threshold: config.reject_threshold,
      generation,
      retry: *retry,
    };
    tasks.spawn(async move { job.run().await.map(|built| (index, built)) });
  }

  let mut results = Vec::with_capacity(targets.len());
  while let Some(joined) = tasks.join_next().await {
    results.push(joined??);
  }
  // Stage in configuration order regardless of which task finished first.
  results.sort_by_key(|(index, _)| *index);

  let mut summaries = Vec::new();
  let mut paths = Vec::new();
  for (_, built) in results {
    for tier in built {
      summaries.push(TierSummary::from(&tier));
      paths.extend(tier.paths);
    }
  }

  let staged =
    with_retry(retry, "stage paths", || store.stage_paths(generation, paths.clone())).await?;
  let published =
    with_retry(retry, "publish generation", || store.publish_generation(generation.id)).await?;

  info!(
    generation = %generation.id,
    themes = targets.len(),
    staged,
    published,
    "path generation published"
  );
  Ok(PathsReport { generation: generation.id, tiers: summaries, published })
}
