//! Pipeline configuration.
//!
//! Deserialised by the binary from an optional TOML file layered under
//! `PUZZLER__*` environment variables. Every field has a default, so an empty
//! configuration is a working one.

use std::{path::PathBuf, time::Duration};

use puzzler_core::{
  candidate::ReviewPolicy,
  curriculum::{ShapeRules, Tier},
  ingest::DEFAULT_BATCH_SIZE,
};
use serde::Deserialize;

use crate::{Error, Result, retry::RetryPolicy};

// ─── Top level ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub ingest:     IngestConfig,
  #[serde(default)]
  pub blocklist:  BlocklistConfig,
  #[serde(default)]
  pub paths:      PathsConfig,
  #[serde(default)]
  pub players:    PlayersConfig,
  #[serde(default)]
  pub retry:      RetryConfig,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      store_path: default_store_path(),
      ingest:     IngestConfig::default(),
      blocklist:  BlocklistConfig::default(),
      paths:      PathsConfig::default(),
      players:    PlayersConfig::default(),
      retry:      RetryConfig::default(),
    }
  }
}

impl PipelineConfig {
  /// Reject settings no job could run with.
  pub fn validate(&self) -> Result<()> {
    if self.ingest.batch_size == 0 {
      return Err(Error::InvalidConfig("ingest.batch_size must be positive".into()));
    }
    if self.players.batch_size == 0 {
      return Err(Error::InvalidConfig("players.batch_size must be positive".into()));
    }
    if self.retry.attempts == 0 {
      return Err(Error::InvalidConfig("retry.attempts must be at least 1".into()));
    }
    self.paths.validate()
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      attempts:        self.retry.attempts,
      initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
    }
  }
}

fn default_store_path() -> PathBuf { PathBuf::from("puzzler.db") }

// ─── Ingest ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
  #[serde(default = "default_ingest_batch_size")]
  pub batch_size:    usize,
  #[serde(default)]
  pub review_policy: ReviewPolicy,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self { batch_size: default_ingest_batch_size(), review_policy: ReviewPolicy::default() }
  }
}

fn default_ingest_batch_size() -> usize { DEFAULT_BATCH_SIZE }

// ─── Blocklist ───────────────────────────────────────────────────────────────

/// Where the blocklist comes from. File ids and inline ids are merged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlocklistConfig {
  #[serde(default)]
  pub path: Option<PathBuf>,
  #[serde(default)]
  pub ids:  Vec<String>,
}

// ─── Paths ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
  /// Puzzles voted at or below this are never part of a path.
  #[serde(default = "default_reject_threshold")]
  pub reject_threshold:      i32,
  #[serde(default)]
  pub themes:                Vec<String>,
  /// Also build the theme-less catalog.
  #[serde(default = "default_true")]
  pub include_wildcard:      bool,
  #[serde(default = "default_tiers")]
  pub tiers:                 Vec<Tier>,
  #[serde(default)]
  pub path_length:           Option<usize>,
  #[serde(default)]
  pub nb_rating_buckets:     Option<usize>,
  #[serde(default = "default_path_length_bounds")]
  pub path_length_bounds:    (usize, usize),
  #[serde(default = "default_bucket_bounds")]
  pub bucket_bounds:         (usize, usize),
  #[serde(default = "default_puzzles_per_path_step")]
  pub puzzles_per_path_step: usize,
  #[serde(default = "default_min_paths_per_bucket")]
  pub min_paths_per_bucket:  usize,
}

impl Default for PathsConfig {
  fn default() -> Self {
    Self {
      reject_threshold:      default_reject_threshold(),
      themes:                Vec::new(),
      include_wildcard:      true,
      tiers:                 default_tiers(),
      path_length:           None,
      nb_rating_buckets:     None,
      path_length_bounds:    default_path_length_bounds(),
      bucket_bounds:         default_bucket_bounds(),
      puzzles_per_path_step: default_puzzles_per_path_step(),
      min_paths_per_bucket:  default_min_paths_per_bucket(),
    }
  }
}

impl PathsConfig {
  pub fn shape_rules(&self) -> ShapeRules {
    ShapeRules {
      path_length:           self.path_length,
      nb_rating_buckets:     self.nb_rating_buckets,
      path_length_bounds:    self.path_length_bounds,
      bucket_bounds:         self.bucket_bounds,
      puzzles_per_path_step: self.puzzles_per_path_step,
      min_paths_per_bucket:  self.min_paths_per_bucket,
    }
  }

  /// The themes to build, `None` standing for the theme-less catalog. An
  /// empty theme list always yields the theme-less catalog.
  pub fn theme_targets(&self) -> Vec<Option<String>> {
    let mut targets: Vec<Option<String>> = Vec::new();
    if self.include_wildcard || self.themes.is_empty() {
      targets.push(None);
    }
    for theme in &self.themes {
      let theme = Some(theme.clone());
      if !targets.contains(&theme) {
        targets.push(theme);
      }
    }
    targets
  }

  pub fn validate(&self) -> Result<()> {
    if self.tiers.is_empty() {
      return Err(Error::InvalidConfig("paths.tiers must not be empty".into()));
    }
    let mut names = std::collections::HashSet::new();
    for tier in &self.tiers {
      tier.validate()?;
      if !names.insert(tier.name.as_str()) {
        return Err(Error::InvalidConfig(format!("duplicate tier {:?}", tier.name)));
      }
    }
    self.shape_rules().validate()?;
    Ok(())
  }
}

fn default_reject_threshold() -> i32 { -100 }

fn default_true() -> bool { true }

fn default_tiers() -> Vec<Tier> { vec![Tier::top(), Tier::all()] }

fn default_path_length_bounds() -> (usize, usize) { ShapeRules::default().path_length_bounds }

fn default_bucket_bounds() -> (usize, usize) { ShapeRules::default().bucket_bounds }

fn default_puzzles_per_path_step() -> usize { ShapeRules::default().puzzles_per_path_step }

fn default_min_paths_per_bucket() -> usize { ShapeRules::default().min_paths_per_bucket }

// ─── Players ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PlayersConfig {
  /// Whitespace-separated titled player ids.
  #[serde(default)]
  pub titled_path: Option<PathBuf>,
  /// JSON object mapping game ids to their players.
  #[serde(default)]
  pub games_path:  Option<PathBuf>,
  #[serde(default)]
  pub super_gms:   Vec<String>,
  #[serde(default = "default_players_batch_size")]
  pub batch_size:  usize,
}

impl Default for PlayersConfig {
  fn default() -> Self {
    Self {
      titled_path: None,
      games_path:  None,
      super_gms:   Vec::new(),
      batch_size:  default_players_batch_size(),
    }
  }
}

fn default_players_batch_size() -> usize { 200 }

// ─── Retry ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
  #[serde(default = "default_attempts")]
  pub attempts:           u32,
  #[serde(default = "default_initial_backoff_ms")]
  pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self { attempts: default_attempts(), initial_backoff_ms: default_initial_backoff_ms() }
  }
}

fn default_attempts() -> u32 { 3 }

fn default_initial_backoff_ms() -> u64 { 200 }
