//! Error type for `puzzler-pipeline`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A store operation failed, after retries where the failure was transient.
  #[error("store error during {operation}: {source}")]
  Store {
    operation: &'static str,
    #[source]
    source:    Box<dyn std::error::Error + Send + Sync>,
  },

  #[error(transparent)]
  Core(#[from] puzzler_core::Error),

  #[error("failed to read {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("{path:?} line {line}: {source}")]
  Parse {
    path:   PathBuf,
    line:   usize,
    #[source]
    source: serde_json::Error,
  },

  #[error("game {game_id} of puzzle {puzzle_id} has {count} players, expected 2")]
  InvalidPlayers {
    puzzle_id: String,
    game_id:   String,
    count:     usize,
  },

  #[error("game {game_id} of puzzle {puzzle_id} is missing from the game directory")]
  MissingGame { puzzle_id: String, game_id: String },

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("path builder task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
