//! `puzzler`: command-line front-end for the puzzle pipeline.
//!
//! Reads `puzzler.toml` (or the path given with `--config`), layers
//! `PUZZLER__*` environment variables on top, opens the SQLite store, and
//! runs one job. Job reports are printed to stdout as JSON; progress goes to
//! the log.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use puzzler_core::store::{BlocklistStore, PathFilter, PathStore};
use puzzler_pipeline::{
  PipelineConfig, blocklist, import, ingest, paths,
  players::{self, FileGameDirectory, TitledPlayers},
  rescore, status,
};
use puzzler_store_sqlite::SqliteStore;
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Puzzle ingestion and curriculum pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "puzzler.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Move eligible candidates into the serving store.
  Ingest,

  /// Manage the blocklist.
  #[command(subcommand)]
  Blocklist(BlocklistCommand),

  /// Build or inspect curriculum paths.
  #[command(subcommand)]
  Paths(PathsCommand),

  /// Recompute the vote of unplayed puzzles.
  Rescore,

  /// Attach players and player themes to served puzzles.
  EnrichPlayers,

  /// Import generator output (JSON lines) into the build store.
  Import { file: PathBuf },

  /// Migrate legacy served puzzles (JSON lines) into the serving store.
  MigrateLegacy { file: PathBuf },

  /// Record a review verdict for a candidate.
  Review {
    id:      String,
    #[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
    approve: bool,
    #[arg(long)]
    reject:  bool,
  },

  /// Print store counts and the live path generation.
  Status,
}

#[derive(Subcommand)]
enum BlocklistCommand {
  /// Load the configured blocklist, persist it, and purge both stores.
  Sync,
  /// Load and persist without purging.
  Load,
  /// Purge ids of the persisted blocklist from both stores.
  Purge,
  /// Show the revision history, newest first.
  History,
}

#[derive(Subcommand)]
enum PathsCommand {
  /// Build a new generation and publish it.
  Build,
  /// List live paths.
  Show {
    #[arg(long)]
    tier:  Option<String>,
    /// Theme name, or `none` for the theme-less catalog.
    #[arg(long)]
    theme: Option<String>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(
      config::Environment::with_prefix("PUZZLER")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .with_context(|| format!("failed to read config file {:?}", cli.config))?;

  let cfg: PipelineConfig = settings
    .try_deserialize()
    .context("failed to deserialise PipelineConfig")?;
  cfg.validate().context("invalid configuration")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&cfg.store_path);

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  run(cli.command, &store, &cfg).await
}

async fn run(command: Command, store: &SqliteStore, cfg: &PipelineConfig) -> anyhow::Result<()> {
  let retry = cfg.retry_policy();

  match command {
    Command::Ingest => {
      let report = ingest::ingest(store, &cfg.ingest, &retry)
        .await
        .context("ingestion failed")?;
      print_json(&report)
    }

    Command::Blocklist(BlocklistCommand::Sync) => {
      let report = blocklist::sync(store, &cfg.blocklist, &retry)
        .await
        .context("blocklist sync failed")?;
      print_json(&report)
    }
    Command::Blocklist(BlocklistCommand::Load) => {
      let loaded = blocklist::load(&cfg.blocklist)
        .await
        .context("failed to load blocklist")?;
      let revision = blocklist::persist(store, &loaded, &retry)
        .await
        .context("failed to persist blocklist")?;
      print_json(&revision)
    }
    Command::Blocklist(BlocklistCommand::Purge) => {
      let persisted = store
        .blocklist()
        .await
        .context("failed to read persisted blocklist")?;
      let report = blocklist::purge(store, &persisted, &retry)
        .await
        .context("purge failed")?;
      print_json(&report)
    }
    Command::Blocklist(BlocklistCommand::History) => {
      let revisions = store
        .blocklist_revisions()
        .await
        .context("failed to read blocklist history")?;
      print_json(&revisions)
    }

    Command::Paths(PathsCommand::Build) => {
      let report = paths::build(store, &cfg.paths, &retry)
        .await
        .context("path build failed")?;
      print_json(&report)
    }
    Command::Paths(PathsCommand::Show { tier, theme }) => {
      let theme = theme.map(|t| (t != puzzler_core::curriculum::ANY_THEME).then_some(t));
      let live = store
        .list_paths(PathFilter { tier, theme })
        .await
        .context("failed to list paths")?;
      print_json(&live)
    }

    Command::Rescore => {
      let report = rescore::rescore(store, cfg.ingest.batch_size, &retry)
        .await
        .context("rescore failed")?;
      print_json(&report)
    }

    Command::EnrichPlayers => {
      let Some(games_path) = &cfg.players.games_path else {
        bail!("players.games_path is not configured");
      };
      let Some(titled_path) = &cfg.players.titled_path else {
        bail!("players.titled_path is not configured");
      };
      let directory = FileGameDirectory::load(&expand_tilde(games_path))
        .await
        .context("failed to load game directory")?;
      let titles = TitledPlayers::load(&expand_tilde(titled_path), &cfg.players.super_gms)
        .await
        .context("failed to load titled players")?;
      let report = players::enrich(store, &directory, &titles, cfg.players.batch_size, &retry)
        .await
        .context("player enrichment failed")?;
      print_json(&report)
    }

    Command::Import { file } => {
      let report = import::import_candidates(store, &file, cfg.ingest.batch_size, &retry)
        .await
        .with_context(|| format!("failed to import {file:?}"))?;
      print_json(&report)
    }
    Command::MigrateLegacy { file } => {
      let report = import::migrate_legacy(store, &file, cfg.ingest.batch_size, &retry)
        .await
        .with_context(|| format!("failed to migrate {file:?}"))?;
      print_json(&report)
    }

    Command::Review { id, approve, reject } => {
      let approved = approve && !reject;
      if !status::review(store, &id, approved, &retry)
        .await
        .context("failed to record review")?
      {
        bail!("no candidate with id {id}");
      }
      Ok(())
    }

    Command::Status => {
      let report = status::status(store, &retry)
        .await
        .context("failed to read status")?;
      print_json(&report)
    }
  }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
