//! Batch jobs of the puzzle pipeline.
//!
//! Every job is generic over the store traits in [`puzzler_core::store`], so
//! the same code runs against SQLite in production and an in-memory database
//! in tests. Jobs keep their buffers and counters local and return a report
//! instead of touching global state.

pub mod blocklist;
pub mod config;
pub mod error;
pub mod import;
pub mod ingest;
pub mod paths;
pub mod players;
pub mod rescore;
pub mod retry;
pub mod status;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use retry::RetryPolicy;
