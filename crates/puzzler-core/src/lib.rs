//! Core types and pure algorithms for the puzzle pipeline.
//!
//! This crate is deliberately free of database and runtime dependencies.
//! Storage backends implement the traits in [`store`]; the jobs in
//! `puzzler-pipeline` drive them.

pub mod blocklist;
pub mod candidate;
pub mod curriculum;
pub mod error;
pub mod ingest;
pub mod players;
pub mod puzzle;
pub mod rating;
pub mod store;
pub mod vote;

pub use error::{Error, Result};
