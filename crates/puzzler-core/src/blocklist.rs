//! Blocklist: ids that must never be served.
//!
//! Membership is curated outside this system; there is no ordering or
//! priority among entries, and no rule for reinstating an id other than it
//! disappearing from the next loaded list.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A set of blocked puzzle ids. Iteration is in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocklist(BTreeSet<String>);

impl Blocklist {
  /// Parse whitespace-separated ids. Blank lines and surrounding whitespace
  /// are discarded; duplicates collapse.
  pub fn parse(text: &str) -> Self {
    text.split_whitespace().map(str::to_owned).collect()
  }

  pub fn contains(&self, id: &str) -> bool { self.0.contains(id) }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }

  /// Ids present here but absent from `other`.
  pub fn difference<'a>(&'a self, other: &'a Blocklist) -> impl Iterator<Item = &'a str> {
    self.0.difference(&other.0).map(String::as_str)
  }

  pub fn extend(&mut self, other: Blocklist) { self.0.extend(other.0) }

  pub fn to_vec(&self) -> Vec<String> { self.0.iter().cloned().collect() }
}

impl FromIterator<String> for Blocklist {
  fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
    Self(
      iter
        .into_iter()
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty())
        .collect(),
    )
  }
}

// ─── Revisions ───────────────────────────────────────────────────────────────

/// Audit record written every time the persisted blocklist is replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlocklistRevision {
  pub revision_id: Uuid,
  pub loaded_at:   DateTime<Utc>,
  /// Human-readable origin, e.g. a file path or `inline`.
  pub source:      String,
  /// Hex SHA-256 over the sorted ids, newline-terminated.
  pub digest:      String,
  pub size:        usize,
  /// Ids not in the previous revision.
  pub added:       usize,
  /// Ids of the previous revision no longer listed.
  pub removed:     usize,
}
