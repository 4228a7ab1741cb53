//! Curriculum (path) construction.
//!
//! A path is a fixed-length ordered list of puzzle ids handed to a learner as
//! one unit. For each (theme, tier) pair the accepted pool is ranked by vote,
//! cut down to the tier's share, split into equal-count rating buckets, and
//! each bucket is dealt round-robin into paths so that every path gets a
//! similar mix of high- and low-vote puzzles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Upper bound of the highest rating bucket, so the catalog covers any
/// future rating.
pub const OPEN_RATING_MAX: f64 = 9999.0;

/// Theme label of paths built without a theme filter.
pub const ANY_THEME: &str = "none";

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// A named quality slice of the accepted pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
  pub name:  String,
  /// Share of the pool kept, best votes first.
  pub ratio: f64,
}

impl Tier {
  pub fn top() -> Self { Self { name: "top".into(), ratio: 0.25 } }

  pub fn all() -> Self { Self { name: "all".into(), ratio: 1.0 } }

  pub fn validate(&self) -> Result<()> {
    if !(self.ratio > 0.0 && self.ratio <= 1.0) {
      return Err(Error::InvalidTier { name: self.name.clone(), ratio: self.ratio });
    }
    Ok(())
  }

  /// Number of puzzles this tier keeps out of `total`.
  pub fn target_count(&self, total: usize) -> usize {
    ((total as f64 * self.ratio).round() as usize).min(total)
  }
}

/// The slice of a served puzzle the builder needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
  pub id:     String,
  pub vote:   i32,
  pub rating: f64,
}

// ─── Shape ───────────────────────────────────────────────────────────────────

/// Path length and bucket count used for one (theme, tier) build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PathShape {
  pub path_length:       usize,
  pub nb_rating_buckets: usize,
}

/// How [`PathShape`] is chosen. Fixed values win; otherwise both numbers are
/// derived from the pool size and clamped to their bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRules {
  pub path_length:           Option<usize>,
  pub nb_rating_buckets:     Option<usize>,
  pub path_length_bounds:    (usize, usize),
  pub bucket_bounds:         (usize, usize),
  /// One puzzle of path length per this many selected puzzles.
  pub puzzles_per_path_step: usize,
  /// Buckets are only added while each still yields this many paths.
  pub min_paths_per_bucket:  usize,
}

impl Default for ShapeRules {
  fn default() -> Self {
    Self {
      path_length:           None,
      nb_rating_buckets:     None,
      path_length_bounds:    (20, 100),
      bucket_bounds:         (1, 10),
      puzzles_per_path_step: 200,
      min_paths_per_bucket:  5,
    }
  }
}

impl ShapeRules {
  pub fn validate(&self) -> Result<()> {
    let check = |what, (min, max): (usize, usize)| {
      if min == 0 || min > max {
        Err(Error::InvalidBounds { what, min, max })
      } else {
        Ok(())
      }
    };
    check("path length", self.path_length_bounds)?;
    check("rating bucket", self.bucket_bounds)?;
    if self.puzzles_per_path_step == 0 {
      return Err(Error::InvalidBounds { what: "puzzles per path step", min: 0, max: 0 });
    }
    if self.min_paths_per_bucket == 0 {
      return Err(Error::InvalidBounds { what: "paths per bucket", min: 0, max: 0 });
    }
    if self.path_length == Some(0) {
      return Err(Error::InvalidBounds { what: "fixed path length", min: 0, max: 0 });
    }
    if self.nb_rating_buckets == Some(0) {
      return Err(Error::InvalidBounds { what: "fixed rating bucket", min: 0, max: 0 });
    }
    Ok(())
  }

  pub fn shape_for(&self, selected: usize) -> PathShape {
    let (len_min, len_max) = self.path_length_bounds;
    let path_length = self.path_length.unwrap_or_else(|| {
      let step = self.puzzles_per_path_step.max(1);
      ((selected + step / 2) / step).clamp(len_min, len_max)
    });

    let (bucket_min, bucket_max) = self.bucket_bounds;
    let nb_rating_buckets = self.nb_rating_buckets.unwrap_or_else(|| {
      let per_bucket = path_length.max(1) * self.min_paths_per_bucket.max(1);
      (selected / per_bucket).clamp(bucket_min, bucket_max)
    });

    PathShape { path_length, nb_rating_buckets }
  }
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// One run of the builder. Every path of a run shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
  pub id:         Uuid,
  pub created_at: DateTime<Utc>,
}

impl Generation {
  pub fn new() -> Self { Self { id: Uuid::new_v4(), created_at: Utc::now() } }

  /// Short form used inside path ids.
  pub fn stamp(&self) -> String {
    let mut s = self.id.simple().to_string();
    s.truncate(8);
    s
  }
}

impl Default for Generation {
  fn default() -> Self { Self::new() }
}

/// A delivered curriculum unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuzzlePath {
  pub id:         String,
  pub tier:       String,
  /// `None` for the theme-less catalog.
  pub theme:      Option<String>,
  /// Inclusive lower bound.
  pub rating_min: f64,
  /// Exclusive upper bound; [`OPEN_RATING_MAX`] for the highest bucket.
  pub rating_max: f64,
  pub puzzle_ids: Vec<String>,
  pub length:     usize,
  pub generation: Uuid,
}

/// A rating bucket with its ids in vote order.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingBucket {
  pub rating_min: f64,
  pub rating_max: f64,
  pub ids:        Vec<String>,
}

/// Everything built for one (theme, tier) pair.
#[derive(Debug, Clone)]
pub struct TierPaths {
  pub theme:    Option<String>,
  pub tier:     String,
  pub total:    usize,
  pub selected: usize,
  pub shape:    Option<PathShape>,
  pub buckets:  usize,
  pub paths:    Vec<PuzzlePath>,
}

// ─── Steps ───────────────────────────────────────────────────────────────────

/// Sort by vote descending (ties by id) and keep the tier's share.
pub fn rank_by_vote(mut pool: Vec<PoolEntry>, tier: &Tier) -> Vec<PoolEntry> {
  pool.sort_by(|a, b| b.vote.cmp(&a.vote).then_with(|| a.id.cmp(&b.id)));
  pool.truncate(tier.target_count(pool.len()));
  pool
}

/// Split `ranked` into at most `nb` equal-count buckets by rating.
///
/// Equal ratings never straddle a boundary, so heavily tied pools produce
/// fewer buckets. Bucket ranges are half-open and contiguous: each bucket
/// ends where the next one starts and the last one ends at
/// [`OPEN_RATING_MAX`]. Ids keep their order from `ranked`.
pub fn rating_buckets(ranked: &[PoolEntry], nb: usize) -> Vec<RatingBucket> {
  let n = ranked.len();
  if n == 0 {
    return Vec::new();
  }
  let nb = nb.clamp(1, n);

  let mut order: Vec<usize> = (0..n).collect();
  order.sort_by(|&a, &b| {
    ranked[a]
      .rating
      .total_cmp(&ranked[b].rating)
      .then(a.cmp(&b))
  });
  let rating_at = |i: usize| ranked[order[i]].rating;

  let mut starts = vec![0];
  let mut prev = 0;
  for k in 1..nb {
    let mut start = k * n / nb;
    while start < n && rating_at(start).total_cmp(&rating_at(start - 1)).is_eq() {
      start += 1;
    }
    if start < n && start > prev {
      starts.push(start);
      prev = start;
    }
  }

  let mut buckets = Vec::with_capacity(starts.len());
  for (b, &start) in starts.iter().enumerate() {
    let end = starts.get(b + 1).copied().unwrap_or(n);
    let rating_max = if end < n { rating_at(end) } else { OPEN_RATING_MAX };

    let mut members = order[start..end].to_vec();
    members.sort_unstable();

    buckets.push(RatingBucket {
      rating_min: rating_at(start),
      rating_max,
      ids: members.into_iter().map(|i| ranked[i].id.clone()).collect(),
    });
  }
  buckets
}

/// Deal `items` round-robin into `floor(len / path_length)` paths; the item
/// at position `i` goes to path `i mod nb_paths`. The remainder is dropped.
///
/// ```text
/// interleave([a, b, c, d, e, f, g], 2) == [[a, d], [b, e], [c, f]]
/// ```
pub fn interleave<T: Clone>(items: &[T], path_length: usize) -> Vec<Vec<T>> {
  if path_length == 0 {
    return Vec::new();
  }
  let nb_paths = items.len() / path_length;
  let mut paths = vec![Vec::with_capacity(path_length); nb_paths];
  for (i, item) in items[..nb_paths * path_length].iter().enumerate() {
    paths[i % nb_paths].push(item.clone());
  }
  paths
}

fn path_id(
  theme: &str,
  tier: &str,
  bucket: &RatingBucket,
  generation: &Generation,
  bucket_index: usize,
  path_index: usize,
) -> String {
  format!(
    "{theme}_{tier}_{}-{}_{}_{bucket_index}.{path_index}",
    bucket.rating_min.floor() as i64,
    bucket.rating_max.ceil() as i64,
    generation.stamp(),
  )
}

/// Build every path for one (theme, tier) pair out of its accepted pool.
pub fn build_paths(
  pool: Vec<PoolEntry>,
  theme: Option<&str>,
  tier: &Tier,
  rules: &ShapeRules,
  generation: &Generation,
) -> TierPaths {
  let total = pool.len();
  let mut out = TierPaths {
    theme: theme.map(str::to_owned),
    tier: tier.name.clone(),
    total,
    selected: 0,
    shape: None,
    buckets: 0,
    paths: Vec::new(),
  };
  if total == 0 {
    return out;
  }

  let ranked = rank_by_vote(pool, tier);
  let shape = rules.shape_for(ranked.len());
  let buckets = rating_buckets(&ranked, shape.nb_rating_buckets);
  let theme_label = theme.unwrap_or(ANY_THEME);

  for (b, bucket) in buckets.iter().enumerate() {
    for (i, ids) in interleave(&bucket.ids, shape.path_length).into_iter().enumerate() {
      out.paths.push(PuzzlePath {
        id:         path_id(theme_label, &tier.name, bucket, generation, b, i),
        tier:       tier.name.clone(),
        theme:      out.theme.clone(),
        rating_min: bucket.rating_min,
        rating_max: bucket.rating_max,
        length:     ids.len(),
        puzzle_ids: ids,
        generation: generation.id,
      });
    }
  }

  out.selected = ranked.len();
  out.shape = Some(shape);
  out.buckets = buckets.len();
  out
}
