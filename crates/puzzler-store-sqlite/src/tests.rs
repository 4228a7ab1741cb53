//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::HashSet;

use chrono::Utc;
use puzzler_core::{
  blocklist::{Blocklist, BlocklistRevision},
  candidate::{Candidate, Generator, Review, ReviewPolicy},
  curriculum::{Generation, PuzzlePath},
  puzzle::Puzzle,
  store::{
    BlocklistStore, BuildStore, PathFilter, PathStore, PlayerUpdate, PuzzlePage, ServingStore,
    VoteUpdate,
  },
  vote::VoteTally,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn candidate(id: &str, game: &str, moves: &[&str]) -> Candidate {
  Candidate {
    id:             id.into(),
    source_game_id: game.into(),
    fen:            format!("fen-{id}"),
    moves:          moves.iter().map(|m| (*m).to_owned()).collect(),
    generator:      Generator { tier: 30, version: 1 },
    eval_signal:    80,
    review:         None,
  }
}

fn puzzle(id: &str, vote: i32, rating: f64) -> Puzzle {
  let mut p = Puzzle::from_candidate(&candidate(id, &format!("g-{id}"), &["e2e4", "e7e5"]));
  p.vote_score = vote;
  p.rating.r = rating;
  p
}

fn ids<'a>(items: impl IntoIterator<Item = &'a String>) -> Vec<&'a str> {
  items.into_iter().map(String::as_str).collect()
}

// ─── Candidates ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_candidate() {
  let s = store().await;
  let c = candidate("c1", "g1", &["e2e4", "e7e5", "g1f3"]);

  let outcome = s.insert_candidates(vec![c.clone()]).await.unwrap();
  assert_eq!(outcome.inserted, 1);
  assert_eq!(outcome.duplicates, 0);

  let fetched = s.get_candidate("c1".into()).await.unwrap().unwrap();
  assert_eq!(fetched, c);
  assert!(s.get_candidate("nope".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn candidate_duplicates_are_skipped_not_failed() {
  let s = store().await;
  let mut transposed = candidate("c3", "g3", &["e2e4", "d7d5"]);
  transposed.fen = "fen-c1".into();

  let outcome = s
    .insert_candidates(vec![
      candidate("c1", "g1", &["e2e4", "e7e5"]),
      // same source game
      candidate("c2", "g1", &["d2d4", "d7d5"]),
      // same fen and first move as c1
      transposed,
      candidate("c4", "g4", &["c2c4", "e7e5"]),
    ])
    .await
    .unwrap();

  assert_eq!(outcome.inserted, 2);
  assert_eq!(outcome.duplicates, 2);
  assert_eq!(s.candidate_counts().await.unwrap().total, 2);
}

#[tokio::test]
async fn eligibility_filters_short_blocked_and_rejected() {
  let s = store().await;
  let mut approved = candidate("c2", "g2", &["e2e4", "e7e5"]);
  approved.review = Some(Review { approved: true });
  let mut rejected = candidate("c3", "g3", &["e2e4", "e7e5"]);
  rejected.review = Some(Review { approved: false });

  s.insert_candidates(vec![
    candidate("c1", "g1", &["e2e4", "e7e5"]),
    approved,
    rejected,
    candidate("c4", "g4", &["e2e4"]),
    candidate("c5", "g5", &["e2e4", "e7e5"]),
  ])
  .await
  .unwrap();

  let revision = BlocklistRevision {
    revision_id: Uuid::new_v4(),
    loaded_at:   Utc::now(),
    source:      "inline".into(),
    digest:      String::new(),
    size:        1,
    added:       1,
    removed:     0,
  };
  s.replace_blocklist(Blocklist::parse("c5"), revision).await.unwrap();

  let eligible = s
    .eligible_candidates(ReviewPolicy::NotRejected, None, 100)
    .await
    .unwrap();
  assert_eq!(ids(eligible.iter().map(|c| &c.id)), ["c1", "c2"]);

  let strict = s.eligible_candidates(ReviewPolicy::Approved, None, 100).await.unwrap();
  assert_eq!(ids(strict.iter().map(|c| &c.id)), ["c2"]);
}

#[tokio::test]
async fn eligible_candidates_page_by_id() {
  let s = store().await;
  let batch = (0..5)
    .map(|i| candidate(&format!("c{i}"), &format!("g{i}"), &["e2e4", "e7e5"]))
    .collect();
  s.insert_candidates(batch).await.unwrap();

  let first = s
    .eligible_candidates(ReviewPolicy::NotRejected, None, 2)
    .await
    .unwrap();
  assert_eq!(ids(first.iter().map(|c| &c.id)), ["c0", "c1"]);

  let next = s
    .eligible_candidates(ReviewPolicy::NotRejected, Some("c1".into()), 2)
    .await
    .unwrap();
  assert_eq!(ids(next.iter().map(|c| &c.id)), ["c2", "c3"]);
}

#[tokio::test]
async fn review_and_counts() {
  let s = store().await;
  s.insert_candidates(vec![
    candidate("c1", "g1", &["e2e4", "e7e5"]),
    candidate("c2", "g2", &["e2e4", "e7e5"]),
  ])
  .await
  .unwrap();

  assert!(s.set_review("c1".into(), false).await.unwrap());
  assert!(!s.set_review("missing".into(), true).await.unwrap());

  let counts = s.candidate_counts().await.unwrap();
  assert_eq!((counts.total, counts.reviewed), (2, 1));

  let c1 = s.get_candidate("c1".into()).await.unwrap().unwrap();
  assert_eq!(c1.review, Some(Review { approved: false }));
}

#[tokio::test]
async fn deleting_candidates_is_idempotent() {
  let s = store().await;
  s.insert_candidates(vec![candidate("c1", "g1", &["e2e4", "e7e5"])])
    .await
    .unwrap();

  assert_eq!(s.delete_candidates(vec!["c1".into(), "c9".into()]).await.unwrap(), 1);
  assert_eq!(s.delete_candidates(vec!["c1".into()]).await.unwrap(), 0);
  assert_eq!(s.delete_candidates(Vec::new()).await.unwrap(), 0);
}

// ─── Puzzles ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_puzzle() {
  let s = store().await;
  let p = puzzle("p1", 2, 1500.0);

  let outcome = s.insert_puzzles(vec![p.clone()]).await.unwrap();
  assert_eq!(outcome.inserted, 1);

  let fetched = s.get_puzzle("p1".into()).await.unwrap().unwrap();
  assert_eq!(fetched, p);
  assert_eq!(s.puzzle_count().await.unwrap(), 1);
}

#[tokio::test]
async fn puzzle_unique_constraints() {
  let s = store().await;
  s.insert_puzzles(vec![puzzle("p1", 1, 1500.0)]).await.unwrap();

  let mut same_game = puzzle("p2", 1, 1500.0);
  same_game.source_game_id = "g-p1".into();
  let mut same_position = puzzle("p3", 1, 1500.0);
  same_position.fen = "fen-p1".into();

  let outcome = s
    .insert_puzzles(vec![puzzle("p1", 1, 1500.0), same_game, same_position, puzzle("p4", 1, 1500.0)])
    .await
    .unwrap();
  assert_eq!(outcome.inserted, 1);
  assert_eq!(outcome.duplicates, 3);
}

#[tokio::test]
async fn existing_source_games_lookup() {
  let s = store().await;
  s.insert_puzzles(vec![puzzle("p1", 1, 1500.0), puzzle("p2", 1, 1500.0)])
    .await
    .unwrap();

  let existing = s
    .existing_source_games(vec!["g-p1".into(), "g-zz".into()])
    .await
    .unwrap();
  assert_eq!(existing.len(), 1);
  assert!(existing.contains("g-p1"));
  assert!(s.existing_source_games(Vec::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn existing_source_games_beyond_variable_limit() {
  let s = store().await;
  s.insert_puzzles(vec![puzzle("p1", 1, 1500.0), puzzle("p2", 1, 1500.0)])
    .await
    .unwrap();

  let mut lookup: Vec<String> = (0..40_000).map(|i| format!("g-x{i}")).collect();
  lookup.push("g-p2".into());
  let existing = s.existing_source_games(lookup).await.unwrap();
  assert_eq!(existing, HashSet::from(["g-p2".to_owned()]));
}

#[tokio::test]
async fn puzzles_page_can_skip_played() {
  let s = store().await;
  let mut played = puzzle("p2", 1, 1500.0);
  played.plays = 4;
  s.insert_puzzles(vec![puzzle("p1", 1, 1500.0), played, puzzle("p3", 1, 1500.0)])
    .await
    .unwrap();

  let all = s
    .puzzles_page(PuzzlePage { after: None, limit: 10, unplayed_only: false })
    .await
    .unwrap();
  assert_eq!(all.len(), 3);

  let unplayed = s
    .puzzles_page(PuzzlePage { after: Some("p1".into()), limit: 10, unplayed_only: true })
    .await
    .unwrap();
  assert_eq!(ids(unplayed.iter().map(|p| &p.id)), ["p3"]);
}

#[tokio::test]
async fn vote_updates() {
  let s = store().await;
  s.insert_puzzles(vec![puzzle("p1", 1, 1500.0)]).await.unwrap();

  let updated = s
    .update_votes(vec![
      VoteUpdate { id: "p1".into(), tally: VoteTally::seeded(-10) },
      VoteUpdate { id: "gone".into(), tally: VoteTally::seeded(2) },
    ])
    .await
    .unwrap();
  assert_eq!(updated, 1);

  let p1 = s.get_puzzle("p1".into()).await.unwrap().unwrap();
  assert_eq!((p1.vote_score, p1.vote_up, p1.vote_down), (-10, 0, 10));
}

#[tokio::test]
async fn player_updates_merge_themes() {
  let s = store().await;
  let mut p = puzzle("p1", 1, 1500.0);
  p.themes = vec!["fork".into(), "master".into()];
  s.insert_puzzles(vec![p]).await.unwrap();

  let updated = s
    .apply_player_updates(vec![PlayerUpdate {
      id:         "p1".into(),
      players:    vec!["alice".into(), "bob".into()],
      add_themes: vec!["master".into(), "masterVsMaster".into()],
    }])
    .await
    .unwrap();
  assert_eq!(updated, 1);

  let p1 = s.get_puzzle("p1".into()).await.unwrap().unwrap();
  assert_eq!(p1.themes, ["fork", "master", "masterVsMaster"]);
  assert_eq!(p1.players.as_deref(), Some(&["alice".to_owned(), "bob".to_owned()][..]));
}

#[tokio::test]
async fn accepted_pool_applies_threshold_and_theme() {
  let s = store().await;
  let mut fork = puzzle("p1", 5, 1400.0);
  fork.themes = vec!["fork".into()];
  let mut rejected_fork = puzzle("p2", -150, 1500.0);
  rejected_fork.themes = vec!["fork".into()];
  s.insert_puzzles(vec![fork, rejected_fork, puzzle("p3", -100, 1600.0), puzzle("p4", 0, 1700.0)])
    .await
    .unwrap();

  let mut all = s.accepted_pool(-100, None).await.unwrap();
  all.sort_by(|a, b| a.id.cmp(&b.id));
  assert_eq!(ids(all.iter().map(|e| &e.id)), ["p1", "p4"]);
  assert_eq!(all[0].vote, 5);
  assert_eq!(all[0].rating, 1400.0);

  let forks = s.accepted_pool(-100, Some("fork".into())).await.unwrap();
  assert_eq!(ids(forks.iter().map(|e| &e.id)), ["p1"]);
}

#[tokio::test]
async fn deleting_puzzles_is_idempotent() {
  let s = store().await;
  s.insert_puzzles(vec![puzzle("p1", 1, 1500.0)]).await.unwrap();
  assert_eq!(s.delete_puzzles(vec!["p1".into()]).await.unwrap(), 1);
  assert_eq!(s.delete_puzzles(vec!["p1".into()]).await.unwrap(), 0);
  assert_eq!(s.puzzle_count().await.unwrap(), 0);
}

// ─── Blocklist ───────────────────────────────────────────────────────────────

fn revision(size: usize, added: usize, removed: usize) -> BlocklistRevision {
  BlocklistRevision {
    revision_id: Uuid::new_v4(),
    loaded_at: Utc::now(),
    source: "blocklist.txt".into(),
    digest: "00".into(),
    size,
    added,
    removed,
  }
}

#[tokio::test]
async fn blocklist_replace_and_history() {
  let s = store().await;
  assert!(s.blocklist().await.unwrap().is_empty());

  let first = revision(2, 2, 0);
  s.replace_blocklist(Blocklist::parse("a b"), first.clone()).await.unwrap();
  let second = revision(2, 1, 1);
  s.replace_blocklist(Blocklist::parse("b c"), second.clone()).await.unwrap();

  assert_eq!(s.blocklist().await.unwrap(), Blocklist::parse("c b"));

  let history = s.blocklist_revisions().await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].revision_id, second.revision_id);
  assert_eq!(history[1].revision_id, first.revision_id);
  assert_eq!((history[0].added, history[0].removed), (1, 1));
}

// ─── Paths ───────────────────────────────────────────────────────────────────

fn path(id: &str, tier: &str, theme: Option<&str>, generation: &Generation) -> PuzzlePath {
  PuzzlePath {
    id:         id.into(),
    tier:       tier.into(),
    theme:      theme.map(str::to_owned),
    rating_min: 1500.0,
    rating_max: 9999.0,
    puzzle_ids: vec!["p1".into(), "p2".into()],
    length:     2,
    generation: generation.id,
  }
}

#[tokio::test]
async fn staged_paths_are_invisible_until_published() {
  let s = store().await;
  let generation = Generation::new();

  let staged = s
    .stage_paths(generation, vec![path("x1", "all", None, &generation)])
    .await
    .unwrap();
  assert_eq!(staged, 1);
  let staged = s
    .stage_paths(generation, vec![path("x2", "top", Some("fork"), &generation)])
    .await
    .unwrap();
  assert_eq!(staged, 2);

  assert!(s.list_paths(PathFilter::default()).await.unwrap().is_empty());
  assert!(s.live_generation().await.unwrap().is_none());

  assert_eq!(s.publish_generation(generation.id).await.unwrap(), 2);
  let live = s.list_paths(PathFilter::default()).await.unwrap();
  assert_eq!(live.len(), 2);
  assert!(live.contains(&path("x1", "all", None, &generation)));

  let info = s.live_generation().await.unwrap().unwrap();
  assert_eq!(info.generation.id, generation.id);
  assert_eq!(info.path_count, 2);
}

#[tokio::test]
async fn publishing_replaces_the_previous_generation() {
  let s = store().await;
  let old = Generation::new();
  s.stage_paths(old, vec![path("old1", "all", None, &old), path("old2", "all", None, &old)])
    .await
    .unwrap();
  s.publish_generation(old.id).await.unwrap();

  let new = Generation::new();
  s.stage_paths(new, vec![path("new1", "all", None, &new)]).await.unwrap();
  // Still the old catalog while the new one is staged.
  assert_eq!(s.list_paths(PathFilter::default()).await.unwrap().len(), 2);

  assert_eq!(s.publish_generation(new.id).await.unwrap(), 1);
  let live = s.list_paths(PathFilter::default()).await.unwrap();
  assert_eq!(ids(live.iter().map(|p| &p.id)), ["new1"]);
  assert_eq!(s.live_generation().await.unwrap().unwrap().generation.id, new.id);

  // Publishing again is a no-op.
  assert_eq!(s.publish_generation(new.id).await.unwrap(), 1);
}

#[tokio::test]
async fn abandoned_staging_is_discarded() {
  let s = store().await;
  let abandoned = Generation::new();
  s.stage_paths(abandoned, vec![path("a1", "all", None, &abandoned)])
    .await
    .unwrap();

  let next = Generation::new();
  assert_eq!(s.stage_paths(next, Vec::new()).await.unwrap(), 0);
  assert!(matches!(
    s.publish_generation(abandoned.id).await,
    Err(Error::UnknownGeneration(id)) if id == abandoned.id
  ));

  // An empty generation still goes live.
  assert_eq!(s.publish_generation(next.id).await.unwrap(), 0);
  assert_eq!(s.live_generation().await.unwrap().unwrap().path_count, 0);
}

#[tokio::test]
async fn list_paths_filters_by_tier_and_theme() {
  let s = store().await;
  let g = Generation::new();
  s.stage_paths(g, vec![
    path("n-all", "all", None, &g),
    path("n-top", "top", None, &g),
    path("f-all", "all", Some("fork"), &g),
  ])
  .await
  .unwrap();
  s.publish_generation(g.id).await.unwrap();

  let all_tier = s
    .list_paths(PathFilter { tier: Some("all".into()), theme: None })
    .await
    .unwrap();
  assert_eq!(all_tier.len(), 2);

  let themeless = s
    .list_paths(PathFilter { tier: None, theme: Some(None) })
    .await
    .unwrap();
  assert!(themeless.iter().all(|p| p.theme.is_none()));
  assert_eq!(themeless.len(), 2);

  let forks = s
    .list_paths(PathFilter { tier: Some("all".into()), theme: Some(Some("fork".into())) })
    .await
    .unwrap();
  assert_eq!(ids(forks.iter().map(|p| &p.id)), ["f-all"]);
}

#[tokio::test]
async fn unknown_generation_cannot_be_published() {
  let s = store().await;
  let id = Uuid::new_v4();
  assert!(matches!(
    s.publish_generation(id).await,
    Err(Error::UnknownGeneration(got)) if got == id
  ));
}
