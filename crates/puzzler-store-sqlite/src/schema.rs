//! SQL schema for the puzzler SQLite store.
//!
//! Executed once at connection startup. The version is recorded in
//! `PRAGMA user_version`; future migrations will be gated on it.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Build store: raw generator output.
CREATE TABLE IF NOT EXISTS candidates (
    id                TEXT PRIMARY KEY,
    source_game_id    TEXT NOT NULL UNIQUE,
    fen               TEXT NOT NULL,
    first_move        TEXT NOT NULL,
    moves             TEXT NOT NULL,   -- JSON array of UCI moves
    move_count        INTEGER NOT NULL,
    generator_tier    INTEGER NOT NULL,
    generator_version INTEGER NOT NULL,
    eval_signal       INTEGER NOT NULL,
    review_approved   INTEGER,         -- NULL = not reviewed
    UNIQUE (fen, first_move)
);

-- Serving store.
CREATE TABLE IF NOT EXISTS puzzles (
    id             TEXT PRIMARY KEY,
    source_game_id TEXT NOT NULL UNIQUE,
    fen            TEXT NOT NULL,
    first_move     TEXT NOT NULL,
    line           TEXT NOT NULL,
    themes         TEXT NOT NULL DEFAULT '[]',
    rating_r       REAL NOT NULL,
    rating_d       REAL NOT NULL,
    rating_v       REAL NOT NULL,
    vote_score     INTEGER NOT NULL,
    vote_up        INTEGER NOT NULL DEFAULT 0,
    vote_down      INTEGER NOT NULL DEFAULT 0,
    plays          INTEGER NOT NULL DEFAULT 0,
    eval_signal    INTEGER,
    players        TEXT,               -- JSON array or NULL
    UNIQUE (fen, first_move)
);

CREATE INDEX IF NOT EXISTS puzzles_vote_idx ON puzzles(vote_score);

CREATE TABLE IF NOT EXISTS blocklist (
    id TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS blocklist_revisions (
    revision_id TEXT PRIMARY KEY,
    loaded_at   TEXT NOT NULL,
    source      TEXT NOT NULL,
    digest      TEXT NOT NULL,
    size        INTEGER NOT NULL,
    added       INTEGER NOT NULL,
    removed     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS path_generations (
    generation_id TEXT PRIMARY KEY,
    created_at    TEXT NOT NULL,
    path_count    INTEGER NOT NULL,
    live          INTEGER NOT NULL DEFAULT 0
);

-- Live catalog. Only ever replaced wholesale inside one transaction.
CREATE TABLE IF NOT EXISTS paths (
    path_id       TEXT PRIMARY KEY,
    generation_id TEXT NOT NULL REFERENCES path_generations(generation_id),
    tier          TEXT NOT NULL,
    theme         TEXT NOT NULL,     -- 'none' for the theme-less catalog
    rating_min    REAL NOT NULL,
    rating_max    REAL NOT NULL,
    puzzle_ids    TEXT NOT NULL,     -- JSON array
    length        INTEGER NOT NULL
);

-- Same shape as `paths`; holds a generation until it is published.
CREATE TABLE IF NOT EXISTS paths_staging (
    path_id       TEXT PRIMARY KEY,
    generation_id TEXT NOT NULL REFERENCES path_generations(generation_id),
    tier          TEXT NOT NULL,
    theme         TEXT NOT NULL,
    rating_min    REAL NOT NULL,
    rating_max    REAL NOT NULL,
    puzzle_ids    TEXT NOT NULL,
    length        INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS paths_tier_theme_idx ON paths(tier, theme);

PRAGMA user_version = 1;
";
