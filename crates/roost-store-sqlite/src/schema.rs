//! SQL schema for the Roost SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per unit of durable work. The claim UPDATE in store.rs is the only
-- path from 'queued' to 'running'.
CREATE TABLE IF NOT EXISTS jobs (
    job_id       TEXT PRIMARY KEY,
    kind         TEXT NOT NULL,    -- discriminant of JobKind variant
    payload      TEXT NOT NULL,    -- JSON, opaque to the store
    status       TEXT NOT NULL DEFAULT 'queued',
    attempts     INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL DEFAULT 3,
    scheduled_at TEXT NOT NULL,    -- ISO 8601 UTC; eligibility gate
    started_at   TEXT,
    completed_at TEXT,
    last_error   TEXT,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    account_id     TEXT PRIMARY KEY,
    display_name   TEXT NOT NULL,
    retention_days INTEGER NOT NULL DEFAULT 90,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pages (
    page_id          TEXT PRIMARY KEY,
    account_id       TEXT NOT NULL REFERENCES accounts(account_id),
    external_id      TEXT NOT NULL,  -- the platform's own page id
    platform         TEXT NOT NULL,
    name             TEXT NOT NULL,
    encrypted_token  TEXT NOT NULL,  -- vault envelope; never plaintext
    token_expires_at TEXT,
    is_active        INTEGER NOT NULL DEFAULT 1,
    connected_at     TEXT NOT NULL,
    UNIQUE (external_id, platform)
);

CREATE TABLE IF NOT EXISTS posts (
    post_id       TEXT PRIMARY KEY,
    page_id       TEXT NOT NULL REFERENCES pages(page_id),
    external_id   TEXT NOT NULL,
    platform      TEXT NOT NULL,
    message       TEXT NOT NULL DEFAULT '',
    permalink     TEXT,
    posted_at     TEXT NOT NULL,    -- platform timestamp, not fetch time
    comment_count INTEGER NOT NULL DEFAULT 0,
    fetched_at    TEXT NOT NULL,
    UNIQUE (external_id, platform)
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id  TEXT PRIMARY KEY,
    post_id     TEXT NOT NULL REFERENCES posts(post_id),
    external_id TEXT NOT NULL,
    platform    TEXT NOT NULL,
    message     TEXT NOT NULL DEFAULT '',
    author_name TEXT,
    posted_at   TEXT NOT NULL,
    like_count  INTEGER NOT NULL DEFAULT 0,
    fetched_at  TEXT NOT NULL,
    UNIQUE (external_id, platform)
);

-- At most one analysis per comment, enforced here rather than in handlers.
CREATE TABLE IF NOT EXISTS analyses (
    analysis_id     TEXT PRIMARY KEY,
    comment_id      TEXT NOT NULL REFERENCES comments(comment_id),
    sentiment       TEXT NOT NULL,  -- 'positive' | 'negative' | 'neutral'
    sentiment_score REAL NOT NULL,
    toxicity_score  REAL NOT NULL,
    language        TEXT NOT NULL,
    keywords        TEXT NOT NULL DEFAULT '[]',
    analyzed_at     TEXT NOT NULL,
    UNIQUE (comment_id)
);

CREATE INDEX IF NOT EXISTS jobs_claim_idx      ON jobs(status, scheduled_at);
CREATE INDEX IF NOT EXISTS jobs_kind_idx       ON jobs(kind);
CREATE INDEX IF NOT EXISTS pages_account_idx   ON pages(account_id);
CREATE INDEX IF NOT EXISTS posts_page_idx      ON posts(page_id);
CREATE INDEX IF NOT EXISTS posts_posted_idx    ON posts(posted_at);
CREATE INDEX IF NOT EXISTS comments_post_idx   ON comments(post_id);
CREATE INDEX IF NOT EXISTS comments_posted_idx ON comments(posted_at);

PRAGMA user_version = 1;
";
