//! Canonical SQLite schema for the draft store.
//!
//! The schema is normalized for queryability and safe concurrent writers:
//! - `drafts` holds the live working copies, one row per draft
//! - a partial unique index enforces the single AUTO slot per
//!   (owner, session) pair
//! - `snapshots` is append-only; the FK clears `draft_id` instead of
//!   cascading so snapshots can outlive their draft
//! - `store_meta` tracks the applied schema version

/// Migration v1: drafts, snapshots, and store metadata.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS drafts (
    draft_id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL CHECK (length(trim(owner_id)) > 0),
    session_id TEXT NOT NULL CHECK (session_id LIKE 'ss-%'),
    kind TEXT NOT NULL CHECK (kind IN ('auto', 'manual')),
    name TEXT,
    title TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL DEFAULT '',
    excerpt TEXT NOT NULL DEFAULT '',
    meta_json TEXT NOT NULL DEFAULT '{}',
    version INTEGER NOT NULL CHECK (version >= 1),
    content_hash TEXT NOT NULL CHECK (content_hash LIKE 'blake3:%'),
    post_id TEXT,
    created_at_ms INTEGER NOT NULL,
    updated_at_ms INTEGER NOT NULL,
    last_opened_at_ms INTEGER NOT NULL,
    CHECK (draft_id LIKE 'dr-%'),
    CHECK ((kind = 'manual') = (name IS NOT NULL))
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_drafts_auto_slot
    ON drafts (owner_id, session_id)
    WHERE kind = 'auto';

CREATE UNIQUE INDEX IF NOT EXISTS idx_drafts_manual_name
    ON drafts (owner_id, name)
    WHERE kind = 'manual';

CREATE INDEX IF NOT EXISTS idx_drafts_owner_updated
    ON drafts (owner_id, kind, updated_at_ms);

CREATE TABLE IF NOT EXISTS snapshots (
    snapshot_id TEXT PRIMARY KEY,
    draft_id TEXT REFERENCES drafts(draft_id) ON DELETE SET NULL,
    session_id TEXT NOT NULL CHECK (session_id LIKE 'ss-%'),
    version_number INTEGER NOT NULL CHECK (version_number >= 1),
    reason TEXT NOT NULL CHECK (reason IN ('auto_interval', 'manual_save', 'publish', 'restore')),
    title TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL DEFAULT '',
    excerpt TEXT NOT NULL DEFAULT '',
    meta_json TEXT NOT NULL DEFAULT '{}',
    content_hash TEXT NOT NULL CHECK (content_hash LIKE 'blake3:%'),
    created_at_ms INTEGER NOT NULL,
    CHECK (snapshot_id LIKE 'sn-%')
);

CREATE INDEX IF NOT EXISTS idx_snapshots_draft_created
    ON snapshots (draft_id, created_at_ms);

CREATE INDEX IF NOT EXISTS idx_snapshots_session_created
    ON snapshots (session_id, created_at_ms);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
"#;

/// Indexes the store relies on; verified by migration tests.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_drafts_auto_slot",
    "idx_drafts_manual_name",
    "idx_drafts_owner_updated",
    "idx_snapshots_draft_created",
    "idx_snapshots_session_created",
];
