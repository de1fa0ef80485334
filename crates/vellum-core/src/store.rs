//! Canonical draft store with optimistic concurrency.
//!
//! One row per draft; the `version` counter is the sole arbiter of races
//! between concurrent writers (tabs, devices). The check-and-bump is a
//! single `UPDATE … WHERE draft_id = ?1 AND version = ?2` — never a read
//! followed by a write — so two pushers holding the same version can never
//! both win. The loser gets a [`PushOutcome::Conflict`] and the stored
//! content is left untouched; resolution is the caller's (and ultimately
//! the user's) decision.
//!
//! Transactions run `BEGIN IMMEDIATE` so a writer holds the write lock from
//! the first statement; combined with the partial unique index on the AUTO
//! slot this also serializes two sessions racing to create the slot.

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::Path;

use crate::config::HistoryConfig;
use crate::error::ErrorCode;
use crate::hash::content_hash;
use crate::ids::{DraftId, SessionId, SnapshotId};
use crate::ledger::{HistoryTarget, Ledger, SnapshotWrite};
use crate::model::{Draft, DraftFields, DraftKind, SnapshotReason, VersionSnapshot};

const DRAFT_COLUMNS: &str = "draft_id, owner_id, session_id, kind, name, title, body, excerpt, \
     meta_json, version, content_hash, post_id, created_at_ms, updated_at_ms, last_opened_at_ms";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from draft store operations.
///
/// A version mismatch is *not* an error — it is the [`PushOutcome::Conflict`]
/// variant, because rejection is an expected outcome the engine must route
/// to the user, not a fault.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced draft does not exist.
    #[error("draft {draft_id} not found")]
    DraftNotFound { draft_id: DraftId },

    /// The referenced snapshot does not exist.
    #[error("snapshot {snapshot_id} not found")]
    SnapshotNotFound { snapshot_id: SnapshotId },

    /// The snapshot exists but its draft lineage was torn down; it cannot
    /// be restored in place.
    #[error("snapshot {snapshot_id} no longer has a live draft")]
    OrphanedSnapshot { snapshot_id: SnapshotId },

    /// A stored row failed to decode.
    #[error("stored row is corrupt: {detail}")]
    CorruptRow { detail: String },

    /// Stored meta fields failed to decode as JSON.
    #[error("stored meta fields are not valid JSON: {0}")]
    MetaDecode(#[from] serde_json::Error),

    /// Underlying SQLite failure.
    #[error("draft store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DraftNotFound { .. } => ErrorCode::DraftNotFound,
            Self::SnapshotNotFound { .. } => ErrorCode::SnapshotNotFound,
            Self::OrphanedSnapshot { .. } => ErrorCode::OrphanedSnapshot,
            Self::CorruptRow { .. } | Self::MetaDecode(_) => ErrorCode::InternalUnexpected,
            Self::Sqlite(_) => ErrorCode::StoreWriteFailed,
        }
    }
}

// ---------------------------------------------------------------------------
// Push request/outcome
// ---------------------------------------------------------------------------

/// One push from a session: the content to persist plus the identity and
/// version the caller last observed.
#[derive(Debug, Clone, Copy)]
pub struct PushRequest<'a> {
    pub owner_id: &'a str,
    pub session_id: &'a SessionId,
    /// Absent on the first push of a session; the AUTO slot is created (or
    /// rolled) for (`owner_id`, `session_id`).
    pub draft_id: Option<&'a DraftId>,
    /// Version the caller last observed. Absent means the caller has never
    /// seen a store response; such writes are accepted (the store cannot
    /// distinguish a first push from a retry after a lost response).
    pub expected_version: Option<u64>,
    pub fields: &'a DraftFields,
    /// Published-post lineage pointer, persisted verbatim when present.
    pub post_id: Option<&'a str>,
    /// Reason recorded on the ledger when the write is accepted.
    pub reason: SnapshotReason,
    pub now_ms: i64,
}

/// Result of a push. Conflict and unknown-draft are outcomes, not errors:
/// the store rejected the write and changed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Write accepted; continue the lineage from the returned version.
    Accepted { draft_id: DraftId, version: u64 },
    /// Another writer pushed since this caller last synced. Stored content
    /// was not overwritten.
    Conflict { draft_id: DraftId, server_version: u64 },
    /// The draft id is no longer recognized (discarded in a concurrent
    /// session). The caller's conflict handling engages.
    UnknownDraft { draft_id: DraftId },
}

/// Which AUTO slot to discard.
#[derive(Debug, Clone, Copy)]
pub enum DiscardTarget<'a> {
    Draft(&'a DraftId),
    Session {
        owner_id: &'a str,
        session_id: &'a SessionId,
    },
}

/// Latest drafts for a session: the AUTO slot and the most recent manual
/// copy, either of which may be absent.
#[derive(Debug, Clone, Default)]
pub struct SessionDrafts {
    pub auto: Option<Draft>,
    pub manual: Option<Draft>,
}

// ---------------------------------------------------------------------------
// DraftStore
// ---------------------------------------------------------------------------

/// Connection-owning store facade.
pub struct DraftStore {
    conn: Connection,
    keep_auto: u32,
}

impl DraftStore {
    /// Open (or create) a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, history: &HistoryConfig) -> anyhow::Result<Self> {
        let conn = crate::db::open_store_db(path).context("open draft store")?;
        Ok(Self {
            conn,
            keep_auto: history.keep_auto,
        })
    }

    /// Open an in-memory store (tests, anonymous local-only operation).
    ///
    /// # Errors
    ///
    /// Returns an error if migration fails.
    pub fn open_in_memory(history: &HistoryConfig) -> anyhow::Result<Self> {
        let conn = crate::db::open_store_in_memory()?;
        Ok(Self {
            conn,
            keep_auto: history.keep_auto,
        })
    }

    /// Push content for a session. See [`PushRequest`] and [`PushOutcome`].
    ///
    /// The version check and increment happen in one SQL statement inside an
    /// immediate transaction; a rejected push leaves stored content and
    /// version untouched. Accepted pushes record a ledger snapshot
    /// (hash-gated for periodic reasons).
    ///
    /// # Errors
    ///
    /// Returns an error only for store faults; version mismatches are
    /// reported through the outcome.
    pub fn push(&mut self, request: &PushRequest<'_>) -> Result<PushOutcome, StoreError> {
        let hash = content_hash(request.fields);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let outcome = match request.draft_id {
            Some(draft_id) => push_existing(&tx, request, draft_id, &hash)?,
            None => push_auto_slot(&tx, request, &hash)?,
        };

        if let PushOutcome::Accepted { draft_id, version } = &outcome {
            let ledger = Ledger::new(&tx, self.keep_auto);
            ledger.record(
                &SnapshotWrite {
                    draft_id,
                    session_id: request.session_id,
                    version: *version,
                    fields: request.fields,
                    content_hash: &hash,
                },
                request.reason,
                request.now_ms,
            )?;
        }

        tx.commit()?;

        match &outcome {
            PushOutcome::Accepted { draft_id, version } => {
                tracing::debug!(draft_id = %draft_id, version, "push accepted");
            }
            PushOutcome::Conflict {
                draft_id,
                server_version,
            } => {
                tracing::info!(
                    draft_id = %draft_id,
                    server_version,
                    expected = ?request.expected_version,
                    "push rejected: version conflict"
                );
            }
            PushOutcome::UnknownDraft { draft_id } => {
                tracing::info!(draft_id = %draft_id, "push rejected: draft no longer exists");
            }
        }

        Ok(outcome)
    }

    /// Fetch one draft by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub fn get(&self, draft_id: &DraftId) -> Result<Option<Draft>, StoreError> {
        let sql = format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE draft_id = ?1");
        let raw = self
            .conn
            .query_row(&sql, [draft_id.as_str()], raw_draft_from_row)
            .optional()?;
        raw.map(RawDraft::into_draft).transpose()
    }

    /// The AUTO slot and latest manual draft for a session. Used by the
    /// restore workflow at editor load.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a row is corrupt.
    pub fn latest_for_session(
        &self,
        owner_id: &str,
        session_id: &SessionId,
    ) -> Result<SessionDrafts, StoreError> {
        let auto_sql = format!(
            "SELECT {DRAFT_COLUMNS} FROM drafts
             WHERE owner_id = ?1 AND session_id = ?2 AND kind = 'auto'"
        );
        let auto = self
            .conn
            .query_row(
                &auto_sql,
                params![owner_id, session_id.as_str()],
                raw_draft_from_row,
            )
            .optional()?
            .map(RawDraft::into_draft)
            .transpose()?;

        let manual_sql = format!(
            "SELECT {DRAFT_COLUMNS} FROM drafts
             WHERE owner_id = ?1 AND session_id = ?2 AND kind = 'manual'
             ORDER BY updated_at_ms DESC, rowid DESC
             LIMIT 1"
        );
        let manual = self
            .conn
            .query_row(
                &manual_sql,
                params![owner_id, session_id.as_str()],
                raw_draft_from_row,
            )
            .optional()?
            .map(RawDraft::into_draft)
            .transpose()?;

        Ok(SessionDrafts { auto, manual })
    }

    /// The most recently updated AUTO draft for an owner, across sessions.
    /// Used at load on a device with no local state, where no session id is
    /// known yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub fn latest_auto_for_owner(&self, owner_id: &str) -> Result<Option<Draft>, StoreError> {
        let sql = format!(
            "SELECT {DRAFT_COLUMNS} FROM drafts
             WHERE owner_id = ?1 AND kind = 'auto'
             ORDER BY updated_at_ms DESC, rowid DESC
             LIMIT 1"
        );
        let raw = self
            .conn
            .query_row(&sql, [owner_id], raw_draft_from_row)
            .optional()?;
        raw.map(RawDraft::into_draft).transpose()
    }

    /// All manual drafts for an owner, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub fn list_manual(&self, owner_id: &str) -> Result<Vec<Draft>, StoreError> {
        let sql = format!(
            "SELECT {DRAFT_COLUMNS} FROM drafts
             WHERE owner_id = ?1 AND kind = 'manual'
             ORDER BY updated_at_ms DESC, rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([owner_id], raw_draft_from_row)?;

        let mut drafts = Vec::new();
        for row in rows {
            drafts.push(row?.into_draft()?);
        }
        Ok(drafts)
    }

    /// Explicit "Save Draft": create or update the named manual copy of
    /// `source`. Does not consume the source's version lineage; the manual
    /// draft versions independently. Records a MANUAL_SAVE snapshot
    /// (hash-gated, so an unchanged re-save succeeds without growing
    /// history).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DraftNotFound`] if the source is gone.
    pub fn promote_to_manual(
        &mut self,
        source: &DraftId,
        name: &str,
        now_ms: i64,
    ) -> Result<DraftId, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let source_sql = format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE draft_id = ?1");
        let source_draft = tx
            .query_row(&source_sql, [source.as_str()], raw_draft_from_row)
            .optional()?
            .ok_or_else(|| StoreError::DraftNotFound {
                draft_id: source.clone(),
            })?
            .into_draft()?;

        let hash = content_hash(&source_draft.fields);
        let meta_json = serde_json::to_string(&source_draft.fields.meta)?;

        let existing: Option<(String, i64)> = tx
            .query_row(
                "SELECT draft_id, version FROM drafts
                 WHERE owner_id = ?1 AND kind = 'manual' AND name = ?2",
                params![source_draft.owner_id, name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (manual_id, version) = match existing {
            Some((id, version)) => {
                tx.execute(
                    "UPDATE drafts
                     SET title = ?1, body = ?2, excerpt = ?3, meta_json = ?4,
                         content_hash = ?5, version = version + 1, updated_at_ms = ?6
                     WHERE draft_id = ?7",
                    params![
                        source_draft.fields.title,
                        source_draft.fields.body,
                        source_draft.fields.excerpt,
                        meta_json,
                        hash,
                        now_ms,
                        id,
                    ],
                )?;
                (DraftId::new_unchecked(&id), u64::try_from(version).unwrap_or(0) + 1)
            }
            None => {
                let id = DraftId::generate();
                tx.execute(
                    "INSERT INTO drafts (
                        draft_id, owner_id, session_id, kind, name,
                        title, body, excerpt, meta_json, version, content_hash,
                        post_id, created_at_ms, updated_at_ms, last_opened_at_ms
                    ) VALUES (?1, ?2, ?3, 'manual', ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10, ?11, ?11, ?11)",
                    params![
                        id.as_str(),
                        source_draft.owner_id,
                        source_draft.session_id.as_str(),
                        name,
                        source_draft.fields.title,
                        source_draft.fields.body,
                        source_draft.fields.excerpt,
                        meta_json,
                        hash,
                        source_draft.post_id,
                        now_ms,
                    ],
                )?;
                (id, 1)
            }
        };

        let ledger = Ledger::new(&tx, self.keep_auto);
        ledger.record(
            &SnapshotWrite {
                draft_id: &manual_id,
                session_id: &source_draft.session_id,
                version,
                fields: &source_draft.fields,
                content_hash: &hash,
            },
            SnapshotReason::ManualSave,
            now_ms,
        )?;

        tx.commit()?;
        Ok(manual_id)
    }

    /// Remove the AUTO slot and its lineage snapshots. Manual drafts are
    /// unaffected. Discarding an already-absent slot is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn discard(&mut self, target: DiscardTarget<'_>) -> Result<bool, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let resolved: Option<String> = match target {
            DiscardTarget::Draft(draft_id) => tx
                .query_row(
                    "SELECT draft_id FROM drafts WHERE draft_id = ?1 AND kind = 'auto'",
                    [draft_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?,
            DiscardTarget::Session {
                owner_id,
                session_id,
            } => tx
                .query_row(
                    "SELECT draft_id FROM drafts
                     WHERE owner_id = ?1 AND session_id = ?2 AND kind = 'auto'",
                    params![owner_id, session_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?,
        };

        let Some(draft_id) = resolved else {
            tx.commit()?;
            return Ok(false);
        };

        let draft_id = DraftId::new_unchecked(&draft_id);
        let ledger = Ledger::new(&tx, self.keep_auto);
        ledger.delete_for_draft(&draft_id)?;
        tx.execute("DELETE FROM drafts WHERE draft_id = ?1", [draft_id.as_str()])?;
        tx.commit()?;

        tracing::info!(draft_id = %draft_id, "discarded auto draft and lineage");
        Ok(true)
    }

    /// Publish teardown: record the final PUBLISH snapshot, then remove the
    /// draft row. The FK clears `draft_id` on the lineage's snapshots, so
    /// history survives orphaned (still listable by session).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DraftNotFound`] if the draft is gone.
    pub fn publish(&mut self, draft_id: &DraftId, now_ms: i64) -> Result<SnapshotId, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sql = format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE draft_id = ?1");
        let draft = tx
            .query_row(&sql, [draft_id.as_str()], raw_draft_from_row)
            .optional()?
            .ok_or_else(|| StoreError::DraftNotFound {
                draft_id: draft_id.clone(),
            })?
            .into_draft()?;

        let hash = content_hash(&draft.fields);
        let ledger = Ledger::new(&tx, self.keep_auto);
        let snapshot_id = ledger
            .record(
                &SnapshotWrite {
                    draft_id,
                    session_id: &draft.session_id,
                    version: draft.version,
                    fields: &draft.fields,
                    content_hash: &hash,
                },
                SnapshotReason::Publish,
                now_ms,
            )?
            .ok_or_else(|| StoreError::CorruptRow {
                detail: "publish snapshot was unexpectedly gated".to_string(),
            })?;

        tx.execute("DELETE FROM drafts WHERE draft_id = ?1", [draft_id.as_str()])?;
        tx.commit()?;

        tracing::info!(draft_id = %draft_id, snapshot_id = %snapshot_id, "published draft torn down");
        Ok(snapshot_id)
    }

    /// History for a draft or session lineage, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub fn history(&self, target: HistoryTarget<'_>) -> Result<Vec<VersionSnapshot>, StoreError> {
        Ledger::new(&self.conn, self.keep_auto).list(target)
    }

    /// Roll a draft back to a snapshot's content.
    ///
    /// Forward history is preserved: the content *being replaced* is first
    /// recorded as a RESTORE snapshot (so rolling back is itself undoable),
    /// then the draft adopts the chosen snapshot's fields with the version
    /// lineage continuing forward from the current version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SnapshotNotFound`] or
    /// [`StoreError::OrphanedSnapshot`] when the snapshot or its draft is
    /// gone.
    pub fn restore(
        &mut self,
        snapshot_id: &SnapshotId,
        now_ms: i64,
    ) -> Result<Draft, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let ledger = Ledger::new(&tx, self.keep_auto);
        let snapshot = ledger.get(snapshot_id)?;

        let Some(draft_id) = snapshot.draft_id.clone() else {
            return Err(StoreError::OrphanedSnapshot {
                snapshot_id: snapshot_id.clone(),
            });
        };

        let sql = format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE draft_id = ?1");
        let current = tx
            .query_row(&sql, [draft_id.as_str()], raw_draft_from_row)
            .optional()?
            .ok_or_else(|| StoreError::OrphanedSnapshot {
                snapshot_id: snapshot_id.clone(),
            })?
            .into_draft()?;

        // Record what is about to be replaced. Never gated: restoring to
        // identical content still marks a restore point.
        let current_hash = content_hash(&current.fields);
        ledger.record(
            &SnapshotWrite {
                draft_id: &draft_id,
                session_id: &current.session_id,
                version: current.version,
                fields: &current.fields,
                content_hash: &current_hash,
            },
            SnapshotReason::Restore,
            now_ms,
        )?;

        let meta_json = serde_json::to_string(&snapshot.fields.meta)?;
        tx.execute(
            "UPDATE drafts
             SET title = ?1, body = ?2, excerpt = ?3, meta_json = ?4,
                 content_hash = ?5, version = version + 1, updated_at_ms = ?6
             WHERE draft_id = ?7",
            params![
                snapshot.fields.title,
                snapshot.fields.body,
                snapshot.fields.excerpt,
                meta_json,
                snapshot.content_hash,
                now_ms,
                draft_id.as_str(),
            ],
        )?;

        tx.commit()?;

        let new_version = current.version + 1;
        tracing::info!(
            draft_id = %draft_id,
            snapshot_id = %snapshot_id,
            version = new_version,
            "restored snapshot content"
        );

        Ok(Draft {
            fields: snapshot.fields,
            version: new_version,
            content_hash: snapshot.content_hash,
            updated_at_ms: now_ms,
            ..current
        })
    }

    /// Stamp a draft as opened (restore adoption, history panel).
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn touch_opened(&self, draft_id: &DraftId, now_ms: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE drafts SET last_opened_at_ms = ?1 WHERE draft_id = ?2",
            params![now_ms, draft_id.as_str()],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Push internals
// ---------------------------------------------------------------------------

fn push_existing(
    conn: &Connection,
    request: &PushRequest<'_>,
    draft_id: &DraftId,
    hash: &str,
) -> Result<PushOutcome, StoreError> {
    let meta_json = serde_json::to_string(&request.fields.meta)?;

    let changed = match request.expected_version {
        Some(expected) => conn.execute(
            "UPDATE drafts
             SET title = ?1, body = ?2, excerpt = ?3, meta_json = ?4,
                 content_hash = ?5, post_id = COALESCE(?6, post_id),
                 version = version + 1, updated_at_ms = ?7
             WHERE draft_id = ?8 AND version = ?9",
            params![
                request.fields.title,
                request.fields.body,
                request.fields.excerpt,
                meta_json,
                hash,
                request.post_id,
                request.now_ms,
                draft_id.as_str(),
                i64::try_from(expected).unwrap_or(i64::MAX),
            ],
        )?,
        // Absent version: accept if the draft exists at all.
        None => conn.execute(
            "UPDATE drafts
             SET title = ?1, body = ?2, excerpt = ?3, meta_json = ?4,
                 content_hash = ?5, post_id = COALESCE(?6, post_id),
                 version = version + 1, updated_at_ms = ?7
             WHERE draft_id = ?8",
            params![
                request.fields.title,
                request.fields.body,
                request.fields.excerpt,
                meta_json,
                hash,
                request.post_id,
                request.now_ms,
                draft_id.as_str(),
            ],
        )?,
    };

    if changed == 1 {
        let version = stored_version(conn, draft_id)?.ok_or_else(|| StoreError::CorruptRow {
            detail: format!("draft {draft_id} vanished mid-transaction"),
        })?;
        return Ok(PushOutcome::Accepted {
            draft_id: draft_id.clone(),
            version,
        });
    }

    match stored_version(conn, draft_id)? {
        Some(server_version) => Ok(PushOutcome::Conflict {
            draft_id: draft_id.clone(),
            server_version,
        }),
        None => Ok(PushOutcome::UnknownDraft {
            draft_id: draft_id.clone(),
        }),
    }
}

fn push_auto_slot(
    conn: &Connection,
    request: &PushRequest<'_>,
    hash: &str,
) -> Result<PushOutcome, StoreError> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT draft_id FROM drafts
             WHERE owner_id = ?1 AND session_id = ?2 AND kind = 'auto'",
            params![request.owner_id, request.session_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        // The slot exists but this caller never saw it (first push after a
        // lost response, or a second device joining the session). Accepted:
        // the caller carries no stale version to contradict.
        let draft_id = DraftId::new_unchecked(&id);
        return push_existing(
            conn,
            &PushRequest {
                draft_id: Some(&draft_id),
                expected_version: None,
                ..*request
            },
            &draft_id,
            hash,
        );
    }

    let draft_id = DraftId::generate();
    let meta_json = serde_json::to_string(&request.fields.meta)?;
    conn.execute(
        "INSERT INTO drafts (
            draft_id, owner_id, session_id, kind, name,
            title, body, excerpt, meta_json, version, content_hash,
            post_id, created_at_ms, updated_at_ms, last_opened_at_ms
        ) VALUES (?1, ?2, ?3, 'auto', NULL, ?4, ?5, ?6, ?7, 1, ?8, ?9, ?10, ?10, ?10)",
        params![
            draft_id.as_str(),
            request.owner_id,
            request.session_id.as_str(),
            request.fields.title,
            request.fields.body,
            request.fields.excerpt,
            meta_json,
            hash,
            request.post_id,
            request.now_ms,
        ],
    )?;

    Ok(PushOutcome::Accepted {
        draft_id,
        version: 1,
    })
}

fn stored_version(conn: &Connection, draft_id: &DraftId) -> Result<Option<u64>, StoreError> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM drafts WHERE draft_id = ?1",
            [draft_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.map(|v| u64::try_from(v).unwrap_or(0)))
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct RawDraft {
    draft_id: String,
    owner_id: String,
    session_id: String,
    kind: String,
    name: Option<String>,
    title: String,
    body: String,
    excerpt: String,
    meta_json: String,
    version: i64,
    content_hash: String,
    post_id: Option<String>,
    created_at_ms: i64,
    updated_at_ms: i64,
    last_opened_at_ms: i64,
}

impl RawDraft {
    fn into_draft(self) -> Result<Draft, StoreError> {
        let kind: DraftKind = self.kind.parse().map_err(|_| StoreError::CorruptRow {
            detail: format!("unknown draft kind '{}'", self.kind),
        })?;

        Ok(Draft {
            draft_id: DraftId::new_unchecked(&self.draft_id),
            owner_id: self.owner_id,
            session_id: SessionId::new_unchecked(&self.session_id),
            kind,
            name: self.name,
            fields: DraftFields {
                title: self.title,
                body: self.body,
                excerpt: self.excerpt,
                meta: serde_json::from_str(&self.meta_json)?,
            },
            version: u64::try_from(self.version).unwrap_or(0),
            content_hash: self.content_hash,
            post_id: self.post_id,
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.updated_at_ms,
            last_opened_at_ms: self.last_opened_at_ms,
        })
    }
}

fn raw_draft_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDraft> {
    Ok(RawDraft {
        draft_id: row.get(0)?,
        owner_id: row.get(1)?,
        session_id: row.get(2)?,
        kind: row.get(3)?,
        name: row.get(4)?,
        title: row.get(5)?,
        body: row.get(6)?,
        excerpt: row.get(7)?,
        meta_json: row.get(8)?,
        version: row.get(9)?,
        content_hash: row.get(10)?,
        post_id: row.get(11)?,
        created_at_ms: row.get(12)?,
        updated_at_ms: row.get(13)?,
        last_opened_at_ms: row.get(14)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
