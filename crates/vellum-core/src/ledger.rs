//! Version history ledger: append-only snapshots of draft content.
//!
//! Snapshots are immutable once written. The ledger never updates a row;
//! rolling back is itself recorded as a new RESTORE snapshot (see
//! [`crate::store::DraftStore::restore`]), so history only grows forward.
//!
//! # De-duplication
//!
//! AUTO_INTERVAL and MANUAL_SAVE writes are suppressed when the content
//! hash equals the latest snapshot for the draft — a steady autosave
//! heartbeat that has nothing new to record must not grow the history.
//! PUBLISH and RESTORE mark moments rather than content deltas and always
//! append.
//!
//! # Retention
//!
//! AUTO_INTERVAL snapshots are capped per draft (config
//! `history.keep_auto`); the oldest past the cap are evicted after each
//! accepted write. Other reasons are never pruned.

use rusqlite::{Connection, OptionalExtension, params};

use crate::ids::{DraftId, SessionId, SnapshotId};
use crate::model::{DraftFields, SnapshotReason, VersionSnapshot};
use crate::store::StoreError;

const SNAPSHOT_COLUMNS: &str = "snapshot_id, draft_id, session_id, version_number, reason, \
     title, body, excerpt, meta_json, content_hash, created_at_ms";

/// One snapshot write: the draft identity and content to record.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotWrite<'a> {
    pub draft_id: &'a DraftId,
    pub session_id: &'a SessionId,
    /// Draft version the content belongs to.
    pub version: u64,
    pub fields: &'a DraftFields,
    pub content_hash: &'a str,
}

/// Which lineage to list history for.
#[derive(Debug, Clone, Copy)]
pub enum HistoryTarget<'a> {
    Draft(&'a DraftId),
    /// Includes snapshots whose draft has been torn down (publish).
    Session(&'a SessionId),
}

/// Snapshot-table gateway. Borrows a connection so the store can run it
/// inside the same transaction as the draft write it records.
pub struct Ledger<'conn> {
    conn: &'conn Connection,
    keep_auto: u32,
}

impl<'conn> Ledger<'conn> {
    /// Create a ledger over an open store connection.
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(conn: &'conn Connection, keep_auto: u32) -> Self {
        Self { conn, keep_auto }
    }

    /// Record a snapshot, subject to hash gating and retention.
    ///
    /// Returns `Ok(None)` when the write was gated (unchanged content under
    /// a gated reason) — a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying insert or prune fails.
    pub fn record(
        &self,
        write: &SnapshotWrite<'_>,
        reason: SnapshotReason,
        now_ms: i64,
    ) -> Result<Option<SnapshotId>, StoreError> {
        if reason.is_hash_gated()
            && self.latest_hash(write.draft_id)?.as_deref() == Some(write.content_hash)
        {
            tracing::debug!(
                draft_id = %write.draft_id,
                reason = %reason,
                "snapshot gated: content unchanged"
            );
            return Ok(None);
        }

        let snapshot_id = SnapshotId::generate();
        let meta_json = serde_json::to_string(&write.fields.meta)?;

        self.conn.execute(
            "INSERT INTO snapshots (
                snapshot_id, draft_id, session_id, version_number, reason,
                title, body, excerpt, meta_json, content_hash, created_at_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                snapshot_id.as_str(),
                write.draft_id.as_str(),
                write.session_id.as_str(),
                i64::try_from(write.version).unwrap_or(i64::MAX),
                reason.to_string(),
                write.fields.title,
                write.fields.body,
                write.fields.excerpt,
                meta_json,
                write.content_hash,
                now_ms,
            ],
        )?;

        if reason == SnapshotReason::AutoInterval {
            self.prune_auto(write.draft_id)?;
        }

        Ok(Some(snapshot_id))
    }

    /// Content hash of the most recent snapshot for a draft, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn latest_hash(&self, draft_id: &DraftId) -> Result<Option<String>, StoreError> {
        let hash = self
            .conn
            .query_row(
                "SELECT content_hash FROM snapshots
                 WHERE draft_id = ?1
                 ORDER BY created_at_ms DESC, rowid DESC
                 LIMIT 1",
                [draft_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    /// All snapshots for a lineage, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored row is corrupt.
    pub fn list(&self, target: HistoryTarget<'_>) -> Result<Vec<VersionSnapshot>, StoreError> {
        let (filter, key) = match target {
            HistoryTarget::Draft(id) => ("draft_id = ?1", id.as_str()),
            HistoryTarget::Session(id) => ("session_id = ?1", id.as_str()),
        };

        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots
             WHERE {filter}
             ORDER BY created_at_ms DESC, rowid DESC"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([key], raw_snapshot_from_row)?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?.into_snapshot()?);
        }
        Ok(snapshots)
    }

    /// Fetch one snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SnapshotNotFound`] if absent.
    pub fn get(&self, snapshot_id: &SnapshotId) -> Result<VersionSnapshot, StoreError> {
        let sql = format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE snapshot_id = ?1");
        let raw = self
            .conn
            .query_row(&sql, [snapshot_id.as_str()], raw_snapshot_from_row)
            .optional()?
            .ok_or_else(|| StoreError::SnapshotNotFound {
                snapshot_id: snapshot_id.clone(),
            })?;
        raw.into_snapshot()
    }

    /// Delete every snapshot still referencing `draft_id`. Used by discard,
    /// which removes the whole lineage.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_for_draft(&self, draft_id: &DraftId) -> Result<usize, StoreError> {
        let deleted = self.conn.execute(
            "DELETE FROM snapshots WHERE draft_id = ?1",
            [draft_id.as_str()],
        )?;
        Ok(deleted)
    }

    fn prune_auto(&self, draft_id: &DraftId) -> Result<(), StoreError> {
        let evicted = self.conn.execute(
            "DELETE FROM snapshots
             WHERE draft_id = ?1 AND reason = 'auto_interval'
               AND snapshot_id NOT IN (
                 SELECT snapshot_id FROM snapshots
                 WHERE draft_id = ?1 AND reason = 'auto_interval'
                 ORDER BY created_at_ms DESC, rowid DESC
                 LIMIT ?2
               )",
            params![draft_id.as_str(), i64::from(self.keep_auto)],
        )?;

        if evicted > 0 {
            tracing::debug!(draft_id = %draft_id, evicted, "pruned auto-interval snapshots");
        }

        Ok(())
    }
}

/// Row image before meta-json decoding.
struct RawSnapshot {
    snapshot_id: String,
    draft_id: Option<String>,
    session_id: String,
    version_number: i64,
    reason: String,
    title: String,
    body: String,
    excerpt: String,
    meta_json: String,
    content_hash: String,
    created_at_ms: i64,
}

impl RawSnapshot {
    fn into_snapshot(self) -> Result<VersionSnapshot, StoreError> {
        let reason: SnapshotReason = self
            .reason
            .parse()
            .map_err(|_| StoreError::CorruptRow {
                detail: format!("unknown snapshot reason '{}'", self.reason),
            })?;

        Ok(VersionSnapshot {
            snapshot_id: SnapshotId::new_unchecked(&self.snapshot_id),
            draft_id: self.draft_id.as_deref().map(DraftId::new_unchecked),
            session_id: SessionId::new_unchecked(&self.session_id),
            version_number: u64::try_from(self.version_number).unwrap_or(0),
            reason,
            fields: DraftFields {
                title: self.title,
                body: self.body,
                excerpt: self.excerpt,
                meta: serde_json::from_str(&self.meta_json)?,
            },
            content_hash: self.content_hash,
            created_at_ms: self.created_at_ms,
        })
    }
}

fn raw_snapshot_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSnapshot> {
    Ok(RawSnapshot {
        snapshot_id: row.get(0)?,
        draft_id: row.get(1)?,
        session_id: row.get(2)?,
        version_number: row.get(3)?,
        reason: row.get(4)?,
        title: row.get(5)?,
        body: row.get(6)?,
        excerpt: row.get(7)?,
        meta_json: row.get(8)?,
        content_hash: row.get(9)?,
        created_at_ms: row.get(10)?,
    })
}
