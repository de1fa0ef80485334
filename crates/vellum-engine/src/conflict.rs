//! Sync conflict handling.
//!
//! A conflict means another writer — another tab or device — pushed a newer
//! version of this draft since we last synced. Silent retries stop the
//! moment it is detected; the user picks a direction. Neither side is ever
//! force-overwritten automatically.

use vellum_core::ids::DraftId;

/// Why the store rejected our push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The stored version is ahead of ours.
    VersionBehind { server_version: u64 },
    /// The draft id is no longer recognized (discarded elsewhere).
    DraftMissing,
}

/// An unresolved conflict the UI is surfacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictState {
    pub draft_id: DraftId,
    pub kind: ConflictKind,
    pub detected_at_ms: i64,
    /// The banner was dismissed ("Keep editing"); local edits continue but
    /// pushes stay disabled until the user reconciles.
    pub dismissed: bool,
}

impl ConflictState {
    #[must_use]
    pub const fn new(draft_id: DraftId, kind: ConflictKind, detected_at_ms: i64) -> Self {
        Self {
            draft_id,
            kind,
            detected_at_ms,
            dismissed: false,
        }
    }
}

/// The user's choice on the conflict banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Fetch the server's current draft, overwrite local editor state and
    /// cache with it, adopt its version, and resume syncing.
    LoadLatest,
    /// Dismiss the banner. Local edits stay in the editor and cache; pushes
    /// remain disabled until an explicit reconciliation.
    KeepEditing,
}
