//! Restore/discard workflow: reconcile local and server state at editor
//! load into one user decision.
//!
//! Runs once, before the surface accepts input. Produces at most one
//! prompt; content is never loaded into the editor without the user
//! confirming it.

use vellum_core::model::Draft;

use crate::cache::CachedDraft;

/// What the prompt offers to bring back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreCandidate {
    /// The local cache slot (always available, authenticated or not).
    Local(CachedDraft),
    /// The AUTO draft from the store.
    Server(Draft),
}

impl RestoreCandidate {
    /// When the candidate's content was last written.
    #[must_use]
    pub const fn saved_at_ms(&self) -> i64 {
        match self {
            Self::Local(entry) => entry.saved_at_ms,
            Self::Server(draft) => draft.updated_at_ms,
        }
    }
}

/// The one decision the user makes before editing resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreDecision {
    /// Load the candidate into the editor and continue its lineage.
    Restore,
    /// Dismiss without loading or discarding; the candidate is offered
    /// again next time.
    KeepForLater,
    /// Drop the AUTO slot, clear the local cache, and start a fresh
    /// lineage under a new session id.
    Discard,
}

/// The prompt handed to the editor surface. The surface must resolve it
/// before accepting input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePrompt {
    pub candidate: RestoreCandidate,
    /// Age of the candidate at load time, for the prompt copy.
    pub age_ms: i64,
}

/// Pick the restore candidate, if any.
///
/// Local wins when it exists (the cache read already shape-checked it),
/// sits within the freshness window, and is at least as recent as the
/// server copy — or there is no server copy to compare against. Otherwise
/// the server AUTO draft is offered when it has content. No candidate
/// means editing starts blank with no prompt.
#[must_use]
pub fn select_candidate(
    local: Option<CachedDraft>,
    server: Option<Draft>,
    now_ms: i64,
    local_freshness_ms: i64,
) -> Option<RestoreCandidate> {
    let server = server.filter(|draft| draft.fields.has_content());

    if let Some(entry) = local {
        let age_ms = now_ms.saturating_sub(entry.saved_at_ms);
        let fresh = age_ms <= local_freshness_ms;
        let newest = server
            .as_ref()
            .is_none_or(|draft| entry.saved_at_ms >= draft.updated_at_ms);

        if fresh && newest {
            return Some(RestoreCandidate::Local(entry));
        }
    }

    server.map(RestoreCandidate::Server)
}
