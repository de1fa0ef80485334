//! Editor session facade.
//!
//! One `EditorSession` per tab. The surface feeds it field changes, focus
//! events, and an online signal; the session wires the local cache, the
//! save scheduler, the draft store, the tab lease, and the restore and
//! conflict flows together, and reports a single [`SaveStatus`] back.
//!
//! The session is single-threaded and cooperative: nothing here spawns a
//! thread or blocks. The surface calls [`EditorSession::poll`] on its own
//! tick (or after events), and the session does whatever work is due.

use std::fmt;
use std::sync::Arc;

use vellum_core::clock::Clock;
use vellum_core::config::EngineConfig;
use vellum_core::ids::{DraftId, SessionId, SnapshotId};
use vellum_core::ledger::HistoryTarget;
use vellum_core::model::{Draft, DraftFields, SnapshotReason, VersionSnapshot};
use vellum_core::store::{DiscardTarget, DraftStore, PushOutcome, PushRequest, StoreError};

use crate::cache::{CachedDraft, DraftCache};
use crate::conflict::{ConflictChoice, ConflictKind, ConflictState};
use crate::lease::LeaseSlot;
use crate::restore::{RestoreCandidate, RestoreDecision, RestorePrompt, select_candidate};
use crate::scheduler::{PushCompletion, PushTrigger, SaveScheduler, SchedulerEvent};
use crate::tabs::TabCoordinator;

/// Save state shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    SavedAt(i64),
    Offline,
    Conflict,
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Saving => f.write_str("saving"),
            Self::SavedAt(ts) => write!(f, "saved-at:{ts}"),
            Self::Offline => f.write_str("offline"),
            Self::Conflict => f.write_str("conflict"),
        }
    }
}

/// An authenticated identity plus its store connection.
pub struct StoreHandle {
    pub store: DraftStore,
    pub owner_id: String,
}

/// Errors surfaced to the editor. Everything here is recoverable; the
/// session stays usable after any of them.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The operation needs an attached store (authenticated identity).
    #[error("no draft store attached (unauthenticated session)")]
    NotAuthenticated,

    /// The operation needs visible content and the draft has none.
    #[error("draft has no content")]
    NoContent,

    /// A sync conflict is pending; reconcile it first.
    #[error("a sync conflict is pending; reconcile before continuing")]
    ConflictPending,

    /// Store-side failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One editor session (one tab).
pub struct EditorSession {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    cache: Box<dyn DraftCache>,
    lease: Box<dyn LeaseSlot>,
    store: Option<StoreHandle>,
    scheduler: SaveScheduler,
    coordinator: TabCoordinator,
    online: bool,
    session_id: SessionId,
    draft_id: Option<DraftId>,
    version: Option<u64>,
    fields: DraftFields,
    conflict: Option<ConflictState>,
    last_saved_at_ms: Option<i64>,
    prompt: Option<RestorePrompt>,
}

impl EditorSession {
    /// Open a session: read both caches, run candidate selection, and claim
    /// the tab lease. If a restore prompt is returned (via
    /// [`EditorSession::restore_prompt`]), the surface must resolve it
    /// before accepting input.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookup at load fails. Local-cache and
    /// lease problems never fail an open.
    pub fn open(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        cache: Box<dyn DraftCache>,
        lease: Box<dyn LeaseSlot>,
        store: Option<StoreHandle>,
        online: bool,
    ) -> Result<Self, EngineError> {
        let now_ms = clock.now_ms();

        let local = cache.read();
        let session_id = local
            .as_ref()
            .map_or_else(SessionId::generate, |entry| entry.session_id.clone());

        let server = match (&store, online) {
            (Some(handle), true) => {
                if local.is_some() {
                    handle
                        .store
                        .latest_for_session(&handle.owner_id, &session_id)?
                        .auto
                } else {
                    // No local state (fresh device): find the newest AUTO
                    // slot for this identity instead.
                    handle.store.latest_auto_for_owner(&handle.owner_id)?
                }
            }
            _ => None,
        };

        let prompt = select_candidate(
            local,
            server,
            now_ms,
            config.restore.local_freshness_ms,
        )
        .map(|candidate| RestorePrompt {
            age_ms: now_ms.saturating_sub(candidate.saved_at_ms()),
            candidate,
        });

        let scheduler = SaveScheduler::new(&config.save, now_ms);
        let mut coordinator = TabCoordinator::new(&config.lease);
        coordinator.on_load(lease.as_ref(), now_ms);

        Ok(Self {
            config,
            clock,
            cache,
            lease,
            store,
            scheduler,
            coordinator,
            online,
            session_id,
            draft_id: None,
            version: None,
            fields: DraftFields::default(),
            conflict: None,
            last_saved_at_ms: None,
            prompt,
        })
    }

    // -----------------------------------------------------------------------
    // Restore workflow
    // -----------------------------------------------------------------------

    /// The pending restore prompt, if candidate selection found one.
    #[must_use]
    pub const fn restore_prompt(&self) -> Option<&RestorePrompt> {
        self.prompt.as_ref()
    }

    /// Resolve the restore prompt. A no-op when no prompt is pending.
    ///
    /// # Errors
    ///
    /// Returns an error if a store call made on behalf of the decision
    /// fails; the prompt is consumed either way.
    pub fn resolve_restore(&mut self, decision: RestoreDecision) -> Result<(), EngineError> {
        let Some(prompt) = self.prompt.take() else {
            return Ok(());
        };
        let now_ms = self.clock.now_ms();

        match decision {
            RestoreDecision::Restore => match prompt.candidate {
                RestoreCandidate::Local(entry) => {
                    self.fields = entry.fields;
                    self.draft_id = entry.draft_id;
                    self.version = entry.version;
                }
                RestoreCandidate::Server(draft) => {
                    self.session_id = draft.session_id.clone();
                    self.draft_id = Some(draft.draft_id.clone());
                    self.version = Some(draft.version);
                    self.fields = draft.fields;

                    if let Some(handle) = &self.store {
                        if let Err(error) = handle.store.touch_opened(&draft.draft_id, now_ms) {
                            tracing::warn!(%error, "failed to stamp draft as opened");
                        }
                    }
                    self.write_cache(now_ms);
                }
            },
            RestoreDecision::KeepForLater => {
                // Leave both caches untouched; offered again next load.
            }
            RestoreDecision::Discard => {
                if self.draft_id.is_none() {
                    self.draft_id = match &prompt.candidate {
                        RestoreCandidate::Local(entry) => entry.draft_id.clone(),
                        RestoreCandidate::Server(draft) => Some(draft.draft_id.clone()),
                    };
                }
                self.discard_draft()?;
            }
        }

        Ok(())
    }

    /// Discard the AUTO lineage: remove the slot store-side (when known),
    /// clear the local cache, and rotate the session id so a brand-new
    /// lineage begins.
    ///
    /// # Errors
    ///
    /// Returns an error if the store delete fails; local state is rotated
    /// regardless.
    pub fn discard_draft(&mut self) -> Result<(), EngineError> {
        let result = match (&mut self.store, &self.draft_id) {
            (Some(handle), Some(draft_id)) => handle
                .store
                .discard(DiscardTarget::Draft(draft_id))
                .map(|_| ())
                .map_err(EngineError::from),
            (Some(handle), None) => handle
                .store
                .discard(DiscardTarget::Session {
                    owner_id: &handle.owner_id,
                    session_id: &self.session_id,
                })
                .map(|_| ())
                .map_err(EngineError::from),
            (None, _) => Ok(()),
        };

        self.cache.clear();
        self.session_id = SessionId::generate();
        self.draft_id = None;
        self.version = None;
        self.fields = DraftFields::default();
        self.conflict = None;
        self.last_saved_at_ms = None;
        self.scheduler.resume_pushes();

        result
    }

    // -----------------------------------------------------------------------
    // Edit stream
    // -----------------------------------------------------------------------

    /// A document change from the surface. Writes the local cache
    /// immediately and (re)arms the debounce window.
    pub fn on_change(&mut self, fields: DraftFields) {
        if self.prompt.is_some() {
            // The surface is supposed to resolve the prompt before input.
            // Typing anyway reads as a dismissal — never a silent restore.
            tracing::warn!("edit before restore prompt resolved; dismissing prompt");
            self.prompt = None;
        }

        let now_ms = self.clock.now_ms();
        self.fields = fields;
        self.write_cache(now_ms);
        self.scheduler.on_change(now_ms);
    }

    /// A field lost focus: push soon.
    pub fn on_blur(&mut self) {
        self.scheduler.on_blur();
        self.poll();
    }

    /// The tab was hidden: push soon.
    pub fn on_hide(&mut self) {
        self.scheduler.on_hide();
        self.poll();
    }

    /// The page is unloading. Writes the cache, fires one best-effort push
    /// whose outcome is deliberately not fed back (the page may be gone
    /// before it resolves — the local cache is the fallback of record),
    /// and releases the tab lease.
    pub fn on_unload(&mut self) {
        let now_ms = self.clock.now_ms();
        self.write_cache(now_ms);

        if self.can_push() {
            if let Some(handle) = &mut self.store {
                let request = PushRequest {
                    owner_id: &handle.owner_id,
                    session_id: &self.session_id,
                    draft_id: self.draft_id.as_ref(),
                    expected_version: self.version,
                    fields: &self.fields,
                    post_id: None,
                    reason: SnapshotReason::AutoInterval,
                    now_ms,
                };
                if let Err(error) = handle.store.push(&request) {
                    tracing::debug!(%error, "unload push failed; cache holds the content");
                }
            }
        }

        self.coordinator.on_unload(self.lease.as_ref());
    }

    /// Online/offline signal from the surface. While offline, pushes are
    /// skipped entirely; the next scheduled trigger after reconnecting
    /// pushes current state (no replay queue).
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    /// Advance timers and perform due work. Call on a tick or after events.
    pub fn poll(&mut self) -> SaveStatus {
        let now_ms = self.clock.now_ms();
        self.coordinator.poll(self.lease.as_ref(), now_ms);

        let can_push = self.can_push();
        for event in self.scheduler.poll(now_ms, can_push) {
            match event {
                SchedulerEvent::LocalSettled => {
                    self.last_saved_at_ms = Some(now_ms);
                }
                SchedulerEvent::PushDue(trigger) => {
                    self.perform_push(now_ms, trigger);
                }
            }
        }

        self.status()
    }

    // -----------------------------------------------------------------------
    // Conflict handling
    // -----------------------------------------------------------------------

    /// The unresolved conflict, if any.
    #[must_use]
    pub const fn conflict(&self) -> Option<&ConflictState> {
        self.conflict.as_ref()
    }

    /// Resolve the conflict banner. A no-op when no conflict is pending.
    ///
    /// # Errors
    ///
    /// Returns an error if `LoadLatest` fails to fetch the server draft;
    /// the conflict remains pending in that case.
    pub fn resolve_conflict(&mut self, choice: ConflictChoice) -> Result<(), EngineError> {
        let Some(conflict) = self.conflict.clone() else {
            return Ok(());
        };

        match choice {
            ConflictChoice::KeepEditing => {
                if let Some(state) = &mut self.conflict {
                    state.dismissed = true;
                }
            }
            ConflictChoice::LoadLatest => {
                let now_ms = self.clock.now_ms();
                let Some(handle) = &mut self.store else {
                    return Err(EngineError::NotAuthenticated);
                };

                match handle.store.get(&conflict.draft_id)? {
                    Some(draft) => {
                        self.session_id = draft.session_id.clone();
                        self.draft_id = Some(draft.draft_id.clone());
                        self.version = Some(draft.version);
                        self.fields = draft.fields;
                    }
                    None => {
                        // Discarded on the other side. Keep the user's
                        // editor content and begin a fresh lineage.
                        self.draft_id = None;
                        self.version = None;
                        self.session_id = SessionId::generate();
                    }
                }

                self.conflict = None;
                self.scheduler.resume_pushes();
                self.write_cache(now_ms);
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // History and lifecycle
    // -----------------------------------------------------------------------

    /// Version history for the current lineage, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAuthenticated`] without a store.
    pub fn history(&self) -> Result<Vec<VersionSnapshot>, EngineError> {
        let handle = self.store.as_ref().ok_or(EngineError::NotAuthenticated)?;
        let target = match &self.draft_id {
            Some(draft_id) => HistoryTarget::Draft(draft_id),
            None => HistoryTarget::Session(&self.session_id),
        };
        Ok(handle.store.history(target)?)
    }

    /// Roll the draft back to a snapshot's content and adopt the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the store restore fails.
    pub fn restore_snapshot(&mut self, snapshot_id: &SnapshotId) -> Result<(), EngineError> {
        let now_ms = self.clock.now_ms();
        let handle = self.store.as_mut().ok_or(EngineError::NotAuthenticated)?;

        let draft = handle.store.restore(snapshot_id, now_ms)?;
        self.draft_id = Some(draft.draft_id.clone());
        self.version = Some(draft.version);
        self.fields = draft.fields;
        self.write_cache(now_ms);
        Ok(())
    }

    /// Explicit "Save Draft": persist the current content as a named manual
    /// copy, independent of the AUTO lineage.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoContent`] for an empty draft and
    /// [`EngineError::NotAuthenticated`] without a store.
    pub fn save_draft_as(&mut self, name: &str) -> Result<DraftId, EngineError> {
        if self.store.is_none() {
            return Err(EngineError::NotAuthenticated);
        }
        if !self.fields.has_content() {
            return Err(EngineError::NoContent);
        }

        let now_ms = self.clock.now_ms();
        if self.draft_id.is_none() {
            self.ensure_synced(now_ms)?;
        }
        let draft_id = self.draft_id.clone().ok_or(EngineError::NoContent)?;

        let Some(handle) = &mut self.store else {
            return Err(EngineError::NotAuthenticated);
        };
        Ok(handle.store.promote_to_manual(&draft_id, name, now_ms)?)
    }

    /// Manual drafts for the authenticated owner, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAuthenticated`] without a store.
    pub fn manual_drafts(&self) -> Result<Vec<Draft>, EngineError> {
        let handle = self.store.as_ref().ok_or(EngineError::NotAuthenticated)?;
        Ok(handle.store.list_manual(&handle.owner_id)?)
    }

    /// Successful publish: final PUBLISH snapshot, AUTO slot torn down,
    /// local cache cleared, session rotated.
    ///
    /// # Errors
    ///
    /// Returns an error if the store teardown fails.
    pub fn publish(&mut self) -> Result<SnapshotId, EngineError> {
        if !self.fields.has_content() {
            return Err(EngineError::NoContent);
        }

        let now_ms = self.clock.now_ms();
        if self.draft_id.is_none() {
            self.ensure_synced(now_ms)?;
        }
        let draft_id = self.draft_id.clone().ok_or(EngineError::NoContent)?;

        let Some(handle) = &mut self.store else {
            return Err(EngineError::NotAuthenticated);
        };
        let snapshot_id = handle.store.publish(&draft_id, now_ms)?;

        self.cache.clear();
        self.session_id = SessionId::generate();
        self.draft_id = None;
        self.version = None;
        self.fields = DraftFields::default();
        self.last_saved_at_ms = None;

        Ok(snapshot_id)
    }

    // -----------------------------------------------------------------------
    // Surface queries
    // -----------------------------------------------------------------------

    /// Current save status.
    #[must_use]
    pub fn status(&self) -> SaveStatus {
        if self.conflict.is_some() {
            return SaveStatus::Conflict;
        }
        if self.store.is_some() && !self.online {
            return SaveStatus::Offline;
        }
        if self.scheduler.is_in_flight() {
            return SaveStatus::Saving;
        }
        match self.last_saved_at_ms {
            Some(ts) => SaveStatus::SavedAt(ts),
            None => SaveStatus::Idle,
        }
    }

    /// Whether another live tab holds the editing lease.
    #[must_use]
    pub fn edited_elsewhere(&self) -> bool {
        self.coordinator.edited_elsewhere()
    }

    /// A lease-slot change was observed (another tab wrote it): re-evaluate
    /// immediately instead of waiting for the next poll.
    pub fn notify_lease_changed(&mut self) {
        let now_ms = self.clock.now_ms();
        self.coordinator.reevaluate(self.lease.as_ref(), now_ms);
    }

    /// The current field bag.
    #[must_use]
    pub const fn fields(&self) -> &DraftFields {
        &self.fields
    }

    /// The current draft identity, if synced.
    #[must_use]
    pub const fn draft_id(&self) -> Option<&DraftId> {
        self.draft_id.as_ref()
    }

    /// The last store-confirmed version.
    #[must_use]
    pub const fn version(&self) -> Option<u64> {
        self.version
    }

    /// The current composition session id.
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Engine configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn can_push(&self) -> bool {
        self.online
            && self.store.is_some()
            && self.conflict.is_none()
            && self.fields.has_content()
    }

    fn write_cache(&mut self, now_ms: i64) {
        let entry = CachedDraft {
            fields: self.fields.clone(),
            session_id: self.session_id.clone(),
            draft_id: self.draft_id.clone(),
            version: self.version,
            saved_at_ms: now_ms,
        };
        self.cache.write(&entry);
    }

    fn perform_push(&mut self, now_ms: i64, trigger: PushTrigger) {
        let Some(handle) = &mut self.store else {
            self.scheduler.complete_push(PushCompletion::Failed);
            return;
        };

        let request = PushRequest {
            owner_id: &handle.owner_id,
            session_id: &self.session_id,
            draft_id: self.draft_id.as_ref(),
            expected_version: self.version,
            fields: &self.fields,
            post_id: None,
            reason: SnapshotReason::AutoInterval,
            now_ms,
        };

        match handle.store.push(&request) {
            Ok(PushOutcome::Accepted { draft_id, version }) => {
                self.draft_id = Some(draft_id);
                self.version = Some(version);
                self.last_saved_at_ms = Some(now_ms);
                self.scheduler.complete_push(PushCompletion::Accepted);
                self.write_cache(now_ms);
            }
            Ok(PushOutcome::Conflict {
                draft_id,
                server_version,
            }) => {
                self.conflict = Some(ConflictState::new(
                    draft_id,
                    ConflictKind::VersionBehind { server_version },
                    now_ms,
                ));
                self.scheduler.complete_push(PushCompletion::Conflicted);
            }
            Ok(PushOutcome::UnknownDraft { draft_id }) => {
                self.conflict = Some(ConflictState::new(
                    draft_id,
                    ConflictKind::DraftMissing,
                    now_ms,
                ));
                self.scheduler.complete_push(PushCompletion::Conflicted);
            }
            Err(error) => {
                tracing::warn!(code = %error.code(), %error, ?trigger, "draft push failed");
                self.scheduler.complete_push(PushCompletion::Failed);
            }
        }
    }

    fn ensure_synced(&mut self, now_ms: i64) -> Result<(), EngineError> {
        let Some(handle) = &mut self.store else {
            return Err(EngineError::NotAuthenticated);
        };

        let request = PushRequest {
            owner_id: &handle.owner_id,
            session_id: &self.session_id,
            draft_id: None,
            expected_version: None,
            fields: &self.fields,
            post_id: None,
            reason: SnapshotReason::AutoInterval,
            now_ms,
        };

        match handle.store.push(&request)? {
            PushOutcome::Accepted { draft_id, version } => {
                self.draft_id = Some(draft_id);
                self.version = Some(version);
                self.write_cache(now_ms);
                Ok(())
            }
            PushOutcome::Conflict {
                draft_id,
                server_version,
            } => {
                self.conflict = Some(ConflictState::new(
                    draft_id,
                    ConflictKind::VersionBehind { server_version },
                    now_ms,
                ));
                Err(EngineError::ConflictPending)
            }
            PushOutcome::UnknownDraft { draft_id } => {
                self.conflict = Some(ConflictState::new(
                    draft_id,
                    ConflictKind::DraftMissing,
                    now_ms,
                ));
                Err(EngineError::ConflictPending)
            }
        }
    }
}
