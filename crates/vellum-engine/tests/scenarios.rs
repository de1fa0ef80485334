//! End-to-end session scenarios: reload recovery, unload pushes, two-tab
//! conflicts, and the restore/discard workflow.
//!
//! Sessions share state the way real tabs do — through the cache slot
//! file, the lease slot file, and the store database — and time only moves
//! when the test advances the manual clock.

use std::path::Path;
use std::sync::Arc;

use vellum_core::clock::{Clock, ManualClock};
use vellum_core::config::{EngineConfig, HistoryConfig};
use vellum_core::ids::SessionId;
use vellum_core::model::{DraftFields, SnapshotReason};
use vellum_core::store::DraftStore;
use vellum_engine::cache::FileCache;
use vellum_engine::conflict::{ConflictChoice, ConflictKind};
use vellum_engine::lease::FileLease;
use vellum_engine::restore::{RestoreCandidate, RestoreDecision};
use vellum_engine::session::{EditorSession, SaveStatus, StoreHandle};

const OWNER: &str = "author-1";
const HEARTBEAT_MS: i64 = 45_000;

fn fields(title: &str, body: &str) -> DraftFields {
    DraftFields {
        title: title.into(),
        body: body.into(),
        ..DraftFields::default()
    }
}

fn open_session(
    dir: &Path,
    clock: &Arc<ManualClock>,
    authenticated: bool,
    online: bool,
) -> EditorSession {
    let store = authenticated.then(|| StoreHandle {
        store: DraftStore::open(&dir.join("store.sqlite3"), &HistoryConfig::default())
            .expect("open store"),
        owner_id: OWNER.to_string(),
    });

    let clock: Arc<dyn Clock> = Arc::clone(clock) as Arc<dyn Clock>;
    EditorSession::open(
        EngineConfig::default(),
        clock,
        Box::new(FileCache::new(dir.join("cache.json"))),
        Box::new(FileLease::new(dir.join("lease.json"))),
        store,
        online,
    )
    .expect("open session")
}

fn inspect_store(dir: &Path) -> DraftStore {
    DraftStore::open(&dir.join("store.sqlite3"), &HistoryConfig::default()).expect("open store")
}

// ---------------------------------------------------------------------------
// Reload and unload safety
// ---------------------------------------------------------------------------

#[test]
fn unannounced_reload_inside_debounce_window_loses_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(1_000));

    let mut session = open_session(dir.path(), &clock, false, false);
    assert!(session.restore_prompt().is_none());

    let edited = fields("Hello", "<p>first paragraph</p>");
    session.on_change(edited.clone());
    // The tab dies 1s later: no unload hook, debounce never elapsed.
    clock.advance(1_000);
    drop(session);

    let reloaded = open_session(dir.path(), &clock, false, false);
    let prompt = reloaded.restore_prompt().expect("local candidate offered");
    match &prompt.candidate {
        RestoreCandidate::Local(entry) => assert_eq!(entry.fields, edited),
        other => panic!("expected local candidate, got {other:?}"),
    }
}

#[test]
fn closing_the_tab_within_two_seconds_keeps_the_title() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut session = open_session(dir.path(), &clock, true, true);
    let session_id = session.session_id().clone();
    session.on_change(fields("Hello", ""));
    clock.advance(1_500);
    session.on_unload();
    drop(session);

    // The unload hook fired a best-effort push: the store has the title.
    let store = inspect_store(dir.path());
    let auto = store
        .latest_for_session(OWNER, &session_id)
        .expect("lookup")
        .auto
        .expect("auto slot");
    assert_eq!(auto.fields.title, "Hello");
    assert_eq!(auto.version, 1);

    // Either way the local cache has it.
    let reloaded = open_session(dir.path(), &clock, true, true);
    let prompt = reloaded.restore_prompt().expect("candidate offered");
    match &prompt.candidate {
        RestoreCandidate::Local(entry) => assert_eq!(entry.fields.title, "Hello"),
        RestoreCandidate::Server(draft) => assert_eq!(draft.fields.title, "Hello"),
    }
}

#[test]
fn unauthenticated_typing_never_materializes_a_server_draft() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut session = open_session(dir.path(), &clock, false, true);
    let session_id = session.session_id().clone();
    session.on_change(fields("Hello", ""));

    clock.advance(10 * HEARTBEAT_MS);
    session.poll();
    session.on_unload();

    let store = inspect_store(dir.path());
    assert!(
        store
            .latest_for_session(OWNER, &session_id)
            .expect("lookup")
            .auto
            .is_none(),
        "no store draft without an authenticated identity"
    );
}

#[test]
fn empty_content_is_never_pushed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut session = open_session(dir.path(), &clock, true, true);
    let session_id = session.session_id().clone();
    session.on_change(fields("", "<p><br></p>"));

    clock.advance(HEARTBEAT_MS + 1);
    session.poll();
    session.on_blur();
    session.on_unload();

    let store = inspect_store(dir.path());
    assert!(
        store
            .latest_for_session(OWNER, &session_id)
            .expect("lookup")
            .auto
            .is_none(),
        "placeholder-only drafts must not be materialized"
    );
}

// ---------------------------------------------------------------------------
// Save status and offline behavior
// ---------------------------------------------------------------------------

#[test]
fn debounce_stamps_the_saved_at_marker() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut session = open_session(dir.path(), &clock, false, false);
    session.on_change(fields("Hello", ""));
    assert_eq!(session.poll(), SaveStatus::Idle);

    clock.advance(4_000);
    assert_eq!(session.poll(), SaveStatus::SavedAt(4_000));
}

#[test]
fn offline_skips_pushes_and_recovers_without_a_replay_queue() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut session = open_session(dir.path(), &clock, true, false);
    let session_id = session.session_id().clone();

    session.on_change(fields("written offline", ""));
    assert_eq!(session.poll(), SaveStatus::Offline);

    clock.advance(3 * HEARTBEAT_MS);
    session.poll();
    assert!(
        inspect_store(dir.path())
            .latest_for_session(OWNER, &session_id)
            .expect("lookup")
            .auto
            .is_none(),
        "offline heartbeats must not push"
    );

    // Back online: the next heartbeat pushes current state, once.
    session.set_online(true);
    clock.advance(HEARTBEAT_MS + 1);
    session.poll();

    let auto = inspect_store(dir.path())
        .latest_for_session(OWNER, &session_id)
        .expect("lookup")
        .auto
        .expect("auto slot");
    assert_eq!(auto.version, 1, "exactly one push, no replay of missed beats");
    assert_eq!(auto.fields.title, "written offline");
}

#[test]
fn cache_write_failure_degrades_to_store_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    // Block the cache path with a file so every cache write fails.
    std::fs::write(dir.path().join("cache.json"), "").expect("seed");
    let blocked = dir.path().join("cache.json").join("slot.json");

    let store = StoreHandle {
        store: DraftStore::open(&dir.path().join("store.sqlite3"), &HistoryConfig::default())
            .expect("open store"),
        owner_id: OWNER.to_string(),
    };
    let clock_dyn: Arc<dyn Clock> = Arc::clone(&clock) as Arc<dyn Clock>;
    let mut session = EditorSession::open(
        EngineConfig::default(),
        clock_dyn,
        Box::new(FileCache::new(blocked)),
        Box::new(FileLease::new(dir.path().join("lease.json"))),
        Some(store),
        true,
    )
    .expect("open despite broken cache");

    session.on_change(fields("resilient", ""));
    clock.advance(HEARTBEAT_MS + 1);
    assert_ne!(session.poll(), SaveStatus::Conflict);
    assert_eq!(session.version(), Some(1), "store push still succeeded");
}

// ---------------------------------------------------------------------------
// Two tabs, one version counter
// ---------------------------------------------------------------------------

#[test]
fn second_tab_with_stale_version_gets_a_conflict_and_keeps_its_cache() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    // Tab 1 creates the draft and syncs it.
    let mut tab1 = open_session(dir.path(), &clock, true, true);
    clock.set(1_000);
    tab1.on_change(fields("base", ""));
    clock.set(HEARTBEAT_MS + 1);
    tab1.poll();
    assert_eq!(tab1.version(), Some(1));

    // Tab 2 opens, restores the shared draft, and holds version 1.
    let mut tab2 = open_session(dir.path(), &clock, true, true);
    tab2.resolve_restore(RestoreDecision::Restore)
        .expect("restore");
    assert_eq!(tab2.version(), Some(1));
    assert_eq!(tab2.draft_id(), tab1.draft_id());

    // Tab 1 edits and syncs first.
    clock.set(50_000);
    tab1.on_change(fields("tab1 edit", ""));
    tab1.on_blur();
    assert_eq!(tab1.version(), Some(2));

    // Tab 2, still at version 1, edits and syncs: conflict.
    clock.set(55_000);
    tab2.on_change(fields("tab2 edit", ""));
    tab2.on_blur();
    assert_eq!(tab2.poll(), SaveStatus::Conflict);
    match tab2.conflict() {
        Some(state) => assert_eq!(
            state.kind,
            ConflictKind::VersionBehind { server_version: 2 }
        ),
        None => panic!("conflict state missing"),
    }

    // The store kept tab 1's write; tab 2's edits survive in its cache.
    let stored = inspect_store(dir.path())
        .get(tab1.draft_id().expect("id"))
        .expect("get")
        .expect("draft");
    assert_eq!(stored.fields.title, "tab1 edit");
    assert_eq!(stored.version, 2);

    let cached = FileCache::new(dir.path().join("cache.json"));
    let slot = vellum_engine::cache::DraftCache::read(&cached).expect("cache slot");
    assert_eq!(slot.fields.title, "tab2 edit");

    // Conflicted pushes stay silent until reconciled.
    clock.set(55_000 + 2 * HEARTBEAT_MS);
    tab2.poll();
    assert_eq!(
        inspect_store(dir.path())
            .get(tab1.draft_id().expect("id"))
            .expect("get")
            .expect("draft")
            .version,
        2,
        "no silent retries while conflicted"
    );

    // Load latest: adopt the server content and resume syncing.
    tab2.resolve_conflict(ConflictChoice::LoadLatest)
        .expect("resolve");
    assert_eq!(tab2.version(), Some(2));
    assert_eq!(tab2.fields().title, "tab1 edit");

    clock.advance(1_000);
    tab2.on_change(fields("tab2 after reload", ""));
    tab2.on_blur();
    assert_eq!(tab2.version(), Some(3));
}

#[test]
fn keep_editing_preserves_local_edits_and_blocks_pushes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut tab1 = open_session(dir.path(), &clock, true, true);
    clock.set(1_000);
    tab1.on_change(fields("base", ""));
    clock.set(HEARTBEAT_MS + 1);
    tab1.poll();

    let mut tab2 = open_session(dir.path(), &clock, true, true);
    tab2.resolve_restore(RestoreDecision::Restore)
        .expect("restore");

    clock.set(50_000);
    tab1.on_change(fields("winner", ""));
    tab1.on_blur();

    clock.set(51_000);
    tab2.on_change(fields("loser edits", ""));
    tab2.on_blur();
    assert_eq!(tab2.status(), SaveStatus::Conflict);

    tab2.resolve_conflict(ConflictChoice::KeepEditing)
        .expect("dismiss");
    assert_eq!(tab2.fields().title, "loser edits", "editor content untouched");
    assert_eq!(
        tab2.conflict().map(|c| c.dismissed),
        Some(true),
        "banner dismissed but conflict unreconciled"
    );

    // Heartbeats elapse; the store still holds the winner.
    clock.advance(5 * HEARTBEAT_MS);
    tab2.poll();
    let stored = inspect_store(dir.path())
        .get(tab1.draft_id().expect("id"))
        .expect("get")
        .expect("draft");
    assert_eq!(stored.fields.title, "winner");
}

// ---------------------------------------------------------------------------
// Manual save through the session
// ---------------------------------------------------------------------------

#[test]
fn save_draft_twice_is_one_named_copy_and_both_calls_succeed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut session = open_session(dir.path(), &clock, true, true);
    session.on_change(fields("My Post", "<p>body</p>"));

    let first = session.save_draft_as("My Post").expect("first save");
    clock.advance(1_000);
    let second = session.save_draft_as("My Post").expect("second save");
    assert_eq!(first, second);

    let manuals = session.manual_drafts().expect("list");
    assert_eq!(manuals.len(), 1);

    let history = inspect_store(dir.path())
        .history(vellum_core::ledger::HistoryTarget::Draft(&first))
        .expect("history");
    let manual_saves = history
        .iter()
        .filter(|s| s.reason == SnapshotReason::ManualSave)
        .count();
    assert_eq!(manual_saves, 1, "unchanged re-save is hash-gated");
}

// ---------------------------------------------------------------------------
// Restore prompt and discard
// ---------------------------------------------------------------------------

#[test]
fn two_hour_old_local_cache_is_offered_and_discard_is_final() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    // Write local content, then abandon the tab for two hours.
    let mut session = open_session(dir.path(), &clock, false, false);
    session.on_change(fields("two hours ago", "<p>draft</p>"));
    drop(session);
    clock.set(2 * 60 * 60 * 1_000);

    // Authenticated reload, server has no AUTO draft: local is offered.
    let mut session = open_session(dir.path(), &clock, true, true);
    let prompt = session.restore_prompt().expect("prompt offered");
    assert!(matches!(prompt.candidate, RestoreCandidate::Local(_)));

    let old_session_id = session.session_id().clone();
    session.resolve_restore(RestoreDecision::Discard).expect("discard");
    assert_ne!(session.session_id(), &old_session_id, "session id rotated");

    // Next load: nothing to offer.
    drop(session);
    let session = open_session(dir.path(), &clock, true, true);
    assert!(session.restore_prompt().is_none(), "no prompt after discard");
}

#[test]
fn stale_local_cache_is_not_offered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut session = open_session(dir.path(), &clock, false, false);
    session.on_change(fields("ancient", ""));
    drop(session);

    // Two days later: past the 24h freshness window.
    clock.set(2 * 24 * 60 * 60 * 1_000);
    let session = open_session(dir.path(), &clock, false, false);
    assert!(session.restore_prompt().is_none());
}

#[test]
fn keep_for_later_reoffers_the_candidate_next_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut session = open_session(dir.path(), &clock, false, false);
    session.on_change(fields("still here", ""));
    drop(session);

    clock.set(60_000);
    let mut session = open_session(dir.path(), &clock, false, false);
    assert!(session.restore_prompt().is_some());
    session
        .resolve_restore(RestoreDecision::KeepForLater)
        .expect("dismiss");
    drop(session);

    let session = open_session(dir.path(), &clock, false, false);
    let prompt = session.restore_prompt().expect("offered again");
    match &prompt.candidate {
        RestoreCandidate::Local(entry) => assert_eq!(entry.fields.title, "still here"),
        other => panic!("expected local candidate, got {other:?}"),
    }
}

#[test]
fn restoring_the_server_candidate_continues_its_lineage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    // Device 1 syncs a draft; the tab then dies without unloading and the
    // device's local cache never travels.
    let mut device1 = open_session(dir.path(), &clock, true, true);
    let session_id = device1.session_id().clone();
    clock.set(1_000);
    device1.on_change(fields("from device one", ""));
    clock.set(HEARTBEAT_MS + 1);
    device1.poll();
    drop(device1);
    std::fs::remove_file(dir.path().join("cache.json")).expect("lose local cache");

    // Device 2 has no local state; the owner lookup finds the AUTO slot.
    clock.advance(60_000);
    let mut device2 = open_session(dir.path(), &clock, true, true);
    let prompt = device2.restore_prompt().expect("server candidate");
    assert!(matches!(prompt.candidate, RestoreCandidate::Server(_)));

    device2
        .resolve_restore(RestoreDecision::Restore)
        .expect("restore");
    assert_eq!(device2.fields().title, "from device one");
    assert_eq!(device2.version(), Some(1));
    assert_eq!(
        device2.session_id(),
        &session_id,
        "restoring the server copy adopts its session"
    );

    // Continued edits extend the same lineage.
    clock.advance(1_000);
    device2.on_change(fields("continued on device two", ""));
    device2.on_blur();
    assert_eq!(device2.version(), Some(2));
}

// ---------------------------------------------------------------------------
// Multi-tab lease through the session surface
// ---------------------------------------------------------------------------

#[test]
fn second_tab_sees_edited_elsewhere_until_the_first_leaves() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut tab1 = open_session(dir.path(), &clock, false, false);
    assert!(!tab1.edited_elsewhere());

    clock.advance(1_000);
    let mut tab2 = open_session(dir.path(), &clock, false, false);
    assert!(tab2.edited_elsewhere());

    // Tab 1 closes; the storage-change notification flips tab 2 over.
    tab1.on_unload();
    clock.advance(100);
    tab2.notify_lease_changed();
    assert!(!tab2.edited_elsewhere());
}

// ---------------------------------------------------------------------------
// Publish teardown
// ---------------------------------------------------------------------------

#[test]
fn publish_clears_cache_rotates_session_and_keeps_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut session = open_session(dir.path(), &clock, true, true);
    let old_session_id = session.session_id().clone();
    clock.set(1_000);
    session.on_change(fields("Shipped", "<p>final</p>"));
    clock.set(HEARTBEAT_MS + 1);
    session.poll();
    let draft_id = session.draft_id().expect("synced").clone();

    clock.advance(1_000);
    session.publish().expect("publish");

    assert_ne!(session.session_id(), &old_session_id);
    assert!(session.draft_id().is_none());

    let store = inspect_store(dir.path());
    assert!(store.get(&draft_id).expect("get").is_none(), "slot torn down");
    let history = store
        .history(vellum_core::ledger::HistoryTarget::Session(&old_session_id))
        .expect("history");
    assert!(
        history
            .iter()
            .any(|s| s.reason == SnapshotReason::Publish && s.fields.title == "Shipped"),
        "final publish snapshot recorded"
    );

    // Fresh load: nothing offered.
    drop(session);
    let session = open_session(dir.path(), &clock, true, true);
    assert!(session.restore_prompt().is_none());
}

// ---------------------------------------------------------------------------
// Version history through the session surface
// ---------------------------------------------------------------------------

#[test]
fn history_panel_lists_newest_first_and_restore_is_undoable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut session = open_session(dir.path(), &clock, true, true);
    clock.set(1_000);
    session.on_change(fields("first", ""));
    clock.set(HEARTBEAT_MS + 1);
    session.poll();

    clock.advance(1_000);
    session.on_change(fields("second", ""));
    session.on_blur();
    assert_eq!(session.version(), Some(2));

    let history = session.history().expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].fields.title, "second");
    assert_eq!(history[1].fields.title, "first");

    let oldest = history.last().expect("oldest").snapshot_id.clone();
    clock.advance(1_000);
    session.restore_snapshot(&oldest).expect("restore");
    assert_eq!(session.fields().title, "first");
    assert_eq!(session.version(), Some(3), "lineage continues forward");

    let history = session.history().expect("history");
    assert!(
        history
            .iter()
            .any(|s| s.reason == SnapshotReason::Restore && s.fields.title == "second"),
        "replaced content is preserved as a restore snapshot"
    );
}

// ---------------------------------------------------------------------------
// Discard race across tabs
// ---------------------------------------------------------------------------

#[test]
fn push_after_foreign_discard_engages_the_conflict_handler() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(0));

    let mut tab1 = open_session(dir.path(), &clock, true, true);
    clock.set(1_000);
    tab1.on_change(fields("doomed", ""));
    clock.set(HEARTBEAT_MS + 1);
    tab1.poll();

    let mut tab2 = open_session(dir.path(), &clock, true, true);
    tab2.resolve_restore(RestoreDecision::Restore)
        .expect("restore");

    // Tab 1 discards; tab 2 is still mid-composition.
    tab1.discard_draft().expect("discard");

    clock.advance(1_000);
    tab2.on_change(fields("late edit", ""));
    tab2.on_blur();

    assert_eq!(tab2.status(), SaveStatus::Conflict);
    assert_eq!(
        tab2.conflict().map(|c| c.kind),
        Some(ConflictKind::DraftMissing)
    );

    // Load-latest on a missing draft begins a fresh lineage with the
    // user's content intact.
    let stale_session = tab2.session_id().clone();
    tab2.resolve_conflict(ConflictChoice::LoadLatest)
        .expect("resolve");
    assert_eq!(tab2.fields().title, "late edit");
    assert!(tab2.draft_id().is_none());
    assert_ne!(tab2.session_id(), &stale_session);

    clock.advance(1_000);
    tab2.on_blur();
    assert_eq!(tab2.version(), Some(1), "fresh lineage starts at version 1");
}

// Sanity: the session-id type round-trips through the cache seed used above.
#[test]
fn session_ids_are_stable_through_serde() {
    let id = SessionId::generate();
    let json = serde_json::to_string(&id).expect("encode");
    let back: SessionId = serde_json::from_str(&json).expect("decode");
    assert_eq!(id, back);
}
