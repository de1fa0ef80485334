//! vellum-engine: the client side of the draft persistence engine.
//!
//! One [`session::EditorSession`] per tab wires together:
//!
//! - [`cache`] — the single-slot local draft cache (reload/crash safety)
//! - [`scheduler`] — debounce + heartbeat + focus-event save scheduling
//! - [`lease`] / [`tabs`] — the advisory multi-tab editing lease
//! - [`restore`] — the load-time restore/discard workflow
//! - [`conflict`] — version-conflict surfacing and resolution
//!
//! against a `vellum_core::store::DraftStore`. Everything is
//! single-threaded and cooperative; time is injected through
//! `vellum_core::clock::Clock`, which is what makes the timing behavior
//! deterministic under test.

pub mod cache;
pub mod conflict;
pub mod lease;
pub mod restore;
pub mod scheduler;
pub mod session;
pub mod tabs;

pub use cache::{CachedDraft, DraftCache, FileCache, MemoryCache};
pub use conflict::{ConflictChoice, ConflictKind, ConflictState};
pub use lease::{FileLease, LeaseError, LeaseSlot, LeaseUpdate, MemoryLease, TabLease};
pub use restore::{RestoreCandidate, RestoreDecision, RestorePrompt, select_candidate};
pub use scheduler::{PushCompletion, PushTrigger, SaveScheduler, SchedulerEvent};
pub use session::{EditorSession, EngineError, SaveStatus, StoreHandle};
pub use tabs::{TabCoordinator, TabState};
