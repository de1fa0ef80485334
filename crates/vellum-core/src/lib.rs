//! vellum-core: data model, versioned draft store, and history ledger.
//!
//! This crate is the canonical side of the engine: the SQLite-backed
//! [`store::DraftStore`] with its optimistic version counter, the
//! append-only [`ledger`] of content snapshots, and the shared model,
//! hashing, config, and clock plumbing the client-side crate builds on.
//!
//! # Conventions
//!
//! - **Errors**: per-module `thiserror` enums carrying a machine-readable
//!   [`error::ErrorCode`]; `anyhow::Result` at db/config boundaries.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`) with
//!   structured fields.
//! - **Time**: always through [`clock::Clock`]; nothing in this crate calls
//!   the system clock directly except [`clock::SystemClock`].

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod hash;
pub mod ids;
pub mod ledger;
pub mod model;
pub mod normalize;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::ErrorCode;
pub use ids::{DraftId, SessionId, SnapshotId, TabId};
pub use ledger::HistoryTarget;
pub use model::{Draft, DraftFields, DraftKind, SnapshotReason, VersionSnapshot};
pub use store::{DiscardTarget, DraftStore, PushOutcome, PushRequest, SessionDrafts, StoreError};
