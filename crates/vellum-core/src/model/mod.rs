//! Persisted data model: drafts and version snapshots.

pub mod draft;
pub mod snapshot;

pub use draft::{Draft, DraftFields, DraftKind, ParseEnumError};
pub use snapshot::{AgeBucket, SnapshotReason, VersionSnapshot};
