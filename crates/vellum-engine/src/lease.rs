//! The shared tab-lease slot.
//!
//! Abstractly a liveness lease with no central coordinator: one shared slot
//! holding `{tab_id, heartbeat_at}`, claimed by whoever finds it absent or
//! expired. All mutation goes through an atomic read-modify-write so two
//! tabs racing a claim cannot both think they won.
//!
//! The lease is advisory. Nothing here ever blocks a draft write; the only
//! consumer is the "being edited elsewhere" UI hint. Correctness against
//! concurrent writers lives in the store's version check.

use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use fs2::FileExt;
use vellum_core::error::ErrorCode;
use vellum_core::ids::TabId;

/// The liveness token: which tab currently advertises itself as the active
/// editor, and when it last proved it was alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabLease {
    pub tab_id: TabId,
    pub heartbeat_at_ms: i64,
}

impl TabLease {
    /// Whether the lease has gone a full liveness window without renewal.
    #[must_use]
    pub const fn is_stale(&self, now_ms: i64, liveness_window_ms: i64) -> bool {
        now_ms.saturating_sub(self.heartbeat_at_ms) >= liveness_window_ms
    }
}

/// Result of one read-modify-write step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseUpdate {
    /// Leave the slot as it is.
    Keep,
    /// Replace the slot contents.
    Set(TabLease),
    /// Empty the slot.
    Clear,
}

/// Errors from lease slot access.
#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    /// Could not acquire the slot lock within the timeout.
    #[error("lease slot busy: lock not acquired within {waited:?}")]
    Busy { waited: Duration },

    /// Underlying I/O failure.
    #[error("lease slot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl LeaseError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Busy { .. } | Self::Io(_) => ErrorCode::LeaseContention,
        }
    }
}

/// Atomic access to the single shared lease slot.
///
/// `modify` runs the whole read-decide-write cycle under exclusion and
/// returns the slot contents *after* the update — the caller learns whether
/// its claim took by inspecting the result, never by a second read.
pub trait LeaseSlot {
    /// Atomically read the slot, apply `apply`, and persist the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be locked or accessed. Callers
    /// treat errors as "no change observed" — the lease is a hint and must
    /// degrade quietly.
    fn modify(
        &self,
        apply: &mut dyn FnMut(Option<&TabLease>) -> LeaseUpdate,
    ) -> Result<Option<TabLease>, LeaseError>;

    /// Read the slot without changing it.
    ///
    /// # Errors
    ///
    /// Same as [`LeaseSlot::modify`].
    fn read(&self) -> Result<Option<TabLease>, LeaseError> {
        self.modify(&mut |_| LeaseUpdate::Keep)
    }
}

// ---------------------------------------------------------------------------
// In-process slot
// ---------------------------------------------------------------------------

/// Mutex-guarded slot shared by tabs within one process (tests, embedded
/// multi-view editors).
#[derive(Debug, Default)]
pub struct MemoryLease {
    slot: Mutex<Option<TabLease>>,
}

impl MemoryLease {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaseSlot for MemoryLease {
    fn modify(
        &self,
        apply: &mut dyn FnMut(Option<&TabLease>) -> LeaseUpdate,
    ) -> Result<Option<TabLease>, LeaseError> {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match apply(slot.as_ref()) {
            LeaseUpdate::Keep => {}
            LeaseUpdate::Set(lease) => *slot = Some(lease),
            LeaseUpdate::Clear => *slot = None,
        }

        Ok(slot.clone())
    }
}

// ---------------------------------------------------------------------------
// File-backed slot
// ---------------------------------------------------------------------------

/// Default wait for the slot file's advisory lock. Renewals are frequent
/// and cheap; holding out longer than this means something is wedged, and
/// the coordinator would rather skip a beat than stall the editor.
const LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// Lease slot shared across processes: one JSON file guarded by an fs2
/// exclusive lock for the duration of each read-modify-write.
#[derive(Debug)]
pub struct FileLease {
    path: PathBuf,
}

impl FileLease {
    /// Create a slot over the given file path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn open_locked(&self) -> Result<std::fs::File, LeaseError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?;

        let start = Instant::now();
        loop {
            if file.try_lock_exclusive().is_ok() {
                return Ok(file);
            }
            if start.elapsed() >= LOCK_TIMEOUT {
                return Err(LeaseError::Busy {
                    waited: start.elapsed(),
                });
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

impl LeaseSlot for FileLease {
    fn modify(
        &self,
        apply: &mut dyn FnMut(Option<&TabLease>) -> LeaseUpdate,
    ) -> Result<Option<TabLease>, LeaseError> {
        let mut file = self.open_locked()?;

        let mut content = String::new();
        file.read_to_string(&mut content)?;

        // A torn or hand-edited slot reads as vacant; the next claim
        // rewrites it wholesale.
        let current: Option<TabLease> = if content.trim().is_empty() {
            None
        } else {
            match serde_json::from_str(&content) {
                Ok(lease) => Some(lease),
                Err(error) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        %error,
                        "lease slot is malformed; treating as vacant"
                    );
                    None
                }
            }
        };

        let updated = match apply(current.as_ref()) {
            LeaseUpdate::Keep => current,
            LeaseUpdate::Set(lease) => Some(lease),
            LeaseUpdate::Clear => None,
        };

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        if let Some(lease) = &updated {
            let json = serde_json::to_vec(lease)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            file.write_all(&json)?;
        }
        file.sync_all()?;
        let _ = file.unlock();

        Ok(updated)
    }
}
