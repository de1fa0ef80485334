//! Local draft cache: the last line of defense against losing in-progress
//! work to a reload or crash.
//!
//! One fixed slot holds the most recent local draft — deliberately not
//! per-session, so whatever was being written last is what a reload finds.
//! Writes are synchronous and best-effort: a full disk or unwritable
//! directory degrades to store-only persistence and is never surfaced to
//! the editor as an error. Reads apply a minimal shape check; a slot whose
//! content is placeholder-only reads as absent.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

use vellum_core::ids::{DraftId, SessionId};
use vellum_core::model::DraftFields;

/// The cached slot: content plus the identity pointers a restored session
/// needs to continue the draft's lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDraft {
    pub fields: DraftFields,
    pub session_id: SessionId,
    /// Store identity, if the draft has synced at least once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<DraftId>,
    /// Version last confirmed by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// When this slot was written.
    pub saved_at_ms: i64,
}

/// Single-slot local persistence.
pub trait DraftCache {
    /// Store the slot. Best-effort: returns the stored timestamp on
    /// success, `None` on failure (already logged, never raised).
    fn write(&mut self, entry: &CachedDraft) -> Option<i64>;

    /// Read the slot. Absent, unparseable, or content-empty slots all read
    /// as `None`.
    fn read(&self) -> Option<CachedDraft>;

    /// Empty the slot.
    fn clear(&mut self);
}

fn passes_shape_check(entry: &CachedDraft) -> bool {
    entry.fields.has_content()
}

// ---------------------------------------------------------------------------
// File-backed slot
// ---------------------------------------------------------------------------

/// Cache slot stored as one JSON file. Writes go through a temp file in the
/// same directory followed by a rename, so a crash mid-write leaves the
/// previous slot intact.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    /// Create a cache over the given slot path. The parent directory is
    /// created lazily on first write.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn try_write(&self, entry: &CachedDraft) -> std::io::Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent"))?;
        std::fs::create_dir_all(parent)?;

        let json = serde_json::to_vec(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DraftCache for FileCache {
    fn write(&mut self, entry: &CachedDraft) -> Option<i64> {
        match self.try_write(entry) {
            Ok(()) => Some(entry.saved_at_ms),
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    %error,
                    "local cache write failed; continuing store-only"
                );
                None
            }
        }
    }

    fn read(&self) -> Option<CachedDraft> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "local cache unreadable");
                return None;
            }
        };

        let entry: CachedDraft = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    %error,
                    "local cache slot is malformed; treating as absent"
                );
                return None;
            }
        };

        passes_shape_check(&entry).then_some(entry)
    }

    fn clear(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), %error, "local cache clear failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory slot
// ---------------------------------------------------------------------------

/// In-memory slot for tests and storage-disabled environments.
#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: Option<CachedDraft>,
    fail_writes: bool,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate quota-exhausted storage: writes fail silently.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl DraftCache for MemoryCache {
    fn write(&mut self, entry: &CachedDraft) -> Option<i64> {
        if self.fail_writes {
            tracing::warn!("local cache write failed; continuing store-only");
            return None;
        }
        self.slot = Some(entry.clone());
        Some(entry.saved_at_ms)
    }

    fn read(&self) -> Option<CachedDraft> {
        self.slot.as_ref().filter(|e| passes_shape_check(e)).cloned()
    }

    fn clear(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{CachedDraft, DraftCache, FileCache, MemoryCache};
    use vellum_core::ids::SessionId;
    use vellum_core::model::DraftFields;

    fn entry(title: &str, body: &str) -> CachedDraft {
        CachedDraft {
            fields: DraftFields {
                title: title.into(),
                body: body.into(),
                ..DraftFields::default()
            },
            session_id: SessionId::generate(),
            draft_id: None,
            version: None,
            saved_at_ms: 1_000,
        }
    }

    #[test]
    fn file_cache_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = FileCache::new(dir.path().join("slot.json"));

        let written = entry("Hello", "<p>body</p>");
        assert_eq!(cache.write(&written), Some(1_000));
        assert_eq!(cache.read(), Some(written));

        cache.clear();
        assert_eq!(cache.read(), None);
    }

    #[test]
    fn file_cache_read_of_missing_slot_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = FileCache::new(dir.path().join("slot.json"));
        assert_eq!(cache.read(), None);
    }

    #[test]
    fn malformed_slot_reads_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("slot.json");
        std::fs::write(&path, "{not json").expect("write garbage");

        let cache = FileCache::new(path);
        assert_eq!(cache.read(), None);
    }

    #[test]
    fn placeholder_content_reads_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = FileCache::new(dir.path().join("slot.json"));

        cache.write(&entry("", "<p><br></p>"));
        assert_eq!(cache.read(), None, "placeholder markup is not content");
    }

    #[test]
    fn write_failure_is_swallowed() {
        let dir = tempfile::tempdir().expect("tempdir");
        // The slot path's parent is a *file*, so create_dir_all must fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").expect("write blocker");

        let mut cache = FileCache::new(blocker.join("slot.json"));
        assert_eq!(cache.write(&entry("Hello", "")), None);
        assert_eq!(cache.read(), None);
    }

    #[test]
    fn memory_cache_simulates_quota_failure() {
        let mut cache = MemoryCache::new();
        assert!(cache.write(&entry("a", "")).is_some());

        cache.fail_writes(true);
        assert_eq!(cache.write(&entry("b", "")), None);
        // Previous slot is still readable.
        assert_eq!(cache.read().map(|e| e.fields.title), Some("a".into()));
    }

    #[test]
    fn clear_then_read_is_none() {
        let mut cache = MemoryCache::new();
        cache.write(&entry("a", ""));
        cache.clear();
        assert_eq!(cache.read(), None);
    }
}
