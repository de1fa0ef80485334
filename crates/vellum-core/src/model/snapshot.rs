use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::draft::{DraftFields, ParseEnumError};
use crate::ids::{DraftId, SessionId, SnapshotId};

/// Why a snapshot was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotReason {
    /// Periodic autosave heartbeat accepted a changed write.
    AutoInterval,
    /// The user explicitly saved a named draft.
    ManualSave,
    /// Final snapshot taken when the draft was published.
    Publish,
    /// Content that was replaced by restoring an older snapshot.
    Restore,
}

impl SnapshotReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::AutoInterval => "auto_interval",
            Self::ManualSave => "manual_save",
            Self::Publish => "publish",
            Self::Restore => "restore",
        }
    }

    /// Whether writes with this reason are suppressed when content is
    /// unchanged from the latest snapshot. Restore and publish snapshots
    /// mark moments, not content deltas, so they always append.
    #[must_use]
    pub const fn is_hash_gated(self) -> bool {
        matches!(self, Self::AutoInterval | Self::ManualSave)
    }
}

impl fmt::Display for SnapshotReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotReason {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto_interval" => Ok(Self::AutoInterval),
            "manual_save" => Ok(Self::ManualSave),
            "publish" => Ok(Self::Publish),
            "restore" => Ok(Self::Restore),
            _ => Err(ParseEnumError {
                expected: "snapshot reason",
                got: s.to_string(),
            }),
        }
    }
}

/// Immutable point-in-time copy of a draft's content fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub snapshot_id: SnapshotId,
    /// Cleared (not cascaded) when the draft row is torn down on publish, so
    /// a snapshot may outlive its draft.
    pub draft_id: Option<DraftId>,
    pub session_id: SessionId,
    /// Draft version at the moment the snapshot was taken.
    pub version_number: u64,
    pub reason: SnapshotReason,
    pub fields: DraftFields,
    pub content_hash: String,
    pub created_at_ms: i64,
}

impl VersionSnapshot {
    /// Human-facing age bucket relative to `now_ms`.
    #[must_use]
    pub fn age_bucket(&self, now_ms: i64) -> AgeBucket {
        AgeBucket::from_age_ms(now_ms.saturating_sub(self.created_at_ms))
    }
}

/// Coarse age label for the history panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBucket {
    JustNow,
    Minutes(i64),
    Hours(i64),
    Days(i64),
    Weeks(i64),
}

impl AgeBucket {
    const MINUTE_MS: i64 = 60 * 1_000;
    const HOUR_MS: i64 = 60 * Self::MINUTE_MS;
    const DAY_MS: i64 = 24 * Self::HOUR_MS;
    const WEEK_MS: i64 = 7 * Self::DAY_MS;

    /// Bucket an age in milliseconds. Negative ages (clock skew between
    /// writers) read as "just now".
    #[must_use]
    pub const fn from_age_ms(age_ms: i64) -> Self {
        if age_ms < Self::MINUTE_MS {
            Self::JustNow
        } else if age_ms < Self::HOUR_MS {
            Self::Minutes(age_ms / Self::MINUTE_MS)
        } else if age_ms < Self::DAY_MS {
            Self::Hours(age_ms / Self::HOUR_MS)
        } else if age_ms < Self::WEEK_MS {
            Self::Days(age_ms / Self::DAY_MS)
        } else {
            Self::Weeks(age_ms / Self::WEEK_MS)
        }
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JustNow => f.write_str("just now"),
            Self::Minutes(n) => write!(f, "{n}m ago"),
            Self::Hours(n) => write!(f, "{n}h ago"),
            Self::Days(n) => write!(f, "{n}d ago"),
            Self::Weeks(n) => write!(f, "{n}w ago"),
        }
    }
}
