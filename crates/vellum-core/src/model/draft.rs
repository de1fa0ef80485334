use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

use crate::ids::{DraftId, SessionId};
use crate::normalize::normalized_text;

/// The two kinds of draft record.
///
/// `Auto` is the single rolling autosave slot per (owner, session); `Manual`
/// drafts are user-named, independently listed copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftKind {
    Auto,
    Manual,
}

impl DraftKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for DraftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl FromStr for DraftKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            _ => Err(ParseEnumError {
                expected: "draft kind",
                got: s.to_string(),
            }),
        }
    }
}

/// The flat bag of document fields the editor surface hands the engine on
/// every change. `title`/`body`/`excerpt` participate in content checks and
/// hashing; `meta` holds presentation/metadata fields the engine persists
/// verbatim and never interprets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftFields {
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub meta: BTreeMap<String, String>,
}

impl DraftFields {
    /// Whether the draft carries any visible content: a non-empty title,
    /// excerpt, or normalized body text. Placeholder markup does not count.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.title.trim().is_empty()
            || !self.excerpt.trim().is_empty()
            || !normalized_text(&self.body).is_empty()
    }
}

/// All persisted fields for one draft record (the store-level aggregate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub draft_id: DraftId,
    pub owner_id: String,
    pub session_id: SessionId,
    pub kind: DraftKind,
    /// User-facing name; present exactly when `kind` is `Manual`.
    pub name: Option<String>,
    pub fields: DraftFields,
    /// Optimistic concurrency counter. Only ever increases on the store.
    pub version: u64,
    /// `blake3:<hex>` digest of the normalized content fields.
    pub content_hash: String,
    /// Set once the draft is attached to a published document.
    pub post_id: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub last_opened_at_ms: i64,
}
