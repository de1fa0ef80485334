//! Content hashing for snapshot de-duplication.
//!
//! The hash input is the normalized content fields joined by tabs:
//!
//! ```text
//! {title}\t{excerpt}\t{normalized_body}\t{meta_json}\n
//! ```
//!
//! Guarantees:
//!
//! - Deterministic: same visible content always produces the same hash.
//!   Meta keys are a `BTreeMap`, so the JSON encoding is key-sorted.
//! - Markup-churn insensitive: the body contributes its normalized text,
//!   so re-serialized markup with identical visible text hashes equal.
//! - Hash format: `blake3:<lowercase hex>` (full 64-char digest).

use std::collections::BTreeMap;

use crate::model::DraftFields;
use crate::normalize::normalized_text;

/// Prefix on every content hash string.
pub const HASH_PREFIX: &str = "blake3:";

/// Compute the content hash of a field bag.
#[must_use]
pub fn content_hash(fields: &DraftFields) -> String {
    let meta_json = meta_json(&fields.meta);
    let input = format!(
        "{}\t{}\t{}\t{}\n",
        fields.title.trim(),
        fields.excerpt.trim(),
        normalized_text(&fields.body),
        meta_json,
    );

    format!("{HASH_PREFIX}{}", blake3::hash(input.as_bytes()).to_hex())
}

/// Canonical (key-sorted, compact) JSON encoding of the opaque meta fields.
fn meta_json(meta: &BTreeMap<String, String>) -> String {
    serde_json::to_string(meta).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::{HASH_PREFIX, content_hash};
    use crate::model::DraftFields;

    fn fields(title: &str, body: &str, excerpt: &str) -> DraftFields {
        DraftFields {
            title: title.into(),
            body: body.into(),
            excerpt: excerpt.into(),
            meta: std::collections::BTreeMap::new(),
        }
    }

    #[test]
    fn hash_is_deterministic_and_prefixed() {
        let a = content_hash(&fields("Title", "<p>body</p>", "ex"));
        let b = content_hash(&fields("Title", "<p>body</p>", "ex"));
        assert_eq!(a, b);
        assert!(a.starts_with(HASH_PREFIX));
        assert_eq!(a.len(), HASH_PREFIX.len() + 64);
    }

    #[test]
    fn markup_churn_does_not_change_hash() {
        let a = content_hash(&fields("T", "<p>Hello world</p>", ""));
        let b = content_hash(&fields("T", "<div>Hello\nworld</div>", ""));
        assert_eq!(a, b);
    }

    #[test]
    fn visible_change_changes_hash() {
        let a = content_hash(&fields("T", "<p>Hello world</p>", ""));
        let b = content_hash(&fields("T", "<p>Hello there</p>", ""));
        assert_ne!(a, b);
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        // "ab" + "" must not collide with "a" + "b".
        let a = content_hash(&fields("ab", "", ""));
        let b = content_hash(&fields("a", "b", ""));
        assert_ne!(a, b);
    }

    #[test]
    fn meta_participates_in_hash() {
        let plain = fields("T", "body", "");
        let mut tagged = plain.clone();
        tagged.meta.insert("cover".into(), "img.png".into());
        assert_ne!(content_hash(&plain), content_hash(&tagged));
    }
}
