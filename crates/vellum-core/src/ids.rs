//! Prefixed short identifiers for drafts, sessions, snapshots, and tabs.
//!
//! Every id is `{prefix}-{suffix}` where the suffix is 8 characters drawn
//! from a lowercase base32 alphabet with the easily-confused letters (`i`,
//! `l`, `o`, `u`) removed. The prefix encodes the entity type so ids are
//! self-describing in logs and in the schema's CHECK constraints.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Alphabet for id suffixes: lowercase base32, no `i`/`l`/`o`/`u`.
const ALPHABET: &[u8] = b"0123456789abcdefghjkmnpqrstvwxyz";

/// Length of the random suffix after the prefix and dash.
const SUFFIX_LEN: usize = 8;

/// Error returned when parsing an id from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    pub expected_prefix: &'static str,
    pub got: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid id '{}': expected '{}-' followed by 4-12 alphanumeric characters",
            self.got, self.expected_prefix
        )
    }
}

impl std::error::Error for ParseIdError {}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            char::from(ALPHABET[idx])
        })
        .collect()
}

fn validate(prefix: &'static str, value: &str) -> Result<(), ParseIdError> {
    let err = || ParseIdError {
        expected_prefix: prefix,
        got: value.to_string(),
    };

    let suffix = value
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .ok_or_else(err)?;

    // Accept hand-written short suffixes from tests and fixtures, but reject
    // anything outside the lowercase alphanumeric set.
    if suffix.len() < 4 || suffix.len() > 12 {
        return Err(err());
    }
    if !suffix
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        return Err(err());
    }

    Ok(())
}

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix for this id type, without the trailing dash.
            pub const PREFIX: &'static str = $prefix;

            /// Generate a fresh random id.
            #[must_use]
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, random_suffix()))
            }

            /// Parse and validate an id from text.
            ///
            /// # Errors
            ///
            /// Returns [`ParseIdError`] if the prefix or suffix is malformed.
            pub fn new(value: &str) -> Result<Self, ParseIdError> {
                validate($prefix, value)?;
                Ok(Self(value.to_string()))
            }

            /// Construct without validation. For trusted inputs (rows read
            /// back from the store, test fixtures).
            #[must_use]
            pub fn new_unchecked(value: &str) -> Self {
                Self(value.to_string())
            }

            /// The id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

define_id!(
    /// Store-assigned identity of a draft record.
    DraftId,
    "dr"
);
define_id!(
    /// Client-generated identity of one composition session. Rotated on
    /// explicit discard and on successful publish.
    SessionId,
    "ss"
);
define_id!(
    /// Identity of an immutable version snapshot.
    SnapshotId,
    "sn"
);
define_id!(
    /// Random per-page-load identity of a browser tab / editor process.
    TabId,
    "tb"
);
