use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidId,
    DraftNotFound,
    SnapshotNotFound,
    VersionConflict,
    OrphanedSnapshot,
    CacheUnavailable,
    CacheCorrupt,
    StoreWriteFailed,
    LeaseContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidId => "E1002",
            Self::DraftNotFound => "E2001",
            Self::SnapshotNotFound => "E2002",
            Self::VersionConflict => "E2003",
            Self::OrphanedSnapshot => "E2004",
            Self::CacheUnavailable => "E3001",
            Self::CacheCorrupt => "E3002",
            Self::StoreWriteFailed => "E5001",
            Self::LeaseContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidId => "Malformed identifier",
            Self::DraftNotFound => "Draft not found",
            Self::SnapshotNotFound => "Snapshot not found",
            Self::VersionConflict => "Draft version conflict",
            Self::OrphanedSnapshot => "Snapshot no longer has a live draft",
            Self::CacheUnavailable => "Local draft cache unavailable",
            Self::CacheCorrupt => "Local draft cache unreadable",
            Self::StoreWriteFailed => "Draft store write failed",
            Self::LeaseContention => "Tab lease slot contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in vellum.toml and retry."),
            Self::InvalidId => Some("Identifiers look like 'dr-ab12cd34'; check the prefix."),
            Self::DraftNotFound => None,
            Self::SnapshotNotFound => None,
            Self::VersionConflict => {
                Some("Another writer pushed first. Load the latest draft or keep editing locally.")
            }
            Self::OrphanedSnapshot => {
                Some("The draft was discarded; start a new draft from the snapshot's content.")
            }
            Self::CacheUnavailable => {
                Some("Local persistence is degraded; the store remains the system of record.")
            }
            Self::CacheCorrupt => Some("The cached slot will be ignored and overwritten."),
            Self::StoreWriteFailed => Some("Check disk space and write permissions."),
            Self::LeaseContention => {
                Some("Retry after the other editor process releases the lease slot.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::InvalidId,
            ErrorCode::DraftNotFound,
            ErrorCode::SnapshotNotFound,
            ErrorCode::VersionConflict,
            ErrorCode::OrphanedSnapshot,
            ErrorCode::CacheUnavailable,
            ErrorCode::CacheCorrupt,
            ErrorCode::StoreWriteFailed,
            ErrorCode::LeaseContention,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::VersionConflict.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }
}
