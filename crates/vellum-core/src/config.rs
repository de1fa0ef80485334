use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration, loadable from `vellum.toml`.
///
/// Every field has a serde default, so a partial (or absent) config file is
/// always valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub save: SaveConfig,
    pub restore: RestoreConfig,
    pub lease: LeaseConfig,
    pub history: HistoryConfig,
}

/// Save scheduling windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Quiet period after the last edit before the local write is stamped
    /// as the authoritative "saved at" marker.
    pub debounce_ms: i64,
    /// Fixed period between store pushes while authenticated and online.
    pub heartbeat_ms: i64,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            heartbeat_ms: default_heartbeat_ms(),
        }
    }
}

/// Restore-prompt candidate selection windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Local cache entries older than this are no longer offered.
    pub local_freshness_ms: i64,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            local_freshness_ms: default_local_freshness_ms(),
        }
    }
}

/// Tab lease liveness windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// A lease without a heartbeat renewal inside this window is stale and
    /// reclaimable.
    pub liveness_window_ms: i64,
    /// Renewal interval while holding the lease.
    pub renew_every_ms: i64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            liveness_window_ms: default_liveness_window_ms(),
            renew_every_ms: default_renew_every_ms(),
        }
    }
}

/// Version-history retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Cap on AUTO_INTERVAL snapshots kept per draft; oldest are evicted
    /// past the cap. Manual, publish, and restore snapshots are never
    /// pruned.
    pub keep_auto: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            keep_auto: default_keep_auto(),
        }
    }
}

const fn default_debounce_ms() -> i64 {
    4_000
}

const fn default_heartbeat_ms() -> i64 {
    45_000
}

const fn default_local_freshness_ms() -> i64 {
    24 * 60 * 60 * 1_000
}

const fn default_liveness_window_ms() -> i64 {
    15_000
}

const fn default_renew_every_ms() -> i64 {
    5_000
}

const fn default_keep_auto() -> u32 {
    200
}

/// Load configuration from `{root}/vellum.toml`, falling back to defaults
/// when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(root: &Path) -> Result<EngineConfig> {
    let path = root.join("vellum.toml");
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<EngineConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Default on-disk location for the shared store and lease slot.
#[must_use]
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("vellum"))
}
