//! Truncation recovery and disk checkpoint settings.

use serde::{Deserialize, Serialize};

/// Truncation recovery (in-memory snapshot) settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TruncationSettings {
    /// Maximum snapshots held; the LRU snapshot is evicted on overflow.
    pub max_snapshots: usize,
    /// Hard per-snapshot size ceiling in bytes (after compression).
    pub max_snapshot_size: usize,
    /// Gzip snapshots larger than 1KB when this is set.
    pub enable_compression: bool,
    /// Snapshot time-to-live (milliseconds).
    pub expiration_ms: u64,
}

impl Default for TruncationSettings {
    fn default() -> Self {
        Self {
            max_snapshots: 10,
            max_snapshot_size: 1_048_576,
            enable_compression: true,
            expiration_ms: 3_600_000,
        }
    }
}

/// How `persist` schedules the backing write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStrategy {
    /// Block until the payload and manifest are on disk.
    #[default]
    Immediate,
    /// Return at once; the write lands asynchronously and `load` serves
    /// from a pending buffer until it does.
    Lazy,
}

/// Disk checkpoint persistence settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckpointSettings {
    /// Master switch; when false every mutating operation is a no-op.
    pub enabled: bool,
    /// Directory holding `manifest.json` and payload files.
    pub directory: String,
    /// Total disk usage cap in bytes, enforced by `cleanup`.
    pub max_disk_usage: u64,
    /// Write scheduling strategy.
    pub strategy: CheckpointStrategy,
    /// Gzip checkpoint payloads when set.
    pub enable_compression: bool,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        Self {
            enabled: true,
            directory: format!("{home}/.braid/checkpoints"),
            max_disk_usage: 104_857_600,
            strategy: CheckpointStrategy::default(),
            enable_compression: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_defaults() {
        let t = TruncationSettings::default();
        assert_eq!(t.max_snapshots, 10);
        assert!(t.enable_compression);
    }

    #[test]
    fn strategy_wire_names() {
        assert_eq!(
            serde_json::to_string(&CheckpointStrategy::Lazy).unwrap(),
            "\"lazy\""
        );
        let s: CheckpointStrategy = serde_json::from_str("\"immediate\"").unwrap();
        assert_eq!(s, CheckpointStrategy::Immediate);
    }

    #[test]
    fn checkpoint_directory_under_home() {
        let c = CheckpointSettings::default();
        assert!(c.directory.ends_with(".braid/checkpoints"));
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let c: CheckpointSettings = serde_json::from_str(r#"{"strategy":"lazy"}"#).unwrap();
        assert_eq!(c.strategy, CheckpointStrategy::Lazy);
        assert!(c.enabled);
        assert!(c.enable_compression);
    }
}
