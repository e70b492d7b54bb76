//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BraidSettings::default()`]
//! 2. If `~/.braid/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{BraidSettings, CheckpointStrategy, ProtectionStrategy};

/// Resolve the path to the settings file (`~/.braid/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".braid").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<BraidSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<BraidSettings> {
    let defaults = serde_json::to_value(BraidSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: BraidSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are silently ignored (fall back to file/default)
pub fn apply_env_overrides(settings: &mut BraidSettings) {
    // ── Budget settings ─────────────────────────────────────────────
    if let Some(v) = read_env_u64("BRAID_CONTEXT_WINDOW", 1_000, 10_000_000) {
        settings.budget.context_window = v;
    }
    if let Some(v) = read_env_u64("BRAID_OUTPUT_RESERVE", 0, 1_000_000) {
        settings.budget.output_reserve = v;
    }
    if let Some(v) = read_env_u64("BRAID_SYSTEM_RESERVE", 0, 1_000_000) {
        settings.budget.system_reserve = v;
    }

    // ── Cache settings ──────────────────────────────────────────────
    if let Some(v) = read_env_usize("BRAID_CACHE_MAX_ENTRIES", 1, 1_000_000) {
        settings.cache.max_entries = v;
    }
    if let Some(v) = read_env_u64("BRAID_CACHE_TTL_MS", 1, 86_400_000) {
        settings.cache.ttl_ms = v;
    }

    // ── Truncation settings ─────────────────────────────────────────
    if let Some(v) = read_env_usize("BRAID_TRUNCATION_MAX_SNAPSHOTS", 1, 10_000) {
        settings.truncation.max_snapshots = v;
    }
    if let Some(v) = read_env_bool("BRAID_TRUNCATION_COMPRESSION") {
        settings.truncation.enable_compression = v;
    }

    // ── Checkpoint settings ─────────────────────────────────────────
    if let Some(v) = read_env_bool("BRAID_CHECKPOINTS_ENABLED") {
        settings.checkpoints.enabled = v;
    }
    if let Some(v) = read_env_string("BRAID_CHECKPOINT_DIR") {
        settings.checkpoints.directory = v;
    }
    if let Some(v) = read_env_u64("BRAID_CHECKPOINT_MAX_DISK_USAGE", 1_024, u64::MAX) {
        settings.checkpoints.max_disk_usage = v;
    }
    if let Some(v) = read_env_string("BRAID_CHECKPOINT_STRATEGY") {
        if let Ok(strategy) = serde_json::from_value::<CheckpointStrategy>(Value::String(v)) {
            settings.checkpoints.strategy = strategy;
        }
    }

    // ── Protection settings ─────────────────────────────────────────
    if let Some(v) = read_env_bool("BRAID_PROTECTION_ENABLED") {
        settings.protection.enabled = v;
    }
    if let Some(v) = read_env_string("BRAID_PROTECTION_STRATEGY") {
        if let Ok(strategy) = serde_json::from_value::<ProtectionStrategy>(Value::String(v)) {
            settings.protection.strategy = strategy;
        }
    }
    if let Some(v) = read_env_usize("BRAID_PROTECTION_MAX_SUMMARIES", 0, 10_000) {
        settings.protection.max_protected_summaries = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within `[min, max]`.
pub fn parse_u64_in_range(val: &str, min: u64, max: u64) -> Option<u64> {
    val.trim().parse::<u64>().ok().filter(|v| (min..=max).contains(v))
}

/// Parse a string as a `usize` within `[min, max]`.
pub fn parse_usize_in_range(val: &str, min: usize, max: usize) -> Option<usize> {
    val.trim()
        .parse::<usize>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| parse_bool(&v))
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_u64_in_range(&v, min, max))
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_usize_in_range(&v, min, max))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── deep_merge ───────────────────────────────────────────────────────

    #[test]
    fn merge_objects_recursively() {
        let target = json!({"a": {"x": 1, "y": 2}, "b": 3});
        let source = json!({"a": {"y": 20}});
        let merged = deep_merge(target, source);
        assert_eq!(merged, json!({"a": {"x": 1, "y": 20}, "b": 3}));
    }

    #[test]
    fn merge_replaces_arrays_entirely() {
        let target = json!({"list": [1, 2, 3]});
        let source = json!({"list": [9]});
        assert_eq!(deep_merge(target, source), json!({"list": [9]}));
    }

    #[test]
    fn merge_skips_null_source_values() {
        let target = json!({"keep": "me"});
        let source = json!({"keep": null});
        assert_eq!(deep_merge(target, source), json!({"keep": "me"}));
    }

    #[test]
    fn merge_adds_new_keys() {
        let target = json!({"a": 1});
        let source = json!({"b": 2});
        assert_eq!(deep_merge(target, source), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn merge_primitive_replaced_by_source() {
        assert_eq!(deep_merge(json!(1), json!("two")), json!("two"));
    }

    // ── parse helpers ────────────────────────────────────────────────────

    #[test]
    fn parse_bool_accepts_variants() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_range_enforced() {
        assert_eq!(parse_u64_in_range("500", 1, 1000), Some(500));
        assert_eq!(parse_u64_in_range("5000", 1, 1000), None);
        assert_eq!(parse_u64_in_range("0", 1, 1000), None);
        assert_eq!(parse_u64_in_range("abc", 1, 1000), None);
    }

    #[test]
    fn parse_usize_trims_whitespace() {
        assert_eq!(parse_usize_in_range(" 42 ", 1, 100), Some(42));
    }

    // ── file loading ─────────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings =
            load_settings_from_path(Path::new("/nonexistent/braid/settings.json")).unwrap();
        assert_eq!(settings.budget.context_window, 100_000);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"budget": {"contextWindow": 200000}, "checkpoints": {"strategy": "lazy"}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.budget.context_window, 200_000);
        assert_eq!(settings.checkpoints.strategy, CheckpointStrategy::Lazy);
        // Untouched values survive the merge
        assert_eq!(settings.budget.output_reserve, 4_000);
        assert_eq!(settings.protection.max_protected_summaries, 5);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_settings_from_path(&path).is_err());
    }
}
