//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the JSON
//! wire format. Each type implements [`Default`] with production default
//! values. Types marked with `#[serde(default)]` allow partial JSON —
//! missing fields get their default value during deserialization.

mod budget;
mod protection;
mod recovery;

pub use budget::*;
pub use protection::*;
pub use recovery::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the Braid context engine.
///
/// Loaded from `~/.braid/settings.json` with defaults applied for
/// missing fields. Environment variables can override specific values.
///
/// # JSON Format
///
/// All field names are camelCase. Example:
///
/// ```json
/// {
///   "version": "0.1.0",
///   "budget": { "contextWindow": 200000 },
///   "checkpoints": { "strategy": "lazy" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BraidSettings {
    /// Settings schema version.
    pub version: String,
    /// Budget allocation settings.
    pub budget: BudgetSettings,
    /// Evidence cache settings.
    pub cache: CacheSettings,
    /// Evidence provider query settings.
    pub providers: ProviderSettings,
    /// Truncation recovery settings.
    pub truncation: TruncationSettings,
    /// Disk checkpoint persistence settings.
    pub checkpoints: CheckpointSettings,
    /// Summary protection settings.
    pub protection: ProtectionSettings,
}

impl Default for BraidSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            budget: BudgetSettings::default(),
            cache: CacheSettings::default(),
            providers: ProviderSettings::default(),
            truncation: TruncationSettings::default(),
            checkpoints: CheckpointSettings::default(),
            protection: ProtectionSettings::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
