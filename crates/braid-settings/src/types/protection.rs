//! Summary protection settings.

use serde::{Deserialize, Serialize};

/// Which summaries are shielded from further compression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionStrategy {
    /// Every summary message is protected.
    All,
    /// The N most recently created summaries are protected.
    #[default]
    Recent,
    /// The N highest-scoring summaries by composite importance.
    Weighted,
}

/// Coefficients for the `weighted` strategy's composite score.
///
/// The exact constants are not semantically load-bearing — only the
/// property that the score increases with each factor — so they are
/// exposed here rather than hard-coded.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtectionWeights {
    /// Weight on `ln(1 + tokens)`.
    pub token_weight: f64,
    /// Weight on the summary's `compressedCount` metadata.
    pub compression_weight: f64,
    /// Weight on recency rank (newest summary scores highest).
    pub recency_weight: f64,
}

impl Default for ProtectionWeights {
    fn default() -> Self {
        Self {
            token_weight: 1.0,
            compression_weight: 2.0,
            recency_weight: 3.0,
        }
    }
}

/// Summary protection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtectionSettings {
    /// Master switch; when false both filter operations are no-ops.
    pub enabled: bool,
    /// Active protection strategy.
    pub strategy: ProtectionStrategy,
    /// Cap on protected summaries for `recent` and `weighted`.
    pub max_protected_summaries: usize,
    /// Composite score coefficients for `weighted`.
    pub weights: ProtectionWeights,
}

impl Default for ProtectionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: ProtectionStrategy::Recent,
            max_protected_summaries: 5,
            weights: ProtectionWeights::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
