//! Budget allocation and provider query settings.

use std::collections::BTreeMap;

use braid_core::evidence::ProviderKind;
use serde::{Deserialize, Serialize};

/// Token budget partitioning settings.
///
/// `total = context_window - output_reserve - system_reserve` (floored
/// at 0); summary and working-set shares are ratios of `total`; the rest
/// is split across providers by `provider_ratios`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BudgetSettings {
    /// Model context window, in tokens.
    pub context_window: u64,
    /// Tokens reserved for the model's output.
    pub output_reserve: u64,
    /// Tokens reserved for the system prompt.
    pub system_reserve: u64,
    /// Share of the total budget reserved for conversation summaries (0–1).
    pub summary_ratio: f64,
    /// Share of the total budget reserved for working-set files (0–1).
    pub working_set_ratio: f64,
    /// Per-provider shares of the evidence budget (0–1 each).
    ///
    /// Ratios are taken as given, not renormalized; under-summing ratios
    /// leave more rounding slack in `remaining`.
    pub provider_ratios: BTreeMap<ProviderKind, f64>,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        let mut provider_ratios = BTreeMap::new();
        let _ = provider_ratios.insert(ProviderKind::Lsp, 0.5);
        let _ = provider_ratios.insert(ProviderKind::Diff, 0.3);
        let _ = provider_ratios.insert(ProviderKind::Search, 0.2);
        Self {
            context_window: 100_000,
            output_reserve: 4_000,
            system_reserve: 2_000,
            summary_ratio: 0.30,
            working_set_ratio: 0.20,
            provider_ratios,
        }
    }
}

/// Evidence provider query settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    /// Maximum evidence items per query.
    pub max_results: usize,
    /// Context lines added above and below each hit.
    pub context_lines: u32,
    /// Per-sub-query timeout (milliseconds).
    pub query_timeout_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            max_results: 20,
            context_lines: 3,
            query_timeout_ms: 2_000,
        }
    }
}

/// Evidence cache settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Maximum number of cached entries.
    pub max_entries: usize,
    /// Uniform time-to-live per entry (milliseconds).
    pub ttl_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl_ms: 300_000,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
