//! Scored, located candidate snippets.
//!
//! An [`Evidence`] item is one candidate inclusion in the prompt: a span
//! of a file plus the score and token cost the budget allocator fits
//! against. Items with a zero token estimate are excluded from fitting.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::EvidenceId;
use crate::signal::Signal;

/// Which provider produced an evidence item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Language-analysis (definitions / references) provider.
    Lsp,
    /// Git diff provider.
    Diff,
    /// Workspace text-search provider.
    Search,
}

impl ProviderKind {
    /// Stable lowercase name, used in cache keys and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lsp => "lsp",
            Self::Diff => "diff",
            Self::Search => "search",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored, located candidate snippet of supporting material.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Unique evidence ID.
    pub id: EvidenceId,
    /// Producing provider.
    pub provider: ProviderKind,
    /// File the snippet comes from.
    pub path: String,
    /// Covered line range, inclusive, 0-based `(start, end)`.
    pub range: (u32, u32),
    /// Snippet text.
    pub content: String,
    /// Non-negative token estimate. Items with 0 never enter fitting.
    pub tokens: u32,
    /// Provider-assigned score before orchestrator adjustment.
    pub base_score: f64,
    /// Final score after orchestrator adjustment; falls back to
    /// `base_score` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    /// Signals that led to this item.
    #[serde(default)]
    pub matched_signals: Vec<Signal>,
    /// Free-form provider metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Evidence {
    /// Effective score used for ordering during fitting.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.final_score.unwrap_or(self.base_score)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
