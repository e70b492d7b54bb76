//! Shields summary messages from further compression.
//!
//! Summaries already stand in for compressed-away history; compressing
//! them again is lossy twice over. The filter decides which summaries
//! are off-limits, under one of three strategies (`all`, `recent`,
//! `weighted`), and removes them from truncation candidate lists.
//!
//! Protection is always evaluated against the *full* message set:
//! [`SummaryProtectionFilter::filter_candidates`] takes both the
//! candidate slice and the complete history so recency and weight
//! comparisons stay global even when the caller filters a partial slice.

use std::collections::HashSet;

use tracing::debug;

use braid_core::ids::MessageId;
use braid_core::messages::ContextMessage;
use braid_settings::{ProtectionSettings, ProtectionStrategy};

/// Observability counters for the active protection configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectionStats {
    /// Summary messages in the full set.
    pub total_summaries: usize,
    /// Summaries currently protected.
    pub protected: usize,
    /// Summaries eligible for further compression.
    pub unprotected: usize,
    /// Whether protection is active at all.
    pub enabled: bool,
    /// The strategy in force.
    pub strategy: ProtectionStrategy,
    /// Cap for the `recent` and `weighted` strategies.
    pub max_protected_summaries: usize,
}

/// Decides which summaries may not be compressed again.
#[derive(Clone, Debug)]
pub struct SummaryProtectionFilter {
    settings: ProtectionSettings,
}

impl SummaryProtectionFilter {
    /// Build a filter over a protection configuration.
    #[must_use]
    pub fn new(settings: ProtectionSettings) -> Self {
        Self { settings }
    }

    /// IDs of protected summaries, evaluated against the full set.
    #[must_use]
    pub fn protected_ids(&self, all_messages: &[ContextMessage]) -> HashSet<MessageId> {
        if !self.settings.enabled {
            return HashSet::new();
        }
        let summaries: Vec<&ContextMessage> = all_messages
            .iter()
            .filter(|m| m.is_summary_message())
            .collect();

        let protected: HashSet<MessageId> = match self.settings.strategy {
            ProtectionStrategy::All => summaries.iter().map(|m| m.id.clone()).collect(),
            ProtectionStrategy::Recent => self.most_recent(&summaries),
            ProtectionStrategy::Weighted => self.highest_weighted(&summaries),
        };
        debug!(
            total = summaries.len(),
            protected = protected.len(),
            strategy = ?self.settings.strategy,
            "evaluated summary protection"
        );
        protected
    }

    /// `candidates` minus every protected message.
    ///
    /// `all_messages` supplies the global context; protection never
    /// depends on which slice is being filtered. Disabled protection is a
    /// full passthrough.
    #[must_use]
    pub fn filter_candidates(
        &self,
        candidates: &[ContextMessage],
        all_messages: &[ContextMessage],
    ) -> Vec<ContextMessage> {
        if !self.settings.enabled {
            return candidates.to_vec();
        }
        let protected = self.protected_ids(all_messages);
        candidates
            .iter()
            .filter(|m| !protected.contains(&m.id))
            .cloned()
            .collect()
    }

    /// Counts plus the active configuration.
    #[must_use]
    pub fn protection_stats(&self, all_messages: &[ContextMessage]) -> ProtectionStats {
        let total_summaries = all_messages
            .iter()
            .filter(|m| m.is_summary_message())
            .count();
        let protected = self.protected_ids(all_messages).len();
        ProtectionStats {
            total_summaries,
            protected,
            unprotected: total_summaries - protected,
            enabled: self.settings.enabled,
            strategy: self.settings.strategy,
            max_protected_summaries: self.settings.max_protected_summaries,
        }
    }

    /// The N most recently created summaries.
    fn most_recent(&self, summaries: &[&ContextMessage]) -> HashSet<MessageId> {
        let mut ordered: Vec<&&ContextMessage> = summaries.iter().collect();
        ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        ordered
            .into_iter()
            .take(self.settings.max_protected_summaries)
            .map(|m| m.id.clone())
            .collect()
    }

    /// The N highest-scoring summaries by composite importance.
    ///
    /// Score increases with token count, with the `compressedCount`
    /// metadata, and with recency. A summary lacking metadata contributes
    /// 0 for the missing factor; it is never excluded outright.
    fn highest_weighted(&self, summaries: &[&ContextMessage]) -> HashSet<MessageId> {
        let weights = &self.settings.weights;
        let count = summaries.len();

        // Recency rank fraction: the newest summary scores 1.0, the
        // oldest 1/count.
        let mut by_age: Vec<usize> = (0..count).collect();
        by_age.sort_by(|&a, &b| summaries[a].created_at.cmp(&summaries[b].created_at));
        let mut recency = vec![0.0f64; count];
        #[allow(clippy::cast_precision_loss)]
        for (rank, idx) in by_age.into_iter().enumerate() {
            recency[idx] = (rank + 1) as f64 / count as f64;
        }

        #[allow(clippy::cast_precision_loss)]
        let mut scored: Vec<(f64, &MessageId)> = summaries
            .iter()
            .enumerate()
            .map(|(idx, m)| {
                let score = weights.token_weight * f64::from(m.tokens).ln_1p()
                    + weights.compression_weight * m.compressed_count() as f64
                    + weights.recency_weight * recency[idx];
                (score, &m.id)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(self.settings.max_protected_summaries)
            .map(|(_, id)| id.clone())
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
