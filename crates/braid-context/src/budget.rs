//! Token budget planning and evidence fitting.
//!
//! [`BudgetAllocator::allocate`] partitions the context window into
//! category and per-provider shares with floor arithmetic — the sum of
//! parts never exceeds the evidence budget, and flooring slack is
//! surfaced as `remaining` rather than silently dropped.
//!
//! [`BudgetAllocator::fit_to_budget`] then packs scored evidence into
//! those shares greedily, best-score-first.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use braid_core::evidence::{Evidence, ProviderKind};
use braid_settings::BudgetSettings;

/// The result of budget planning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAllocation {
    /// Window minus output and system reserves, floored at 0.
    pub total: u64,
    /// Tokens reserved for conversation summaries.
    pub summary: u64,
    /// Tokens reserved for working-set file content.
    pub working_set: u64,
    /// Evidence tokens per provider.
    pub per_provider: BTreeMap<ProviderKind, u64>,
    /// Flooring slack inside the evidence sub-budget.
    pub remaining: u64,
}

impl BudgetAllocation {
    /// The evidence sub-budget: everything not reserved for summaries
    /// or the working set.
    #[must_use]
    pub fn evidence_budget(&self) -> u64 {
        self.total
            .saturating_sub(self.summary)
            .saturating_sub(self.working_set)
    }
}

/// Plans token budgets and fits evidence into them.
#[derive(Clone, Debug)]
pub struct BudgetAllocator {
    settings: BudgetSettings,
}

impl BudgetAllocator {
    /// Build an allocator over a fixed budget configuration.
    #[must_use]
    pub fn new(settings: BudgetSettings) -> Self {
        Self { settings }
    }

    /// Partition the window. Pure arithmetic, every share floored.
    ///
    /// Reserves exceeding the window yield an all-zero allocation, never
    /// negative quantities.
    #[must_use]
    pub fn allocate(&self) -> BudgetAllocation {
        let s = &self.settings;
        let total = s
            .context_window
            .saturating_sub(s.output_reserve)
            .saturating_sub(s.system_reserve);

        // Category ratios summing past 1.0 clamp rather than underflow;
        // the summary share wins and the working set takes what's left.
        let summary = floor_share(total, s.summary_ratio);
        let working_set = floor_share(total, s.working_set_ratio).min(total - summary);
        let evidence_budget = total - summary - working_set;

        let per_provider: BTreeMap<ProviderKind, u64> = s
            .provider_ratios
            .iter()
            .map(|(kind, ratio)| (*kind, floor_share(evidence_budget, *ratio)))
            .collect();
        let allocated: u64 = per_provider.values().sum();
        let remaining = evidence_budget - allocated;

        debug!(total, summary, working_set, remaining, "allocated budget");
        BudgetAllocation {
            total,
            summary,
            working_set,
            per_provider,
            remaining,
        }
    }

    /// Greedily pack evidence into an allocation, best score first.
    ///
    /// Items are visited in descending [`Evidence::score`] order (stable,
    /// ties keep input order). Zero-token items are skipped outright. An
    /// item that would overflow its provider's share is skipped while the
    /// scan continues — one greedy provider must not starve the rest —
    /// but once the global evidence budget would be exceeded the scan
    /// stops entirely.
    #[must_use]
    pub fn fit_to_budget(
        &self,
        mut evidence: Vec<Evidence>,
        allocation: &BudgetAllocation,
    ) -> Vec<Evidence> {
        evidence.sort_by(|a, b| b.score().total_cmp(&a.score()));

        let mut global_left = allocation.evidence_budget();
        let mut provider_left: BTreeMap<ProviderKind, u64> = allocation.per_provider.clone();

        let mut fitted = Vec::new();
        for item in evidence {
            let cost = u64::from(item.tokens);
            if cost == 0 {
                continue;
            }
            if cost > global_left {
                break;
            }
            let share = provider_left.entry(item.provider).or_insert(0);
            if cost > *share {
                continue;
            }
            *share -= cost;
            global_left -= cost;
            fitted.push(item);
        }
        fitted
    }
}

/// `floor(base × ratio)`, clamped into `0..=base`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn floor_share(base: u64, ratio: f64) -> u64 {
    ((base as f64 * ratio).floor() as u64).min(base)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::ids::EvidenceId;
    use proptest::prelude::*;

    fn item(provider: ProviderKind, tokens: u32, score: f64) -> Evidence {
        Evidence {
            id: EvidenceId::new(),
            provider,
            path: "src/lib.rs".into(),
            range: (0, 10),
            content: String::new(),
            tokens,
            base_score: score,
            final_score: None,
            matched_signals: Vec::new(),
            metadata: None,
        }
    }

    fn default_allocator() -> BudgetAllocator {
        BudgetAllocator::new(BudgetSettings::default())
    }

    // ── allocate ─────────────────────────────────────────────────────────

    #[test]
    fn default_window_yields_94k_total() {
        let allocation = default_allocator().allocate();
        assert_eq!(allocation.total, 94_000);
        assert_eq!(allocation.summary, 28_200); // 30%
        assert_eq!(allocation.working_set, 18_800); // 20%
        assert_eq!(allocation.evidence_budget(), 47_000);
    }

    #[test]
    fn provider_shares_floored() {
        let allocation = default_allocator().allocate();
        assert_eq!(allocation.per_provider[&ProviderKind::Lsp], 23_500);
        assert_eq!(allocation.per_provider[&ProviderKind::Diff], 14_100);
        assert_eq!(allocation.per_provider[&ProviderKind::Search], 9_400);
        assert_eq!(allocation.remaining, 0);
    }

    #[test]
    fn reserves_exceeding_window_floor_to_zero() {
        let allocation = BudgetAllocator::new(BudgetSettings {
            context_window: 1_000,
            output_reserve: 800,
            system_reserve: 800,
            ..Default::default()
        })
        .allocate();
        assert_eq!(allocation.total, 0);
        assert_eq!(allocation.summary, 0);
        assert_eq!(allocation.working_set, 0);
        assert_eq!(allocation.remaining, 0);
        assert!(allocation.per_provider.values().all(|&v| v == 0));
    }

    #[test]
    fn flooring_slack_lands_in_remaining() {
        let allocation = BudgetAllocator::new(BudgetSettings {
            context_window: 107,
            output_reserve: 0,
            system_reserve: 0,
            summary_ratio: 0.0,
            working_set_ratio: 0.0,
            provider_ratios: [(ProviderKind::Lsp, 0.33), (ProviderKind::Diff, 0.33)]
                .into_iter()
                .collect(),
            ..Default::default()
        })
        .allocate();
        // floor(107 × 0.33) = 35 twice, slack 37.
        assert_eq!(allocation.per_provider[&ProviderKind::Lsp], 35);
        assert_eq!(allocation.per_provider[&ProviderKind::Diff], 35);
        assert_eq!(allocation.remaining, 37);
    }

    #[test]
    fn category_ratios_exceeding_one_clamp_to_total() {
        let allocation = BudgetAllocator::new(BudgetSettings {
            context_window: 1_000,
            output_reserve: 0,
            system_reserve: 0,
            summary_ratio: 0.9,
            working_set_ratio: 0.9,
            ..Default::default()
        })
        .allocate();
        assert_eq!(allocation.total, 1_000);
        assert_eq!(allocation.summary, 900);
        assert_eq!(allocation.working_set, 100);
        assert_eq!(allocation.evidence_budget(), 0);
        assert!(allocation.per_provider.values().all(|&v| v == 0));
        assert_eq!(allocation.remaining, 0);
    }

    proptest! {
        #[test]
        fn budget_is_conserved(
            window in 0u64..1_000_000,
            output in 0u64..50_000,
            system in 0u64..50_000,
            summary_ratio in 0.0f64..1.2,
            working_set_ratio in 0.0f64..1.2,
            lsp in 0.0f64..0.4,
            diff in 0.0f64..0.4,
            search in 0.0f64..0.2,
        ) {
            let allocation = BudgetAllocator::new(BudgetSettings {
                context_window: window,
                output_reserve: output,
                system_reserve: system,
                summary_ratio,
                working_set_ratio,
                provider_ratios: [
                    (ProviderKind::Lsp, lsp),
                    (ProviderKind::Diff, diff),
                    (ProviderKind::Search, search),
                ]
                .into_iter()
                .collect(),
            })
            .allocate();

            let providers: u64 = allocation.per_provider.values().sum();
            prop_assert_eq!(
                allocation.summary + allocation.working_set + providers + allocation.remaining,
                allocation.total
            );
        }
    }

    // ── fit_to_budget ────────────────────────────────────────────────────

    #[test]
    fn fits_all_when_budget_permits() {
        let allocator = default_allocator();
        let allocation = allocator.allocate();
        let fitted = allocator.fit_to_budget(
            vec![
                item(ProviderKind::Lsp, 500, 100.0),
                item(ProviderKind::Lsp, 500, 90.0),
                item(ProviderKind::Lsp, 500, 80.0),
                item(ProviderKind::Lsp, 500, 10.0),
            ],
            &allocation,
        );
        let scores: Vec<f64> = fitted.iter().map(Evidence::score).collect();
        assert_eq!(scores, vec![100.0, 90.0, 80.0, 10.0]);
    }

    #[test]
    fn input_order_presorted_or_not_output_is_descending() {
        let allocator = default_allocator();
        let allocation = allocator.allocate();
        let fitted = allocator.fit_to_budget(
            vec![
                item(ProviderKind::Lsp, 100, 10.0),
                item(ProviderKind::Diff, 100, 80.0),
                item(ProviderKind::Search, 100, 40.0),
            ],
            &allocation,
        );
        let scores: Vec<f64> = fitted.iter().map(Evidence::score).collect();
        assert_eq!(scores, vec![80.0, 40.0, 10.0]);
    }

    #[test]
    fn zero_token_items_skipped() {
        let allocator = default_allocator();
        let allocation = allocator.allocate();
        let fitted = allocator.fit_to_budget(
            vec![
                item(ProviderKind::Lsp, 0, 100.0),
                item(ProviderKind::Lsp, 200, 50.0),
            ],
            &allocation,
        );
        assert_eq!(fitted.len(), 1);
        assert_eq!(fitted[0].tokens, 200);
    }

    #[test]
    fn overflowing_provider_is_skipped_without_starving_others() {
        let allocator = BudgetAllocator::new(BudgetSettings {
            context_window: 10_000,
            output_reserve: 0,
            system_reserve: 0,
            summary_ratio: 0.0,
            working_set_ratio: 0.0,
            provider_ratios: [(ProviderKind::Lsp, 0.01), (ProviderKind::Diff, 0.5)]
                .into_iter()
                .collect(),
        });
        let allocation = allocator.allocate();
        // Lsp share is 100 tokens; the 500-token Lsp item cannot fit but
        // the lower-scored Diff item behind it still must.
        let fitted = allocator.fit_to_budget(
            vec![
                item(ProviderKind::Lsp, 500, 100.0),
                item(ProviderKind::Diff, 500, 50.0),
            ],
            &allocation,
        );
        assert_eq!(fitted.len(), 1);
        assert_eq!(fitted[0].provider, ProviderKind::Diff);
    }

    #[test]
    fn scan_stops_at_global_ceiling() {
        let allocator = BudgetAllocator::new(BudgetSettings {
            context_window: 1_000,
            output_reserve: 0,
            system_reserve: 0,
            summary_ratio: 0.0,
            working_set_ratio: 0.0,
            provider_ratios: [(ProviderKind::Lsp, 0.6), (ProviderKind::Diff, 0.4)]
                .into_iter()
                .collect(),
        });
        let allocation = allocator.allocate();
        // After the 600-token item, 400 evidence tokens remain globally.
        // The 500-token item trips the global ceiling and the scan stops,
        // so the small item behind it is never considered either.
        let fitted = allocator.fit_to_budget(
            vec![
                item(ProviderKind::Lsp, 600, 100.0),
                item(ProviderKind::Diff, 500, 90.0),
                item(ProviderKind::Diff, 100, 80.0),
            ],
            &allocation,
        );
        assert_eq!(fitted.len(), 1);
        assert_eq!(fitted[0].tokens, 600);
    }

    #[test]
    fn final_score_takes_precedence_over_base() {
        let allocator = default_allocator();
        let allocation = allocator.allocate();
        let mut rescored = item(ProviderKind::Lsp, 100, 10.0);
        rescored.final_score = Some(99.0);
        let fitted = allocator.fit_to_budget(
            vec![item(ProviderKind::Lsp, 100, 50.0), rescored],
            &allocation,
        );
        assert!((fitted[0].score() - 99.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_provider_has_no_share() {
        let allocator = BudgetAllocator::new(BudgetSettings {
            provider_ratios: [(ProviderKind::Lsp, 0.5)].into_iter().collect(),
            ..Default::default()
        });
        let allocation = allocator.allocate();
        let fitted =
            allocator.fit_to_budget(vec![item(ProviderKind::Search, 100, 50.0)], &allocation);
        assert!(fitted.is_empty());
    }
}
