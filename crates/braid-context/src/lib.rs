//! # braid-context
//!
//! The context-assembly engine: turns raw session inputs into scored,
//! budget-fitted evidence for the LLM prompt, and provides the recovery
//! machinery for material that later has to leave the context.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `signal_extractor` | Raw inputs → typed, confidence-scored search keys |
//! | `provider` | Evidence provider contract and analysis-backend boundary |
//! | `lsp_provider` | Language-analysis provider (definitions / references) |
//! | `budget` | Token budget partitioning and greedy evidence fitting |
//! | `evidence_cache` | LRU+TTL memoization of provider query results |
//! | `summary_protection` | Shields prior summaries from re-compression |
//! | `truncation` | In-memory, compressed, time-boxed truncation snapshots |
//! | `checkpoint` | Durable disk checkpoints with manifest and cleanup |
//! | `constants` | Scoring weights, thresholds, decay constants |
//!
//! ## Control flow
//!
//! An external orchestrator extracts signals, queries providers (through
//! the cache), fits the results into a [`budget::BudgetAllocation`], and
//! assembles the prompt. When it decides to compress or truncate history
//! it consults [`summary_protection::SummaryProtectionFilter`] first, then
//! uses [`truncation::TruncationStateManager`] for fast in-memory recovery
//! and/or [`checkpoint::DiskCheckpointPersistence`] for durable recovery.
//!
//! One engine instance serves one logical session; shared use requires
//! external serialization.

#![deny(unsafe_code)]

pub mod budget;
pub mod checkpoint;
pub mod constants;
pub mod evidence_cache;
pub mod lsp_provider;
pub mod provider;
pub mod signal_extractor;
pub mod summary_protection;
pub mod truncation;
