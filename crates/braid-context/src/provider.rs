//! Evidence provider contract and analysis-backend boundary.
//!
//! Providers turn signals into scored, located [`Evidence`] behind a
//! uniform contract; the orchestrator neither knows nor cares whether a
//! provider queries a language server, a diff, or a text index.
//!
//! The analysis backend is a collaborator injected into the LSP provider.
//! It is duck-typed in the original system; here it is a trait the
//! provider holds behind an optional slot, settable after construction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use braid_core::evidence::{Evidence, ProviderKind};
use braid_core::signal::Signal;

/// Options for a single provider query.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    /// Cap on returned items; `None` means no cap.
    pub max_results: Option<usize>,
    /// Token budget accumulated greedily in result order; items that
    /// would exceed it are dropped, never split.
    pub max_tokens: Option<u64>,
    /// Context lines added above and below each hit.
    pub context_lines: Option<u32>,
    /// Only evidence whose path matches one of these globs is kept
    /// (empty = keep all).
    pub include_patterns: Vec<String>,
    /// Evidence whose path matches one of these globs is dropped.
    pub exclude_patterns: Vec<String>,
}

/// A source of evidence.
///
/// Implementations MUST be safely queryable when no backend is attached
/// (returning empty, not erroring) — the orchestrator keeps assembling a
/// prompt under partial backend failure.
#[async_trait]
pub trait EvidenceProvider: Send + Sync {
    /// Which provider this is (used for budget partitioning and cache keys).
    fn kind(&self) -> ProviderKind;

    /// Whether the provider can currently serve queries.
    fn is_available(&self) -> bool;

    /// Turn signals into scored evidence. Failures degrade to fewer (or
    /// zero) items; this method never fails the overall assembly.
    async fn query(&self, signals: &[Signal], options: &QueryOptions) -> Vec<Evidence>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Analysis backend boundary
// ─────────────────────────────────────────────────────────────────────────────

/// A position inside a document (0-based line and character).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 0-based line.
    pub line: u32,
    /// 0-based character offset.
    pub character: u32,
}

/// A half-open range inside a document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Range start.
    pub start: Position,
    /// Range end.
    pub end: Position,
}

/// A located analysis result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Document URI (`file://...` or backend-specific).
    pub uri: String,
    /// Covered range.
    pub range: Range,
}

/// The language-analysis collaborator queried by the LSP provider.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Where is the symbol at `path:line:col` defined?
    async fn definition(&self, path: &str, line: u32, col: u32) -> anyhow::Result<Vec<Location>>;

    /// Where is the symbol at `path:line:col` referenced?
    async fn references(
        &self,
        path: &str,
        line: u32,
        col: u32,
        include_declaration: bool,
    ) -> anyhow::Result<Vec<Location>>;

    /// Whether the backend has finished initializing. Defaults to ready.
    fn is_initialized(&self) -> bool {
        true
    }
}

/// Convert a `file://` URI to a filesystem path.
///
/// Non-file URIs pass through unchanged.
#[must_use]
pub fn uri_to_path(uri: &str) -> String {
    uri.strip_prefix("file://").unwrap_or(uri).to_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
