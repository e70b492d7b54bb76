//! Language-analysis evidence provider.
//!
//! The reference [`EvidenceProvider`] implementation: resolves symbol and
//! stack-frame signals against an injected [`AnalysisBackend`] via two
//! bounded sub-queries per signal — "definition" (weight 60) and
//! "reference" (weight 30) — scaled by the originating signal's
//! confidence.
//!
//! The provider deliberately restricts itself to signals carrying an
//! already-resolved `file`/`line` (1-based, as stack traces report them)
//! in their metadata; it never performs workspace-wide symbol search.
//!
//! Every sub-query is raced against a timeout. A failure or timeout
//! degrades to an empty result for that signal only — the overall query
//! never aborts.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use braid_core::evidence::{Evidence, ProviderKind};
use braid_core::ids::EvidenceId;
use braid_core::patterns::PatternSet;
use braid_core::signal::{Signal, SignalType};
use braid_core::tokens::estimate_tokens;

use crate::constants::{DEFINITION_WEIGHT, FALLBACK_TOKENS_PER_LINE, REFERENCE_WEIGHT};
use crate::provider::{AnalysisBackend, EvidenceProvider, Location, QueryOptions, uri_to_path};

/// LSP provider configuration.
#[derive(Clone, Debug)]
pub struct LspProviderConfig {
    /// Per-sub-query timeout.
    pub query_timeout: Duration,
    /// Default context lines when the query doesn't specify any.
    pub context_lines: u32,
}

impl Default for LspProviderConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_millis(2_000),
            context_lines: 3,
        }
    }
}

impl From<&braid_settings::ProviderSettings> for LspProviderConfig {
    fn from(settings: &braid_settings::ProviderSettings) -> Self {
        Self {
            query_timeout: Duration::from_millis(settings.query_timeout_ms),
            context_lines: settings.context_lines,
        }
    }
}

/// Evidence provider backed by a language-analysis service.
///
/// The backend slot is late-bound: the provider is constructible (and
/// safely queryable, returning empty) before any backend exists, and the
/// backend can be attached or swapped at any point afterwards.
pub struct LspEvidenceProvider {
    config: LspProviderConfig,
    backend: RwLock<Option<Arc<dyn AnalysisBackend>>>,
}

impl LspEvidenceProvider {
    /// Create a provider with no backend attached.
    #[must_use]
    pub fn new(config: LspProviderConfig) -> Self {
        Self {
            config,
            backend: RwLock::new(None),
        }
    }

    /// Attach (or replace) the analysis backend.
    pub fn set_backend(&self, backend: Arc<dyn AnalysisBackend>) {
        *self.backend.write().expect("backend lock poisoned") = Some(backend);
    }

    /// Detach the analysis backend.
    pub fn clear_backend(&self) {
        *self.backend.write().expect("backend lock poisoned") = None;
    }

    fn current_backend(&self) -> Option<Arc<dyn AnalysisBackend>> {
        self.backend.read().expect("backend lock poisoned").clone()
    }

    /// Run one timeout-guarded sub-query, degrading to empty on any fault.
    async fn sub_query(
        &self,
        backend: &Arc<dyn AnalysisBackend>,
        kind: SubQueryKind,
        path: &str,
        line: u32,
        col: u32,
    ) -> Vec<Location> {
        let fut = async {
            match kind {
                SubQueryKind::Definition => backend.definition(path, line, col).await,
                SubQueryKind::Reference => backend.references(path, line, col, false).await,
            }
        };
        match tokio::time::timeout(self.config.query_timeout, fut).await {
            Ok(Ok(locations)) => locations,
            Ok(Err(error)) => {
                warn!(%error, path, line, ?kind, "analysis sub-query failed");
                Vec::new()
            }
            Err(_) => {
                warn!(path, line, ?kind, "analysis sub-query timed out");
                Vec::new()
            }
        }
    }

    /// Convert one analysis hit into an evidence item.
    async fn location_to_evidence(
        &self,
        location: Location,
        weight: f64,
        signal: &Signal,
        context_lines: u32,
        kind: SubQueryKind,
    ) -> Evidence {
        let path = uri_to_path(&location.uri);
        let start = location.range.start.line.saturating_sub(context_lines);
        let end = location.range.end.line.saturating_add(context_lines);

        let (content, tokens) = read_snippet(&path, start, end).await;

        let mut metadata = serde_json::Map::new();
        let _ = metadata.insert("queryKind".into(), serde_json::json!(kind.as_str()));

        Evidence {
            id: EvidenceId::new(),
            provider: ProviderKind::Lsp,
            path,
            range: (start, end),
            content,
            tokens,
            base_score: weight * signal.confidence,
            final_score: None,
            matched_signals: vec![signal.clone()],
            metadata: Some(metadata),
        }
    }
}

#[async_trait]
impl EvidenceProvider for LspEvidenceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Lsp
    }

    fn is_available(&self) -> bool {
        self.current_backend()
            .is_some_and(|backend| backend.is_initialized())
    }

    async fn query(&self, signals: &[Signal], options: &QueryOptions) -> Vec<Evidence> {
        let Some(backend) = self.current_backend() else {
            debug!("no analysis backend attached, returning empty");
            return Vec::new();
        };
        if !backend.is_initialized() {
            debug!("analysis backend not initialized, returning empty");
            return Vec::new();
        }

        let context_lines = options.context_lines.unwrap_or(self.config.context_lines);
        let include = PatternSet::compile(&options.include_patterns);
        let exclude = PatternSet::compile(&options.exclude_patterns);

        let mut results: Vec<Evidence> = Vec::new();
        for signal in signals.iter().filter(|s| is_eligible(s)) {
            // Positions in signal metadata are 1-based (stack trace
            // convention); the backend speaks 0-based.
            let Some(file) = signal.meta_str("file").map(str::to_owned) else {
                continue;
            };
            #[allow(clippy::cast_possible_truncation)]
            let line = signal.meta_u64("line").unwrap_or(1).saturating_sub(1) as u32;
            #[allow(clippy::cast_possible_truncation)]
            let col = signal.meta_u64("column").unwrap_or(1).saturating_sub(1) as u32;

            for (kind, weight) in [
                (SubQueryKind::Definition, DEFINITION_WEIGHT),
                (SubQueryKind::Reference, REFERENCE_WEIGHT),
            ] {
                let locations = self.sub_query(&backend, kind, &file, line, col).await;
                for location in locations {
                    let item = self
                        .location_to_evidence(location, weight, signal, context_lines, kind)
                        .await;
                    results.push(item);
                }
            }
        }

        // Path filtering: include (when given) then exclude.
        results.retain(|item| {
            (include.is_empty() || include.matches_any(&item.path))
                && !(!exclude.is_empty() && exclude.matches_any(&item.path))
        });

        // Dedup by (path, start, end), keeping the first (highest-weight) hit.
        let mut seen = std::collections::HashSet::new();
        results.retain(|item| seen.insert((item.path.clone(), item.range.0, item.range.1)));

        if let Some(max) = options.max_results {
            results.truncate(max);
        }

        if let Some(budget) = options.max_tokens {
            let mut used: u64 = 0;
            results.retain(|item| {
                let cost = u64::from(item.tokens);
                if used + cost > budget {
                    false
                } else {
                    used += cost;
                    true
                }
            });
        }

        results
    }
}

/// Which analysis sub-query a hit came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SubQueryKind {
    Definition,
    Reference,
}

impl SubQueryKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::Reference => "reference",
        }
    }
}

/// Only symbol and stack-frame signals that carry a resolved location.
fn is_eligible(signal: &Signal) -> bool {
    matches!(
        signal.signal_type,
        SignalType::Symbol | SignalType::StackFrame
    ) && signal.meta_str("file").is_some()
        && signal.meta_u64("line").is_some()
}

/// Read the covered lines from disk, estimating tokens from content.
///
/// When the file cannot be read (common for virtual or remote URIs) the
/// content is empty and tokens fall back to a per-line estimate so the
/// item still participates in fitting.
async fn read_snippet(path: &str, start: u32, end: u32) -> (String, u32) {
    let line_span = u64::from(end.saturating_sub(start)) + 1;
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            let snippet: String = text
                .lines()
                .skip(start as usize)
                .take((end - start + 1) as usize)
                .collect::<Vec<_>>()
                .join("\n");
            #[allow(clippy::cast_possible_truncation)]
            let tokens = estimate_tokens(snippet.len()) as u32;
            (snippet, tokens)
        }
        Err(_) => {
            #[allow(clippy::cast_possible_truncation)]
            let tokens = (line_span * FALLBACK_TOKENS_PER_LINE) as u32;
            (String::new(), tokens)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
