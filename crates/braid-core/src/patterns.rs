//! Compiled path pattern matching.
//!
//! Evidence filtering and cache invalidation match paths against glob
//! patterns. Each pattern is compiled once (via `globset`) and reused;
//! `*` and `?` stay within a path segment, `**` crosses segment
//! boundaries.

use globset::{Glob, GlobBuilder, GlobMatcher};

/// A single compiled path pattern.
#[derive(Clone, Debug)]
pub struct PathPattern {
    source: String,
    matcher: GlobMatcher,
}

impl PathPattern {
    /// Compile a glob pattern.
    ///
    /// Supports `*` (within a segment), `?` (single char within a
    /// segment), and `**` (across segments).
    pub fn new(pattern: &str) -> Result<Self, globset::Error> {
        let glob: Glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()?;
        Ok(Self {
            source: pattern.to_owned(),
            matcher: glob.compile_matcher(),
        })
    }

    /// The original pattern text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether `path` matches this pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}

/// An ordered set of compiled patterns.
///
/// Invalid patterns are dropped at construction (they can never match
/// anything meaningful); the caller decides whether an empty set means
/// match-all or match-none.
#[derive(Clone, Debug, Default)]
pub struct PatternSet {
    patterns: Vec<PathPattern>,
}

impl PatternSet {
    /// Compile a set of patterns, silently dropping invalid ones.
    #[must_use]
    pub fn compile(patterns: &[String]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .filter_map(|p| PathPattern::new(p).ok())
                .collect(),
        }
    }

    /// Whether the set contains no compiled patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether any pattern matches `path`.
    #[must_use]
    pub fn matches_any(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
