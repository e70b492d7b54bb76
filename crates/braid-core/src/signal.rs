//! Typed, confidence-scored search keys.
//!
//! A [`Signal`] is what the extraction layer produces from raw inputs
//! (user text, stack traces, diffs, open files) and what evidence
//! providers consume. Signals are immutable once produced; deduplication
//! happens by `(type, value)` keeping the highest confidence seen.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Kind of search key a signal carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// A code identifier (function, type, variable).
    Symbol,
    /// A filesystem path.
    Path,
    /// A resolved stack trace frame.
    StackFrame,
    /// A significant token from an error message.
    ErrorToken,
}

/// Where a signal was extracted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// The free-text user message.
    UserMessage,
    /// A parsed stack trace.
    StackTrace,
    /// An error message body.
    ErrorMessage,
    /// The session's working-set file list.
    WorkingSet,
    /// A file named in the git diff.
    GitDiff,
}

/// A typed, confidence-scored search key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    /// What kind of key this is.
    pub signal_type: SignalType,
    /// The key itself (identifier, path, token).
    pub value: String,
    /// Extraction confidence, 0..=1.
    pub confidence: f64,
    /// Where the signal came from.
    pub source: SignalSource,
    /// Extra context (e.g. resolved `file`/`line`/`column` for stack frames).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Signal {
    /// Create a signal with no metadata.
    #[must_use]
    pub fn new(
        signal_type: SignalType,
        value: impl Into<String>,
        confidence: f64,
        source: SignalSource,
    ) -> Self {
        Self {
            signal_type,
            value: value.into(),
            confidence,
            source,
            metadata: None,
        }
    }

    /// Read a metadata field as a string.
    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    /// Read a metadata field as an unsigned integer.
    #[must_use]
    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        self.metadata.as_ref()?.get(key)?.as_u64()
    }
}

/// Deduplicate signals by `(type, value)`.
///
/// When the same key was extracted from multiple sources, the surviving
/// signal is the one with the highest confidence — never an average.
/// First-seen order is preserved for the surviving entries.
#[must_use]
pub fn dedupe_signals(signals: Vec<Signal>) -> Vec<Signal> {
    let mut best: HashMap<(SignalType, String), usize> = HashMap::new();
    let mut out: Vec<Signal> = Vec::new();

    for signal in signals {
        let key = (signal.signal_type, signal.value.clone());
        match best.get(&key) {
            Some(&idx) => {
                if signal.confidence > out[idx].confidence {
                    out[idx] = signal;
                }
            }
            None => {
                let _ = best.insert(key, out.len());
                out.push(signal);
            }
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(value: &str, confidence: f64, source: SignalSource) -> Signal {
        Signal::new(SignalType::Symbol, value, confidence, source)
    }

    #[test]
    fn dedupe_keeps_highest_confidence() {
        let out = dedupe_signals(vec![
            sym("parse", 0.6, SignalSource::UserMessage),
            sym("parse", 0.9, SignalSource::StackTrace),
        ]);
        assert_eq!(out.len(), 1);
        assert!((out[0].confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(out[0].source, SignalSource::StackTrace);
    }

    #[test]
    fn dedupe_never_averages() {
        let out = dedupe_signals(vec![
            sym("x", 0.4, SignalSource::UserMessage),
            sym("x", 0.8, SignalSource::ErrorMessage),
        ]);
        assert!((out[0].confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn dedupe_distinguishes_types() {
        let out = dedupe_signals(vec![
            Signal::new(SignalType::Symbol, "main", 0.6, SignalSource::UserMessage),
            Signal::new(SignalType::Path, "main", 0.8, SignalSource::UserMessage),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn dedupe_preserves_first_seen_order() {
        let out = dedupe_signals(vec![
            sym("a", 0.5, SignalSource::UserMessage),
            sym("b", 0.5, SignalSource::UserMessage),
            sym("a", 0.9, SignalSource::StackTrace),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].value, "a");
        assert_eq!(out[1].value, "b");
    }

    #[test]
    fn meta_accessors() {
        let mut meta = Map::new();
        let _ = meta.insert("file".into(), serde_json::json!("src/lib.rs"));
        let _ = meta.insert("line".into(), serde_json::json!(42));
        let mut signal = sym("foo", 0.9, SignalSource::StackTrace);
        signal.metadata = Some(meta);

        assert_eq!(signal.meta_str("file"), Some("src/lib.rs"));
        assert_eq!(signal.meta_u64("line"), Some(42));
        assert_eq!(signal.meta_str("missing"), None);
    }
}
