//! Signal extraction from raw session inputs.
//!
//! Pure function over its input: user text, error contexts (message +
//! optional stack + optional code), the working-set file list, and the
//! git diff file list become typed, confidence-scored [`Signal`]s.
//! No I/O, no external state — identical input always yields identical
//! output.
//!
//! Stack traces are parsed in two conventions:
//! - bracketed frames: `at handler (src/server.rs:42:17)`
//! - indented frames:  `File "app/main.py", line 12, in main`
//!
//! Frame confidence decays monotonically with depth (frame 0 highest).

use std::sync::LazyLock;

use regex::Regex;

use braid_core::signal::{Signal, SignalSource, SignalType, dedupe_signals};
use serde_json::{Map, json};

use crate::constants::{
    ERROR_CODE_CONFIDENCE, ERROR_NOISE_WORDS, ERROR_TOKEN_CONFIDENCE, PATH_CONFIDENCE,
    STACK_FRAME_BASE_CONFIDENCE, STACK_FRAME_DECAY, STACK_FRAME_MIN_CONFIDENCE,
    SYMBOL_CONFIDENCE,
};

/// camelCase or snake_case identifiers.
static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[a-z][a-z0-9]*(?:[A-Z][A-Za-z0-9]*)+|[A-Za-z][A-Za-z0-9]*(?:_[A-Za-z0-9]+)+)\b")
        .expect("identifier regex")
});

/// Path-like substrings (at least one separator).
static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9_.~-]*(?:/[A-Za-z0-9_.-]+)+").expect("path regex")
});

/// Bracketed stack frames: `at name (file:line:col)` or bare `file:line:col`.
static BRACKET_FRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*at\s+(?:([^\s()]+)\s+\()?([^():\s]+):(\d+):(\d+)\)?\s*$")
        .expect("bracket frame regex")
});

/// Indented frames: `File "path", line N[, in func]`.
static INDENT_FRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*File\s+"([^"]+)",\s+line\s+(\d+)(?:,\s+in\s+(\S+))?"#)
        .expect("indent frame regex")
});

/// Candidate error-message tokens (3+ chars, identifier-shaped).
static ERROR_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]{2,}").expect("error token regex"));

/// One error observed during the session.
#[derive(Clone, Debug, Default)]
pub struct ErrorContext {
    /// The error message body.
    pub message: String,
    /// Raw stack trace text, if captured.
    pub stack: Option<String>,
    /// Machine error code (e.g. `ENOENT`, `E0308`), if present.
    pub code: Option<String>,
}

/// Raw inputs to a single extraction pass.
#[derive(Clone, Debug, Default)]
pub struct ExtractionInput {
    /// Free-text user message, if any.
    pub user_message: Option<String>,
    /// Errors observed since the last turn.
    pub errors: Vec<ErrorContext>,
    /// Files currently in the working set.
    pub working_set: Vec<String>,
    /// Files named in the git diff.
    pub diff_files: Vec<String>,
}

/// Extractor configuration.
#[derive(Clone, Debug)]
pub struct SignalExtractorConfig {
    /// Signals below this confidence are dropped after deduplication.
    pub min_confidence: f64,
}

impl Default for SignalExtractorConfig {
    fn default() -> Self {
        Self { min_confidence: 0.0 }
    }
}

/// Turns raw inputs into deduplicated, confidence-scored signals.
#[derive(Clone, Debug, Default)]
pub struct SignalExtractor {
    config: SignalExtractorConfig,
}

impl SignalExtractor {
    /// Create an extractor with the given configuration.
    #[must_use]
    pub fn new(config: SignalExtractorConfig) -> Self {
        Self { config }
    }

    /// Extract all signals from `input`.
    ///
    /// Results are deduplicated by `(type, value)` keeping the highest
    /// confidence across sources, then filtered by the configured
    /// minimum confidence.
    #[must_use]
    pub fn extract(&self, input: &ExtractionInput) -> Vec<Signal> {
        let mut signals = Vec::new();

        if let Some(message) = input.user_message.as_deref() {
            extract_from_user_message(message, &mut signals);
        }

        for error in &input.errors {
            extract_from_error(error, &mut signals);
        }

        for path in &input.working_set {
            signals.push(Signal::new(
                SignalType::Path,
                path.clone(),
                1.0,
                SignalSource::WorkingSet,
            ));
        }
        for path in &input.diff_files {
            signals.push(Signal::new(
                SignalType::Path,
                path.clone(),
                1.0,
                SignalSource::GitDiff,
            ));
        }

        let deduped = dedupe_signals(signals);
        let floor = self.config.min_confidence;
        deduped
            .into_iter()
            .filter(|s| s.confidence >= floor)
            .collect()
    }
}

fn extract_from_user_message(message: &str, out: &mut Vec<Signal>) {
    for m in PATH_RE.find_iter(message) {
        out.push(Signal::new(
            SignalType::Path,
            m.as_str(),
            PATH_CONFIDENCE,
            SignalSource::UserMessage,
        ));
    }
    for m in IDENT_RE.find_iter(message) {
        out.push(Signal::new(
            SignalType::Symbol,
            m.as_str(),
            SYMBOL_CONFIDENCE,
            SignalSource::UserMessage,
        ));
    }
}

fn extract_from_error(error: &ErrorContext, out: &mut Vec<Signal>) {
    for token in ERROR_TOKEN_RE.find_iter(&error.message) {
        if ERROR_NOISE_WORDS.contains(&token.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        out.push(Signal::new(
            SignalType::ErrorToken,
            token.as_str(),
            ERROR_TOKEN_CONFIDENCE,
            SignalSource::ErrorMessage,
        ));
    }

    if let Some(code) = error.code.as_deref().filter(|c| !c.is_empty()) {
        out.push(Signal::new(
            SignalType::ErrorToken,
            code,
            ERROR_CODE_CONFIDENCE,
            SignalSource::ErrorMessage,
        ));
    }

    if let Some(stack) = error.stack.as_deref() {
        extract_stack_frames(stack, out);
    }
}

/// Parse stack frames in both supported conventions.
///
/// Depth counts across the whole trace in order of appearance, so the
/// topmost frame always carries the highest confidence.
fn extract_stack_frames(stack: &str, out: &mut Vec<Signal>) {
    let mut depth: u32 = 0;

    for caps in BRACKET_FRAME_RE.captures_iter(stack) {
        let file = &caps[2];
        let line: u64 = caps[3].parse().unwrap_or(0);
        let column: u64 = caps[4].parse().unwrap_or(0);
        let mut meta = Map::new();
        let _ = meta.insert("file".into(), json!(file));
        let _ = meta.insert("line".into(), json!(line));
        let _ = meta.insert("column".into(), json!(column));
        if let Some(func) = caps.get(1) {
            let _ = meta.insert("function".into(), json!(func.as_str()));
        }
        push_frame(out, format!("{file}:{line}:{column}"), meta, depth);
        depth += 1;
    }

    for caps in INDENT_FRAME_RE.captures_iter(stack) {
        let file = &caps[1];
        let line: u64 = caps[2].parse().unwrap_or(0);
        let mut meta = Map::new();
        let _ = meta.insert("file".into(), json!(file));
        let _ = meta.insert("line".into(), json!(line));
        if let Some(func) = caps.get(3) {
            let _ = meta.insert("function".into(), json!(func.as_str()));
        }
        push_frame(out, format!("{file}:{line}"), meta, depth);
        depth += 1;
    }
}

fn push_frame(out: &mut Vec<Signal>, value: String, meta: Map<String, serde_json::Value>, depth: u32) {
    let confidence = (STACK_FRAME_BASE_CONFIDENCE * STACK_FRAME_DECAY.powi(depth as i32))
        .max(STACK_FRAME_MIN_CONFIDENCE);
    let mut signal = Signal::new(
        SignalType::StackFrame,
        value,
        confidence,
        SignalSource::StackTrace,
    );
    signal.metadata = Some(meta);
    out.push(signal);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
