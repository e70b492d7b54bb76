//! Token estimation from character counts.
//!
//! The engine budgets in tokens but only ever sees text; estimates use the
//! 4-chars-per-token approximation (consistent with Anthropic's tokenizer).

/// Approximate characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate token count from character count (rounds up).
#[must_use]
pub fn estimate_tokens(chars: usize) -> usize {
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Convert a token budget to a character budget.
#[must_use]
pub fn tokens_to_chars(tokens: usize) -> usize {
    tokens * CHARS_PER_TOKEN
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
