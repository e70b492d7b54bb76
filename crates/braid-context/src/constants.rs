//! Context subsystem constants.
//!
//! Shared constants for signal extraction, evidence scoring, and the
//! recovery stores.

// =============================================================================
// Signal extraction
// =============================================================================

/// Confidence for identifiers tokenized out of the user message.
pub const SYMBOL_CONFIDENCE: f64 = 0.6;

/// Confidence for path-like substrings in the user message.
pub const PATH_CONFIDENCE: f64 = 0.8;

/// Confidence for significant error-message tokens.
pub const ERROR_TOKEN_CONFIDENCE: f64 = 0.7;

/// Confidence for an explicit error code.
pub const ERROR_CODE_CONFIDENCE: f64 = 0.9;

/// Confidence of the topmost stack frame.
pub const STACK_FRAME_BASE_CONFIDENCE: f64 = 0.9;

/// Multiplicative confidence decay per stack frame of depth.
pub const STACK_FRAME_DECAY: f64 = 0.85;

/// Floor below which frame confidence stops decaying.
pub const STACK_FRAME_MIN_CONFIDENCE: f64 = 0.05;

/// Noise words filtered out of error messages.
pub const ERROR_NOISE_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "cannot", "could", "did", "does",
    "for", "from", "had", "has", "have", "in", "into", "is", "it", "its", "may", "might", "not",
    "of", "on", "or", "should", "that", "the", "this", "to", "was", "were", "while", "will",
    "with", "would", "you", "your",
];

// =============================================================================
// Evidence scoring
// =============================================================================

/// Base weight for a "definition" analysis hit.
pub const DEFINITION_WEIGHT: f64 = 60.0;

/// Base weight for a "reference" analysis hit.
pub const REFERENCE_WEIGHT: f64 = 30.0;

/// Fallback token estimate per covered line when snippet content
/// cannot be read from disk.
pub const FALLBACK_TOKENS_PER_LINE: u64 = 10;

// =============================================================================
// Recovery stores
// =============================================================================

/// Serialized payloads above this size are gzip candidates.
pub const COMPRESSION_THRESHOLD_BYTES: usize = 1_024;

/// Checkpoint payload file extension (uncompressed).
pub const CHECKPOINT_EXT: &str = "checkpoint";

/// Checkpoint payload file extension (gzip).
pub const CHECKPOINT_GZ_EXT: &str = "checkpoint.gz";

/// Manifest file name inside the checkpoint directory.
pub const MANIFEST_FILE: &str = "manifest.json";
