//! Error hierarchy for the Braid context engine.
//!
//! Built on [`thiserror`]. The propagation policy is deliberately lopsided:
//! provider, cache, and recovery lookups contain failures locally (the
//! orchestrator must keep assembling a prompt under partial failure), while
//! capacity violations in snapshotting surface loudly — silently dropping a
//! requested durability guarantee is worse than an error the caller must
//! handle.

use thiserror::Error;

/// Top-level error type for the context engine.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A snapshot or checkpoint payload exceeded its hard size ceiling.
    #[error("payload of {actual} bytes exceeds the {limit} byte ceiling")]
    Capacity {
        /// Final payload size in bytes (after any compression).
        actual: usize,
        /// Configured maximum size in bytes.
        limit: usize,
    },

    /// A stored payload could not be parsed or decompressed.
    #[error("corrupt payload: {0}")]
    Corruption(String),

    /// Filesystem failure while persisting or loading state.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize a payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for context engine operations.
pub type Result<T> = std::result::Result<T, ContextError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
