//! In-memory truncation recovery store.
//!
//! When the orchestrator removes messages from active context it parks a
//! snapshot here first, so an immediate "undo" is cheap. The store is
//! bounded three ways: a snapshot count cap (LRU-evicted), a hard
//! per-snapshot size ceiling (the one loud failure in the engine), and a
//! time-to-live after which snapshots silently expire.
//!
//! Payloads above the compression threshold are gzipped when enabled,
//! keeping whichever representation is smaller.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use braid_core::errors::{ContextError, Result};
use braid_core::ids::{MessageId, SnapshotId, TruncationId};
use braid_core::messages::ContextMessage;
use braid_settings::TruncationSettings;

use crate::constants::COMPRESSION_THRESHOLD_BYTES;

/// Descriptor for a stored snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncationState {
    /// The truncation this snapshot recovers.
    pub truncation_id: TruncationId,
    /// Identity of the stored snapshot itself.
    pub snapshot_id: SnapshotId,
    /// Caller-supplied reason for the truncation.
    pub reason: String,
    /// IDs of the messages the snapshot covers.
    pub truncated_message_ids: Vec<MessageId>,
    /// Number of messages captured.
    pub message_count: usize,
    /// Stored payload size in bytes (after any compression).
    pub size_bytes: usize,
    /// Whether the stored payload is gzipped.
    pub compressed: bool,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

struct Snapshot {
    state: TruncationState,
    payload: Vec<u8>,
    stored_at: Instant,
    last_access: u64,
}

/// Bounded store of recoverable truncation snapshots.
pub struct TruncationStateManager {
    settings: TruncationSettings,
    snapshots: HashMap<TruncationId, Snapshot>,
    clock: u64,
}

impl TruncationStateManager {
    /// Build a store from settings.
    #[must_use]
    pub fn new(settings: TruncationSettings) -> Self {
        Self {
            settings,
            snapshots: HashMap::new(),
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn expiration(&self) -> Duration {
        Duration::from_millis(self.settings.expiration_ms)
    }

    /// Serialize and store a snapshot of `messages`.
    ///
    /// Payloads over 1KB are gzipped when compression is enabled, keeping
    /// the smaller representation. Returns
    /// [`ContextError::Capacity`] when the final payload exceeds
    /// `max_snapshot_size` — the caller asked for a durability guarantee
    /// the store cannot honor, and that must not be silent.
    ///
    /// When already at `max_snapshots`, the least recently used snapshot
    /// is evicted before insertion, so the store never transiently holds
    /// more than the configured maximum.
    pub fn save_snapshot(
        &mut self,
        truncation_id: &TruncationId,
        messages: &[ContextMessage],
        reason: &str,
    ) -> Result<TruncationState> {
        let raw = serde_json::to_vec(messages)?;

        let mut payload = raw;
        let mut compressed = false;
        if payload.len() > COMPRESSION_THRESHOLD_BYTES && self.settings.enable_compression {
            let gz = gzip(&payload)?;
            if gz.len() < payload.len() {
                payload = gz;
                compressed = true;
            }
        }

        if payload.len() > self.settings.max_snapshot_size {
            return Err(ContextError::Capacity {
                actual: payload.len(),
                limit: self.settings.max_snapshot_size,
            });
        }

        if !self.snapshots.contains_key(truncation_id)
            && self.snapshots.len() >= self.settings.max_snapshots.max(1)
        {
            self.evict_lru();
        }

        let state = TruncationState {
            truncation_id: truncation_id.clone(),
            snapshot_id: SnapshotId::new(),
            reason: reason.to_owned(),
            truncated_message_ids: messages.iter().map(|m| m.id.clone()).collect(),
            message_count: messages.len(),
            size_bytes: payload.len(),
            compressed,
            created_at: Utc::now(),
        };
        let stamp = self.tick();
        let _ = self.snapshots.insert(
            truncation_id.clone(),
            Snapshot {
                state: state.clone(),
                payload,
                stored_at: Instant::now(),
                last_access: stamp,
            },
        );
        debug!(
            id = %truncation_id,
            bytes = state.size_bytes,
            compressed,
            "saved truncation snapshot"
        );
        Ok(state)
    }

    /// Recover the messages of a snapshot, refreshing its recency.
    ///
    /// `None` for unknown or expired ids (an expired entry is evicted by
    /// the failed lookup). A corrupt payload is treated as a miss and
    /// removed rather than surfacing a parse error.
    pub fn recover(&mut self, truncation_id: &TruncationId) -> Option<Vec<ContextMessage>> {
        let expiration = self.expiration();
        match self.snapshots.get(truncation_id) {
            None => None,
            Some(snapshot) if snapshot.stored_at.elapsed() > expiration => {
                let _ = self.snapshots.remove(truncation_id);
                None
            }
            Some(snapshot) => {
                let decoded = decode_messages(&snapshot.payload, snapshot.state.compressed);
                match decoded {
                    Ok(messages) => {
                        let stamp = self.tick();
                        let entry = self.snapshots.get_mut(truncation_id).expect("checked above");
                        entry.last_access = stamp;
                        Some(messages)
                    }
                    Err(error) => {
                        warn!(id = %truncation_id, %error, "corrupt snapshot, removing");
                        let _ = self.snapshots.remove(truncation_id);
                        None
                    }
                }
            }
        }
    }

    /// Drop every expired snapshot, returning the count removed.
    pub fn cleanup(&mut self) -> usize {
        let expiration = self.expiration();
        let before = self.snapshots.len();
        self.snapshots
            .retain(|_, snapshot| snapshot.stored_at.elapsed() <= expiration);
        before - self.snapshots.len()
    }

    /// Descriptors of all recoverable snapshots, newest first.
    ///
    /// Runs [`cleanup`](Self::cleanup) first so callers never see stale
    /// entries.
    pub fn list_recoverable(&mut self) -> Vec<TruncationState> {
        let _ = self.cleanup();
        let mut states: Vec<TruncationState> = self
            .snapshots
            .values()
            .map(|snapshot| snapshot.state.clone())
            .collect();
        states.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        states
    }

    fn evict_lru(&mut self) {
        let victim = self
            .snapshots
            .iter()
            .min_by_key(|(_, snapshot)| snapshot.last_access)
            .map(|(id, _)| id.clone());
        if let Some(id) = victim {
            debug!(id = %id, "evicting least recently used snapshot");
            let _ = self.snapshots.remove(&id);
        }
    }
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

fn decode_messages(payload: &[u8], compressed: bool) -> Result<Vec<ContextMessage>> {
    let bytes = if compressed {
        let mut decoder = GzDecoder::new(payload);
        let mut raw = Vec::new();
        let _ = decoder
            .read_to_end(&mut raw)
            .map_err(|e| ContextError::Corruption(e.to_string()))?;
        raw
    } else {
        payload.to_vec()
    };
    serde_json::from_slice(&bytes).map_err(|e| ContextError::Corruption(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
