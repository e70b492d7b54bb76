//! Durable checkpoint persistence.
//!
//! Checkpoints outlive the process: each one is a payload file
//! (`<id>.checkpoint`, or `<id>.checkpoint.gz` when compressed) under a
//! configured directory, indexed by a `manifest.json` beside them. The
//! compression state is encoded in the file name so `load` can dispatch
//! without consulting the manifest.
//!
//! Write ordering is payload first, manifest second; a crash between the
//! two leaves either an unindexed payload (recovered by the manifest
//! rebuild scan) or nothing. A manifest entry pointing at a missing or
//! corrupt file is removed the first time `load` trips over it.
//!
//! The `lazy` strategy returns before the write lands. An in-memory
//! pending buffer serves `load` in the meantime and is cleared only once
//! the disk write is acknowledged.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use braid_core::errors::{ContextError, Result};
use braid_core::ids::CheckpointId;
use braid_core::messages::ContextMessage;
use braid_settings::{CheckpointSettings, CheckpointStrategy};

use crate::constants::{CHECKPOINT_EXT, CHECKPOINT_GZ_EXT, MANIFEST_FILE};

/// What gets checkpointed: the message history plus free-form metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointPayload {
    /// Checkpoint identity.
    pub checkpoint_id: CheckpointId,
    /// Full message history at checkpoint time.
    pub messages: Vec<ContextMessage>,
    /// Associated metadata (model, session tags, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Manifest entry describing one persisted checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRecord {
    /// Checkpoint identity.
    pub checkpoint_id: CheckpointId,
    /// Absolute path of the payload file ("" when persistence is disabled).
    pub file_path: String,
    /// Payload size on disk in bytes.
    pub size_bytes: u64,
    /// Number of messages captured.
    pub message_count: usize,
    /// Whether the payload file is gzipped.
    pub compressed: bool,
    /// When the checkpoint was persisted.
    pub created_at: DateTime<Utc>,
}

struct Inner {
    settings: CheckpointSettings,
    manifest: tokio::sync::Mutex<Vec<CheckpointRecord>>,
    pending: std::sync::Mutex<HashMap<CheckpointId, CheckpointPayload>>,
}

/// Disk-backed checkpoint store.
pub struct DiskCheckpointPersistence {
    inner: Arc<Inner>,
}

impl DiskCheckpointPersistence {
    /// Open (or initialize) a checkpoint store.
    ///
    /// When the manifest file is missing but payload files exist, the
    /// manifest is rebuilt by scanning the directory. Disabled stores
    /// skip the scan entirely.
    pub fn new(settings: CheckpointSettings) -> Result<Self> {
        let manifest = if settings.enabled {
            load_or_rebuild_manifest(Path::new(&settings.directory))?
        } else {
            Vec::new()
        };
        Ok(Self {
            inner: Arc::new(Inner {
                settings,
                manifest: tokio::sync::Mutex::new(manifest),
                pending: std::sync::Mutex::new(HashMap::new()),
            }),
        })
    }

    fn dir(&self) -> &Path {
        Path::new(&self.inner.settings.directory)
    }

    /// Persist a checkpoint, returning its manifest record.
    ///
    /// `immediate` blocks until payload and manifest are on disk. `lazy`
    /// returns at once; until the background write lands, `load` serves
    /// the checkpoint from the pending buffer.
    pub async fn persist(&self, payload: CheckpointPayload) -> Result<CheckpointRecord> {
        if !self.inner.settings.enabled {
            return Ok(disabled_record(&payload));
        }

        let bytes = encode_payload(&payload, self.inner.settings.enable_compression)?;
        let compressed = self.inner.settings.enable_compression;
        let file_path = payload_path(self.dir(), &payload.checkpoint_id, compressed);

        let record = CheckpointRecord {
            checkpoint_id: payload.checkpoint_id.clone(),
            file_path: file_path.to_string_lossy().into_owned(),
            size_bytes: bytes.len() as u64,
            message_count: payload.messages.len(),
            compressed,
            created_at: Utc::now(),
        };

        match self.inner.settings.strategy {
            CheckpointStrategy::Immediate => {
                self.write_checkpoint(&file_path, &bytes, record.clone()).await?;
            }
            CheckpointStrategy::Lazy => {
                {
                    let mut pending = self.inner.pending.lock().expect("pending lock poisoned");
                    let _ = pending.insert(payload.checkpoint_id.clone(), payload.clone());
                }
                let store = Self {
                    inner: Arc::clone(&self.inner),
                };
                let task_record = record.clone();
                let id = payload.checkpoint_id.clone();
                drop(tokio::spawn(async move {
                    match store.write_checkpoint(&file_path, &bytes, task_record).await {
                        Ok(()) => {
                            let mut pending =
                                store.inner.pending.lock().expect("pending lock poisoned");
                            let _ = pending.remove(&id);
                        }
                        Err(error) => {
                            // Keep the pending entry so the checkpoint
                            // stays loadable in-memory.
                            warn!(id = %id, %error, "lazy checkpoint write failed");
                        }
                    }
                }));
            }
        }
        Ok(record)
    }

    /// Write the payload file, then record it in the manifest.
    async fn write_checkpoint(
        &self,
        file_path: &Path,
        bytes: &[u8],
        record: CheckpointRecord,
    ) -> Result<()> {
        tokio::fs::create_dir_all(self.dir()).await?;
        tokio::fs::write(file_path, bytes).await?;
        debug!(id = %record.checkpoint_id, bytes = bytes.len(), "wrote checkpoint payload");

        let mut manifest = self.inner.manifest.lock().await;
        manifest.retain(|r| r.checkpoint_id != record.checkpoint_id);
        manifest.push(record);
        self.write_manifest(&manifest).await
    }

    /// Load a checkpoint, from the pending buffer or from disk.
    ///
    /// `None` for missing or corrupt payloads; a stale manifest entry
    /// found on that path is removed.
    pub async fn load(&self, checkpoint_id: &CheckpointId) -> Option<CheckpointPayload> {
        if !self.inner.settings.enabled {
            return None;
        }
        {
            let pending = self.inner.pending.lock().expect("pending lock poisoned");
            if let Some(payload) = pending.get(checkpoint_id) {
                return Some(payload.clone());
            }
        }

        // Extension encodes compression; try compressed first.
        for compressed in [true, false] {
            let path = payload_path(self.dir(), checkpoint_id, compressed);
            match tokio::fs::read(&path).await {
                Ok(bytes) => match decode_payload(&bytes, compressed) {
                    Ok(payload) => return Some(payload),
                    Err(error) => {
                        warn!(id = %checkpoint_id, %error, "corrupt checkpoint, dropping record");
                        let _ = tokio::fs::remove_file(&path).await;
                        self.remove_manifest_entry(checkpoint_id).await;
                        return None;
                    }
                },
                Err(_) => {}
            }
        }
        // No payload on disk; heal the manifest if it still points here.
        self.remove_manifest_entry(checkpoint_id).await;
        None
    }

    /// Manifest entries, newest first.
    pub async fn list(&self) -> Vec<CheckpointRecord> {
        let manifest = self.inner.manifest.lock().await;
        let mut records = manifest.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Remove a checkpoint's payload file and manifest entry.
    ///
    /// Returns whether anything was removed.
    pub async fn delete(&self, checkpoint_id: &CheckpointId) -> Result<bool> {
        if !self.inner.settings.enabled {
            return Ok(false);
        }
        let pending_removed = {
            let mut pending = self.inner.pending.lock().expect("pending lock poisoned");
            pending.remove(checkpoint_id).is_some()
        };

        let mut file_removed = false;
        for compressed in [true, false] {
            let path = payload_path(self.dir(), checkpoint_id, compressed);
            if tokio::fs::remove_file(&path).await.is_ok() {
                file_removed = true;
            }
        }

        let mut manifest = self.inner.manifest.lock().await;
        let before = manifest.len();
        manifest.retain(|r| &r.checkpoint_id != checkpoint_id);
        let entry_removed = manifest.len() != before;
        if entry_removed {
            self.write_manifest(&manifest).await?;
        }
        Ok(pending_removed || file_removed || entry_removed)
    }

    /// Evict oldest checkpoints until disk usage is under the cap.
    ///
    /// Returns the number evicted; a no-op when already under the cap.
    pub async fn cleanup(&self) -> Result<usize> {
        if !self.inner.settings.enabled {
            return Ok(0);
        }
        let mut manifest = self.inner.manifest.lock().await;
        manifest.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut usage: u64 = manifest.iter().map(|r| r.size_bytes).sum();
        let mut evicted = 0;
        while usage > self.inner.settings.max_disk_usage && !manifest.is_empty() {
            let victim = manifest.remove(0);
            let _ = tokio::fs::remove_file(&victim.file_path).await;
            usage -= victim.size_bytes;
            evicted += 1;
            debug!(id = %victim.checkpoint_id, "evicted checkpoint for disk usage");
        }
        if evicted > 0 {
            self.write_manifest(&manifest).await?;
        }
        Ok(evicted)
    }

    /// Total recorded payload bytes on disk.
    pub async fn disk_usage(&self) -> u64 {
        let manifest = self.inner.manifest.lock().await;
        manifest.iter().map(|r| r.size_bytes).sum()
    }

    async fn remove_manifest_entry(&self, checkpoint_id: &CheckpointId) {
        let mut manifest = self.inner.manifest.lock().await;
        let before = manifest.len();
        manifest.retain(|r| &r.checkpoint_id != checkpoint_id);
        if manifest.len() != before {
            if let Err(error) = self.write_manifest(&manifest).await {
                warn!(%error, "failed to rewrite manifest after healing");
            }
        }
    }

    async fn write_manifest(&self, records: &[CheckpointRecord]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(self.dir().join(MANIFEST_FILE), bytes).await?;
        Ok(())
    }
}

fn disabled_record(payload: &CheckpointPayload) -> CheckpointRecord {
    CheckpointRecord {
        checkpoint_id: payload.checkpoint_id.clone(),
        file_path: String::new(),
        size_bytes: 0,
        message_count: 0,
        compressed: false,
        created_at: Utc::now(),
    }
}

fn payload_path(dir: &Path, id: &CheckpointId, compressed: bool) -> PathBuf {
    let ext = if compressed {
        CHECKPOINT_GZ_EXT
    } else {
        CHECKPOINT_EXT
    };
    dir.join(format!("{id}.{ext}"))
}

fn encode_payload(payload: &CheckpointPayload, compress: bool) -> Result<Vec<u8>> {
    let raw = serde_json::to_vec(payload)?;
    if !compress {
        return Ok(raw);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

fn decode_payload(bytes: &[u8], compressed: bool) -> Result<CheckpointPayload> {
    let raw = if compressed {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = Vec::new();
        let _ = decoder
            .read_to_end(&mut out)
            .map_err(|e| ContextError::Corruption(e.to_string()))?;
        out
    } else {
        bytes.to_vec()
    };
    serde_json::from_slice(&raw).map_err(|e| ContextError::Corruption(e.to_string()))
}

/// Read the manifest, or rebuild it from payload files when missing.
fn load_or_rebuild_manifest(dir: &Path) -> Result<Vec<CheckpointRecord>> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        let bytes = std::fs::read(&manifest_path)?;
        return Ok(serde_json::from_slice(&bytes).unwrap_or_else(|error| {
            warn!(%error, "unreadable manifest, rebuilding from directory");
            scan_directory(dir)
        }));
    }
    if dir.exists() {
        let records = scan_directory(dir);
        if !records.is_empty() {
            debug!(count = records.len(), "rebuilt checkpoint manifest from scan");
            let bytes = serde_json::to_vec_pretty(&records)?;
            std::fs::write(&manifest_path, bytes)?;
        }
        return Ok(records);
    }
    Ok(Vec::new())
}

/// Derive manifest records from the payload files present on disk.
///
/// Unparseable payloads are skipped; they'd only produce entries that
/// `load` would immediately heal away.
fn scan_directory(dir: &Path) -> Vec<CheckpointRecord> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut records = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let compressed = if name.ends_with(&format!(".{CHECKPOINT_GZ_EXT}")) {
            true
        } else if name.ends_with(&format!(".{CHECKPOINT_EXT}")) {
            false
        } else {
            continue;
        };
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        let Ok(payload) = decode_payload(&bytes, compressed) else {
            continue;
        };
        let created_at = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map_or_else(Utc::now, DateTime::<Utc>::from);
        records.push(CheckpointRecord {
            checkpoint_id: payload.checkpoint_id,
            file_path: path.to_string_lossy().into_owned(),
            size_bytes: bytes.len() as u64,
            message_count: payload.messages.len(),
            compressed,
            created_at,
        });
    }
    records
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> CheckpointSettings {
        CheckpointSettings {
            enabled: true,
            directory: dir.path().to_string_lossy().into_owned(),
            max_disk_usage: 104_857_600,
            strategy: CheckpointStrategy::Immediate,
            enable_compression: true,
        }
    }

    fn payload(n: usize) -> CheckpointPayload {
        CheckpointPayload {
            checkpoint_id: CheckpointId::new(),
            messages: (0..n)
                .map(|i| ContextMessage::user(format!("checkpointed message {i}")))
                .collect(),
            metadata: None,
        }
    }

    async fn wait_for_file(path: &str) {
        for _ in 0..100 {
            if Path::new(path).exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("file never appeared: {path}");
    }

    // ── persist / load ───────────────────────────────────────────────────

    #[tokio::test]
    async fn immediate_persist_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(settings(&dir)).unwrap();
        let p = payload(10);

        let record = store.persist(p.clone()).await.unwrap();
        assert!(record.compressed);
        assert!(record.file_path.ends_with(".checkpoint.gz"));
        assert!(Path::new(&record.file_path).exists());
        assert_eq!(store.load(&p.checkpoint_id).await.unwrap(), p);
    }

    #[tokio::test]
    async fn uncompressed_extension_when_compression_disabled() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(CheckpointSettings {
            enable_compression: false,
            ..settings(&dir)
        })
        .unwrap();
        let p = payload(3);
        let record = store.persist(p.clone()).await.unwrap();
        assert!(!record.compressed);
        assert!(record.file_path.ends_with(".checkpoint"));
        assert_eq!(store.load(&p.checkpoint_id).await.unwrap(), p);
    }

    #[tokio::test]
    async fn load_unknown_id_is_none() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(settings(&dir)).unwrap();
        assert!(store.load(&CheckpointId::new()).await.is_none());
    }

    #[tokio::test]
    async fn repersisting_same_id_keeps_one_manifest_entry() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(settings(&dir)).unwrap();
        let p = payload(2);
        let _ = store.persist(p.clone()).await.unwrap();
        let _ = store.persist(p).await.unwrap();
        assert_eq!(store.list().await.len(), 1);
    }

    // ── lazy strategy ────────────────────────────────────────────────────

    #[tokio::test]
    async fn lazy_persist_serves_from_pending_then_disk() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(CheckpointSettings {
            strategy: CheckpointStrategy::Lazy,
            ..settings(&dir)
        })
        .unwrap();
        let p = payload(5);

        let record = store.persist(p.clone()).await.unwrap();
        // Loadable immediately, before the write necessarily landed.
        assert_eq!(store.load(&p.checkpoint_id).await.unwrap(), p);

        wait_for_file(&record.file_path).await;
        // Give the task a beat to clear the pending buffer.
        for _ in 0..100 {
            if store.inner.pending.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(store.inner.pending.lock().unwrap().is_empty());
        assert_eq!(store.load(&p.checkpoint_id).await.unwrap(), p);
    }

    // ── corruption healing ───────────────────────────────────────────────

    #[tokio::test]
    async fn corrupt_file_loads_none_and_leaves_list() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(settings(&dir)).unwrap();
        let p = payload(5);
        let record = store.persist(p.clone()).await.unwrap();

        std::fs::write(&record.file_path, b"\x1f\x8bnot a gzip stream").unwrap();
        assert!(store.load(&p.checkpoint_id).await.is_none());
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn missing_file_heals_manifest_entry() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(settings(&dir)).unwrap();
        let p = payload(2);
        let record = store.persist(p.clone()).await.unwrap();

        std::fs::remove_file(&record.file_path).unwrap();
        assert!(store.load(&p.checkpoint_id).await.is_none());
        assert!(store.list().await.is_empty());
    }

    // ── list / delete ────────────────────────────────────────────────────

    #[tokio::test]
    async fn list_is_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(settings(&dir)).unwrap();
        let first = payload(1);
        let second = payload(1);
        let _ = store.persist(first.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let _ = store.persist(second.clone()).await.unwrap();

        let listed = store.list().await;
        assert_eq!(listed[0].checkpoint_id, second.checkpoint_id);
        assert_eq!(listed[1].checkpoint_id, first.checkpoint_id);
    }

    #[tokio::test]
    async fn delete_removes_file_and_entry() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(settings(&dir)).unwrap();
        let p = payload(2);
        let record = store.persist(p.clone()).await.unwrap();

        assert!(store.delete(&p.checkpoint_id).await.unwrap());
        assert!(!Path::new(&record.file_path).exists());
        assert!(store.list().await.is_empty());
        assert!(!store.delete(&p.checkpoint_id).await.unwrap());
    }

    // ── cleanup / usage ──────────────────────────────────────────────────

    #[tokio::test]
    async fn disk_usage_sums_recorded_sizes() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(settings(&dir)).unwrap();
        let a = store.persist(payload(5)).await.unwrap();
        let b = store.persist(payload(5)).await.unwrap();
        assert_eq!(store.disk_usage().await, a.size_bytes + b.size_bytes);
    }

    #[tokio::test]
    async fn cleanup_evicts_oldest_until_under_cap() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(settings(&dir)).unwrap();
        let oldest = payload(10);
        let _ = store.persist(oldest.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let kept = store.persist(payload(10)).await.unwrap();

        // Cap that fits exactly one of the two payloads.
        let store = DiskCheckpointPersistence::new(CheckpointSettings {
            max_disk_usage: kept.size_bytes,
            ..settings(&dir)
        })
        .unwrap();
        let evicted = store.cleanup().await.unwrap();
        assert_eq!(evicted, 1);
        assert!(store.load(&oldest.checkpoint_id).await.is_none());
        assert!(store.disk_usage().await <= kept.size_bytes);
    }

    #[tokio::test]
    async fn cleanup_noop_under_cap() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(settings(&dir)).unwrap();
        let _ = store.persist(payload(2)).await.unwrap();
        assert_eq!(store.cleanup().await.unwrap(), 0);
    }

    // ── manifest rebuild ─────────────────────────────────────────────────

    #[tokio::test]
    async fn missing_manifest_rebuilt_from_payload_files() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(settings(&dir)).unwrap();
        let a = payload(3);
        let b = payload(4);
        let _ = store.persist(a.clone()).await.unwrap();
        let _ = store.persist(b.clone()).await.unwrap();

        std::fs::remove_file(dir.path().join(MANIFEST_FILE)).unwrap();
        let reopened = DiskCheckpointPersistence::new(settings(&dir)).unwrap();
        let listed = reopened.list().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(reopened.load(&a.checkpoint_id).await.unwrap(), a);
        let rebuilt = listed
            .iter()
            .find(|r| r.checkpoint_id == b.checkpoint_id)
            .unwrap();
        assert_eq!(rebuilt.message_count, 4);
    }

    // ── disabled ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn disabled_store_is_inert() {
        let dir = TempDir::new().unwrap();
        let store = DiskCheckpointPersistence::new(CheckpointSettings {
            enabled: false,
            ..settings(&dir)
        })
        .unwrap();
        let p = payload(3);

        let record = store.persist(p.clone()).await.unwrap();
        assert_eq!(record.size_bytes, 0);
        assert!(record.file_path.is_empty());
        assert!(store.load(&p.checkpoint_id).await.is_none());
        assert!(store.list().await.is_empty());
        assert!(!store.delete(&p.checkpoint_id).await.unwrap());
        assert_eq!(store.cleanup().await.unwrap(), 0);
        assert_eq!(store.disk_usage().await, 0);
    }
}
