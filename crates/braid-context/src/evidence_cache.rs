//! LRU + TTL cache for provider query results.
//!
//! Keys follow the `<provider>:<path>:<content_hash>` convention (see
//! [`make_key`]) so invalidation can be scoped to a path when a file
//! changes on disk. Expiry is lazy: entries are only checked against the
//! TTL when touched (or during an explicit [`EvidenceCache::cleanup`]),
//! and an expired entry found at read time counts as an eviction.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::debug;

use braid_core::evidence::{Evidence, ProviderKind};
use braid_settings::CacheSettings;

/// Cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CacheStats {
    /// Live entries (may include not-yet-swept expired entries).
    pub size: usize,
    /// Successful `get` lookups.
    pub hits: u64,
    /// Failed `get` lookups (absent or expired).
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 when nothing was looked up yet.
    pub hit_rate: f64,
    /// Entries removed by capacity pressure or expiry.
    pub evictions: u64,
}

/// What to invalidate: one exact key, or every key matching a pattern.
pub enum KeyMatcher<'a> {
    /// A single exact key.
    Exact(&'a str),
    /// All keys matching the regex.
    Pattern(&'a Regex),
}

impl<'a> From<&'a str> for KeyMatcher<'a> {
    fn from(key: &'a str) -> Self {
        Self::Exact(key)
    }
}

impl<'a> From<&'a Regex> for KeyMatcher<'a> {
    fn from(pattern: &'a Regex) -> Self {
        Self::Pattern(pattern)
    }
}

struct CacheEntry {
    value: Vec<Evidence>,
    inserted_at: Instant,
    // Monotonic access stamp; lowest stamp = least recently used.
    last_access: u64,
}

/// Bounded LRU cache with a uniform TTL.
pub struct EvidenceCache {
    entries: HashMap<String, CacheEntry>,
    max_entries: usize,
    ttl: Duration,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl EvidenceCache {
    /// Build a cache from settings.
    #[must_use]
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: settings.max_entries.max(1),
            ttl: Duration::from_millis(settings.ttl_ms),
            clock: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.inserted_at.elapsed() > self.ttl
    }

    /// Insert or overwrite, marking the entry most-recently-used.
    ///
    /// When inserting a new key into a full cache, the least recently
    /// *accessed* entry is evicted first, so the store never transiently
    /// exceeds its capacity.
    pub fn set(&mut self, key: impl Into<String>, value: Vec<Evidence>) {
        let key = key.into();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_lru();
        }
        let stamp = self.tick();
        let _ = self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                last_access: stamp,
            },
        );
    }

    /// Look up a key, refreshing recency on a hit.
    ///
    /// An expired entry is removed, counted as both an eviction and a
    /// miss.
    pub fn get(&mut self, key: &str) -> Option<Vec<Evidence>> {
        match self.entries.get(key) {
            Some(entry) if self.is_expired(entry) => {
                let _ = self.entries.remove(key);
                self.evictions += 1;
                self.misses += 1;
                None
            }
            Some(_) => {
                let stamp = self.tick();
                let entry = self.entries.get_mut(key).expect("checked above");
                entry.last_access = stamp;
                self.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Whether a live (non-expired) entry exists. Does not touch the
    /// hit/miss counters or recency; an expired entry found here is still
    /// swept and counted as an eviction.
    pub fn has(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) if self.is_expired(entry) => {
                let _ = self.entries.remove(key);
                self.evictions += 1;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Remove entries by exact key or pattern, returning the count.
    pub fn invalidate<'a>(&mut self, matcher: impl Into<KeyMatcher<'a>>) -> usize {
        match matcher.into() {
            KeyMatcher::Exact(key) => usize::from(self.entries.remove(key).is_some()),
            KeyMatcher::Pattern(pattern) => {
                let before = self.entries.len();
                self.entries.retain(|key, _| !pattern.is_match(key));
                before - self.entries.len()
            }
        }
    }

    /// Remove every entry whose key encodes `path`, returning the count.
    pub fn invalidate_by_path(&mut self, path: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| key_path(key) != Some(path));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(path, removed, "invalidated cached evidence for path");
        }
        removed
    }

    /// Sweep all expired entries now, returning the count removed.
    pub fn cleanup(&mut self) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() <= ttl);
        let removed = before - self.entries.len();
        self.evictions += removed as u64;
        removed
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let accesses = self.hits + self.misses;
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if accesses == 0 {
            0.0
        } else {
            self.hits as f64 / accesses as f64
        };
        CacheStats {
            size: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            hit_rate,
            evictions: self.evictions,
        }
    }

    fn evict_lru(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            let _ = self.entries.remove(&key);
            self.evictions += 1;
        }
    }
}

/// Build a cache key in the `<provider>:<path>:<content_hash>` convention.
#[must_use]
pub fn make_key(provider: ProviderKind, path: &str, content_hash: &str) -> String {
    format!("{}:{path}:{content_hash}", provider.as_str())
}

/// Extract the path component from a conventional key, if well-formed.
fn key_path(key: &str) -> Option<&str> {
    let (_, rest) = key.split_once(':')?;
    let (path, _) = rest.rsplit_once(':')?;
    Some(path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
