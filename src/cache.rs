//! Snapshot cache
//!
//! A small LRU map from [`WindowSpec`] to the last snapshot built for it, tagged with the
//! [`SourceFingerprint`] of the log tree at build time. A lookup is a hit only when the
//! fingerprint still matches and the entry is younger than the configured maximum age.
//!
//! Presets end at "now", so their entries are never older than [`OPEN_WINDOW_MAX_AGE_SECS`]
//! even when expiry is otherwise disabled. Explicit ranges follow the configured age only.
//!
//! ## Eviction
//!
//! When an insert pushes the store over capacity, entries built against an outdated
//! fingerprint go first (least recently used among them), then the least recently used
//! live entry.
//!
//! ## Persistence
//!
//! The store can be written to and read from a versioned JSON document. Unreadable,
//! corrupt or differently versioned files load as an empty cache.

use crate::error::Result;
use crate::file_discovery::SourceFingerprint;
use crate::models::Snapshot;
use crate::window::{ResolvedWindow, WindowSpec};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bumped whenever the persisted layout or the snapshot schema changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Upper bound on the age of an entry for a window that ends at the query time.
pub const OPEN_WINDOW_MAX_AGE_SECS: i64 = 30;

#[derive(Debug, Clone)]
struct CacheEntry {
    fingerprint: SourceFingerprint,
    created_at: DateTime<Utc>,
    last_used: u64,
    snapshot: Arc<Snapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCache {
    version: u32,
    entries: Vec<PersistedEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedEntry {
    window: WindowSpec,
    source_fingerprint: SourceFingerprint,
    created_at: DateTime<Utc>,
    snapshot: Snapshot,
}

#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<WindowSpec, CacheEntry>,
    capacity: usize,
    max_age: Option<Duration>,
    clock: u64,
    stats: CacheStats,
}

impl CacheStore {
    /// `capacity` is clamped to at least one entry. `max_age` of `None` disables expiry.
    pub fn new(capacity: usize, max_age: Option<Duration>) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            max_age,
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest entry still served for `window`.
    fn age_limit(&self, window: &ResolvedWindow) -> Option<Duration> {
        if !window.open_ended {
            return self.max_age;
        }
        let tick = Duration::seconds(OPEN_WINDOW_MAX_AGE_SECS);
        Some(self.max_age.map_or(tick, |age| age.min(tick)))
    }

    /// `window` is `spec` resolved at `now`.
    pub fn get(
        &mut self,
        spec: &WindowSpec,
        window: &ResolvedWindow,
        current: SourceFingerprint,
        now: DateTime<Utc>,
    ) -> Option<Arc<Snapshot>> {
        self.clock += 1;
        let clock = self.clock;
        let max_age = self.age_limit(window);

        let hit = match self.entries.get_mut(spec) {
            None => None,
            Some(entry) if entry.fingerprint != current => {
                debug!(window = %spec, "Cache entry built from older log state");
                None
            }
            Some(entry) if max_age.is_some_and(|age| now - entry.created_at > age) => {
                debug!(window = %spec, "Cache entry expired");
                None
            }
            Some(entry) => {
                entry.last_used = clock;
                Some(Arc::clone(&entry.snapshot))
            }
        };

        match hit {
            Some(_) => self.stats.hits += 1,
            None => self.stats.misses += 1,
        }
        hit
    }

    pub fn put(
        &mut self,
        spec: WindowSpec,
        fingerprint: SourceFingerprint,
        snapshot: Arc<Snapshot>,
        now: DateTime<Utc>,
    ) {
        self.clock += 1;
        self.entries.insert(
            spec,
            CacheEntry {
                fingerprint,
                created_at: now,
                last_used: self.clock,
                snapshot,
            },
        );

        while self.entries.len() > self.capacity {
            let Some(victim) = self.eviction_candidate(&spec, fingerprint) else {
                break;
            };
            self.entries.remove(&victim);
            self.stats.evictions += 1;
            debug!(window = %victim, "Evicted cache entry");
        }
    }

    fn eviction_candidate(
        &self,
        keep: &WindowSpec,
        current: SourceFingerprint,
    ) -> Option<WindowSpec> {
        self.entries
            .iter()
            .filter(|(spec, _)| *spec != keep)
            .min_by_key(|(_, entry)| (entry.fingerprint == current, entry.last_used))
            .map(|(spec, _)| *spec)
    }

    /// Load a persisted cache, dropping entries that do not match `current`.
    pub fn load(
        path: &Path,
        capacity: usize,
        max_age: Option<Duration>,
        current: SourceFingerprint,
    ) -> Self {
        let mut store = Self::new(capacity, max_age);

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return store,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read snapshot cache, starting empty");
                return store;
            }
        };

        let persisted: PersistedCache = match serde_json::from_str(&content) {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Snapshot cache is corrupt, starting empty");
                return store;
            }
        };

        if persisted.version != CACHE_FORMAT_VERSION {
            warn!(
                path = %path.display(),
                found = persisted.version,
                expected = CACHE_FORMAT_VERSION,
                "Snapshot cache version mismatch, starting empty"
            );
            return store;
        }

        let mut entries: Vec<_> = persisted
            .entries
            .into_iter()
            .filter(|entry| entry.source_fingerprint == current)
            .collect();
        entries.sort_by_key(|entry| entry.created_at);

        for entry in entries {
            store.put(
                entry.window,
                entry.source_fingerprint,
                Arc::new(entry.snapshot),
                entry.created_at,
            );
        }
        store.stats = CacheStats::default();

        debug!(path = %path.display(), entries = store.len(), "Loaded snapshot cache");
        store
    }

    /// Write the cache to `path` through a temporary file and a rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(spec, entry)| PersistedEntry {
                window: *spec,
                source_fingerprint: entry.fingerprint,
                created_at: entry.created_at,
                snapshot: (*entry.snapshot).clone(),
            })
            .collect();
        entries.sort_by_key(|entry| entry.created_at);

        let document = PersistedCache {
            version: CACHE_FORMAT_VERSION,
            entries,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&document)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
