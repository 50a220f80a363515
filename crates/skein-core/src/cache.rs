// ── Result cache ──
//
// Process-lifetime response store keyed by request identity. Entries
// expire logically after a TTL and are evicted lazily, on the next lookup
// of the same key. Nothing sweeps the map proactively.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use skein_api::Envelope;
use tokio::time::Instant;
use tracing::trace;

/// Default time-to-live for cached responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// A cached response and the instant it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub envelope: Envelope,
    pub stored_at: Instant,
}

impl CacheEntry {
    pub fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            stored_at: Instant::now(),
        }
    }

    fn is_live(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// Storage backend shared by collections.
///
/// Implementations must be safe to share across tasks; the TTL check and
/// the lazy eviction in [`get`](Self::get) happen atomically per key.
pub trait CacheStore: Send + Sync {
    /// Return the entry if it is younger than `ttl`. An expired entry is
    /// removed as a side effect and `None` is returned.
    fn get(&self, key: &str, ttl: Duration) -> Option<CacheEntry>;

    /// Insert or overwrite.
    fn set(&self, key: String, entry: CacheEntry);

    /// Drop a single key.
    fn remove(&self, key: &str) -> Option<CacheEntry>;

    /// Drop everything.
    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`CacheStore`] on a sharded `DashMap`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance. Only wiring code should reach for this;
    /// tests build their own.
    pub fn global() -> Arc<MemoryCache> {
        static GLOBAL: OnceLock<Arc<MemoryCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(MemoryCache::new())))
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str, ttl: Duration) -> Option<CacheEntry> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(ttl, now) {
                return Some(entry.clone());
            }
        }
        // Re-checked under the shard lock so a concurrent fresh `set` survives.
        if self
            .entries
            .remove_if(key, |_, entry| !entry.is_live(ttl, now))
            .is_some()
        {
            trace!(key, "evicted expired cache entry");
        }
        None
    }

    fn set(&self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    fn remove(&self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Per-collection view onto a shared [`CacheStore`].
///
/// Reads honour `enabled` and `ttl`. Writes always reach the store so that
/// collections with caching enabled can benefit from fetches made by
/// collections without it.
#[derive(Clone)]
pub struct CachePolicy {
    store: Arc<dyn CacheStore>,
    enabled: bool,
    ttl: Duration,
}

impl CachePolicy {
    pub fn new(store: Arc<dyn CacheStore>, enabled: bool, ttl: Duration) -> Self {
        Self {
            store,
            enabled,
            ttl,
        }
    }

    /// Live entry for `key`, or `None` when disabled, absent, or expired.
    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        self.store.get(key, self.ttl)
    }

    /// Write a fresh entry for `key`.
    pub fn write(&self, key: String, envelope: Envelope) {
        self.store.set(key, CacheEntry::new(envelope));
    }
}

impl std::fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePolicy")
            .field("enabled", &self.enabled)
            .field("ttl", &self.ttl)
            .field("entries", &self.store.len())
            .finish()
    }
}

/// Cache key for a request: the full URL followed by the compact JSON of
/// the body (`null` for read-shaped requests).
///
/// `serde_json` maps are key-ordered, so bodies that differ only in key
/// order produce the same key.
pub fn cache_key(full_url: &str, post_data: Option<&Value>) -> String {
    let body = post_data.map_or_else(|| "null".to_owned(), Value::to_string);
    format!("{full_url}{body}")
}
