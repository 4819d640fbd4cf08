use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.stored_at + self.ttl
    }
}

/// Inserts between sweeps of expired entries.
pub const PURGE_EVERY: usize = 64;

/// Thread-safe TTL cache keyed by request string.
///
/// Entries are populated on miss by the caller and expire on read once their
/// TTL has elapsed. Every `PURGE_EVERY` inserts also sweeps expired entries,
/// so keys that are never read again do not accumulate. Clones share the
/// same underlying map.
#[derive(Clone)]
pub struct ResponseCache<V> {
    entries: Arc<DashMap<String, CacheEntry<V>>>,
    inserts: Arc<AtomicUsize>,
    default_ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(default_ttl: std::time::Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            inserts: Arc::new(AtomicUsize::new(0)),
            default_ttl: Duration::from_std(default_ttl).unwrap_or_else(|_| Duration::zero()),
        }
    }

    /// Cached value for `key`, if present and not expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Utc::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }

        // Expired; a concurrent refresh may have replaced it, so re-check under the lock
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        if (self.inserts.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_EVERY == 0 {
            self.purge_expired();
        }
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Utc::now(),
                ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| entry.is_live(now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
