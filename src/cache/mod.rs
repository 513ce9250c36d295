//! Time- and size-bounded memoization of finished channel/post records.
//!
//! The cache is a best-effort accelerator with no durability guarantee:
//! entries expire after a fixed TTL, and when the aggregate serialized size
//! exceeds the budget the oldest-stored entries are evicted first. Hits hand
//! back owned clones, so callers can never mutate cached state. Constructed
//! once at startup and injected through `AppState`; there is no process-wide
//! global. Concurrent misses on one key are allowed to race - both compute,
//! last writer wins.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_SIZE: usize = 50 * 1024 * 1024;

struct Entry<V> {
    value: V,
    size: usize,
    stored_at: Instant,
}

struct CacheInner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Keys in insertion order; front is evicted first under size pressure.
    order: VecDeque<String>,
    total_size: usize,
}

pub struct ResponseCache<V> {
    inner: Mutex<CacheInner<V>>,
    ttl: Duration,
    max_size: usize,
}

impl<V> ResponseCache<V>
where
    V: Clone + Serialize,
{
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                total_size: 0,
            }),
            ttl,
            max_size,
        }
    }

    /// The production policy: 5-minute TTL, 50 MiB aggregate budget.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_SIZE)
    }

    /// Look up a key. Expired entries are dropped on observation. The
    /// returned value is an owned clone, structurally independent of the
    /// stored one.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match inner.entries.get(key) {
            Some(entry) => entry.stored_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            if let Some(entry) = inner.entries.remove(key) {
                inner.total_size -= entry.size;
            }
            inner.order.retain(|k| k != key);
            return None;
        }
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store a value unconditionally, replacing any previous entry for the
    /// key. Entry size is estimated by serialized JSON byte length; oldest
    /// entries are evicted while the aggregate exceeds the budget.
    pub fn insert(&self, key: &str, value: V) {
        let size = match serde_json::to_string(&value) {
            Ok(json) => json.len(),
            Err(err) => {
                warn!(error = %err, "failed to size cache entry, skipping store");
                return;
            }
        };

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = inner.entries.remove(key) {
            inner.total_size -= previous.size;
            inner.order.retain(|k| k != key);
        }

        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                size,
                stored_at: Instant::now(),
            },
        );
        inner.order.push_back(key.to_string());
        inner.total_size += size;

        while inner.total_size > self.max_size {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if let Some(evicted) = inner.entries.remove(&oldest) {
                inner.total_size -= evicted.size;
                debug!(key = %oldest, size = evicted.size, "evicted cache entry");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
