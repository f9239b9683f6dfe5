//! In-process response cache with a TTL, one instance per pipeline stage.
//!
//! Keys are normalized (trimmed, lowercased) so "Котка" and "котка "
//! share an entry. Expired entries are evicted lazily on lookup.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Normalizes a raw cache key: trim whitespace, lowercase.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

struct CacheInner<T> {
    entries: HashMap<String, (Instant, T)>,
    hits: u64,
    misses: u64,
}

pub struct ResponseCache<T> {
    inner: Mutex<CacheInner<T>>,
    ttl: Duration,
}

impl<T: Clone> ResponseCache<T> {
    pub fn new(ttl: Duration) -> Self {
        ResponseCache {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            ttl,
        }
    }

    /// Looks up a cached response, evicting it first if its TTL elapsed.
    pub fn get(&self, raw_key: &str) -> Option<T> {
        let key = normalize_key(raw_key);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((stored_at, _)) = inner.entries.get(&key) {
            if stored_at.elapsed() >= self.ttl {
                inner.entries.remove(&key);
            }
        }
        match inner.entries.get(&key) {
            Some((_, value)) => {
                let value = value.clone();
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, raw_key: &str, value: T) {
        let key = normalize_key(raw_key);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.insert(key, (Instant::now(), value));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses) since construction.
    pub fn stats(&self) -> (u64, u64) {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        (inner.hits, inner.misses)
    }

    #[cfg(test)]
    fn backdate(&self, raw_key: &str, age: Duration) {
        let key = normalize_key(raw_key);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((stored_at, _)) = inner.entries.get_mut(&key) {
            *stored_at = Instant::now() - age;
        }
    }
}
