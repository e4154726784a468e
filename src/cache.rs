use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;

use crate::util::lock_unpoisoned;

/// Default time-to-live applied when `set` is called without one.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Expiry horizon used when `stored_at + ttl` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A stored value together with its lifetime bounds.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// An entry is valid up to and including its expiry instant.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

/// In-memory key/value store with per-entry expiry.
///
/// Expired entries are removed lazily when they are read; there is no
/// background sweeper. All operations take a short internal lock and never
/// hold it across an `.await`.
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl<V> ResponseCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// A zero TTL stores nothing: such an entry could never be read back.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            return;
        }
        let stored_at = Instant::now();
        let expires_at = stored_at
            .checked_add(ttl)
            .unwrap_or_else(|| stored_at + FAR_FUTURE);
        let entry = CacheEntry {
            value,
            stored_at,
            expires_at,
        };
        lock_unpoisoned(&self.entries).insert(key.into(), entry);
    }

    /// Returns whether a valid entry exists, evicting it if it has expired.
    pub fn has(&self, key: &str) -> bool {
        let mut entries = lock_unpoisoned(&self.entries);
        Self::live_entry(&mut entries, key).is_some()
    }

    /// Removes entries and returns how many were dropped.
    ///
    /// Without a pattern every entry is cleared; otherwise only keys the
    /// pattern matches are removed.
    pub fn invalidate(&self, pattern: Option<&Regex>) -> usize {
        let mut entries = lock_unpoisoned(&self.entries);
        let before = entries.len();
        match pattern {
            None => entries.clear(),
            Some(pattern) => entries.retain(|key, _| !pattern.is_match(key)),
        }
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_entry<'a>(
        entries: &'a mut HashMap<String, CacheEntry<V>>,
        key: &str,
    ) -> Option<&'a CacheEntry<V>> {
        let now = Instant::now();
        let expired = entries.get(key).map(|entry| !entry.is_valid_at(now))?;
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key)
    }
}

impl<V: Clone> ResponseCache<V> {
    /// Returns a copy of the value if present and not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = lock_unpoisoned(&self.entries);
        Self::live_entry(&mut entries, key).map(|entry| entry.value.clone())
    }
}
