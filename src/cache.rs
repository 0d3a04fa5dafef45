//! Small TTL cache for responses that are expensive relative to their
//! freshness requirements (currently sensor availability lookups).
//!
//! Deliberately an explicit value passed through router state rather than
//! ambient module state, so handlers stay deterministic under test.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// ---

/// Key → (value, expiry) map with expiry checked on read.
///
/// Writers prune expired entries in passing, so the map stays bounded by
/// the working set of live keys.
#[derive(Debug, Default)]
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, (V, Instant)>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        // ---
        TtlCache {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a live entry; expired entries are dropped on the way.
    pub fn get(&self, key: &K) -> Option<V> {
        // ---
        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };

        match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value for `ttl`, evicting any already-expired entries.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        // ---
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| now < *expires_at);
        entries.insert(key, (value, now + ttl));
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_roundtrip() {
        // ---
        let cache: TtlCache<(i64, i64), String> = TtlCache::new();
        assert_eq!(cache.get(&(0, 1)), None);

        cache.insert((0, 1), "hit".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get(&(0, 1)), Some("hit".to_string()));
        assert_eq!(cache.get(&(0, 2)), None);
    }

    #[test]
    fn test_expiry() {
        // ---
        let cache: TtlCache<u32, u32> = TtlCache::new();
        cache.insert(1, 10, Duration::from_millis(10));
        assert_eq!(cache.get(&1), Some(10));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn test_insert_prunes_expired_entries() {
        // ---
        let cache: TtlCache<u32, u32> = TtlCache::new();
        cache.insert(1, 10, Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));

        cache.insert(2, 20, Duration::from_secs(60));
        let entries = cache.entries.lock().unwrap();
        assert!(!entries.contains_key(&1));
        assert!(entries.contains_key(&2));
    }

    #[test]
    fn test_overwrite_refreshes_ttl() {
        // ---
        let cache: TtlCache<u32, u32> = TtlCache::new();
        cache.insert(1, 10, Duration::from_millis(10));
        cache.insert(1, 11, Duration::from_secs(60));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&1), Some(11));
    }
}
