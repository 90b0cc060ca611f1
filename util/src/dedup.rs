//! Short-lived duplicate-submission guard.
//!
//! Keeps a process-local set of recently completed operation fingerprints so
//! that a retried or double-clicked submit within the window is treated as
//! already done instead of creating a second row. Callers check `contains`
//! before doing the work and `record` the fingerprint once the work has
//! actually landed, so a failed attempt never blocks its own retry. Entries
//! expire after a fixed window; expired entries are pruned opportunistically
//! on access.
//!
//! This is best-effort and single-instance only. It is not a substitute for a
//! durable uniqueness constraint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct DedupCache {
    seen: Arc<Mutex<HashMap<String, Instant>>>,
    window: Duration,
}

impl DedupCache {
    pub fn new(window: Duration) -> Self {
        Self {
            seen: Arc::new(Mutex::new(HashMap::new())),
            window,
        }
    }

    /// Cache using the configured `DEDUP_WINDOW_SECONDS`.
    pub fn from_config() -> Self {
        Self::new(Duration::from_secs(crate::config::dedup_window_seconds()))
    }

    /// Returns `true` if `key` was recorded within the window. Never records
    /// anything itself.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut map = self.seen.lock().expect("dedup cache lock poisoned");
        map.retain(|_, recorded| now.duration_since(*recorded) < self.window);
        map.contains_key(key)
    }

    /// Starts the window for `key`. Call only after the operation succeeded.
    pub fn record(&self, key: &str) {
        let now = Instant::now();
        let mut map = self.seen.lock().expect("dedup cache lock poisoned");
        map.retain(|_, recorded| now.duration_since(*recorded) < self.window);
        map.insert(key.to_string(), now);
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(12))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checking_never_records() {
        let cache = DedupCache::new(Duration::from_secs(10));
        assert!(!cache.contains("a:1:hello"));
        assert!(!cache.contains("a:1:hello"));
    }

    #[test]
    fn recorded_key_is_a_duplicate_within_the_window() {
        let cache = DedupCache::new(Duration::from_secs(10));
        cache.record("a:1:hello");
        assert!(cache.contains("a:1:hello"));
        assert!(cache.contains("a:1:hello"));
    }

    #[test]
    fn distinct_keys_do_not_collide() {
        let cache = DedupCache::new(Duration::from_secs(10));
        cache.record("a:1:hello");
        assert!(!cache.contains("a:2:hello"));
        assert!(!cache.contains("b:1:hello"));
    }

    #[tokio::test]
    async fn entry_expires_after_window() {
        let cache = DedupCache::new(Duration::from_millis(40));
        cache.record("a:1:hello");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!cache.contains("a:1:hello"));
    }
}
