//! Keyed TTL cache used to pin a UDP client to the host it was assigned
//! on its first datagram, for a bounded idle window.
//!
//! Grounded on the original proxy's `udp.Cache`: a single map guarded by
//! one lock, with a self-rescheduling sweep that computes, for every
//! entry, how long until it would expire and uses the shortest such
//! duration as the delay until the next sweep.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Sweeps never wait less than this, so a cache churning entries doesn't
/// spin the sweeper.
const MIN_SWEEP_DELAY: Duration = Duration::from_millis(50);

struct Entry<V> {
    value: V,
    last_access: Instant,
}

/// A `put`/`get`/`remove` map with lazy idle eviction.
///
/// `get` refreshes `last_access` on hit, so a session under continuous
/// traffic never expires. Reads and writes share one lock: sweeps are
/// infrequent and brief (no user callbacks or I/O run while it is held),
/// so contention with the hot `get`/`put` path stays low in practice
/// even without a sharded map.
pub struct TtlCache<V> {
    ttl: Duration,
    inner: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        self.inner.write().insert(
            key.into(),
            Entry {
                value,
                last_access: Instant::now(),
            },
        );
    }

    /// Returns the value if present, refreshing its last-access time.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.inner.write();
        let entry = guard.get_mut(key)?;
        entry.last_access = Instant::now();
        Some(entry.value.clone())
    }

    pub fn remove(&self, key: &str) {
        self.inner.write().remove(key);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Evict every entry whose last access is at least `ttl` old. Returns
    /// the delay until the next sweep should run: the shortest remaining
    /// lifetime among surviving entries, or `ttl` if the cache is empty.
    pub fn sweep(&self) -> Duration {
        let now = Instant::now();
        let mut shortest = self.ttl;
        let mut guard = self.inner.write();

        guard.retain(|_, entry| {
            let diff = now.duration_since(entry.last_access);
            if diff >= self.ttl {
                return false;
            }
            let remaining = self.ttl - diff;
            if remaining < shortest {
                shortest = remaining;
            }
            true
        });

        shortest.max(MIN_SWEEP_DELAY)
    }

    /// Spawn a task that sweeps forever, rescheduling itself after each
    /// pass using the delay `sweep` returns. Dropping the returned
    /// `JoinHandle` (or the last `Arc` to this cache) does not stop the
    /// task; abort the handle to stop it explicitly.
    pub fn spawn_sweeper(self: std::sync::Arc<Self>) -> tokio::task::JoinHandle<()>
    where
        V: Send + Sync + 'static,
    {
        tokio::spawn(async move {
            loop {
                let delay = self.sweep();
                tokio::time::sleep(delay).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_refreshes_last_access() {
        let cache = TtlCache::new(Duration::from_millis(50));
        cache.put("a", 1);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("a"), Some(1));
        std::thread::sleep(Duration::from_millis(30));
        // still alive: the get() above refreshed last_access
        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn sweep_evicts_expired_entries() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.put("a", 1);
        std::thread::sleep(Duration::from_millis(40));
        cache.sweep();
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn absent_after_two_ttls_of_idleness() {
        let ttl = Duration::from_millis(20);
        let cache = TtlCache::new(ttl);
        cache.put("a", 1);
        std::thread::sleep(ttl * 2);
        cache.sweep();
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn remove_deletes_entry() {
        let cache = TtlCache::new(Duration::from_secs(5));
        cache.put("a", 1);
        cache.remove("a");
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn sweep_on_empty_cache_returns_ttl() {
        let ttl = Duration::from_secs(3);
        let cache: TtlCache<i32> = TtlCache::new(ttl);
        assert_eq!(cache.sweep(), ttl);
    }
}
