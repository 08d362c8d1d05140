//! A small map with per-entry expiry.
//!
//! Expiry is measured from insertion. Expired entries are dropped lazily when
//! touched, by an explicit [`TtlCache::sweep`], or by a background sweeper
//! spawned with [`TtlCache::spawn_sweeper`].

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Default lifetime of an entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Mutex-guarded map whose entries expire a fixed time after insertion.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the default lifetime of new entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Inserts with the default lifetime, replacing any previous entry.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.ttl);
    }

    /// Inserts with an explicit lifetime.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.lock().insert(key, Entry { value, expires_at });
    }

    /// Returns a clone of a live entry.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.fetch(key, |_| false)
    }

    /// Returns a clone of a live entry, removing it when `consume` says so.
    ///
    /// Lookup and removal happen under one lock, so two concurrent callers
    /// can never both consume the same entry.
    pub fn fetch<Q>(&self, key: &Q, consume: impl FnOnce(&V) -> bool) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if !entry.is_live(now) {
            entries.remove(key);
            return None;
        }
        if consume(&entry.value) {
            entries.remove(key).map(|e| e.value)
        } else {
            Some(entry.value.clone())
        }
    }

    /// Removes an entry, returning it if it was still live.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.entries
            .lock()
            .remove(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value)
    }

    /// Returns true if a live entry exists for `key`.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .is_some_and(|e| e.is_live(now))
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Spawns a task that sweeps the cache every `period` until cancelled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            trace!(removed, "Swept expired entries");
                        }
                    }
                }
            }
        })
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_from_insertion() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(10));
        cache.insert("a".into(), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get("a"), Some(1));

        // Reading does not extend the lifetime.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_consumes_once() {
        let cache: TtlCache<String, u32> = TtlCache::default();
        cache.insert("a".into(), 1);
        assert_eq!(cache.fetch("a", |_| true), Some(1));
        assert_eq!(cache.fetch("a", |_| true), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_and_sweeper() {
        let cache = Arc::new(TtlCache::<u32, u32>::new(Duration::from_secs(1)));
        cache.insert(1, 1);
        cache.insert_with_ttl(2, 2, Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.sweep(), 1);
        assert!(cache.contains(&2));

        cache.insert(3, 3);
        let cancel = CancellationToken::new();
        let sweeper = cache.spawn_sweeper(Duration::from_secs(1), cancel.clone());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!cache.contains(&3));
        assert_eq!(cache.len(), 1);

        cancel.cancel();
        sweeper.await.unwrap();
    }
}
