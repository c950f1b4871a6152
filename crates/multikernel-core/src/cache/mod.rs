//! Dynamic key/value cache with LRU eviction, per-entry TTL and a
//! cooperative background maintenance thread.
//!
//! Recency is tracked with a monotone access-sequence index: every touch
//! assigns the entry a fresh sequence number, and the oldest live sequence
//! is the LRU victim. The maintenance thread expires entries, evicts down
//! to capacity and optionally resizes the cache adaptively; it sleeps on a
//! dedicated condition variable and never holds the data lock while
//! waiting. Eviction callbacks fire after the data lock is released.

pub mod preload;
pub mod profile;
pub mod sync;

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Shortest allowed maintenance interval in seconds.
pub const MIN_CLEANUP_INTERVAL: u64 = 1;
/// Longest allowed maintenance interval in seconds.
pub const MAX_CLEANUP_INTERVAL: u64 = 60;
/// Sleep applied when the cache is idle, in seconds.
pub const IDLE_SLEEP_SECONDS: u64 = 10;
/// Inactivity window after which the cache counts as idle, in seconds.
pub const CLEANUP_TIMEOUT_SECONDS: u64 = 30;

/// Handler invoked for every removed entry (explicit, LRU, TTL or resize).
pub type EvictionCallback<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

/// Cache hit/miss/eviction counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned a live entry.
    pub hits: u64,
    /// Lookups that missed or hit an expired entry.
    pub misses: u64,
    /// Entries removed by LRU, TTL or resize pressure.
    pub evictions: u64,
    /// Mutating operations applied.
    pub operations: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, in `[0, 1]`.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

struct Entry<V> {
    value: V,
    last_access: Instant,
    ttl_seconds: u64,
    seq: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.ttl_seconds > 0
            && now.duration_since(self.last_access) >= Duration::from_secs(self.ttl_seconds)
    }
}

struct CacheState<K, V> {
    map: HashMap<K, Entry<V>>,
    /// Access order, oldest sequence first. Mirrors `map` exactly.
    order: BTreeMap<u64, K>,
    next_seq: u64,
    capacity: usize,
    auto_resize: bool,
    min_capacity: usize,
    max_capacity: usize,
    last_operation: Instant,
}

impl<K: Eq + Hash + Clone, V> CacheState<K, V> {
    fn touch(&mut self, key: &K) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(entry) = self.map.get_mut(key) {
            self.order.remove(&entry.seq);
            entry.seq = seq;
            entry.last_access = Instant::now();
            self.order.insert(seq, key.clone());
        }
    }

    fn insert(&mut self, key: K, value: V, ttl_seconds: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.map.insert(
            key,
            Entry {
                value,
                last_access: Instant::now(),
                ttl_seconds,
                seq,
            },
        );
    }

    fn remove(&mut self, key: &K) -> Option<(K, V)> {
        let entry = self.map.remove(key)?;
        let key = self.order.remove(&entry.seq).unwrap_or_else(|| key.clone());
        Some((key, entry.value))
    }

    fn evict_lru(&mut self) -> Option<(K, V)> {
        let (&seq, _) = self.order.iter().next()?;
        let key = self.order.remove(&seq)?;
        let entry = self.map.remove(&key)?;
        Some((key, entry.value))
    }

    fn evict_to_capacity(&mut self, out: &mut Vec<(K, V)>) {
        while self.map.len() > self.capacity {
            match self.evict_lru() {
                Some(pair) => out.push(pair),
                None => break,
            }
        }
    }

    fn remove_expired(&mut self, out: &mut Vec<(K, V)>) {
        let now = Instant::now();
        let expired: Vec<K> = self
            .map
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            if let Some(pair) = self.remove(&key) {
                out.push(pair);
            }
        }
    }

    /// Halve under 25 % utilization, double over 80 %, bounded by
    /// `[min_capacity, max_capacity]`.
    fn auto_resize(&mut self) {
        let size = self.map.len();
        let target = if size < self.capacity / 4 && self.capacity > self.min_capacity {
            (self.capacity / 2).max(self.min_capacity)
        } else if size * 5 > self.capacity * 4 && self.capacity < self.max_capacity {
            (self.capacity * 2).min(self.max_capacity)
        } else {
            self.capacity
        };
        if target != self.capacity {
            debug!(from = self.capacity, to = target, "Cache auto-resized");
            self.capacity = target;
        }
    }
}

struct CacheInner<K, V> {
    state: RwLock<CacheState<K, V>>,
    eviction_cb: RwLock<Option<EvictionCallback<K, V>>>,
    /// Dedicated wait lock for the maintenance thread; never the data lock.
    wait_lock: Mutex<()>,
    wait_cv: Condvar,
    stop: AtomicBool,
    cleanup_interval: AtomicU64,
    ops: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> CacheInner<K, V> {
    /// Invoke the eviction callback for each removed pair, outside any lock.
    /// A panicking callback is isolated; the entries stay removed.
    fn fire_evictions(&self, pairs: &[(K, V)], count_as_eviction: bool) {
        if pairs.is_empty() {
            return;
        }
        if count_as_eviction {
            self.evictions
                .fetch_add(pairs.len() as u64, Ordering::Relaxed);
        }
        let cb = self.eviction_cb.read().unwrap().clone();
        if let Some(cb) = cb {
            for (key, value) in pairs {
                if catch_unwind(AssertUnwindSafe(|| cb(key, value))).is_err() {
                    warn!("Eviction callback panicked");
                }
            }
        }
    }

    fn record_op(&self) {
        self.ops.fetch_add(1, Ordering::Relaxed);
    }
}

/// Thread-safe LRU + TTL cache with background maintenance.
pub struct DynamicCache<K, V> {
    inner: Arc<CacheInner<K, V>>,
    maintenance: Mutex<Option<thread::JoinHandle<()>>>,
    /// TTL applied by [`put`](Self::put); immutable after construction.
    default_ttl: u64,
}

impl<K, V> DynamicCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache with the given capacity and default TTL applied by
    /// [`put`](Self::put). A capacity above zero starts the maintenance
    /// thread.
    #[must_use]
    pub fn new(initial_capacity: usize, default_ttl_seconds: u64) -> Self {
        let interval = (initial_capacity as u64 / 100)
            .clamp(MIN_CLEANUP_INTERVAL, MAX_CLEANUP_INTERVAL);
        let inner = Arc::new(CacheInner {
            state: RwLock::new(CacheState {
                map: HashMap::with_capacity(initial_capacity),
                order: BTreeMap::new(),
                next_seq: 0,
                capacity: initial_capacity,
                auto_resize: false,
                min_capacity: 16,
                max_capacity: 4096,
                last_operation: Instant::now(),
            }),
            eviction_cb: RwLock::new(None),
            wait_lock: Mutex::new(()),
            wait_cv: Condvar::new(),
            stop: AtomicBool::new(false),
            cleanup_interval: AtomicU64::new(interval),
            ops: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        });
        let cache = Self {
            inner,
            maintenance: Mutex::new(None),
            default_ttl: default_ttl_seconds,
        };
        if initial_capacity > 0 {
            cache.start_maintenance();
        }
        debug!(
            capacity = initial_capacity,
            default_ttl = default_ttl_seconds,
            interval,
            "Dynamic cache created"
        );
        cache
    }

    /// Look up a key, promoting it to most-recently-used.
    ///
    /// Returns `None` for absent or expired entries; an expired entry is
    /// removed and its eviction callback fires.
    pub fn get(&self, key: &K) -> Option<V> {
        let (result, expired) = {
            let mut state = self.inner.state.write().unwrap();
            let now = Instant::now();
            match state.map.get(key).map(|entry| entry.is_expired(now)) {
                None => (None, None),
                Some(true) => (None, state.remove(key)),
                Some(false) => {
                    state.touch(key);
                    let value = state.map.get(key).map(|e| e.value.clone());
                    (value, None)
                }
            }
        };
        if let Some(pair) = expired {
            self.inner.fire_evictions(&[pair], true);
        }
        match result {
            Some(value) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or overwrite with the default TTL.
    pub fn put(&self, key: K, value: V) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Insert or overwrite with an explicit TTL (`0` = infinite).
    ///
    /// An insert into a full cache evicts exactly one entry, the LRU tail.
    pub fn put_with_ttl(&self, key: K, value: V, ttl_seconds: u64) {
        let evicted = {
            let mut state = self.inner.state.write().unwrap();
            let mut evicted = Vec::new();
            if state.map.contains_key(&key) {
                if let Some(entry) = state.map.get_mut(&key) {
                    entry.value = value;
                    entry.ttl_seconds = ttl_seconds;
                }
                state.touch(&key);
            } else {
                if state.capacity > 0 && state.map.len() >= state.capacity {
                    if let Some(pair) = state.evict_lru() {
                        evicted.push(pair);
                    }
                }
                state.insert(key, value, ttl_seconds);
            }
            state.last_operation = Instant::now();
            evicted
        };
        self.inner.record_op();
        self.inner.fire_evictions(&evicted, true);
        self.inner.wait_cv.notify_one();
    }

    /// Remove a key, firing the eviction callback if present.
    pub fn remove(&self, key: &K) {
        let removed = {
            let mut state = self.inner.state.write().unwrap();
            state.last_operation = Instant::now();
            state.remove(key)
        };
        self.inner.record_op();
        if let Some(pair) = removed {
            self.inner.fire_evictions(&[pair], false);
        }
    }

    /// Remove every entry, firing the eviction callback for each.
    pub fn clear(&self) {
        let drained: Vec<(K, V)> = {
            let mut state = self.inner.state.write().unwrap();
            state.last_operation = Instant::now();
            let keys: Vec<K> = state.map.keys().cloned().collect();
            keys.iter().filter_map(|k| state.remove(k)).collect()
        };
        self.inner.record_op();
        self.inner.fire_evictions(&drained, false);
    }

    /// Live entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.read().unwrap().map.len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current capacity bound.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.state.read().unwrap().capacity
    }

    /// Set the capacity, evicting LRU entries until the bound holds.
    pub fn resize(&self, new_capacity: usize) {
        let evicted = {
            let mut state = self.inner.state.write().unwrap();
            state.capacity = new_capacity;
            let mut evicted = Vec::new();
            state.evict_to_capacity(&mut evicted);
            evicted
        };
        self.inner.record_op();
        self.inner.fire_evictions(&evicted, true);
        trace!(capacity = new_capacity, "Cache resized");
    }

    /// Install the eviction handler invoked on every removal.
    pub fn set_eviction_callback<F>(&self, callback: F)
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        *self.inner.eviction_cb.write().unwrap() = Some(Arc::new(callback));
    }

    /// Enable or disable adaptive resizing within `[min_capacity, max_capacity]`.
    pub fn set_auto_resize(&self, enabled: bool, min_capacity: usize, max_capacity: usize) {
        let mut state = self.inner.state.write().unwrap();
        state.auto_resize = enabled;
        state.min_capacity = min_capacity;
        state.max_capacity = max_capacity;
    }

    /// Set the maintenance interval, clamped to
    /// `[MIN_CLEANUP_INTERVAL, MAX_CLEANUP_INTERVAL]`.
    pub fn set_cleanup_interval(&self, seconds: u64) {
        self.inner.cleanup_interval.store(
            seconds.clamp(MIN_CLEANUP_INTERVAL, MAX_CLEANUP_INTERVAL),
            Ordering::Relaxed,
        );
    }

    /// Apply put semantics for each pair under a single lock acquisition.
    pub fn batch_put(&self, entries: HashMap<K, V>, ttl_seconds: u64) {
        let evicted = {
            let mut state = self.inner.state.write().unwrap();
            let mut evicted = Vec::new();
            let count = entries.len() as u64;
            for (key, value) in entries {
                if state.map.contains_key(&key) {
                    if let Some(entry) = state.map.get_mut(&key) {
                        entry.value = value;
                        entry.ttl_seconds = ttl_seconds;
                    }
                    state.touch(&key);
                } else {
                    if state.capacity > 0 && state.map.len() >= state.capacity {
                        if let Some(pair) = state.evict_lru() {
                            evicted.push(pair);
                        }
                    }
                    state.insert(key, value, ttl_seconds);
                }
            }
            state.last_operation = Instant::now();
            self.inner.ops.fetch_add(count, Ordering::Relaxed);
            evicted
        };
        self.inner.fire_evictions(&evicted, true);
        self.inner.wait_cv.notify_one();
    }

    /// Atomically replace this cache's contents with a copy of `other`'s
    /// live entries.
    pub fn sync_with(&self, other: &DynamicCache<K, V>) {
        let snapshot = other.export_all();
        let dropped: Vec<(K, V)> = {
            let mut state = self.inner.state.write().unwrap();
            let keys: Vec<K> = state.map.keys().cloned().collect();
            let dropped = keys.iter().filter_map(|k| state.remove(k)).collect();
            for (key, value) in snapshot {
                state.insert(key, value, 0);
            }
            state.last_operation = Instant::now();
            dropped
        };
        self.inner.record_op();
        self.inner.fire_evictions(&dropped, false);
    }

    /// Copy this cache's live entries into `target`.
    pub fn migrate_to(&self, target: &DynamicCache<K, V>) {
        target.sync_with(self);
    }

    /// Snapshot the live (non-expired) entries.
    #[must_use]
    pub fn export_all(&self) -> HashMap<K, V> {
        let state = self.inner.state.read().unwrap();
        let now = Instant::now();
        state
            .map
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    /// Hit/miss/eviction counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            operations: self.inner.ops.load(Ordering::Relaxed),
        }
    }

    /// Run one expire-then-evict pass synchronously on the caller's thread.
    pub fn cleanup_sync(&self) {
        let removed = {
            let mut state = self.inner.state.write().unwrap();
            let mut removed = Vec::new();
            state.remove_expired(&mut removed);
            state.evict_to_capacity(&mut removed);
            removed
        };
        self.inner.fire_evictions(&removed, true);
    }

    /// Stop the maintenance thread. Idempotent; also run on drop.
    pub fn shutdown(&self) {
        self.inner.stop.store(true, Ordering::Release);
        {
            let _guard = self.inner.wait_lock.lock().unwrap();
            self.inner.wait_cv.notify_all();
        }
        if let Some(handle) = self.maintenance.lock().unwrap().take() {
            if handle.join().is_err() {
                warn!("Cache maintenance thread panicked");
            }
        }
    }

    fn start_maintenance(&self) {
        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("mk-cache-maintenance".to_string())
            .spawn(move || maintenance_loop(&inner))
            .expect("failed to spawn cache maintenance thread");
        *self.maintenance.lock().unwrap() = Some(handle);
    }
}

fn maintenance_loop<K, V>(inner: &Arc<CacheInner<K, V>>)
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    trace!("Cache maintenance thread started");
    let mut ops_at_last_pass = 0u64;
    while !inner.stop.load(Ordering::Acquire) {
        let (removed, size, min_capacity, capacity, last_operation) = {
            let mut state = inner.state.write().unwrap();
            if inner.stop.load(Ordering::Acquire) {
                break;
            }
            let mut removed = Vec::new();
            state.remove_expired(&mut removed);
            state.evict_to_capacity(&mut removed);
            if state.auto_resize {
                state.auto_resize();
            }
            (
                removed,
                state.map.len(),
                state.min_capacity,
                state.capacity,
                state.last_operation,
            )
        };
        inner.fire_evictions(&removed, true);

        let total_ops = inner.ops.load(Ordering::Relaxed);
        let recent_ops = total_ops - ops_at_last_pass;
        ops_at_last_pass = total_ops;

        let idle = size <= min_capacity
            && last_operation.elapsed() >= Duration::from_secs(CLEANUP_TIMEOUT_SECONDS);
        let sleep_secs = if idle {
            IDLE_SLEEP_SECONDS
        } else {
            optimal_interval(
                size,
                recent_ops,
                capacity,
                inner.cleanup_interval.load(Ordering::Relaxed),
            )
        };

        let guard = inner.wait_lock.lock().unwrap();
        let _unused = inner
            .wait_cv
            .wait_timeout_while(guard, Duration::from_secs(sleep_secs), |_| {
                !inner.stop.load(Ordering::Acquire)
            })
            .unwrap();
    }
    trace!("Cache maintenance thread stopped");
}

/// Adaptive maintenance interval from size, recent activity and capacity
/// pressure, clamped to `[MIN_CLEANUP_INTERVAL, MAX_CLEANUP_INTERVAL]`.
fn optimal_interval(size: usize, recent_ops: u64, capacity: usize, configured: u64) -> u64 {
    if size == 0 {
        return MAX_CLEANUP_INTERVAL;
    }
    if recent_ops > 1000 {
        return MIN_CLEANUP_INTERVAL;
    }
    if size * 5 > capacity * 4 {
        return MIN_CLEANUP_INTERVAL;
    }
    configured.clamp(MIN_CLEANUP_INTERVAL, MAX_CLEANUP_INTERVAL)
}

impl<K, V> Drop for DynamicCache<K, V> {
    fn drop(&mut self) {
        self.inner.stop.store(true, Ordering::Release);
        {
            let _guard = self.inner.wait_lock.lock().unwrap();
            self.inner.wait_cv.notify_all();
        }
        if let Some(handle) = self.maintenance.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_capacity_one_lru() {
        let cache: DynamicCache<String, i32> = DynamicCache::new(1, 0);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"b".to_string()), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_victim_is_least_recent() {
        let cache: DynamicCache<&str, i32> = DynamicCache::new(3, 0);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        // Touch "a" so "b" becomes the tail.
        assert_eq!(cache.get(&"a"), Some(1));
        cache.put("d", 4);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.get(&"d"), Some(4));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache: DynamicCache<&str, i32> = DynamicCache::new(2, 0);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn test_ttl_expiry_on_get() {
        let cache: DynamicCache<&str, Vec<u8>> = DynamicCache::new(10, 0);
        cache.put_with_ttl("k", vec![42], 1);
        assert_eq!(cache.get(&"k"), Some(vec![42]));
        thread::sleep(Duration::from_millis(1100));
        assert_eq!(cache.get(&"k"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_cleanup_sync_removes_expired() {
        let cache: DynamicCache<&str, i32> = DynamicCache::new(10, 0);
        cache.put_with_ttl("short", 1, 1);
        cache.put("forever", 2);
        thread::sleep(Duration::from_millis(1100));
        cache.cleanup_sync();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"forever"), Some(2));
    }

    #[test]
    fn test_eviction_callback_on_every_removal() {
        let cache: DynamicCache<String, i32> = DynamicCache::new(1, 0);
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let fired = Arc::clone(&fired);
            cache.set_eviction_callback(move |_, _| {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2); // LRU eviction of "a"
        cache.remove(&"b".to_string()); // explicit
        cache.put("c".to_string(), 3);
        cache.clear(); // clear fires per entry
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_callback_panic_is_isolated() {
        let cache: DynamicCache<&str, i32> = DynamicCache::new(1, 0);
        cache.set_eviction_callback(|_, _| panic!("callback failure"));
        cache.put("a", 1);
        cache.put("b", 2);
        // Entry "a" is gone despite the panicking handler.
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_resize_down_evicts_lru_tail() {
        let cache: DynamicCache<&str, i32> = DynamicCache::new(4, 0);
        for (k, v) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            cache.put(k, v);
        }
        cache.get(&"a");
        cache.resize(2);
        assert_eq!(cache.len(), 2);
        // "b" and "c" were least recent.
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"c"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"d"), Some(4));
    }

    #[test]
    fn test_batch_put_and_export() {
        let cache: DynamicCache<String, i32> = DynamicCache::new(10, 0);
        let mut batch = HashMap::new();
        batch.insert("x".to_string(), 1);
        batch.insert("y".to_string(), 2);
        cache.batch_put(batch, 0);
        let exported = cache.export_all();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported.get("x"), Some(&1));
    }

    #[test]
    fn test_sync_with_replaces_contents() {
        let source: DynamicCache<String, i32> = DynamicCache::new(10, 0);
        let target: DynamicCache<String, i32> = DynamicCache::new(10, 0);
        source.put("s".to_string(), 7);
        target.put("t".to_string(), 9);
        target.sync_with(&source);
        assert_eq!(target.get(&"t".to_string()), None);
        assert_eq!(target.get(&"s".to_string()), Some(7));
        // Source untouched.
        assert_eq!(source.get(&"s".to_string()), Some(7));
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let cache: DynamicCache<&str, i32> = DynamicCache::new(4, 0);
        cache.put("a", 1);
        cache.get(&"a");
        cache.get(&"missing");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_capacity_bound_holds_under_churn() {
        let cache: DynamicCache<u32, u32> = DynamicCache::new(8, 0);
        for i in 0..1000 {
            cache.put(i, i);
            assert!(cache.len() <= 8);
        }
    }

    #[test]
    fn test_auto_resize_bounds() {
        let cache: DynamicCache<u32, u32> = DynamicCache::new(64, 0);
        cache.set_auto_resize(true, 16, 128);
        // Nearly empty: one maintenance pass should halve toward the floor.
        cache.put(1, 1);
        cache.cleanup_sync();
        {
            let mut state = cache.inner.state.write().unwrap();
            state.auto_resize();
            assert_eq!(state.capacity, 32);
            state.auto_resize();
            assert_eq!(state.capacity, 16);
            state.auto_resize();
            assert_eq!(state.capacity, 16);
        }
    }

    #[test]
    fn test_order_and_map_stay_consistent() {
        let cache: DynamicCache<u32, u32> = DynamicCache::new(4, 0);
        for i in 0..32 {
            cache.put(i % 6, i);
            cache.get(&(i % 3));
            let state = cache.inner.state.read().unwrap();
            assert_eq!(state.map.len(), state.order.len());
            for key in state.order.values() {
                assert!(state.map.contains_key(key));
            }
        }
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let cache: DynamicCache<&str, i32> = DynamicCache::new(4, 0);
        cache.put("a", 1);
        cache.shutdown();
        cache.shutdown();
        // Data operations still work after the maintenance thread stops.
        assert_eq!(cache.get(&"a"), Some(1));
    }
}
