//! Cache synchronization service.
//!
//! A [`CacheSyncHub`] is a composable registry of named caches owned by the
//! embedding application. It replaces a process-wide singleton: components
//! that want their caches kept in step register them with a hub instance
//! they were handed, and nothing in the core depends on one existing.

use crate::cache::DynamicCache;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// The cache shape kernels register: string keys over byte payloads.
pub type SharedByteCache = Arc<DynamicCache<String, Vec<u8>>>;

/// Registry of named caches with pairwise and broadcast synchronization.
#[derive(Default)]
pub struct CacheSyncHub {
    caches: RwLock<HashMap<String, SharedByteCache>>,
}

impl CacheSyncHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cache under `name`, replacing any previous registration.
    pub fn register(&self, name: impl Into<String>, cache: SharedByteCache) {
        let name = name.into();
        debug!(cache = %name, "Cache registered for synchronization");
        self.caches.write().unwrap().insert(name, cache);
    }

    /// Remove the registration for `name`. Returns true if it existed.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.caches.write().unwrap().remove(name).is_some();
        if removed {
            debug!(cache = %name, "Cache unregistered");
        }
        removed
    }

    /// Names of the registered caches.
    #[must_use]
    pub fn registered(&self) -> Vec<String> {
        self.caches.read().unwrap().keys().cloned().collect()
    }

    /// Replace `to`'s contents with a copy of `from`'s live entries.
    /// Returns false when either name is unknown.
    pub fn sync(&self, from: &str, to: &str) -> bool {
        let (source, target) = {
            let caches = self.caches.read().unwrap();
            match (caches.get(from), caches.get(to)) {
                (Some(source), Some(target)) => (Arc::clone(source), Arc::clone(target)),
                _ => {
                    warn!(from, to, "Sync requested between unregistered caches");
                    return false;
                }
            }
        };
        target.sync_with(&source);
        debug!(from, to, "Caches synchronized");
        true
    }

    /// Copy `from`'s live entries into every other registered cache.
    /// Returns the number of caches updated.
    pub fn broadcast(&self, from: &str) -> usize {
        let (source, targets) = {
            let caches = self.caches.read().unwrap();
            let Some(source) = caches.get(from).map(Arc::clone) else {
                warn!(from, "Broadcast requested from an unregistered cache");
                return 0;
            };
            let targets: Vec<SharedByteCache> = caches
                .iter()
                .filter(|(name, _)| name.as_str() != from)
                .map(|(_, cache)| Arc::clone(cache))
                .collect();
            (source, targets)
        };
        let count = targets.len();
        for target in targets {
            target.sync_with(&source);
        }
        debug!(from, targets = count, "Cache broadcast complete");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(pairs: &[(&str, u8)]) -> SharedByteCache {
        let cache = Arc::new(DynamicCache::new(32, 0));
        for (key, value) in pairs {
            cache.put((*key).to_string(), vec![*value]);
        }
        cache
    }

    #[test]
    fn test_register_and_list() {
        let hub = CacheSyncHub::new();
        hub.register("a", cache_with(&[]));
        hub.register("b", cache_with(&[]));
        let mut names = hub.registered();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert!(hub.unregister("a"));
        assert!(!hub.unregister("a"));
    }

    #[test]
    fn test_pairwise_sync() {
        let hub = CacheSyncHub::new();
        let source = cache_with(&[("x", 1), ("y", 2)]);
        let target = cache_with(&[("z", 9)]);
        hub.register("source", Arc::clone(&source));
        hub.register("target", Arc::clone(&target));

        assert!(hub.sync("source", "target"));
        assert_eq!(target.get(&"x".to_string()), Some(vec![1]));
        assert_eq!(target.get(&"z".to_string()), None);
        // Source untouched.
        assert_eq!(source.get(&"x".to_string()), Some(vec![1]));
    }

    #[test]
    fn test_sync_unknown_names_fails() {
        let hub = CacheSyncHub::new();
        hub.register("only", cache_with(&[]));
        assert!(!hub.sync("only", "missing"));
        assert!(!hub.sync("missing", "only"));
    }

    #[test]
    fn test_broadcast_updates_all_others() {
        let hub = CacheSyncHub::new();
        let source = cache_with(&[("k", 5)]);
        let a = cache_with(&[("a", 1)]);
        let b = cache_with(&[]);
        hub.register("source", Arc::clone(&source));
        hub.register("a", Arc::clone(&a));
        hub.register("b", Arc::clone(&b));

        assert_eq!(hub.broadcast("source"), 2);
        assert_eq!(a.get(&"k".to_string()), Some(vec![5]));
        assert_eq!(a.get(&"a".to_string()), None);
        assert_eq!(b.get(&"k".to_string()), Some(vec![5]));
    }
}
