//! The bounded map substrate.
//!
//! Most of the server's caches share the same shape: a bounded map whose
//! entries carry a validity and a recentness, with capacity-driven
//! eviction picking the least recently used *external* entry and ties
//! broken towards the shortest remaining validity. Entries added as
//! *internal* (authoritative content) are exempt from eviction until
//! they expire. This module provides that substrate once; the concrete
//! caches wrap it or, where they need multi-valued or index semantics,
//! reimplement its policy over their own interior.

use core::hash::Hash;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::error;

//------------ Entry ---------------------------------------------------------

/// An entry of a bounded map.
#[derive(Clone, Debug)]
struct Entry<V> {
    value: V,
    internal: bool,
    valid_until: i64,
    last_access: u64,
}

//------------ BoundedMap ----------------------------------------------------

/// A bounded, expiring map with LRU-style eviction.
///
/// All operations are short critical sections behind a single mutex; the
/// map is safe to share between receiver threads and the sweeper.
pub struct BoundedMap<K, V> {
    inner: Mutex<Inner<K, V>>,
}

struct Inner<K, V> {
    map: HashMap<K, Entry<V>>,
    counter: u64,
    max_entries: usize,
    on_evict: Option<Box<dyn Fn(V) + Send>>,
}

impl<K: Clone + Eq + Hash, V: Clone> BoundedMap<K, V> {
    /// Creates a map holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        BoundedMap {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                counter: 0,
                max_entries,
                on_evict: None,
            }),
        }
    }

    /// Creates a map that runs a hook on every evicted value.
    ///
    /// The hook only fires for capacity-driven eviction, not for
    /// replacement, explicit removal or expiry, whose values the caller
    /// gets back directly.
    pub fn with_evict_hook(
        max_entries: usize,
        on_evict: impl Fn(V) + Send + 'static,
    ) -> Self {
        BoundedMap {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                counter: 0,
                max_entries,
                on_evict: Some(Box::new(on_evict)),
            }),
        }
    }

    /// Inserts a value, evicting if necessary.
    ///
    /// Returns the value previously stored under `key`, if any. If the
    /// map is full and holds no evictable entry the insertion happens
    /// anyway and the overflow is logged; this is not expected outside
    /// of misconfiguration.
    pub fn insert(&self, key: K, value: V, internal: bool, valid_until: i64) -> Option<V> {
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        if !inner.map.contains_key(&key) && inner.map.len() >= inner.max_entries {
            inner.evict();
        }
        inner
            .map
            .insert(
                key,
                Entry {
                    value,
                    internal,
                    valid_until,
                    last_access: access,
                },
            )
            .map(|entry| entry.value)
    }

    /// Returns the value stored under `key`, refreshing its recentness.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        inner.map.get_mut(key).map(|entry| {
            entry.last_access = access;
            entry.value.clone()
        })
    }

    /// Returns whether the map contains `key` without touching recentness.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.lock().map.contains_key(key)
    }

    /// Applies a closure to the value under `key`, refreshing recentness.
    pub fn with_value_mut<R>(
        &self,
        key: &K,
        op: impl FnOnce(&mut V) -> R,
    ) -> Option<R> {
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        inner.map.get_mut(key).map(|entry| {
            entry.last_access = access;
            op(&mut entry.value)
        })
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().map.remove(key).map(|entry| entry.value)
    }

    /// Removes all entries expired at `now` and returns their values.
    pub fn remove_expired(&self, now: i64) -> Vec<V> {
        let mut inner = self.inner.lock();
        let expired: Vec<K> = inner
            .map
            .iter()
            .filter(|(_, entry)| entry.valid_until < now)
            .map(|(key, _)| key.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|key| inner.map.remove(&key).map(|entry| entry.value))
            .collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// Returns whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies a closure to every value.
    pub fn for_each(&self, mut op: impl FnMut(&K, &V)) {
        let inner = self.inner.lock();
        for (key, entry) in &inner.map {
            op(key, &entry.value);
        }
    }
}

impl<K: Clone + Eq + Hash, V> Inner<K, V> {
    /// Evicts the least recently used external entry.
    ///
    /// Ties on recentness go to the entry with the shortest remaining
    /// validity.
    fn evict(&mut self) {
        let victim = self
            .map
            .iter()
            .filter(|(_, entry)| !entry.internal)
            .min_by_key(|(_, entry)| (entry.last_access, entry.valid_until))
            .map(|(key, _)| key.clone());
        match victim {
            Some(key) => {
                if let Some(entry) = self.map.remove(&key) {
                    if let Some(on_evict) = &self.on_evict {
                        on_evict(entry.value);
                    }
                }
            }
            None => {
                error!(
                    len = self.map.len(),
                    "cache full of internal entries, cannot evict"
                );
            }
        }
    }
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let map = BoundedMap::new(4);
        assert!(map.insert("a", 1, false, 100).is_none());
        assert_eq!(map.insert("a", 2, false, 100), Some(1));
        assert_eq!(map.get(&"a"), Some(2));
        assert_eq!(map.remove(&"a"), Some(2));
        assert!(map.is_empty());
    }

    #[test]
    fn lru_eviction() {
        let map = BoundedMap::new(2);
        map.insert("a", 1, false, 100);
        map.insert("b", 2, false, 100);
        // Touch "a" so "b" becomes the victim.
        map.get(&"a");
        map.insert("c", 3, false, 100);
        assert_eq!(map.len(), 2);
        assert!(map.contains_key(&"a"));
        assert!(!map.contains_key(&"b"));
        assert!(map.contains_key(&"c"));
    }

    #[test]
    fn internal_entries_survive_eviction() {
        let map = BoundedMap::new(2);
        map.insert("pinned", 1, true, 100);
        map.insert("b", 2, false, 100);
        map.insert("c", 3, false, 100);
        assert!(map.contains_key(&"pinned"));
        assert!(!map.contains_key(&"b"));
    }

    #[test]
    fn expiry_sweep() {
        let map = BoundedMap::new(4);
        map.insert("old", 1, true, 10);
        map.insert("new", 2, false, 100);
        let removed = map.remove_expired(50);
        assert_eq!(removed, vec![1]);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&"new"));
    }
}
