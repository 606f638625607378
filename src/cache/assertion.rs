//! The assertion cache.

use crate::base::interval::{
    Interval, TOTAL_INTERVAL_BEGIN, TOTAL_INTERVAL_END,
};
use crate::base::unix_now;
use crate::object::ObjectType;
use crate::section::Assertion;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use tracing::error;

//------------ AssertionCacheKey ---------------------------------------------

/// The lookup key of the assertion cache.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct AssertionCacheKey {
    context: String,
    zone: String,
    name: String,
    object_type: ObjectType,
}

//------------ CachedAssertion -----------------------------------------------

#[derive(Clone, Debug)]
struct CachedAssertion {
    assertion: Arc<Assertion>,
    valid_since: i64,
    valid_until: i64,
    internal: bool,
    last_access: u64,
}

//------------ AssertionCache ------------------------------------------------

/// The cache of verified assertions.
///
/// Assertions are stored once per object type they carry, keyed by
/// `(context, zone, name, object type)`, and additionally indexed by
/// name per `(context, zone)` so that range queries can answer which
/// cached assertions fall into a shard's interval.
pub struct AssertionCache {
    inner: Mutex<Inner>,
}

struct Inner {
    map: HashMap<AssertionCacheKey, Vec<CachedAssertion>>,
    /// Per `(context, zone)`: which object types exist for which name.
    range: HashMap<(String, String), BTreeMap<String, HashSet<ObjectType>>>,
    counter: u64,
    /// Total number of stored `(key, assertion)` pairs.
    len: usize,
    max_entries: usize,
}

impl AssertionCache {
    /// Creates a cache holding at most `max_entries` assertion entries.
    ///
    /// An assertion carrying several object types occupies one entry per
    /// type.
    pub fn new(max_entries: usize) -> Self {
        AssertionCache {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                range: HashMap::new(),
                counter: 0,
                len: 0,
                max_entries,
            }),
        }
    }

    /// Adds a verified assertion with its validity window.
    ///
    /// The assertion is registered under every object type it carries.
    /// Returns `false` without touching the cache if the identical
    /// assertion is already present.
    pub fn add(
        &self,
        assertion: Arc<Assertion>,
        internal: bool,
        valid_since: i64,
        valid_until: i64,
    ) -> bool {
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        let types: HashSet<ObjectType> = assertion.object_types().collect();
        let dup = types.iter().any(|&ty| {
            inner
                .map
                .get(&key_for(&assertion, ty))
                .map(|values| {
                    values.iter().any(|cached| cached.assertion == assertion)
                })
                .unwrap_or(false)
        });
        if dup {
            return false;
        }
        for &ty in &types {
            if inner.len >= inner.max_entries {
                inner.evict();
            }
            let key = key_for(&assertion, ty);
            inner.map.entry(key).or_default().push(CachedAssertion {
                assertion: assertion.clone(),
                valid_since,
                valid_until,
                internal,
                last_access: access,
            });
            inner.len += 1;
            inner
                .range
                .entry((assertion.context.clone(), assertion.subject_zone.clone()))
                .or_default()
                .entry(assertion.subject_name.clone())
                .or_default()
                .insert(ty);
        }
        true
    }

    /// Returns the assertions stored under a key.
    ///
    /// Expired assertions are filtered out unless `expired_allowed` is
    /// set, for queriers that asked for stale answers.
    pub fn get(
        &self,
        context: &str,
        zone: &str,
        name: &str,
        object_type: ObjectType,
        expired_allowed: bool,
    ) -> Vec<Arc<Assertion>> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        let key = AssertionCacheKey {
            context: context.into(),
            zone: zone.into(),
            name: name.into(),
            object_type,
        };
        match inner.map.get_mut(&key) {
            Some(values) => values
                .iter_mut()
                .filter(|cached| expired_allowed || cached.valid_until >= now)
                .map(|cached| {
                    cached.last_access = access;
                    cached.assertion.clone()
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns all valid assertions whose name lies inside the interval.
    pub fn get_in_range(
        &self,
        context: &str,
        zone: &str,
        interval: &dyn Interval,
    ) -> Vec<Arc<Assertion>> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        let zone_key = (context.to_string(), zone.to_string());
        let names = match inner.range.get(&zone_key) {
            Some(names) => names,
            None => return Vec::new(),
        };
        let begin = match interval.begin() {
            TOTAL_INTERVAL_BEGIN => Bound::Unbounded,
            bound => Bound::Excluded(bound.to_string()),
        };
        let end = match interval.end() {
            TOTAL_INTERVAL_END => Bound::Unbounded,
            bound => Bound::Excluded(bound.to_string()),
        };
        let keys: Vec<AssertionCacheKey> = names
            .range((begin, end))
            .flat_map(|(name, types)| {
                types.iter().map(|&ty| AssertionCacheKey {
                    context: context.into(),
                    zone: zone.into(),
                    name: name.clone(),
                    object_type: ty,
                })
            })
            .collect();
        let mut res = Vec::new();
        let mut seen = HashSet::new();
        for key in keys {
            if let Some(values) = inner.map.get_mut(&key) {
                for cached in values {
                    if cached.valid_until < now {
                        continue;
                    }
                    cached.last_access = access;
                    if seen.insert(Arc::as_ptr(&cached.assertion)) {
                        res.push(cached.assertion.clone());
                    }
                }
            }
        }
        res
    }

    /// Removes an assertion wherever it is stored.
    ///
    /// Returns `true` if at least one entry was removed.
    pub fn remove(&self, assertion: &Assertion) -> bool {
        let mut inner = self.inner.lock();
        let mut removed = false;
        let types: HashSet<ObjectType> = assertion.object_types().collect();
        for ty in types {
            let key = AssertionCacheKey {
                context: assertion.context.clone(),
                zone: assertion.subject_zone.clone(),
                name: assertion.subject_name.clone(),
                object_type: ty,
            };
            removed |= inner.remove_matching(&key, |cached| {
                cached.assertion.as_ref() == assertion
            });
        }
        removed
    }

    /// Removes every assertion expired at the time of the call.
    pub fn remove_expired_values(&self) {
        let now = unix_now();
        let mut inner = self.inner.lock();
        let keys: Vec<AssertionCacheKey> = inner.map.keys().cloned().collect();
        for key in keys {
            inner.remove_matching(&key, |cached| cached.valid_until < now);
        }
    }

    /// Returns the number of stored assertion entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key_for(assertion: &Assertion, object_type: ObjectType) -> AssertionCacheKey {
    AssertionCacheKey {
        context: assertion.context.clone(),
        zone: assertion.subject_zone.clone(),
        name: assertion.subject_name.clone(),
        object_type,
    }
}

impl Inner {
    /// Removes all values under `key` matching the predicate.
    ///
    /// Returns whether anything was removed and maintains the range
    /// index and the length.
    fn remove_matching(
        &mut self,
        key: &AssertionCacheKey,
        matches: impl Fn(&CachedAssertion) -> bool,
    ) -> bool {
        let values = match self.map.get_mut(key) {
            Some(values) => values,
            None => return false,
        };
        let before = values.len();
        values.retain(|cached| !matches(cached));
        let removed = before - values.len();
        self.len -= removed;
        if values.is_empty() {
            self.map.remove(key);
            self.unindex(key);
        }
        removed > 0
    }

    /// Drops `key` from the range index.
    fn unindex(&mut self, key: &AssertionCacheKey) {
        let zone_key = (key.context.clone(), key.zone.clone());
        if let Some(names) = self.range.get_mut(&zone_key) {
            if let Some(types) = names.get_mut(&key.name) {
                types.remove(&key.object_type);
                if types.is_empty() {
                    names.remove(&key.name);
                }
            }
            if names.is_empty() {
                self.range.remove(&zone_key);
            }
        }
    }

    /// Evicts the least recently used external entry.
    fn evict(&mut self) {
        let victim = self
            .map
            .iter()
            .flat_map(|(key, values)| {
                values
                    .iter()
                    .filter(|cached| !cached.internal)
                    .map(move |cached| (key, cached))
            })
            .min_by_key(|(_, cached)| (cached.last_access, cached.valid_until))
            .map(|(key, cached)| (key.clone(), cached.assertion.clone()));
        match victim {
            Some((key, assertion)) => {
                self.remove_matching(&key, |cached| {
                    cached.assertion == assertion
                });
            }
            None => {
                error!(
                    len = self.len,
                    "assertion cache full of internal entries, cannot evict"
                );
            }
        }
    }
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::interval::StringInterval;
    use crate::object::Object;
    use std::net::Ipv4Addr;

    fn assertion(name: &str) -> Arc<Assertion> {
        Arc::new(Assertion::new(
            name,
            "ch",
            ".",
            vec![Object::Ip4(Ipv4Addr::new(1, 2, 3, 4))],
        ))
    }

    #[test]
    fn add_get_remove() {
        let cache = AssertionCache::new(16);
        let now = unix_now();
        let a = assertion("ethz");
        assert!(cache.add(a.clone(), false, now, now + 100));
        assert!(!cache.add(a.clone(), false, now, now + 100));
        assert_eq!(cache.len(), 1);

        let hits = cache.get(".", "ch", "ethz", ObjectType::Ip4, false);
        assert_eq!(hits, vec![a.clone()]);
        assert!(cache
            .get(".", "ch", "ethz", ObjectType::Ip6, false)
            .is_empty());

        assert!(cache.remove(&a));
        assert!(!cache.remove(&a));
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_needs_opt_in() {
        let cache = AssertionCache::new(16);
        let now = unix_now();
        cache.add(assertion("ethz"), false, now - 100, now - 10);
        assert!(cache
            .get(".", "ch", "ethz", ObjectType::Ip4, false)
            .is_empty());
        assert_eq!(
            cache.get(".", "ch", "ethz", ObjectType::Ip4, true).len(),
            1
        );
    }

    #[test]
    fn range_query() {
        let cache = AssertionCache::new(16);
        let now = unix_now();
        for name in ["aab", "ethz", "zzy"] {
            cache.add(assertion(name), false, now, now + 100);
        }
        let hits = cache.get_in_range(
            ".",
            "ch",
            &StringInterval::new("aab", "zzy"),
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].subject_name, "ethz");

        let hits =
            cache.get_in_range(".", "ch", &StringInterval::total());
        assert_eq!(hits.len(), 3);
        assert!(cache
            .get_in_range(".", "org", &StringInterval::total())
            .is_empty());
    }

    #[test]
    fn sweep_removes_expired() {
        let cache = AssertionCache::new(16);
        let now = unix_now();
        cache.add(assertion("old"), false, now - 100, now - 10);
        cache.add(assertion("new"), false, now, now + 100);
        cache.remove_expired_values();
        assert_eq!(cache.len(), 1);
        assert!(cache
            .get_in_range(".", "ch", &StringInterval::total())
            .iter()
            .all(|a| a.subject_name == "new"));
    }

    #[test]
    fn eviction_prefers_least_recently_used() {
        let cache = AssertionCache::new(2);
        let now = unix_now();
        cache.add(assertion("aaa"), false, now, now + 100);
        cache.add(assertion("bbb"), false, now, now + 100);
        // Touch "aaa"; "bbb" becomes the victim.
        cache.get(".", "ch", "aaa", ObjectType::Ip4, false);
        cache.add(assertion("ccc"), false, now, now + 100);
        assert_eq!(cache.len(), 2);
        assert!(cache
            .get(".", "ch", "bbb", ObjectType::Ip4, false)
            .is_empty());
        assert!(!cache
            .get(".", "ch", "aaa", ObjectType::Ip4, false)
            .is_empty());
    }
}
