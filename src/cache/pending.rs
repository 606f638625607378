//! The pending-work caches.
//!
//! When a section arrives whose delegation key is not yet known, or a
//! query cannot be answered from the caches, the work is parked here
//! until the answer the server asked for upstream comes back.
//!
//! Both caches drain through [`DrainSet`], a one-shot accumulator: the
//! first `get_all_and_delete` atomically takes every parked value and
//! *closes* the set. A racing `add` that observes a closed set returns
//! `false` and its value is discarded. This is the single intentionally
//! lossy edge in the design; it guarantees a parked value can neither
//! be drained twice nor linger invisibly after the drain.

use crate::base::token::Token;
use crate::base::unix_now;
use crate::object::ObjectType;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

//------------ DrainSet ------------------------------------------------------

/// A concurrency-safe set that can be drained exactly once.
pub struct DrainSet<T> {
    state: Mutex<DrainState<T>>,
}

enum DrainState<T> {
    /// The set accepts values.
    Accumulating(Vec<T>),

    /// The set has been drained and rejects values.
    Drained,
}

impl<T> DrainSet<T> {
    /// Creates an empty, open set.
    pub fn new() -> Self {
        DrainSet {
            state: Mutex::new(DrainState::Accumulating(Vec::new())),
        }
    }

    /// Adds a value.
    ///
    /// Returns `false` if the set has already been drained; the value is
    /// then lost.
    pub fn add(&self, value: T) -> bool {
        match &mut *self.state.lock() {
            DrainState::Accumulating(values) => {
                values.push(value);
                true
            }
            DrainState::Drained => false,
        }
    }

    /// Takes all values and closes the set.
    ///
    /// Returns `None` if the set was drained before.
    pub fn drain(&self) -> Option<Vec<T>> {
        match std::mem::replace(&mut *self.state.lock(), DrainState::Drained) {
            DrainState::Accumulating(values) => Some(values),
            DrainState::Drained => None,
        }
    }

    /// Returns the number of values currently parked.
    pub fn len(&self) -> usize {
        match &*self.state.lock() {
            DrainState::Accumulating(values) => values.len(),
            DrainState::Drained => 0,
        }
    }

    /// Returns whether the set holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes values matching a predicate.
    fn retain(&self, keep: impl FnMut(&T) -> bool) {
        if let DrainState::Accumulating(values) = &mut *self.state.lock() {
            values.retain(keep);
        }
    }
}

impl<T> Default for DrainSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

//------------ PendingSignatureCache -----------------------------------------

/// Work parked on a missing delegation key, keyed by `(context, zone)`.
///
/// Values are whatever the caller needs to resume verification once the
/// key arrives, typically the section together with its sender.
pub struct PendingSignatureCache<V> {
    inner: Mutex<PendingSigInner<V>>,
}

struct PendingSigInner<V> {
    map: HashMap<(String, String), PendingSigEntry<V>>,
    counter: u64,
    max_entries: usize,
}

struct PendingSigEntry<V> {
    set: Arc<DrainSet<(V, i64)>>,
    last_access: u64,
}

impl<V: Clone> PendingSignatureCache<V> {
    /// Creates a cache with at most `max_entries` pending zones.
    pub fn new(max_entries: usize) -> Self {
        PendingSignatureCache {
            inner: Mutex::new(PendingSigInner {
                map: HashMap::new(),
                counter: 0,
                max_entries,
            }),
        }
    }

    /// Parks a value until the delegation for `(context, zone)` arrives.
    ///
    /// Returns `true` iff no pending entry existed before, in which case
    /// the caller must issue the delegation query. Returns `false` when
    /// the value joined an existing entry, and also when it raced a
    /// drain and was discarded.
    pub fn add(&self, context: &str, zone: &str, value: V, valid_until: i64) -> bool {
        let key = (context.to_string(), zone.to_string());
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        if let Some(entry) = inner.map.get_mut(&key) {
            entry.last_access = access;
            let set = entry.set.clone();
            drop(inner);
            if !set.add((value, valid_until)) {
                debug!(
                    context,
                    zone, "pending-signature set already drained, value lost"
                );
            }
            return false;
        }
        if inner.map.len() >= inner.max_entries {
            inner.evict();
        }
        let set = Arc::new(DrainSet::new());
        set.add((value, valid_until));
        inner.map.insert(
            key,
            PendingSigEntry {
                set,
                last_access: access,
            },
        );
        true
    }

    /// Atomically takes every valid parked value for `(context, zone)`.
    ///
    /// The underlying set is closed so that racing adds fail, and the
    /// entry is removed. Returns `None` if there was no entry or the set
    /// had been drained already.
    pub fn get_all_and_delete(&self, context: &str, zone: &str) -> Option<Vec<V>> {
        let key = (context.to_string(), zone.to_string());
        let entry = self.inner.lock().map.remove(&key)?;
        let now = unix_now();
        entry.set.drain().map(|values| {
            values
                .into_iter()
                .filter(|(_, valid_until)| *valid_until >= now)
                .map(|(value, _)| value)
                .collect()
        })
    }

    /// Removes expired values and empty entries.
    pub fn remove_expired_sections(&self) {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.map.retain(|_, entry| {
            entry.set.retain(|(_, valid_until)| *valid_until >= now);
            !entry.set.is_empty()
        });
    }

    /// Returns the total number of parked values.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map
            .values()
            .map(|entry| entry.set.len())
            .sum()
    }

    /// Returns whether nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> PendingSigInner<V> {
    /// Evicts the least recently used entry with all its values.
    fn evict(&mut self) {
        let victim = self
            .map
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            self.map.remove(&key);
        }
    }
}

//------------ PendingQueryCache ---------------------------------------------

/// The key of a pending query: what was asked, not who asked.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PendingQueryKey {
    /// The context of the query.
    pub context: String,

    /// The zone the queried name belongs to.
    pub zone: String,

    /// The queried name.
    pub name: String,

    /// The queried object type.
    pub object_type: ObjectType,
}

/// Queriers parked on an answer the server itself had to go ask for.
///
/// The first `add` for a key mints the token for the server's own
/// upstream query; the answer is correlated back through that token.
pub struct PendingQueryCache<V> {
    inner: Mutex<PendingQueryInner<V>>,
}

struct PendingQueryInner<V> {
    map: HashMap<PendingQueryKey, PendingQueryEntry<V>>,
    by_token: HashMap<Token, PendingQueryKey>,
    counter: u64,
    max_entries: usize,
}

struct PendingQueryEntry<V> {
    token: Token,
    set: Arc<DrainSet<(V, i64)>>,
    last_access: u64,
}

impl<V: Clone> PendingQueryCache<V> {
    /// Creates a cache with at most `max_entries` pending questions.
    pub fn new(max_entries: usize) -> Self {
        PendingQueryCache {
            inner: Mutex::new(PendingQueryInner {
                map: HashMap::new(),
                by_token: HashMap::new(),
                counter: 0,
                max_entries,
            }),
        }
    }

    /// Parks a querier waiting for an answer to `key`.
    ///
    /// If no entry exists, one is created under a freshly minted token
    /// and `(true, token)` is returned: the caller must send the
    /// upstream query carrying that token. Otherwise the value joins the
    /// existing entry and `(false, existing_token)` is returned. A value
    /// racing a drain is discarded, also returning `false`.
    pub fn add(&self, key: PendingQueryKey, value: V, valid_until: i64) -> (bool, Token) {
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        if let Some(entry) = inner.map.get_mut(&key) {
            entry.last_access = access;
            let token = entry.token;
            let set = entry.set.clone();
            drop(inner);
            if !set.add((value, valid_until)) {
                debug!(?key, "pending-query set already drained, value lost");
            }
            return (false, token);
        }
        if inner.map.len() >= inner.max_entries {
            inner.evict();
        }
        let token = Token::mint();
        let set = Arc::new(DrainSet::new());
        set.add((value, valid_until));
        inner.by_token.insert(token, key.clone());
        inner.map.insert(
            key,
            PendingQueryEntry {
                token,
                set,
                last_access: access,
            },
        );
        (true, token)
    }

    /// Atomically takes every valid parked querier for a token.
    ///
    /// The underlying set is closed so that racing adds fail, and the
    /// entry is removed together with its token mapping.
    pub fn get_all_and_delete(&self, token: Token) -> Option<Vec<V>> {
        let mut inner = self.inner.lock();
        let key = inner.by_token.remove(&token)?;
        let entry = inner.map.remove(&key)?;
        drop(inner);
        let now = unix_now();
        entry.set.drain().map(|values| {
            values
                .into_iter()
                .filter(|(_, valid_until)| *valid_until >= now)
                .map(|(value, _)| value)
                .collect()
        })
    }

    /// Removes expired values, empty entries and their token mappings.
    pub fn remove_expired_values(&self) {
        let now = unix_now();
        let mut inner = self.inner.lock();
        let mut dead = Vec::new();
        inner.map.retain(|key, entry| {
            entry.set.retain(|(_, valid_until)| *valid_until >= now);
            if entry.set.is_empty() {
                dead.push((key.clone(), entry.token));
                false
            } else {
                true
            }
        });
        for (_, token) in dead {
            inner.by_token.remove(&token);
        }
    }

    /// Returns the total number of parked queriers.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map
            .values()
            .map(|entry| entry.set.len())
            .sum()
    }

    /// Returns whether nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> PendingQueryInner<V> {
    /// Evicts the least recently used entry with all its values.
    fn evict(&mut self) {
        let victim = self
            .map
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, entry)| (key.clone(), entry.token));
        if let Some((key, token)) = victim {
            self.map.remove(&key);
            self.by_token.remove(&token);
        }
    }
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn drain_set_is_one_shot() {
        let set = DrainSet::new();
        assert!(set.add(1));
        assert!(set.add(2));
        assert_eq!(set.drain(), Some(vec![1, 2]));
        assert!(!set.add(3));
        assert_eq!(set.drain(), None);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn pending_signature_first_add_signals_query() {
        let cache = PendingSignatureCache::new(4);
        let until = unix_now() + 100;
        assert!(cache.add(".", "ch", "section-a", until));
        assert!(!cache.add(".", "ch", "section-b", until));
        assert!(cache.add(".", "org", "section-c", until));
        assert_eq!(cache.len(), 3);

        let drained = cache.get_all_and_delete(".", "ch").unwrap();
        assert_eq!(drained, vec!["section-a", "section-b"]);
        assert!(cache.get_all_and_delete(".", "ch").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn pending_signature_drops_expired_on_drain() {
        let cache = PendingSignatureCache::new(4);
        let now = unix_now();
        cache.add(".", "ch", "fresh", now + 100);
        cache.add(".", "ch", "stale", now - 10);
        assert_eq!(
            cache.get_all_and_delete(".", "ch").unwrap(),
            vec!["fresh"]
        );
    }

    #[test]
    fn pending_signature_sweep() {
        let cache = PendingSignatureCache::new(4);
        let now = unix_now();
        cache.add(".", "ch", "stale", now - 10);
        cache.add(".", "org", "fresh", now + 100);
        cache.remove_expired_sections();
        assert_eq!(cache.len(), 1);
        assert!(cache.get_all_and_delete(".", "ch").is_none());
    }

    #[test]
    fn pending_query_tokens() {
        let cache = PendingQueryCache::new(4);
        let key = PendingQueryKey {
            context: ".".into(),
            zone: "ch".into(),
            name: "ethz".into(),
            object_type: ObjectType::Ip4,
        };
        let until = unix_now() + 100;
        let (fresh, token) = cache.add(key.clone(), "alice", until);
        assert!(fresh);
        let (fresh, token2) = cache.add(key.clone(), "bob", until);
        assert!(!fresh);
        assert_eq!(token, token2);
        assert_eq!(cache.len(), 2);

        assert!(cache.get_all_and_delete(Token::mint()).is_none());
        let drained = cache.get_all_and_delete(token).unwrap();
        assert_eq!(drained, vec!["alice", "bob"]);
        assert!(cache.get_all_and_delete(token).is_none());

        // The key is free again afterwards.
        let (fresh, token3) = cache.add(key, "carol", until);
        assert!(fresh);
        assert_ne!(token, token3);
    }

    #[test]
    fn concurrent_drain_is_exactly_once() {
        for _ in 0..64 {
            let cache = Arc::new(PendingSignatureCache::new(16));
            cache.add(".", "ch", 0usize, unix_now() + 100);
            let drained = Arc::new(AtomicUsize::new(0));
            let lost = Arc::new(AtomicUsize::new(0));
            let mut handles = Vec::new();
            for _ in 0..2 {
                let cache = cache.clone();
                let drained = drained.clone();
                handles.push(thread::spawn(move || {
                    if let Some(values) = cache.get_all_and_delete(".", "ch") {
                        drained.fetch_add(values.len(), Ordering::SeqCst);
                    }
                }));
            }
            for i in 0..2 {
                let cache = cache.clone();
                let lost = lost.clone();
                handles.push(thread::spawn(move || {
                    if !cache.add(".", "ch", i + 1, unix_now() + 100) {
                        // Either joined the existing entry or was lost
                        // to the drain race; both return false.
                        lost.fetch_add(1, Ordering::SeqCst);
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }
            // Whatever was not drained must still be present or have
            // been discarded by a closed set; nothing is both drained
            // and still visible.
            let remaining = cache.len();
            let total = drained.load(Ordering::SeqCst) + remaining;
            assert!(total <= 3);
            assert!(drained.load(Ordering::SeqCst) >= 1 || remaining > 0);
        }
    }
}
