//! The public-key cache.

use crate::base::algo::SignatureAlgo;
use crate::base::unix_now;
use crate::cache::bounded::BoundedMap;
use crate::keys::PublicKey;
use smallvec::SmallVec;

/// How many keys are kept per `(context, zone, algorithm)` entry.
///
/// Covers both keys of a rollover plus one spare; additional keys push
/// out the one expiring first.
const KEYS_PER_ENTRY: usize = 3;

//------------ KeyCacheKey ---------------------------------------------------

/// The lookup key of the public-key cache.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct KeyCacheKey {
    /// The context the key is valid in.
    pub context: String,

    /// The zone the key is delegated to.
    pub zone: String,

    /// The algorithm of the key.
    pub algorithm: SignatureAlgo,
}

impl KeyCacheKey {
    /// Creates a lookup key.
    pub fn new(
        context: impl Into<String>,
        zone: impl Into<String>,
        algorithm: SignatureAlgo,
    ) -> Self {
        KeyCacheKey {
            context: context.into(),
            zone: zone.into(),
            algorithm,
        }
    }
}

//------------ ZoneKeyCache --------------------------------------------------

/// The cache of delegation public keys.
///
/// Each `(context, zone, algorithm)` entry holds a small list of keys so
/// that both keys of a rollover can be present. Entries for our own
/// authoritative zones are added with `internal = true` and never fall
/// victim to capacity eviction.
pub struct ZoneKeyCache {
    inner: BoundedMap<KeyCacheKey, SmallVec<[PublicKey; KEYS_PER_ENTRY]>>,
}

impl ZoneKeyCache {
    /// Creates a cache holding keys for at most `max_entries` zones.
    pub fn new(max_entries: usize) -> Self {
        ZoneKeyCache {
            inner: BoundedMap::new(max_entries),
        }
    }

    /// Adds a public key.
    ///
    /// Returns `false` if the identical key was already present. If the
    /// per-entry list is full, the key expiring first is dropped to make
    /// room. The whole entry inherits `internal` from its first
    /// insertion.
    pub fn add(&self, key: KeyCacheKey, public_key: PublicKey, internal: bool) -> bool {
        let added = self.inner.with_value_mut(&key, |list| {
            if list.contains(&public_key) {
                return false;
            }
            if list.len() >= KEYS_PER_ENTRY {
                if let Some(pos) = list
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, key)| key.valid_until)
                    .map(|(pos, _)| pos)
                {
                    list.remove(pos);
                }
            }
            list.push(public_key.clone());
            true
        });
        match added {
            Some(added) => added,
            None => {
                let valid_until = public_key.valid_until;
                let mut list = SmallVec::new();
                list.push(public_key);
                self.inner.insert(key, list, internal, valid_until);
                true
            }
        }
    }

    /// Returns a key currently usable for verification.
    ///
    /// The first key in the entry whose own validity window covers the
    /// present moment is returned; expired or not-yet-valid keys are
    /// skipped.
    pub fn get(&self, key: &KeyCacheKey) -> Option<PublicKey> {
        let now = unix_now();
        self.inner
            .get(key)?
            .into_iter()
            .find(|public_key| public_key.covers(now))
    }

    /// Returns all keys stored for an entry, including stale ones.
    pub fn get_all(&self, key: &KeyCacheKey) -> Vec<PublicKey> {
        self.inner
            .get(key)
            .map(SmallVec::into_vec)
            .unwrap_or_default()
    }

    /// Removes expired keys, dropping entries that become empty.
    pub fn remove_expired_keys(&self) {
        let now = unix_now();
        let mut empty = Vec::new();
        self.inner.for_each(|key, list| {
            if list.iter().all(|public_key| public_key.expired(now)) {
                empty.push(key.clone());
            }
        });
        for key in empty {
            self.inner.remove(&key);
        }
        // Entries that are only partially expired keep their stale keys
        // until the list needs the room; get skips them anyway.
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

//============ Test ==========================================================
