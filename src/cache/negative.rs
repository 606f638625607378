//! The negative-assertion cache.

use crate::base::interval::{Interval, StringInterval};
use crate::base::unix_now;
use crate::section::SignableSection;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

//------------ CachedRange ---------------------------------------------------

#[derive(Clone)]
struct CachedRange {
    section: Arc<SignableSection>,
    /// The section's range, computed once at insertion.
    interval: StringInterval,
    valid_since: i64,
    valid_until: i64,
    internal: bool,
    last_access: u64,
}

/// Returns the interval of a section, if it is a range section.
fn range_of(section: &SignableSection) -> Option<StringInterval> {
    match section {
        SignableSection::Shard(shard) => {
            Some(StringInterval::new(&shard.range_from, &shard.range_to))
        }
        SignableSection::Pshard(pshard) => {
            Some(StringInterval::new(&pshard.range_from, &pshard.range_to))
        }
        SignableSection::Zone(_) => Some(StringInterval::total()),
        _ => None,
    }
}

//------------ NegativeAssertionCache ----------------------------------------

/// The cache of verified shards, pshards and zones.
///
/// These sections prove *non*-existence: a name falling into the range
/// of a verified shard that does not list it does not exist. The cache
/// keeps the range sections per `(context, zone)` and answers interval
/// intersection queries over them.
pub struct NegativeAssertionCache {
    inner: Mutex<Inner>,
}

struct Inner {
    map: HashMap<(String, String), Vec<CachedRange>>,
    counter: u64,
    len: usize,
    max_entries: usize,
}

impl NegativeAssertionCache {
    /// Creates a cache holding at most `max_entries` sections.
    pub fn new(max_entries: usize) -> Self {
        NegativeAssertionCache {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                counter: 0,
                len: 0,
                max_entries,
            }),
        }
    }

    /// Adds a verified range section with its validity window.
    ///
    /// Returns `false` if the section is not a shard, pshard or zone, or
    /// if the identical section is already cached; in the latter case
    /// only its validity is refreshed.
    pub fn add(
        &self,
        context: &str,
        zone: &str,
        internal: bool,
        section: Arc<SignableSection>,
        valid_since: i64,
        valid_until: i64,
    ) -> bool {
        let interval = match range_of(section.as_ref()) {
            Some(interval) => interval,
            None => return false,
        };
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        if inner.len >= inner.max_entries {
            inner.evict();
        }
        let values = inner
            .map
            .entry((context.to_string(), zone.to_string()))
            .or_default();
        if let Some(existing) = values
            .iter_mut()
            .find(|cached| cached.section == section)
        {
            existing.valid_since = existing.valid_since.min(valid_since);
            existing.valid_until = existing.valid_until.max(valid_until);
            existing.last_access = access;
            return false;
        }
        values.push(CachedRange {
            section,
            interval,
            valid_since,
            valid_until,
            internal,
            last_access: access,
        });
        inner.len += 1;
        true
    }

    /// Returns the best section covering the interval.
    ///
    /// Best is the *shortest* covering section, a shard over a zone
    /// wherever possible, with ties broken towards the longest
    /// remaining validity. The caller must still check that the queried
    /// name is absent from the returned section's content.
    pub fn get(
        &self,
        context: &str,
        zone: &str,
        interval: &dyn Interval,
    ) -> Option<Arc<SignableSection>> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        let values = inner
            .map
            .get_mut(&(context.to_string(), zone.to_string()))?;
        let mut best: Option<usize> = None;
        for (pos, cached) in values
            .iter()
            .enumerate()
            .filter(|(_, cached)| cached.valid_until >= now)
        {
            if !cached.interval.covers(interval) {
                continue;
            }
            best = match best {
                None => Some(pos),
                Some(incumbent_pos) => {
                    let incumbent = &values[incumbent_pos];
                    let shorter =
                        incumbent.interval.covers(&cached.interval);
                    let tie = !shorter
                        && !cached.interval.covers(&incumbent.interval)
                        && cached.valid_until > incumbent.valid_until;
                    if shorter || tie {
                        Some(pos)
                    } else {
                        Some(incumbent_pos)
                    }
                }
            };
        }
        best.map(|pos| {
            let cached = &mut values[pos];
            cached.last_access = access;
            cached.section.clone()
        })
    }

    /// Returns every valid section intersecting the interval.
    pub fn get_all(
        &self,
        context: &str,
        zone: &str,
        interval: &dyn Interval,
    ) -> Vec<Arc<SignableSection>> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        match inner
            .map
            .get_mut(&(context.to_string(), zone.to_string()))
        {
            Some(values) => values
                .iter_mut()
                .filter(|cached| {
                    cached.valid_until >= now
                        && cached.interval.intersects(interval)
                })
                .map(|cached| {
                    cached.last_access = access;
                    cached.section.clone()
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Removes the whole entry for a context and zone.
    pub fn remove(&self, context: &str, zone: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner
            .map
            .remove(&(context.to_string(), zone.to_string()))
        {
            Some(values) => {
                inner.len -= values.len();
                true
            }
            None => false,
        }
    }

    /// Removes every section expired at the time of the call.
    pub fn remove_expired_values(&self) {
        let now = unix_now();
        let mut inner = self.inner.lock();
        let mut removed = 0;
        inner.map.retain(|_, values| {
            let before = values.len();
            values.retain(|cached| cached.valid_until >= now);
            removed += before - values.len();
            !values.is_empty()
        });
        inner.len -= removed;
    }

    /// Returns the number of cached sections.
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    /// Evicts the least recently used external section.
    fn evict(&mut self) {
        let victim = self
            .map
            .iter()
            .flat_map(|(key, values)| {
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, cached)| !cached.internal)
                    .map(move |(pos, cached)| (key, pos, cached))
            })
            .min_by_key(|(_, _, cached)| (cached.last_access, cached.valid_until))
            .map(|(key, pos, _)| (key.clone(), pos));
        match victim {
            Some((key, pos)) => {
                if let Some(values) = self.map.get_mut(&key) {
                    values.remove(pos);
                    self.len -= 1;
                    if values.is_empty() {
                        self.map.remove(&key);
                    }
                }
            }
            None => {
                error!(
                    len = self.len,
                    "negative-assertion cache full of internal entries, cannot evict"
                );
            }
        }
    }
}

//============ Test ==========================================================
