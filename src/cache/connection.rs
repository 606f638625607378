//! The connection cache.

use crate::base::conn::AddressPair;
use crate::cache::bounded::BoundedMap;
use std::sync::Arc;

//------------ Conn ----------------------------------------------------------

/// An established connection as the cache sees it.
///
/// The actual transport lives outside this crate; the cache only needs
/// to be able to close a connection it replaces or evicts.
pub trait Conn: Send + Sync {
    /// Closes the connection.
    fn close(&self);
}

//------------ ConnectionCache -----------------------------------------------

/// The cache of active connections, keyed by address pair.
pub struct ConnectionCache {
    inner: BoundedMap<AddressPair, Arc<dyn Conn>>,
}

impl ConnectionCache {
    /// Creates a cache holding at most `max_entries` connections.
    pub fn new(max_entries: usize) -> Self {
        ConnectionCache {
            inner: BoundedMap::with_evict_hook(max_entries, |conn: Arc<dyn Conn>| {
                conn.close()
            }),
        }
    }

    /// Adds a connection.
    ///
    /// If a connection for the pair is already cached it is closed and
    /// replaced, and `false` is returned. A connection evicted to make
    /// room is closed as well.
    pub fn add(&self, pair: AddressPair, conn: Arc<dyn Conn>) -> bool {
        match self.inner.insert(pair, conn, false, i64::MAX) {
            Some(old) => {
                old.close();
                false
            }
            None => true,
        }
    }

    /// Returns the connection for a pair, refreshing its recentness.
    pub fn get(&self, pair: &AddressPair) -> Option<Arc<dyn Conn>> {
        self.inner.get(pair)
    }

    /// Removes and closes the connection for a pair.
    pub fn remove(&self, pair: &AddressPair) -> bool {
        match self.inner.remove(pair) {
            Some(conn) => {
                conn.close();
                true
            }
            None => false,
        }
    }

    /// Returns the number of cached connections.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

//============ Test ==========================================================
