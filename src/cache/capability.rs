//! The capability cache.

use crate::base::capability::{hash_capabilities, Capability};
use crate::base::conn::ConnInfo;
use crate::cache::bounded::BoundedMap;

//------------ CapabilityCache -----------------------------------------------

/// The cache of capabilities peers have advertised.
///
/// Peers may advertise a capability set in full or as the hash of a set
/// sent earlier, so the cache is indexed both by connection identifier
/// and by set hash.
pub struct CapabilityCache {
    by_peer: BoundedMap<ConnInfo, Vec<Capability>>,
    by_hash: BoundedMap<Vec<u8>, Vec<Capability>>,
}

impl CapabilityCache {
    /// Creates a cache bounded to `max_peers` and `max_hashes` entries.
    pub fn new(max_peers: usize, max_hashes: usize) -> Self {
        CapabilityCache {
            by_peer: BoundedMap::new(max_peers),
            by_hash: BoundedMap::new(max_hashes),
        }
    }

    /// Records the capabilities a peer advertised.
    ///
    /// Also indexes the set under its hash. Returns `true` if the peer
    /// was not known yet and `false` if only its entry was refreshed.
    pub fn add(&self, peer: ConnInfo, caps: Vec<Capability>) -> bool {
        let hash = hash_capabilities(&caps);
        self.by_hash.insert(hash, caps.clone(), false, i64::MAX);
        self.by_peer.insert(peer, caps, false, i64::MAX).is_none()
    }

    /// Returns the capabilities of a peer, refreshing its recentness.
    pub fn get(&self, peer: &ConnInfo) -> Option<Vec<Capability>> {
        self.by_peer.get(peer)
    }

    /// Returns the capability set a hash stands for, if known.
    pub fn get_from_hash(&self, hash: &[u8]) -> Option<Vec<Capability>> {
        self.by_hash.get(&hash.to_vec())
    }

    /// Returns the number of peers with cached capabilities.
    pub fn len(&self) -> usize {
        self.by_peer.len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.by_peer.is_empty()
    }
}

//============ Test ==========================================================
