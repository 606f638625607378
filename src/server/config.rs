//! Server configuration.

use crate::siglib::MaxCacheValidity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

//------------ Config --------------------------------------------------------

/// The configuration of a server process.
///
/// One immutable value per process, created at startup. Loading it from
/// a file is left to the binary; the type only provides the shape and
/// the defaults.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Where the root delegation key blob lives.
    pub root_zone_public_key_path: PathBuf,

    /// How many connections are kept open.
    pub max_connections: usize,

    /// How many peers' capabilities are remembered.
    pub capabilities_cache_size: usize,

    /// How many capability-set hashes are remembered.
    pub peer_to_cap_cache_size: usize,

    /// How many zones' delegation keys are kept.
    pub zone_key_cache_size: usize,

    /// How many zones may have sections parked on a missing key.
    pub pending_signature_cache_size: usize,

    /// How many assertion entries are kept.
    pub assertion_cache_size: usize,

    /// How many shards, pshards and zones are kept.
    pub negative_assertion_cache_size: usize,

    /// How many questions may be pending upstream.
    pub pending_query_cache_size: usize,

    /// How many address sections are kept.
    pub address_cache_size: usize,

    /// How long a parked section waits for its delegation, in seconds.
    pub delegation_query_validity_secs: i64,

    /// How long a parked querier waits for an answer, in seconds.
    pub query_validity_secs: i64,

    /// The sweep interval of the verify caches, in seconds.
    pub reap_verify_secs: u64,

    /// The sweep interval of the engine caches, in seconds.
    pub reap_engine_secs: u64,

    /// The contexts this server is an authority for.
    pub context_authority: Vec<String>,

    /// The zones this server is an authority for.
    pub zone_authority: Vec<String>,

    /// How long verified sections may be served from the caches.
    pub max_cache_validity: MaxCacheValidity,

    /// The capabilities this server advertises.
    pub capabilities: Vec<String>,
}

impl Config {
    /// Returns whether this server is authoritative for a context/zone.
    pub fn is_authority(&self, context: &str, zone: &str) -> bool {
        self.context_authority.iter().any(|c| c == context)
            && self.zone_authority.iter().any(|z| z == zone)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            root_zone_public_key_path: PathBuf::from(
                "keys/rootDelegationAssertion.key",
            ),
            max_connections: 1000,
            capabilities_cache_size: 50,
            peer_to_cap_cache_size: 1000,
            zone_key_cache_size: 1000,
            pending_signature_cache_size: 1000,
            assertion_cache_size: 10_000,
            negative_assertion_cache_size: 500,
            pending_query_cache_size: 1000,
            address_cache_size: 1000,
            delegation_query_validity_secs: 5,
            query_validity_secs: 5,
            reap_verify_secs: 1800,
            reap_engine_secs: 1800,
            context_authority: vec![".".into()],
            zone_authority: Vec::new(),
            max_cache_validity: MaxCacheValidity::default(),
            capabilities: vec![
                crate::base::Capability::TLS_OVER_TCP.to_string()
            ],
        }
    }
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn authority_needs_both_dimensions() {
        let config = Config {
            zone_authority: vec!["ch".into()],
            ..Config::default()
        };
        assert!(config.is_authority(".", "ch"));
        assert!(!config.is_authority(".", "org"));
        assert!(!config.is_authority("experimental", "ch"));
    }
}
