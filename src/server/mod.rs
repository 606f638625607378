//! The server context.
//!
//! Everything a running server node shares between its worker threads
//! lives in one [`ServerContext`]: the immutable [configuration][Config],
//! all the caches, and the [`Sender`] collaborator through which answers
//! and delegation queries leave the process. The context is created once
//! at startup, the root delegation key is pinned into the key cache, and
//! a reference is passed into every component. There is no global state.
//!
//! The network layer is not part of this crate. Incoming traffic is
//! handed over through the [`Receiver`] collaborator as already parsed
//! messages; the [engine] methods on the context do the rest.

pub mod config;
pub mod engine;

pub use self::config::Config;

use crate::base::algo::SignatureAlgo;
use crate::base::conn::ConnInfo;
use crate::base::token::Token;
use crate::cache::{
    AddressCache, AssertionCache, CapabilityCache, ConnectionCache,
    KeyCacheKey, NegativeAssertionCache, PendingQueryCache,
    PendingSignatureCache, ZoneKeyCache,
};
use crate::keys::{PublicKey, PublicKeyID, ED25519_PUBLIC_KEY_LEN};
use crate::section::{Message, Query, Section, SignableSection};
use crate::zonefile::parser::decode_hex;
use bytes::Bytes;
use core::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

//------------ MsgSectionSender ----------------------------------------------

/// A section as delivered by the receiver, with its provenance.
#[derive(Clone, Debug)]
pub struct MsgSectionSender {
    /// Who sent the message the section arrived in.
    pub sender: ConnInfo,

    /// The section itself.
    pub section: Section,

    /// The token of the message the section arrived in.
    pub token: Token,
}

//------------ SectionSender -------------------------------------------------

/// A signable section with its provenance, the unit of parked work.
#[derive(Clone, Debug)]
pub struct SectionSender {
    /// Who sent the message the section arrived in.
    pub sender: ConnInfo,

    /// The section itself.
    pub section: SignableSection,

    /// The token of the message the section arrived in.
    pub token: Token,
}

//------------ QueryWaiter ---------------------------------------------------

/// A querier parked until the answer to its question arrives.
#[derive(Clone, Debug)]
pub struct QueryWaiter {
    /// Who asked.
    pub sender: ConnInfo,

    /// The token the answer must carry.
    pub token: Token,
}

//------------ Sender / Receiver ---------------------------------------------

/// The outgoing half of the network collaborator.
pub trait Sender: Send + Sync {
    /// Sends a response message to a peer.
    fn send(&self, to: ConnInfo, message: Message) -> Result<(), SendError>;

    /// Forwards a query towards an authority able to answer it.
    ///
    /// Used both for delegation queries minted on a missing key and for
    /// questions the caches could not answer. Routing is the
    /// collaborator's business.
    fn send_query(&self, query: Query) -> Result<(), SendError>;
}

/// The incoming half of the network collaborator.
pub trait Receiver {
    /// Blocks for the next parsed message, `None` on shutdown.
    fn recv(&self) -> Option<(ConnInfo, Message)>;
}

/// Sending failed; the peer is unreachable or gone.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SendError;

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("unable to send")
    }
}

impl std::error::Error for SendError {}

//------------ ServerContext -------------------------------------------------

/// The shared state of a server node.
pub struct ServerContext {
    /// The process configuration.
    pub config: Config,

    /// Active connections.
    pub connections: ConnectionCache,

    /// Capabilities peers have advertised.
    pub capabilities: CapabilityCache,

    /// Delegation public keys.
    pub zone_keys: ZoneKeyCache,

    /// Verified assertions.
    pub assertions: AssertionCache,

    /// Verified shards, pshards and zones.
    pub negatives: NegativeAssertionCache,

    /// Sections parked on a missing delegation key.
    pub pending_signatures: PendingSignatureCache<SectionSender>,

    /// Queriers parked on an unanswered question.
    pub pending_queries: PendingQueryCache<QueryWaiter>,

    /// Verified address sections.
    pub addresses: AddressCache,

    /// The outgoing network collaborator.
    pub(crate) sender: Arc<dyn Sender>,
}

impl ServerContext {
    /// Creates the context with all caches sized from the config.
    pub fn new(config: Config, sender: Arc<dyn Sender>) -> Self {
        ServerContext {
            connections: ConnectionCache::new(config.max_connections),
            capabilities: CapabilityCache::new(
                config.capabilities_cache_size,
                config.peer_to_cap_cache_size,
            ),
            zone_keys: ZoneKeyCache::new(config.zone_key_cache_size),
            assertions: AssertionCache::new(config.assertion_cache_size),
            negatives: NegativeAssertionCache::new(
                config.negative_assertion_cache_size,
            ),
            pending_signatures: PendingSignatureCache::new(
                config.pending_signature_cache_size,
            ),
            pending_queries: PendingQueryCache::new(
                config.pending_query_cache_size,
            ),
            addresses: AddressCache::new(config.address_cache_size),
            config,
            sender,
        }
    }

    /// Loads the root delegation key and pins it into the key cache.
    ///
    /// The root key is process-wide immutable state: it is added with
    /// `internal = true` and thus only ever leaves the cache by
    /// expiring, which it never does.
    pub fn bootstrap_root_key(&self) -> Result<(), RootKeyError> {
        let key = load_root_key(&self.config.root_zone_public_key_path)?;
        info!(path = %self.config.root_zone_public_key_path.display(),
            "loaded root delegation key");
        self.zone_keys.add(
            KeyCacheKey::new(".", ".", SignatureAlgo::Ed25519),
            key,
            true,
        );
        Ok(())
    }

    /// Sweeps expired entries out of every cache.
    ///
    /// Called periodically from a background thread; every cache also
    /// ignores expired entries on lookup, so the sweep only reclaims
    /// memory.
    pub fn sweep(&self) {
        self.zone_keys.remove_expired_keys();
        self.assertions.remove_expired_values();
        self.negatives.remove_expired_values();
        self.pending_signatures.remove_expired_sections();
        self.pending_queries.remove_expired_values();
        self.addresses.delete_expired_elements();
    }
}

//------------ spawn_sweeper -------------------------------------------------

/// Spawns the background thread sweeping expired cache entries.
///
/// The thread runs for the lifetime of the process at the shorter of
/// the two configured reap intervals.
pub fn spawn_sweeper(ctx: Arc<ServerContext>) -> std::thread::JoinHandle<()> {
    let interval = std::time::Duration::from_secs(
        ctx.config.reap_verify_secs.min(ctx.config.reap_engine_secs).max(1),
    );
    std::thread::spawn(move || loop {
        std::thread::sleep(interval);
        ctx.sweep();
    })
}

//------------ load_root_key -------------------------------------------------

/// Reads the root delegation key blob.
///
/// The file holds the hex encoding of the 32 raw bytes of the root
/// zone's Ed25519 public key.
pub fn load_root_key(path: &Path) -> Result<PublicKey, RootKeyError> {
    let text = std::fs::read_to_string(path).map_err(RootKeyError::Io)?;
    let bytes =
        decode_hex(text.trim()).ok_or(RootKeyError::MalformedKey)?;
    if bytes.len() != ED25519_PUBLIC_KEY_LEN {
        return Err(RootKeyError::MalformedKey);
    }
    Ok(PublicKey::new(
        PublicKeyID::ed25519(0),
        Bytes::from(bytes),
        0,
        i64::MAX,
    ))
}

//------------ RootKeyError --------------------------------------------------

/// The root key blob could not be loaded.
#[derive(Debug)]
pub enum RootKeyError {
    /// Reading the file failed.
    Io(std::io::Error),

    /// The file content is not a 32 byte hex blob.
    MalformedKey,
}

impl fmt::Display for RootKeyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RootKeyError::Io(err) => {
                write!(f, "unable to read root key: {}", err)
            }
            RootKeyError::MalformedKey => {
                f.write_str("root key is not a 32 byte hex blob")
            }
        }
    }
}

impl std::error::Error for RootKeyError {}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn root_key_loading() {
        let path = std::env::temp_dir().join("rains-root-key-test.hex");
        std::fs::write(&path, format!("{}\n", "ab".repeat(32))).unwrap();
        let key = load_root_key(&path).unwrap();
        assert_eq!(key.key.len(), ED25519_PUBLIC_KEY_LEN);
        assert!(key.covers(crate::base::unix_now()));

        std::fs::write(&path, "deadbeef").unwrap();
        assert!(matches!(
            load_root_key(&path),
            Err(RootKeyError::MalformedKey)
        ));
        std::fs::remove_file(&path).ok();
        assert!(matches!(load_root_key(&path), Err(RootKeyError::Io(_))));
    }
}
