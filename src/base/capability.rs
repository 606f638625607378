//! Peer capabilities.

use core::fmt;
use ring::digest;

//------------ Capability ----------------------------------------------------

/// Something a server or client is capable of.
///
/// Capabilities are exchanged in messages, either in full or as a hash of
/// the complete capability set a peer has advertised before.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Capability(String);

impl Capability {
    /// The empty capability.
    pub const NO_CAPABILITY: &'static str = "";

    /// The peer accepts TLS over TCP connections.
    pub const TLS_OVER_TCP: &'static str = "urn:x-rains:tlssrv";

    /// Creates a capability from its urn.
    pub fn new(urn: impl Into<String>) -> Self {
        Capability(urn.into())
    }

    /// Returns the capability's urn.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether this is the TLS-over-TCP capability.
    pub fn is_tls_over_tcp(&self) -> bool {
        self.0 == Self::TLS_OVER_TCP
    }
}

impl From<&str> for Capability {
    fn from(urn: &str) -> Self {
        Capability(urn.into())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//------------ hash_capabilities ---------------------------------------------

/// Returns the SHA-256 hash over a capability set.
///
/// Peers may advertise the hash of a capability set they have sent in full
/// before; the capability cache indexes sets by this value.
pub fn hash_capabilities(caps: &[Capability]) -> Vec<u8> {
    let mut ctx = digest::Context::new(&digest::SHA256);
    for cap in caps {
        ctx.update(cap.as_str().as_bytes());
        ctx.update(b" ");
    }
    ctx.finish().as_ref().to_vec()
}

//============ Test ==========================================================
