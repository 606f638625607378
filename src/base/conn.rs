//! Connection identifiers.

use core::fmt;
use std::net::SocketAddr;

//------------ NetworkAddrType -----------------------------------------------

/// The address family a connection identifier belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NetworkAddrType {
    /// TCP over IP.
    Tcp,
}

//------------ ConnInfo ------------------------------------------------------

/// Information identifying one endpoint of a connection.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ConnInfo {
    addr_type: NetworkAddrType,
    addr: SocketAddr,
}

impl ConnInfo {
    /// Creates a TCP connection identifier from a socket address.
    pub fn tcp(addr: SocketAddr) -> Self {
        ConnInfo {
            addr_type: NetworkAddrType::Tcp,
            addr,
        }
    }

    /// Returns the address family of this endpoint.
    pub fn addr_type(&self) -> NetworkAddrType {
        self.addr_type
    }

    /// Returns the socket address of this endpoint.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl fmt::Display for ConnInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

//------------ AddressPair ---------------------------------------------------

/// The local and remote endpoints of a connection.
///
/// An address pair uniquely identifies an active connection and serves as
/// the key of the connection cache.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct AddressPair {
    /// Our own endpoint.
    pub local: ConnInfo,

    /// The peer's endpoint.
    pub remote: ConnInfo,
}

impl fmt::Display for AddressPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}_{}", self.local, self.remote)
    }
}
