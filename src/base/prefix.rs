//! Address prefixes.

use core::fmt;
use core::str::FromStr;
use std::net::IpAddr;

//------------ Prefix --------------------------------------------------------

/// A CIDR prefix.
///
/// Address assertions and address zones are keyed by prefix rather than
/// by name. The host bits of the address are kept as given; comparisons
/// only ever look at the first `len` bits.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Prefix {
    addr: IpAddr,
    len: u8,
}

impl Prefix {
    /// Creates a prefix, checking the length against the address family.
    pub fn new(addr: IpAddr, len: u8) -> Result<Self, PrefixError> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if len > max {
            return Err(PrefixError::BadLength(len));
        }
        Ok(Prefix { addr, len })
    }

    /// Returns the address part of the prefix.
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Returns the prefix length in bits.
    pub fn len(&self) -> u8 {
        self.len
    }

    /// Returns whether the prefix has length zero.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns whether both prefixes are in the same address family.
    pub fn same_family(&self, other: &Prefix) -> bool {
        self.addr.is_ipv4() == other.addr.is_ipv4()
    }

    /// Returns the bit at `pos` of the address, most significant first.
    pub fn bit(&self, pos: u8) -> bool {
        match self.addr {
            IpAddr::V4(addr) => {
                let octets = addr.octets();
                octets[usize::from(pos / 8)] & (0x80 >> (pos % 8)) != 0
            }
            IpAddr::V6(addr) => {
                let octets = addr.octets();
                octets[usize::from(pos / 8)] & (0x80 >> (pos % 8)) != 0
            }
        }
    }

    /// Returns whether `self` covers `other`.
    ///
    /// A prefix covers another if it is no longer and all its bits match.
    pub fn covers(&self, other: &Prefix) -> bool {
        if !self.same_family(other) || self.len > other.len {
            return false;
        }
        (0..self.len).all(|pos| self.bit(pos) == other.bit(pos))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

impl FromStr for Prefix {
    type Err = PrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s.split_once('/').ok_or(PrefixError::MissingLength)?;
        let addr =
            IpAddr::from_str(addr).map_err(|_| PrefixError::BadAddress)?;
        let len = u8::from_str(len).map_err(|_| PrefixError::BadLength(255))?;
        Prefix::new(addr, len)
    }
}

//------------ PrefixError ---------------------------------------------------

/// A prefix was malformed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrefixError {
    /// The textual form had no `/len` part.
    MissingLength,

    /// The address part did not parse.
    BadAddress,

    /// The length exceeds the address family's bit count.
    BadLength(u8),
}

impl fmt::Display for PrefixError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrefixError::MissingLength => f.write_str("missing prefix length"),
            PrefixError::BadAddress => f.write_str("malformed address"),
            PrefixError::BadLength(len) => {
                write!(f, "prefix length {} out of range", len)
            }
        }
    }
}

impl std::error::Error for PrefixError {}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_and_display() {
        let prefix: Prefix = "127.0.0.1/32".parse().unwrap();
        assert_eq!(prefix.len(), 32);
        assert_eq!(prefix.to_string(), "127.0.0.1/32");
        let prefix: Prefix = "2001:db8::/32".parse().unwrap();
        assert_eq!(prefix.to_string(), "2001:db8::/32");
        assert!("1.2.3.4".parse::<Prefix>().is_err());
        assert!("1.2.3.4/33".parse::<Prefix>().is_err());
        assert!("2001:db8::/129".parse::<Prefix>().is_err());
    }

    #[test]
    fn covering() {
        let net: Prefix = "127.0.0.0/24".parse().unwrap();
        let host: Prefix = "127.0.0.1/32".parse().unwrap();
        let other: Prefix = "10.0.0.0/24".parse().unwrap();
        let v6: Prefix = "::1/128".parse().unwrap();
        assert!(net.covers(&host));
        assert!(!host.covers(&net));
        assert!(!net.covers(&other));
        assert!(!net.covers(&v6));
        assert!(net.covers(&net));
    }
}
