//! Algorithm kinds.
//!
//! The enums in this module name algorithms without implementing them.
//! Each variant knows its zone-file token, which doubles as its canonical
//! text representation.

use core::fmt;

//------------ SignatureAlgo -------------------------------------------------

/// A signature algorithm.
///
/// RAINS currently defines a single signature algorithm. The enum exists
/// so that key caches and signatures stay keyed by algorithm when more
/// are added.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignatureAlgo {
    /// Ed25519 as specified in RFC 8032.
    Ed25519,
}

impl SignatureAlgo {
    /// Returns the zone-file token of the algorithm.
    pub fn token(self) -> &'static str {
        match self {
            SignatureAlgo::Ed25519 => ":ed25519:",
        }
    }

    /// Returns the algorithm for a zone-file token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            ":ed25519:" => Some(SignatureAlgo::Ed25519),
            _ => None,
        }
    }
}

impl fmt::Display for SignatureAlgo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.token())
    }
}

//------------ KeySpace ------------------------------------------------------

/// The key space a public key belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeySpace {
    /// The native RAINS key space.
    Rains,
}

impl KeySpace {
    /// Returns the zone-file token of the key space.
    pub fn token(self) -> &'static str {
        match self {
            KeySpace::Rains => ":rains:",
        }
    }

    /// Returns the key space for a zone-file token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            ":rains:" => Some(KeySpace::Rains),
            _ => None,
        }
    }
}

impl fmt::Display for KeySpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.token())
    }
}

//------------ HashAlgo ------------------------------------------------------

/// A hash algorithm.
///
/// Hash algorithms appear in certificate descriptions and in the hash
/// family of Bloom filters.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HashAlgo {
    /// No hash at all.
    NoHash,

    /// SHA-256.
    Sha256,

    /// SHA-384.
    Sha384,

    /// SHA-512.
    Sha512,

    /// SHAKE256 with 256 bit output.
    Shake256,

    /// 64 bit FNV-1a.
    Fnv64,

    /// 128 bit FNV-1a.
    Fnv128,
}

impl HashAlgo {
    /// Returns the zone-file token of the algorithm.
    pub fn token(self) -> &'static str {
        match self {
            HashAlgo::NoHash => ":noHash:",
            HashAlgo::Sha256 => ":sha256:",
            HashAlgo::Sha384 => ":sha384:",
            HashAlgo::Sha512 => ":sha512:",
            HashAlgo::Shake256 => ":shake256:",
            HashAlgo::Fnv64 => ":fnv64:",
            HashAlgo::Fnv128 => ":fnv128:",
        }
    }

    /// Returns the algorithm for a zone-file token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            ":noHash:" => Some(HashAlgo::NoHash),
            ":sha256:" => Some(HashAlgo::Sha256),
            ":sha384:" => Some(HashAlgo::Sha384),
            ":sha512:" => Some(HashAlgo::Sha512),
            ":shake256:" => Some(HashAlgo::Shake256),
            ":fnv64:" => Some(HashAlgo::Fnv64),
            ":fnv128:" => Some(HashAlgo::Fnv128),
            _ => None,
        }
    }
}

impl fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.token())
    }
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn token_round_trip() {
        for algo in [
            HashAlgo::NoHash,
            HashAlgo::Sha256,
            HashAlgo::Sha384,
            HashAlgo::Sha512,
            HashAlgo::Shake256,
            HashAlgo::Fnv64,
            HashAlgo::Fnv128,
        ] {
            assert_eq!(HashAlgo::from_token(algo.token()), Some(algo));
        }
        assert_eq!(
            SignatureAlgo::from_token(SignatureAlgo::Ed25519.token()),
            Some(SignatureAlgo::Ed25519)
        );
        assert_eq!(KeySpace::from_token(":rains:"), Some(KeySpace::Rains));
    }
}
