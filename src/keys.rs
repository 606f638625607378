//! Public keys.

use crate::base::algo::{KeySpace, SignatureAlgo};
use bytes::Bytes;
use core::fmt;

/// The length of an Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_LEN: usize = 32;

//------------ PublicKeyID ---------------------------------------------------

/// The identity of a public key.
///
/// A key is selected by the algorithm it is for, the key space it lives
/// in, and its key phase. The phase is an integer epoch allowing a zone to
/// roll keys while both the outgoing and the incoming key are valid.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PublicKeyID {
    /// The signature algorithm this key is for.
    pub algorithm: SignatureAlgo,

    /// The key space this key lives in.
    pub key_space: KeySpace,

    /// The epoch of the key.
    pub key_phase: u32,
}

impl PublicKeyID {
    /// Creates a RAINS key space Ed25519 key identity for a phase.
    pub fn ed25519(key_phase: u32) -> Self {
        PublicKeyID {
            algorithm: SignatureAlgo::Ed25519,
            key_space: KeySpace::Rains,
            key_phase,
        }
    }
}

impl fmt::Display for PublicKeyID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.algorithm, self.key_space, self.key_phase)
    }
}

//------------ PublicKey -----------------------------------------------------

/// A public key together with its validity window.
///
/// The validity window states when the key itself may be used for
/// verification, independently of the validity of any signature made
/// with it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicKey {
    /// The identity of the key.
    pub id: PublicKeyID,

    /// The first moment the key may be used, in Unix seconds.
    pub valid_since: i64,

    /// The last moment the key may be used, in Unix seconds.
    pub valid_until: i64,

    /// The raw key material.
    pub key: Bytes,
}

impl PublicKey {
    /// Creates a key valid in the given window.
    pub fn new(id: PublicKeyID, key: Bytes, valid_since: i64, valid_until: i64) -> Self {
        PublicKey {
            id,
            valid_since,
            valid_until,
            key,
        }
    }

    /// Returns whether the key's own validity window covers `when`.
    pub fn covers(&self, when: i64) -> bool {
        self.valid_since <= when && when <= self.valid_until
    }

    /// Returns whether the key has expired at `now`.
    pub fn expired(&self, now: i64) -> bool {
        self.valid_until < now
    }
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn key(valid_since: i64, valid_until: i64) -> PublicKey {
        PublicKey::new(
            PublicKeyID::ed25519(0),
            Bytes::from_static(&[7u8; ED25519_PUBLIC_KEY_LEN]),
            valid_since,
            valid_until,
        )
    }

    #[test]
    fn covers_is_inclusive() {
        let key = key(10, 20);
        assert!(key.covers(10));
        assert!(key.covers(20));
        assert!(!key.covers(9));
        assert!(!key.covers(21));
    }

    #[test]
    fn expiry() {
        assert!(key(10, 20).expired(21));
        assert!(!key(10, 20).expired(20));
    }
}
