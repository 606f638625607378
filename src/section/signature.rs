//! Signatures.

use crate::keys::PublicKeyID;
use bytes::Bytes;
use core::fmt;

//------------ Signature -----------------------------------------------------

/// A signature attached to a section or message.
///
/// Besides the signature data itself, a signature carries the identity of
/// the public key needed to verify it and its own validity window. The
/// window is independent of the key's: a signature is only admissible
/// while both windows cover the current time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signature {
    /// The identity of the key that made this signature.
    pub public_key_id: PublicKeyID,

    /// The first moment the signature is valid, in Unix seconds.
    pub valid_since: i64,

    /// The last moment the signature is valid, in Unix seconds.
    pub valid_until: i64,

    /// The raw signature bytes.
    ///
    /// Empty until the signature has actually been produced; a signature
    /// template handed to the signer has all other fields filled in and
    /// this one empty.
    pub data: Bytes,
}

impl Signature {
    /// Creates a signature template without data.
    pub fn template(public_key_id: PublicKeyID, valid_since: i64, valid_until: i64) -> Self {
        Signature {
            public_key_id,
            valid_since,
            valid_until,
            data: Bytes::new(),
        }
    }

    /// Returns whether the signature's validity window covers `when`.
    pub fn covers(&self, when: i64) -> bool {
        self.valid_since <= when && when <= self.valid_until
    }

    /// Returns whether the signature has expired at `now`.
    pub fn expired(&self, now: i64) -> bool {
        self.valid_until < now
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            ":sig: {} {} {} {}",
            self.public_key_id, self.valid_since, self.valid_until,
            HexBytes(&self.data)
        )
    }
}

//------------ HexBytes ------------------------------------------------------

/// Helper displaying a byte slice as lowercase hex.
pub(crate) struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for ch in self.0 {
            write!(f, "{:02x}", ch)?;
        }
        Ok(())
    }
}
