//! Message tokens.

use core::fmt;
use rand::RngCore;

//------------ Token ---------------------------------------------------------

/// A 16 byte opaque value identifying a message exchange.
///
/// Tokens are compared byte-wise and carry no further structure. A server
/// mints a fresh token for every query it sends out and uses the token on
/// incoming messages to associate them with parked work.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Token([u8; 16]);

impl Token {
    /// Creates a fresh random token.
    pub fn mint() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Token(bytes)
    }

    /// Creates a token from its raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Token(bytes)
    }

    /// Returns the raw bytes of the token.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl AsRef<[u8]> for Token {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

//--- Display

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for ch in &self.0 {
            write!(f, "{:02x}", ch)?;
        }
        Ok(())
    }
}

//============ Test ==========================================================
