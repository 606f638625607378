//! Basics.
//!
//! This module provides the fundamental types the rest of the crate is
//! built on: message [tokens][Token], [connection identifiers][ConnInfo],
//! peer [capabilities][Capability], the algorithm enums shared between
//! signatures and Bloom filters, and the lexical [interval][Interval]
//! abstraction that shards, pshards and zones expose.

pub mod algo;
pub mod capability;
pub mod conn;
pub mod interval;
pub mod prefix;
pub mod token;

pub use self::algo::{HashAlgo, KeySpace, SignatureAlgo};
pub use self::capability::Capability;
pub use self::conn::{AddressPair, ConnInfo, NetworkAddrType};
pub use self::interval::{Interval, StringInterval, TOTAL_INTERVAL_BEGIN, TOTAL_INTERVAL_END};
pub use self::prefix::Prefix;
pub use self::token::Token;

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time as Unix seconds.
///
/// All validity windows in RAINS are expressed as signed 64-bit Unix
/// timestamps; this is the single place where wall-clock time enters the
/// crate.
pub fn unix_now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(dur) => dur.as_secs() as i64,
        Err(_) => 0,
    }
}
