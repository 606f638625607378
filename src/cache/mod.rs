//! The cache substrate.
//!
//! A RAINS server keeps everything it has learned, from connections and
//! peer capabilities to delegation keys, verified sections and parked
//! work, in bounded in-memory caches. All of them share one eviction policy:
//! external entries are ordered by least-recent access, ties broken
//! towards the shortest remaining validity, while *internal* entries
//! (our own authoritative content) only ever leave by expiring. Every
//! cache exposes `len` and an on-demand expiry sweep; a background
//! thread calls the sweeps periodically.
//!
//! The uniform caches sit on the shared [`BoundedMap`]; the caches with
//! index or drain semantics of their own implement the policy over their
//! own interior.

pub mod address;
pub mod assertion;
pub mod bounded;
pub mod capability;
pub mod connection;
pub mod key;
pub mod negative;
pub mod pending;

pub use self::address::{AddressAnswer, AddressCache};
pub use self::assertion::AssertionCache;
pub use self::bounded::BoundedMap;
pub use self::capability::CapabilityCache;
pub use self::connection::{Conn, ConnectionCache};
pub use self::key::{KeyCacheKey, ZoneKeyCache};
pub use self::negative::NegativeAssertionCache;
pub use self::pending::{
    DrainSet, PendingQueryCache, PendingQueryKey, PendingSignatureCache,
};
