//! A server node for RAINS.
//!
//! RAINS is a next-generation naming and trust infrastructure in which
//! authoritative information about names and addresses is distributed as
//! cryptographically signed *assertions*, grouped into *shards*, *pshards*
//! and *zones*. This crate provides the core of a RAINS server: the section
//! data model, the canonical text encoding used as signature input, the
//! signing and verification protocols, the zone-file decoder, and the
//! concurrency-safe caches that tie signed content to the public keys
//! needed to verify it.
//!
//! # Modules
//!
//! * [base] contains fundamental types: tokens, connection identifiers,
//!   capabilities, algorithm kinds, and the lexical interval abstraction.
//! * [keys] contains public keys and their identities.
//! * [object] contains the typed values an assertion can carry, from IP
//!   addresses to delegation keys.
//! * [section] contains the section data model, that is, everything that
//!   can appear in a RAINS message.
//! * [canonical] produces the deterministic text encoding of a section
//!   that signatures are computed over.
//! * [sanitize] rejects sections whose string fields embed zone-file
//!   control tokens and could forge section boundaries under canonical
//!   encoding.
//! * [siglib] attaches and validates signatures on sections and messages.
//! * [crypto] is the small boundary to `ring`: Ed25519 sign/verify and
//!   the hash family used by Bloom filters.
//! * [cache] holds the server's bounded, expiring lookup structures.
//! * [zonefile] reads the textual zone-file format back into signed
//!   sections.
//! * [server] ties the pieces together: configuration, the server
//!   context, and the section intake engine.
//!
//! The network I/O layer is not part of this crate; it is consumed through
//! the [`server::Sender`] and [`server::Receiver`] collaborator traits.

pub mod base;
pub mod cache;
pub mod canonical;
pub mod crypto;
pub mod keys;
pub mod object;
pub mod sanitize;
pub mod section;
pub mod server;
pub mod siglib;
pub mod zonefile;
