//! Canonical encoding.
//!
//! Every signature in RAINS is computed over a deterministic textual
//! encoding of the signed section. The encoding doubles as the zone-file
//! representation: what the [decoder][crate::zonefile] reads is exactly
//! what this module writes. Whitespace-separated tokens, fixed field
//! order per kind, children in insertion order.
//!
//! Attached signatures are part of the encoding and follow their
//! section in a parenthesised group. The [signer][crate::siglib] clears
//! the signature list before encoding, so the canonical *signature input*
//! never contains signatures; see there for the exact protocol.

use crate::base::capability::Capability;
use crate::object::{NameObject, Object};
use crate::section::signature::{HexBytes, Signature};
use crate::section::{
    AddressAssertion, AddressQuery, AddressZone, Assertion, Message,
    Notification, Pshard, Query, Section, Shard, SignableSection, Zone,
    ZoneContent,
};
use core::fmt::{self, Write};

//------------ Canonicalizer -------------------------------------------------

/// The sink canonical encodings are written into.
///
/// The only guarantee the sink provides is that consecutive tokens end up
/// separated by exactly one space with no leading or trailing whitespace,
/// which is what makes the encoding deterministic.
#[derive(Clone, Debug, Default)]
pub struct Canonicalizer {
    buf: String,
}

impl Canonicalizer {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single token.
    pub fn token(&mut self, token: &str) {
        if !self.buf.is_empty() {
            self.buf.push(' ');
        }
        self.buf.push_str(token);
    }

    /// Appends the display form of a value as a single token.
    pub fn display(&mut self, value: impl fmt::Display) {
        if !self.buf.is_empty() {
            self.buf.push(' ');
        }
        let _ = write!(&mut self.buf, "{}", value);
    }

    /// Returns the encoded text.
    pub fn finish(self) -> String {
        self.buf
    }
}

//------------ CanonicalFmt --------------------------------------------------

/// A type with a canonical text encoding.
pub trait CanonicalFmt {
    /// Writes the canonical encoding of `self` into the sink.
    fn canonical_fmt(&self, out: &mut Canonicalizer);
}

/// Encodes a signable section into its canonical text.
pub fn encode_signable(section: &SignableSection) -> String {
    let mut out = Canonicalizer::new();
    section.canonical_fmt(&mut out);
    out.finish()
}

/// Encodes any section into its canonical text.
pub fn encode_section(section: &Section) -> String {
    let mut out = Canonicalizer::new();
    section.canonical_fmt(&mut out);
    out.finish()
}

/// Encodes a message into its canonical text.
pub fn encode_message(message: &Message) -> String {
    let mut out = Canonicalizer::new();
    message.canonical_fmt(&mut out);
    out.finish()
}

//--- impl for signatures

impl CanonicalFmt for Signature {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(":sig:");
        out.token(self.public_key_id.algorithm.token());
        out.display(self.public_key_id.key_phase);
        out.display(self.valid_since);
        out.display(self.valid_until);
        if !self.data.is_empty() {
            out.display(HexBytes(&self.data));
        }
    }
}

/// Writes the parenthesised signature group of a section, if any.
fn fmt_signatures(sigs: &[Signature], out: &mut Canonicalizer) {
    if sigs.is_empty() {
        return;
    }
    out.token("(");
    for sig in sigs {
        sig.canonical_fmt(out);
    }
    out.token(")");
}

//--- impl for objects

impl CanonicalFmt for NameObject {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(":name:");
        out.token(&self.name);
        out.token("[");
        for ty in &self.types {
            out.token(ty.token());
        }
        out.token("]");
    }
}

impl CanonicalFmt for Object {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        match self {
            Object::Name(name) => name.canonical_fmt(out),
            Object::Ip4(addr) => {
                out.token(":ip4:");
                out.display(addr);
            }
            Object::Ip6(addr) => {
                out.token(":ip6:");
                out.display(addr);
            }
            Object::Redirection(name) => {
                out.token(":redir:");
                out.token(name);
            }
            Object::Delegation(key) => {
                out.token(":deleg:");
                out.token(key.id.algorithm.token());
                out.display(key.id.key_phase);
                out.display(HexBytes(&key.key));
            }
            Object::Nameset(expr) => {
                out.token(":nameset:");
                out.token(expr);
            }
            Object::CertInfo(cert) => {
                out.token(":cert:");
                out.token(cert.protocol_type.token());
                out.token(cert.usage.token());
                out.token(cert.hash_algo.token());
                out.display(HexBytes(&cert.data));
            }
            Object::ServiceInfo(srv) => {
                out.token(":srv:");
                out.token(&srv.name);
                out.display(srv.port);
                out.display(srv.priority);
            }
            Object::Registrar(text) => {
                out.token(":regr:");
                out.token(text);
            }
            Object::Registrant(text) => {
                out.token(":regt:");
                out.token(text);
            }
            Object::InfraKey(key) => {
                out.token(":infra:");
                out.token(key.id.algorithm.token());
                out.display(key.id.key_phase);
                out.display(HexBytes(&key.key));
            }
            Object::ExtraKey(key) => {
                out.token(":extra:");
                out.token(key.id.algorithm.token());
                out.display(key.id.key_phase);
                out.display(HexBytes(&key.key));
            }
            Object::NextKey(key) => {
                out.token(":next:");
                out.token(key.id.algorithm.token());
                out.display(key.id.key_phase);
                out.display(HexBytes(&key.key));
                out.display(key.valid_since);
                out.display(key.valid_until);
            }
        }
    }
}

fn fmt_objects(objects: &[Object], out: &mut Canonicalizer) {
    out.token("[");
    for object in objects {
        object.canonical_fmt(out);
    }
    out.token("]");
}

//--- impl for sections

impl CanonicalFmt for Assertion {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(":A:");
        out.token(&self.subject_name);
        // Contained assertions leave zone and context to their container.
        if !self.subject_zone.is_empty() || !self.context.is_empty() {
            out.token(&self.subject_zone);
            out.token(&self.context);
        }
        fmt_objects(&self.content, out);
        fmt_signatures(&self.signatures, out);
    }
}

impl CanonicalFmt for Shard {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(":S:");
        if !self.subject_zone.is_empty() || !self.context.is_empty() {
            out.token(&self.subject_zone);
            out.token(&self.context);
        }
        out.token(&self.range_from);
        out.token(&self.range_to);
        out.token("(");
        for assertion in &self.content {
            assertion.canonical_fmt(out);
        }
        out.token(")");
        fmt_signatures(&self.signatures, out);
    }
}

impl CanonicalFmt for Pshard {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(":P:");
        if !self.subject_zone.is_empty() || !self.context.is_empty() {
            out.token(&self.subject_zone);
            out.token(&self.context);
        }
        out.token(&self.range_from);
        out.token(&self.range_to);
        out.token(":bloom:");
        out.token("[");
        for algo in &self.datastructure.hash_family {
            out.token(algo.token());
        }
        out.token("]");
        out.display(self.datastructure.nof_hash_functions);
        out.token(self.datastructure.mode_of_operation.token());
        out.display(HexBytes(self.datastructure.filter.as_bytes()));
        fmt_signatures(&self.signatures, out);
    }
}

impl CanonicalFmt for Zone {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(":Z:");
        out.token(&self.subject_zone);
        out.token(&self.context);
        out.token("(");
        for content in &self.content {
            match content {
                ZoneContent::Assertion(assertion) => {
                    assertion.canonical_fmt(out)
                }
                ZoneContent::Shard(shard) => shard.canonical_fmt(out),
            }
        }
        out.token(")");
        fmt_signatures(&self.signatures, out);
    }
}

impl CanonicalFmt for AddressAssertion {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(":AA:");
        out.display(self.subject_addr);
        out.token(&self.context);
        fmt_objects(&self.content, out);
        fmt_signatures(&self.signatures, out);
    }
}

impl CanonicalFmt for AddressZone {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(":AZ:");
        out.display(self.subject_addr);
        out.token(&self.context);
        out.token("(");
        for assertion in &self.content {
            assertion.canonical_fmt(out);
        }
        out.token(")");
        fmt_signatures(&self.signatures, out);
    }
}

impl CanonicalFmt for Query {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(":Q:");
        out.display(self.token);
        out.token(&self.context);
        out.token(&self.name);
        out.token(self.query_type.token());
        out.display(self.expires);
        for option in &self.options {
            out.display(option);
        }
    }
}

impl CanonicalFmt for AddressQuery {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(":AQ:");
        out.display(self.token);
        out.display(self.subject_addr);
        out.token(&self.context);
        out.token(self.query_type.token());
        out.display(self.expires);
        for option in &self.options {
            out.display(option);
        }
    }
}

impl CanonicalFmt for Notification {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(":N:");
        out.display(self.token);
        out.display(self.notification_type);
        if !self.data.is_empty() {
            out.token(&self.data);
        }
    }
}

impl CanonicalFmt for SignableSection {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        match self {
            SignableSection::Assertion(section) => section.canonical_fmt(out),
            SignableSection::Shard(section) => section.canonical_fmt(out),
            SignableSection::Pshard(section) => section.canonical_fmt(out),
            SignableSection::Zone(section) => section.canonical_fmt(out),
            SignableSection::AddressAssertion(section) => {
                section.canonical_fmt(out)
            }
            SignableSection::AddressZone(section) => section.canonical_fmt(out),
        }
    }
}

impl CanonicalFmt for Section {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        match self {
            Section::Signable(section) => section.canonical_fmt(out),
            Section::Query(section) => section.canonical_fmt(out),
            Section::AddressQuery(section) => section.canonical_fmt(out),
            Section::Notification(section) => section.canonical_fmt(out),
        }
    }
}

impl CanonicalFmt for Capability {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(self.as_str());
    }
}

impl CanonicalFmt for Message {
    fn canonical_fmt(&self, out: &mut Canonicalizer) {
        out.token(":M:");
        out.display(self.token);
        out.token("[");
        for capability in &self.capabilities {
            capability.canonical_fmt(out);
        }
        out.token("]");
        for section in &self.content {
            section.canonical_fmt(out);
        }
        fmt_signatures(&self.signatures, out);
    }
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::keys::{PublicKey, PublicKeyID};
    use crate::object::ObjectType;
    use bytes::Bytes;
    use std::net::Ipv4Addr;

    #[test]
    fn assertion_encoding_is_stable() {
        let assertion = Assertion::new(
            "ethz",
            "ch",
            ".",
            vec![Object::Ip4(Ipv4Addr::new(127, 0, 0, 1))],
        );
        let encoded = encode_signable(&assertion.clone().into());
        assert_eq!(encoded, ":A: ethz ch . [ :ip4: 127.0.0.1 ]");
        // A second, independent encoder run yields the same bytes.
        assert_eq!(encoded, encode_signable(&assertion.into()));
    }

    #[test]
    fn contained_assertion_omits_zone_and_context() {
        let assertion = Assertion::new("ethz", "", "", vec![
            Object::Ip4(Ipv4Addr::new(1, 2, 3, 4)),
        ]);
        assert_eq!(
            encode_signable(&assertion.into()),
            ":A: ethz [ :ip4: 1.2.3.4 ]"
        );
    }

    #[test]
    fn shard_encoding() {
        let mut shard = Shard::new("ch", ".", "aaa", "zzz");
        shard.content.push(Assertion::new("ethz", "", "", vec![
            Object::Ip4(Ipv4Addr::new(1, 2, 3, 4)),
        ]));
        assert_eq!(
            encode_signable(&shard.into()),
            ":S: ch . aaa zzz ( :A: ethz [ :ip4: 1.2.3.4 ] )"
        );
    }

    #[test]
    fn name_object_encoding() {
        let object = Object::Name(NameObject {
            name: "ethz2.ch".into(),
            types: vec![ObjectType::Ip4, ObjectType::Ip6],
        });
        let mut out = Canonicalizer::new();
        object.canonical_fmt(&mut out);
        assert_eq!(out.finish(), ":name: ethz2.ch [ :ip4: :ip6: ]");
    }

    #[test]
    fn delegation_encoding() {
        let key = PublicKey::new(
            PublicKeyID::ed25519(1),
            Bytes::from(vec![0xab; 32]),
            0,
            0,
        );
        let mut out = Canonicalizer::new();
        Object::Delegation(key).canonical_fmt(&mut out);
        assert_eq!(
            out.finish(),
            format!(":deleg: :ed25519: 1 {}", "ab".repeat(32))
        );
    }

    #[test]
    fn signature_group_follows_section() {
        let mut assertion = Assertion::new("ethz", "ch", ".", Vec::new());
        assertion.signatures.push(Signature {
            public_key_id: PublicKeyID::ed25519(0),
            valid_since: 1000,
            valid_until: 2000,
            data: Bytes::from_static(&[0xde, 0xad]),
        });
        assert_eq!(
            encode_signable(&assertion.into()),
            ":A: ethz ch . [ ] ( :sig: :ed25519: 0 1000 2000 dead )"
        );
    }
}
