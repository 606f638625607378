//! Reading zone files.
//!
//! The textual zone-file format is the same encoding the
//! [canonicaliser][crate::canonical] writes; this module reads it back
//! into signed sections. Top level entries are assertions, shards,
//! pshards and zones, each optionally followed by its signatures.
//!
//! Decoding is total: malformed tokens are reported as
//! [errors][DecodeError], skipped, and the decoder carries on with the
//! next recognisable piece of input. Verification of the decoded
//! sections is the caller's business.

pub mod error;
pub mod parser;
pub mod scan;

pub use self::error::DecodeError;
pub use self::parser::Parser;

use crate::section::SignableSection;

//------------ Decoded -------------------------------------------------------

/// The result of decoding a zone file.
#[derive(Debug)]
pub struct Decoded {
    /// The sections that decoded cleanly, in input order.
    pub sections: Vec<SignableSection>,

    /// Everything that went wrong along the way.
    pub errors: Vec<DecodeError>,
}

impl Decoded {
    /// Returns whether the input decoded without any error.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Decodes a zone file from a string.
pub fn decode(input: &str) -> Decoded {
    let (sections, errors) = Parser::new(input).parse();
    Decoded { sections, errors }
}

/// Decodes a zone file read from `read`.
pub fn load(read: &mut impl std::io::Read) -> Result<Decoded, std::io::Error> {
    let mut input = String::new();
    read.read_to_string(&mut input)?;
    Ok(decode(&input))
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::algo::HashAlgo;
    use crate::canonical::encode_signable;
    use crate::object::{Object, ObjectType};
    use crate::section::{ModeOfOperation, Signable};

    #[test]
    fn assertion_round_trip() {
        let decoded = decode(":A: ethz ch . [ :ip4: 127.0.0.1 ]");
        assert!(decoded.is_clean());
        assert_eq!(decoded.sections.len(), 1);
        assert_eq!(
            encode_signable(&decoded.sections[0]),
            ":A: ethz ch . [ :ip4: 127.0.0.1 ]"
        );
    }

    #[test]
    fn shard_round_trip_with_ranges() {
        let input = ":S: ch . aaa zzz ( :A: ethz [ :ip4: 1.2.3.4 ] )";
        let decoded = decode(input);
        assert!(decoded.is_clean());
        let section = &decoded.sections[0];
        match section {
            SignableSection::Shard(shard) => {
                assert_eq!(shard.range_from, "aaa");
                assert_eq!(shard.range_to, "zzz");
                assert_eq!(shard.content.len(), 1);
                assert_eq!(shard.content[0].subject_name, "ethz");
            }
            other => panic!("expected a shard, got {:?}", other),
        }
        assert_eq!(encode_signable(section), input);

        let decoded = decode(":S: ch . < > ( )");
        assert!(decoded.is_clean());
        match &decoded.sections[0] {
            SignableSection::Shard(shard) => {
                assert_eq!(shard.range_from, "<");
                assert_eq!(shard.range_to, ">");
            }
            other => panic!("expected a shard, got {:?}", other),
        }
    }

    #[test]
    fn pshard_decodes_bloom_filter() {
        let decoded = decode(
            ":P: ch . aaa zzz :bloom: [ :sha256: :sha384: ] 4 :km2: deadbeef",
        );
        assert!(decoded.is_clean());
        match &decoded.sections[0] {
            SignableSection::Pshard(pshard) => {
                let bf = &pshard.datastructure;
                assert_eq!(
                    bf.hash_family,
                    vec![HashAlgo::Sha256, HashAlgo::Sha384]
                );
                assert_eq!(bf.nof_hash_functions, 4);
                assert_eq!(
                    bf.mode_of_operation,
                    ModeOfOperation::KirschMitzenmacher2
                );
                assert_eq!(
                    bf.filter.as_bytes(),
                    &[0xde, 0xad, 0xbe, 0xef]
                );
            }
            other => panic!("expected a pshard, got {:?}", other),
        }
    }

    #[test]
    fn zone_with_mixed_content() {
        let input = ":Z: ch . ( :A: ethz [ :ip4: 1.2.3.4 ] \
                    :S: aaa zzz ( :A: uzh [ :ip4: 5.6.7.8 ] ) )";
        let decoded = decode(input);
        assert!(decoded.is_clean(), "errors: {:?}", decoded.errors);
        match &decoded.sections[0] {
            SignableSection::Zone(zone) => {
                assert_eq!(zone.subject_zone, "ch");
                assert_eq!(zone.content.len(), 2);
                assert_eq!(zone.assertions().count(), 2);
            }
            other => panic!("expected a zone, got {:?}", other),
        }
    }

    #[test]
    fn signatures_attach_to_their_section() {
        let input = format!(
            ":A: ethz ch . [ :ip4: 127.0.0.1 ] \
             ( :sig: :ed25519: 1 1000 2000 {} )",
            "ab".repeat(64)
        );
        let decoded = decode(&input);
        assert!(decoded.is_clean(), "errors: {:?}", decoded.errors);
        let sigs = decoded.sections[0].signatures();
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].public_key_id.key_phase, 1);
        assert_eq!(sigs[0].valid_since, 1000);
        assert_eq!(sigs[0].valid_until, 2000);
        assert_eq!(sigs[0].data.len(), 64);
        // Round trip preserves the signature.
        assert_eq!(encode_signable(&decoded.sections[0]), input);
    }

    #[test]
    fn old_style_keyspace_token_is_accepted() {
        let input = ":A: ethz ch . [ ] ( :sig: :ed25519: :rains: 1 1000 2000 )";
        let decoded = decode(input);
        assert!(decoded.is_clean(), "errors: {:?}", decoded.errors);
        assert_eq!(decoded.sections[0].signatures().len(), 1);
    }

    #[test]
    fn all_object_kinds_round_trip() {
        let key = "ab".repeat(32);
        let input = format!(
            ":A: ethz ch . [ \
             :name: ethz2.ch [ :ip4: :ip6: ] \
             :ip4: 127.0.0.1 \
             :ip6: 2001:db8::68 \
             :redir: ns.ethz.ch \
             :deleg: :ed25519: 1 {key} \
             :nameset: would be an expression \
             :cert: :tls: :endEntity: :sha256: deadbeef \
             :srv: lookup 49830 1 \
             :regr: registrar information \
             :regt: registrant information \
             :infra: :ed25519: 2 {key} \
             :extra: :ed25519: 3 {key} \
             :next: :ed25519: 4 {key} 10000 50000 ]"
        );
        let decoded = decode(&input);
        assert!(decoded.is_clean(), "errors: {:?}", decoded.errors);
        match &decoded.sections[0] {
            SignableSection::Assertion(assertion) => {
                assert_eq!(assertion.content.len(), 13);
                let types: Vec<ObjectType> =
                    assertion.object_types().collect();
                assert_eq!(types, ObjectType::ALL.to_vec());
                match &assertion.content[8] {
                    Object::Registrar(text) => {
                        assert_eq!(text, "registrar information")
                    }
                    other => panic!("expected registrar, got {:?}", other),
                }
            }
            other => panic!("expected an assertion, got {:?}", other),
        }
        assert_eq!(encode_signable(&decoded.sections[0]), input);
    }

    #[test]
    fn srv_port_range_is_enforced() {
        let decoded = decode(":A: ethz ch . [ :srv: lookup 49830 1 ]");
        assert!(decoded.is_clean());
        match &decoded.sections[0] {
            SignableSection::Assertion(assertion) => {
                assert_eq!(
                    assertion.content[0],
                    Object::ServiceInfo(crate::object::ServiceInfo {
                        name: "lookup".into(),
                        port: 49830,
                        priority: 1,
                    })
                );
            }
            other => panic!("expected an assertion, got {:?}", other),
        }

        let decoded = decode(":A: ethz ch . [ :srv: lookup 70000 1 ]");
        assert!(!decoded.is_clean());
        // The bad object is dropped, the assertion survives.
        match &decoded.sections[0] {
            SignableSection::Assertion(assertion) => {
                assert!(assertion.content.is_empty())
            }
            other => panic!("expected an assertion, got {:?}", other),
        }
    }

    #[test]
    fn bad_public_key_length_is_reported() {
        let decoded =
            decode(":A: ethz ch . [ :deleg: :ed25519: 1 deadbeef ]");
        assert!(!decoded.is_clean());
        assert!(decoded.errors[0]
            .to_string()
            .contains("wrong public key length"));
    }

    #[test]
    fn parse_continues_after_garbage() {
        let decoded = decode(
            "garbage more-garbage \
             :A: ethz ch . [ :ip4: 1.2.3.4 ] \
             :S: broken \
             :A: uzh ch . [ :ip4: 5.6.7.8 ]",
        );
        assert!(!decoded.is_clean());
        assert_eq!(decoded.sections.len(), 2);
    }

    #[test]
    fn comments_are_ignored()  {
        let decoded = decode(
            "; a full-line comment\n\
             :A: ethz ch . [ :ip4: 1.2.3.4 ] ; trailing comment\n",
        );
        assert!(decoded.is_clean());
        assert_eq!(decoded.sections.len(), 1);
    }

    #[test]
    fn load_reads_from_reader() {
        let mut input: &[u8] = b":A: ethz ch . [ :ip4: 1.2.3.4 ]";
        let decoded = load(&mut input).unwrap();
        assert!(decoded.is_clean());
        assert_eq!(decoded.sections.len(), 1);
    }
}
