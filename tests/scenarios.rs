//! End-to-end scenarios across the decoder, the signing core, the
//! caches and the engine.

use bytes::Bytes;
use parking_lot::Mutex;
use rains::base::interval::{Interval, StringInterval};
use rains::base::{unix_now, Capability, ConnInfo, Token};
use rains::canonical::encode_signable;
use rains::crypto::SecretKey;
use rains::keys::{PublicKey, PublicKeyID};
use rains::object::{Object, ObjectType, ServiceInfo};
use rains::sanitize;
use rains::section::{
    Message, Query, Section, Signable, SignableSection, Signature,
};
use rains::server::{
    Config, SendError, Sender, SectionSender, ServerContext,
};
use rains::siglib::{self, MaxCacheValidity, Verdict};
use rains::zonefile;
use std::sync::Arc;

/// Setup logging of events reported by the test suite.
///
/// Use the RUST_LOG environment variable to override the defaults, e.g.
/// RUST_LOG=rains=debug to watch the engine work.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .try_init()
        .ok();
}

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(ConnInfo, Message)>>,
    queries: Mutex<Vec<Query>>,
}

impl Sender for RecordingSender {
    fn send(&self, to: ConnInfo, message: Message) -> Result<(), SendError> {
        self.sent.lock().push((to, message));
        Ok(())
    }

    fn send_query(&self, query: Query) -> Result<(), SendError> {
        self.queries.lock().push(query);
        Ok(())
    }
}

fn peer() -> ConnInfo {
    ConnInfo::tcp(([192, 0, 2, 7], 5022).into())
}

fn test_key(seed: u8) -> (SecretKey, PublicKey) {
    let secret = SecretKey::from_seed(&[seed; 32]).unwrap();
    let public = PublicKey::new(
        PublicKeyID::ed25519(0),
        Bytes::from(secret.public_key_bytes()),
        unix_now() - 3600,
        unix_now() + 3600,
    );
    (secret, public)
}

/// Scenario A: the canonical bytes of a fixed assertion are byte-equal
/// across two independent encoder runs, signed or not.
#[test]
fn canonical_bytes_are_stable() {
    let decode_once = || {
        let decoded = zonefile::decode(":A: ethz ch . [ :ip4: 127.0.0.1 ]");
        assert!(decoded.is_clean());
        decoded.sections.into_iter().next().unwrap()
    };
    let mut one = decode_once();
    let two = decode_once();
    assert_eq!(encode_signable(&one), encode_signable(&two));
    assert_eq!(encode_signable(&one), ":A: ethz ch . [ :ip4: 127.0.0.1 ]");

    let (secret, public) = test_key(11);
    let now = unix_now();
    siglib::sign_section(
        &mut one,
        &secret,
        Signature::template(PublicKeyID::ed25519(0), now, now + 3600),
    )
    .unwrap();
    let verdict = siglib::check_section_signatures(
        &mut one,
        std::slice::from_ref(&public),
        &MaxCacheValidity::default(),
    );
    assert!(verdict.is_valid());
}

/// Scenario B: shard interval bounds and the range query over the
/// assertion cache.
#[test]
fn shard_bounds_and_range_query() {
    let decoded =
        zonefile::decode(":S: ch . aaa zzz ( :A: ethz [ :ip4: 1.2.3.4 ] )");
    assert!(decoded.is_clean());
    let shard = match &decoded.sections[0] {
        SignableSection::Shard(shard) => shard,
        other => panic!("expected a shard, got {:?}", other),
    };
    assert_eq!(shard.begin(), "aaa");
    assert_eq!(shard.end(), "zzz");

    // Run the shard through the engine and ask the assertion cache for
    // the covered range.
    let sender = Arc::new(RecordingSender::default());
    let ctx = ServerContext::new(Config::default(), sender);
    let (secret, public) = test_key(12);
    ctx.zone_keys.add(
        rains::cache::KeyCacheKey::new(
            ".",
            "ch",
            rains::base::SignatureAlgo::Ed25519,
        ),
        public,
        false,
    );
    let mut section = decoded.sections.into_iter().next().unwrap();
    let now = unix_now();
    siglib::sign_section(
        &mut section,
        &secret,
        Signature::template(PublicKeyID::ed25519(0), now, now + 3600),
    )
    .unwrap();
    ctx.process_signable(SectionSender {
        sender: peer(),
        section,
        token: Token::mint(),
    });

    let hits = ctx.assertions.get_in_range(
        ".",
        "ch",
        &StringInterval::new("aab", "zzy"),
    );
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].subject_name, "ethz");
    assert_eq!(ctx.negatives.len(), 1);
}

/// Scenario C and D: pshard bloom parameters and service-info decoding
/// including the port bound.
#[test]
fn decoder_semantic_checks() {
    let decoded = zonefile::decode(
        ":P: ch . aaa zzz :bloom: [ :sha256: :sha384: ] 4 :km2: deadbeef",
    );
    assert!(decoded.is_clean());
    match &decoded.sections[0] {
        SignableSection::Pshard(pshard) => {
            assert_eq!(pshard.datastructure.nof_hash_functions, 4);
            assert_eq!(
                pshard.datastructure.filter.as_bytes(),
                &[0xde, 0xad, 0xbe, 0xef]
            );
        }
        other => panic!("expected a pshard, got {:?}", other),
    }

    let decoded = zonefile::decode(":A: ethz ch . [ :srv: lookup 49830 1 ]");
    assert!(decoded.is_clean());
    match &decoded.sections[0] {
        SignableSection::Assertion(assertion) => assert_eq!(
            assertion.content[0],
            Object::ServiceInfo(ServiceInfo {
                name: "lookup".into(),
                port: 49830,
                priority: 1,
            })
        ),
        other => panic!("expected an assertion, got {:?}", other),
    }

    assert!(!zonefile::decode(":A: ethz ch . [ :srv: lookup 70000 1 ]")
        .is_clean());
}

/// Scenario E: capability sanitisation.
#[test]
fn capability_sanitisation() {
    assert!(!sanitize::check_capabilities(&[Capability::from(":ip4: Good")]));
    assert!(sanitize::check_capabilities(&[Capability::from(":ip4:Good")]));
    assert!(sanitize::check_capabilities(&[Capability::from("as:Good:dh")]));

    // An unclean capability poisons the whole message.
    let mut message = Message::new();
    message.capabilities.push(Capability::from(":ip4: Good"));
    assert!(!sanitize::check_message_string_fields(&message));
}

/// Scenario F: of two signatures only the live one decides, and the
/// cache validity follows it.
#[test]
fn live_signature_decides_validity() {
    let (secret, public) = test_key(13);
    let now = unix_now();
    let mut section: SignableSection = rains::section::Assertion::new(
        "ethz",
        "ch",
        ".",
        vec![Object::Ip4(std::net::Ipv4Addr::new(127, 0, 0, 1))],
    )
    .into();
    siglib::sign_section(
        &mut section,
        &secret,
        Signature::template(PublicKeyID::ed25519(0), now - 7200, now - 1),
    )
    .unwrap();
    siglib::sign_section(
        &mut section,
        &secret,
        Signature::template(PublicKeyID::ed25519(0), now, now + 3600),
    )
    .unwrap();

    let verdict = siglib::check_section_signatures(
        &mut section,
        std::slice::from_ref(&public),
        &MaxCacheValidity::default(),
    );
    let (valid_since, valid_until) = match verdict {
        Verdict::Valid {
            valid_since,
            valid_until,
        } => (valid_since, valid_until),
        other => panic!("expected a valid verdict, got {:?}", other),
    };
    assert!((valid_until - (now + 3600)).abs() <= 1);

    // The assertion cache stores exactly this window.
    let ctx = ServerContext::new(
        Config::default(),
        Arc::new(RecordingSender::default()),
    );
    let assertion = match section {
        SignableSection::Assertion(ref assertion) => assertion.clone(),
        ref other => panic!("expected an assertion, got {:?}", other),
    };
    assert!(ctx.assertions.add(
        Arc::new(assertion),
        false,
        valid_since,
        valid_until
    ));
    assert_eq!(
        ctx.assertions
            .get(".", "ch", "ethz", ObjectType::Ip4, false)
            .len(),
        1
    );
}

/// A whole zone file travels from text through signing and the engine
/// into the caches and back out as query answers.
#[test]
fn zonefile_to_query_answer() {
    init_logging();
    let decoded = zonefile::decode(
        ":Z: ch . ( \
           :A: ethz [ :ip4: 129.132.0.1 ] \
           :S: aaa zzz ( :A: uzh [ :ip4: 130.60.0.1 ] ) \
         )",
    );
    assert!(decoded.is_clean(), "errors: {:?}", decoded.errors);

    let sender = Arc::new(RecordingSender::default());
    let ctx = ServerContext::new(Config::default(), sender.clone());
    let (secret, public) = test_key(14);
    ctx.zone_keys.add(
        rains::cache::KeyCacheKey::new(
            ".",
            "ch",
            rains::base::SignatureAlgo::Ed25519,
        ),
        public,
        false,
    );

    let mut section = decoded.sections.into_iter().next().unwrap();
    let now = unix_now();
    siglib::sign_section(
        &mut section,
        &secret,
        Signature::template(PublicKeyID::ed25519(0), now, now + 3600),
    )
    .unwrap();

    let mut message = Message::new();
    message.content.push(Section::Signable(section));
    ctx.process_message(peer(), message);

    assert_eq!(ctx.negatives.len(), 1);
    assert_eq!(ctx.assertions.len(), 2);

    // Both names resolve from the cache now.
    for name in ["ethz.ch", "uzh.ch"] {
        let token = Token::mint();
        ctx.process_message(
            peer(),
            {
                let mut message = Message::with_token(token);
                message.content.push(Section::Query(Query {
                    context: ".".into(),
                    name: name.into(),
                    query_type: ObjectType::Ip4,
                    expires: unix_now() + 10,
                    token,
                    options: Vec::new(),
                }));
                message
            },
        );
        let sent = sender.sent.lock();
        let answer = &sent.last().unwrap().1;
        assert_eq!(answer.token, token);
        assert_eq!(answer.content.len(), 1);
    }
}

/// A round trip through encode and decode reproduces the section,
/// signatures included.
#[test]
fn encode_decode_round_trip_with_signatures() {
    let (secret, _) = test_key(15);
    let now = unix_now();
    let mut section: SignableSection = rains::section::Assertion::new(
        "ethz",
        "ch",
        ".",
        vec![Object::Ip4(std::net::Ipv4Addr::new(127, 0, 0, 1))],
    )
    .into();
    siglib::sign_section(
        &mut section,
        &secret,
        Signature::template(PublicKeyID::ed25519(0), now, now + 3600),
    )
    .unwrap();

    let text = encode_signable(&section);
    let decoded = zonefile::decode(&text);
    assert!(decoded.is_clean(), "errors: {:?}", decoded.errors);
    assert_eq!(decoded.sections.len(), 1);
    assert_eq!(decoded.sections[0], section);
    assert_eq!(decoded.sections[0].signatures().len(), 1);
}
