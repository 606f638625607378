//! String-field sanitisation.
//!
//! The canonical encoding of a section is whitespace-tokenised text. A
//! string field containing a zone-file type token as a stand-alone word
//! would therefore forge section boundaries once embedded in the
//! canonical encoding: signatures could be made to cover different
//! content than what was signed. This module rejects such strings before
//! any section is signed or cached.
//!
//! A string is *unclean* iff any of its whitespace-delimited words equals
//! a reserved token. Reserved are the literal `:ip:` plus every object
//! type keyword. A reserved token embedded inside a larger word (as in
//! `as:Good:dh` or `:ip:d`) is harmless because it can never become a
//! token of its own under canonical encoding.

use crate::base::capability::Capability;
use crate::object::Object;
use crate::section::{
    AddressAssertion, AddressZone, Assertion, Message, Pshard, Section,
    Shard, SignableSection, Zone, ZoneContent,
};
use tracing::debug;

/// The reserved tokens that must not appear as stand-alone words.
const RESERVED: [&str; 14] = [
    ":ip:", ":name:", ":ip4:", ":ip6:", ":redir:", ":deleg:", ":nameset:",
    ":cert:", ":srv:", ":regr:", ":regt:", ":infra:", ":extra:", ":next:",
];

//------------ contains_zonefile_type ----------------------------------------

/// Returns whether a string embeds a reserved zone-file token.
pub fn contains_zonefile_type(s: &str) -> bool {
    s.split_whitespace().any(|word| RESERVED.contains(&word))
}

fn clean(s: &str) -> bool {
    if contains_zonefile_type(s) {
        debug!(field = s, "string field embeds zone-file type token");
        return false;
    }
    true
}

//------------ check_objects -------------------------------------------------

/// Returns whether every string component of the objects is clean.
pub fn check_objects(objects: &[Object]) -> bool {
    objects.iter().all(|object| match object {
        Object::Name(name) => clean(&name.name),
        Object::Redirection(name) => clean(name),
        Object::Nameset(expr) => clean(expr),
        Object::ServiceInfo(srv) => clean(&srv.name),
        Object::Registrar(text) => clean(text),
        Object::Registrant(text) => clean(text),
        Object::Ip4(_)
        | Object::Ip6(_)
        | Object::Delegation(_)
        | Object::CertInfo(_)
        | Object::InfraKey(_)
        | Object::ExtraKey(_)
        | Object::NextKey(_) => true,
    })
}

//------------ check_string_fields -------------------------------------------

fn check_assertion(assertion: &Assertion) -> bool {
    clean(&assertion.subject_name)
        && clean(&assertion.subject_zone)
        && clean(&assertion.context)
        && check_objects(&assertion.content)
}

fn check_shard(shard: &Shard) -> bool {
    clean(&shard.subject_zone)
        && clean(&shard.context)
        && clean(&shard.range_from)
        && clean(&shard.range_to)
        && shard.content.iter().all(check_assertion)
}

fn check_pshard(pshard: &Pshard) -> bool {
    clean(&pshard.subject_zone)
        && clean(&pshard.context)
        && clean(&pshard.range_from)
        && clean(&pshard.range_to)
}

fn check_zone(zone: &Zone) -> bool {
    clean(&zone.subject_zone)
        && clean(&zone.context)
        && zone.content.iter().all(|content| match content {
            ZoneContent::Assertion(assertion) => check_assertion(assertion),
            ZoneContent::Shard(shard) => check_shard(shard),
        })
}

fn check_address_assertion(assertion: &AddressAssertion) -> bool {
    clean(&assertion.context) && check_objects(&assertion.content)
}

fn check_address_zone(zone: &AddressZone) -> bool {
    clean(&zone.context)
        && zone.content.iter().all(check_address_assertion)
}

/// Returns whether every string field of a signable section is clean.
///
/// The check is recursive: contained assertions and shards are checked
/// as well. It must pass before the section is signed or inserted into
/// any cache.
pub fn check_signable_fields(section: &SignableSection) -> bool {
    match section {
        SignableSection::Assertion(section) => check_assertion(section),
        SignableSection::Shard(section) => check_shard(section),
        SignableSection::Pshard(section) => check_pshard(section),
        SignableSection::Zone(section) => check_zone(section),
        SignableSection::AddressAssertion(section) => {
            check_address_assertion(section)
        }
        SignableSection::AddressZone(section) => check_address_zone(section),
    }
}

/// Returns whether every string field of any section is clean.
pub fn check_string_fields(section: &Section) -> bool {
    match section {
        Section::Signable(section) => check_signable_fields(section),
        Section::Query(query) => clean(&query.context) && clean(&query.name),
        Section::AddressQuery(query) => clean(&query.context),
        Section::Notification(notification) => clean(&notification.data),
    }
}

//------------ check_capabilities --------------------------------------------

/// Returns whether every capability string is clean.
pub fn check_capabilities(caps: &[Capability]) -> bool {
    caps.iter().all(|cap| clean(cap.as_str()))
}

//------------ check_message_string_fields -----------------------------------

/// Returns whether a whole message is clean.
pub fn check_message_string_fields(message: &Message) -> bool {
    check_capabilities(&message.capabilities)
        && message.content.iter().all(check_string_fields)
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::object::ObjectType;

    #[test]
    fn token_detection() {
        for (input, want) in [
            ("", false),
            ("Good", false),
            (":ip:", true),
            (":ip: bad", true),
            ("bad test\n\n :ip:", true),
            ("bad :ip: test", true),
            ("bad\t:ip:\ttest", true),
            ("bad\n:ip:\ntest", true),
            ("bad\n:ip:\ttest", true),
            ("bad test :ip:", true),
            ("as:Good:dh", false),
            ("as:Good: dh", false),
            ("as :Good:dh", false),
            (":ip:d", false),
            (" :: ", false),
            ("::", false),
            (":srv: lookup", true),
            (":srv:lookup", false),
        ] {
            assert_eq!(
                contains_zonefile_type(input),
                want,
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn every_reserved_token_is_caught() {
        for token in super::RESERVED {
            let embedded = format!("some {} words", token);
            assert!(contains_zonefile_type(&embedded), "token {}", token);
            let fused = format!("some{}words", token);
            assert!(!contains_zonefile_type(&fused), "token {}", token);
        }
        for ty in ObjectType::ALL {
            assert!(contains_zonefile_type(ty.token()));
        }
    }

    #[test]
    fn dirty_sections_are_rejected() {
        let clean_assertion = Assertion::new("ethz", "ch", ".", Vec::new());
        assert!(check_signable_fields(&clean_assertion.clone().into()));

        for dirty in [
            Assertion::new(":ip:", "ch", ".", Vec::new()),
            Assertion::new("ethz", ":ip:", ".", Vec::new()),
            Assertion::new("ethz", "ch", ":ip:", Vec::new()),
            Assertion::new(
                "ethz",
                "ch",
                ".",
                vec![Object::Registrar(":ip: inc".into())],
            ),
        ] {
            assert!(!check_signable_fields(&dirty.into()));
        }

        let mut shard = Shard::new("ch", ".", ":ip:", "zzz");
        assert!(!check_signable_fields(&shard.clone().into()));
        shard.range_from = "aaa".into();
        shard.content.push(clean_assertion);
        assert!(check_signable_fields(&shard.clone().into()));
        shard
            .content
            .push(Assertion::new(":ip:", "", "", Vec::new()));
        assert!(!check_signable_fields(&shard.into()));
    }

    #[test]
    fn embedded_inside_word_is_accepted() {
        let assertion =
            Assertion::new("ethz", "ch", ".", vec![Object::Registrar(
                ":ip55:".into(),
            )]);
        assert!(check_signable_fields(&assertion.into()));
    }

    #[test]
    fn capability_check() {
        for (input, want) in [
            ("", true),
            ("Good", true),
            (":ip: bad", false),
            (":ip:", false),
            ("bad test :ip:", false),
            ("as:Good:dh", true),
            ("::", true),
            (":ip4:Good", true),
            (":ip4: Good", false),
        ] {
            assert_eq!(
                check_capabilities(&[Capability::from(input)]),
                want,
                "input {:?}",
                input
            );
        }
    }
}
