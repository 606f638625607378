//! The section intake engine.
//!
//! The engine is the control flow between the collaborators and the
//! caches: a received message is sanitised, its sections verified
//! against the key cache, successful sections inserted into the content
//! caches, sections with a missing key parked in the pending-signature
//! cache, and questions answered from the caches or parked in the
//! pending-query cache under a freshly minted token.

use crate::base::conn::ConnInfo;
use crate::base::interval::StringInterval;
use crate::base::token::Token;
use crate::base::unix_now;
use crate::cache::{KeyCacheKey, PendingQueryKey};
use crate::keys::PublicKey;
use crate::object::{Object, ObjectType};
use crate::sanitize;
use crate::section::{
    AddressQuery, Assertion, Message, Notification, NotificationType, Query,
    QueryOption, Section, Signable, SignableSection,
};
use crate::server::{
    QueryWaiter, Receiver, SectionSender, ServerContext,
};
use crate::siglib::{self, Verdict};
use std::sync::Arc;
use tracing::{debug, warn};

impl ServerContext {
    /// Runs the intake loop until the receiver shuts down.
    pub fn run(&self, receiver: &dyn Receiver) {
        while let Some((sender, message)) = receiver.recv() {
            self.process_message(sender, message);
        }
    }

    /// Processes one received message.
    pub fn process_message(&self, sender: ConnInfo, message: Message) {
        if !sanitize::check_message_string_fields(&message) {
            warn!(from = %sender, "malformed message rejected at sanitiser");
            self.send_notification(
                sender,
                message.token,
                NotificationType::BadMessage,
            );
            return;
        }
        if !message.capabilities.is_empty() {
            self.capabilities
                .add(sender, message.capabilities.clone());
        }
        for section in message.content {
            match section {
                Section::Signable(section) => {
                    self.process_signable(SectionSender {
                        sender,
                        section,
                        token: message.token,
                    })
                }
                Section::Query(query) => self.process_query(sender, query),
                Section::AddressQuery(query) => {
                    self.process_address_query(sender, query)
                }
                Section::Notification(notification) => {
                    self.process_notification(sender, notification)
                }
            }
        }
    }

    /// Verifies a signable section and files it.
    pub fn process_signable(&self, mut section_sender: SectionSender) {
        let context = section_sender.section.context().to_string();
        let zone = section_sender.section.subject_zone().to_string();
        let keys = self.zone_keys.get_all(&KeyCacheKey::new(
            context.clone(),
            zone.clone(),
            crate::base::algo::SignatureAlgo::Ed25519,
        ));
        let verdict = siglib::check_section_signatures(
            &mut section_sender.section,
            &keys,
            &self.config.max_cache_validity,
        );
        match verdict {
            Verdict::Valid {
                valid_since,
                valid_until,
            } => {
                if self.insert_section(
                    &section_sender.section,
                    valid_since,
                    valid_until,
                ) {
                    self.deliver_to_waiters(
                        section_sender.token,
                        &section_sender.section,
                    );
                }
            }
            Verdict::MissingKey => {
                let valid_until = unix_now()
                    + self.config.delegation_query_validity_secs;
                debug!(%context, %zone, "parking section on missing key");
                if self.pending_signatures.add(
                    &context,
                    &zone,
                    section_sender,
                    valid_until,
                ) {
                    self.send_delegation_query(&context, &zone);
                }
            }
            Verdict::Invalid => {
                debug!(
                    %context,
                    %zone,
                    from = %section_sender.sender,
                    "dropping section with invalid signatures"
                );
            }
        }
    }

    /// Inserts a verified section into the content caches.
    ///
    /// Verification of the container recursively authorises its
    /// contents, so contained assertions go into the assertion cache
    /// without signatures of their own. Returns whether the section was
    /// accepted.
    fn insert_section(
        &self,
        section: &SignableSection,
        valid_since: i64,
        valid_until: i64,
    ) -> bool {
        match section {
            SignableSection::Assertion(assertion) => {
                let internal = self.config.is_authority(
                    &assertion.context,
                    &assertion.subject_zone,
                );
                self.assertions.add(
                    Arc::new(assertion.clone()),
                    internal,
                    valid_since,
                    valid_until,
                );
                self.register_keys(assertion, valid_since, valid_until);
                true
            }
            SignableSection::Shard(shard) => {
                if !shard.content_in_range() {
                    warn!(
                        zone = %shard.subject_zone,
                        "dropping shard with out-of-range content"
                    );
                    return false;
                }
                let internal = self
                    .config
                    .is_authority(&shard.context, &shard.subject_zone);
                self.negatives.add(
                    &shard.context,
                    &shard.subject_zone,
                    internal,
                    Arc::new(section.clone()),
                    valid_since,
                    valid_until,
                );
                for assertion in &shard.content {
                    let lifted = assertion.with_zone_and_context(
                        &shard.subject_zone,
                        &shard.context,
                    );
                    self.assertions.add(
                        Arc::new(lifted),
                        internal,
                        valid_since,
                        valid_until,
                    );
                }
                true
            }
            SignableSection::Pshard(pshard) => {
                let internal = self
                    .config
                    .is_authority(&pshard.context, &pshard.subject_zone);
                self.negatives.add(
                    &pshard.context,
                    &pshard.subject_zone,
                    internal,
                    Arc::new(section.clone()),
                    valid_since,
                    valid_until,
                );
                true
            }
            SignableSection::Zone(zone) => {
                let internal = self
                    .config
                    .is_authority(&zone.context, &zone.subject_zone);
                self.negatives.add(
                    &zone.context,
                    &zone.subject_zone,
                    internal,
                    Arc::new(section.clone()),
                    valid_since,
                    valid_until,
                );
                for assertion in zone.assertions() {
                    let lifted = assertion.with_zone_and_context(
                        &zone.subject_zone,
                        &zone.context,
                    );
                    self.register_keys(&lifted, valid_since, valid_until);
                    self.assertions.add(
                        Arc::new(lifted),
                        internal,
                        valid_since,
                        valid_until,
                    );
                }
                true
            }
            SignableSection::AddressAssertion(assertion) => {
                self.addresses.add_assertion(
                    Arc::new(assertion.clone()),
                    false,
                    valid_until,
                );
                true
            }
            SignableSection::AddressZone(zone) => {
                self.addresses.add_zone(
                    Arc::new(zone.clone()),
                    false,
                    valid_until,
                );
                for assertion in &zone.content {
                    self.addresses.add_assertion(
                        Arc::new(assertion.clone()),
                        false,
                        valid_until,
                    );
                }
                true
            }
        }
    }

    /// Files the keys a verified assertion delegates.
    ///
    /// A delegation key's own validity is bounded by the validity of the
    /// assertion carrying it. Newly arrived delegations drain the
    /// pending-signature cache for their zone and re-run verification on
    /// everything that was parked there.
    fn register_keys(
        &self,
        assertion: &Assertion,
        valid_since: i64,
        valid_until: i64,
    ) {
        let mut delegated = false;
        for object in &assertion.content {
            if let Object::Delegation(key) = object {
                let internal = self.config.is_authority(
                    &assertion.context,
                    &assertion.subject_zone,
                );
                self.zone_keys.add(
                    KeyCacheKey::new(
                        assertion.context.clone(),
                        assertion.subject_name.clone(),
                        key.id.algorithm,
                    ),
                    effective_key(key, valid_since, valid_until),
                    internal,
                );
                delegated = true;
            }
        }
        if delegated {
            if let Some(parked) = self
                .pending_signatures
                .get_all_and_delete(&assertion.context, &assertion.subject_name)
            {
                debug!(
                    zone = %assertion.subject_name,
                    count = parked.len(),
                    "delegation arrived, draining parked sections"
                );
                for section_sender in parked {
                    self.process_signable(section_sender);
                }
            }
        }
    }

    /// Answers a query from the caches or parks it.
    fn process_query(&self, sender: ConnInfo, query: Query) {
        let now = unix_now();
        if query.expired(now) {
            debug!(name = %query.name, "dropping expired query");
            return;
        }
        let (name, zone) = split_fqdn(&query.name);
        let expired_ok = query.has_option(QueryOption::ExpiredAssertionsOk);
        let hits = self.assertions.get(
            &query.context,
            zone,
            name,
            query.query_type,
            expired_ok,
        );
        if !hits.is_empty() {
            let mut answer = Message::with_token(query.token);
            answer.content.extend(
                hits.iter()
                    .map(|assertion| Section::from((**assertion).clone())),
            );
            self.send_or_log(sender, answer);
            return;
        }
        if let Some(negative) = self.negatives.get(
            &query.context,
            zone,
            &StringInterval::point(name),
        ) {
            let mut answer = Message::with_token(query.token);
            answer
                .content
                .push(Section::Signable((*negative).clone()));
            self.send_or_log(sender, answer);
            return;
        }
        if query.has_option(QueryOption::CachedAnswersOnly) {
            self.send_notification(
                sender,
                query.token,
                NotificationType::NoAssertionAvail,
            );
            return;
        }
        let valid_until =
            query.expires.min(now + self.config.query_validity_secs);
        let key = PendingQueryKey {
            context: query.context.clone(),
            zone: zone.to_string(),
            name: name.to_string(),
            object_type: query.query_type,
        };
        let waiter = QueryWaiter {
            sender,
            token: query.token,
        };
        let (fresh, token) =
            self.pending_queries.add(key, waiter, valid_until);
        if fresh {
            let upstream = Query {
                context: query.context,
                name: query.name,
                query_type: query.query_type,
                expires: valid_until,
                token,
                options: Vec::new(),
            };
            if self.sender.send_query(upstream).is_err() {
                warn!("unable to forward query upstream");
            }
        }
    }

    /// Answers an address query from the address cache.
    ///
    /// Reverse lookups are served from cache only; there is no upstream
    /// recursion for them.
    fn process_address_query(&self, sender: ConnInfo, query: AddressQuery) {
        if query.expired(unix_now()) {
            return;
        }
        let answer = self.addresses.get(
            &query.context,
            &query.subject_addr,
            &[query.query_type],
        );
        let mut message = Message::with_token(query.token);
        if let Some(assertion) = answer.assertion {
            message
                .content
                .push(Section::from((*assertion).clone()));
        } else if let Some(zone) = answer.zone {
            message.content.push(Section::from((*zone).clone()));
        } else {
            self.send_notification(
                sender,
                query.token,
                NotificationType::NoAssertionAvail,
            );
            return;
        }
        self.send_or_log(sender, message);
    }

    /// Reacts to a notification from a peer.
    fn process_notification(
        &self,
        sender: ConnInfo,
        notification: Notification,
    ) {
        match notification.notification_type {
            NotificationType::Heartbeat => {}
            NotificationType::CapHashNotKnown => {
                let mut answer = Message::with_token(notification.token);
                answer.capabilities = self
                    .config
                    .capabilities
                    .iter()
                    .map(|cap| crate::base::Capability::new(cap.clone()))
                    .collect();
                self.send_or_log(sender, answer);
            }
            other => {
                debug!(from = %sender, kind = %other, data = %notification.data,
                    "peer notification");
            }
        }
    }

    /// Hands a freshly cached section to every parked querier.
    fn deliver_to_waiters(&self, token: Token, section: &SignableSection) {
        let waiters = match self.pending_queries.get_all_and_delete(token) {
            Some(waiters) => waiters,
            None => return,
        };
        for waiter in waiters {
            let mut answer = Message::with_token(waiter.token);
            answer
                .content
                .push(Section::Signable(section.clone()));
            self.send_or_log(waiter.sender, answer);
        }
    }

    /// Mints and sends the delegation query for a zone.
    fn send_delegation_query(&self, context: &str, zone: &str) {
        let query = Query {
            context: context.to_string(),
            name: zone.to_string(),
            query_type: ObjectType::Delegation,
            expires: unix_now() + self.config.delegation_query_validity_secs,
            token: Token::mint(),
            options: Vec::new(),
        };
        if self.sender.send_query(query).is_err() {
            warn!(context, zone, "unable to send delegation query");
        }
    }

    fn send_notification(
        &self,
        to: ConnInfo,
        token: Token,
        notification_type: NotificationType,
    ) {
        let mut message = Message::with_token(token);
        message.content.push(Section::Notification(Notification::new(
            token,
            notification_type,
        )));
        self.send_or_log(to, message);
    }

    fn send_or_log(&self, to: ConnInfo, message: Message) {
        if self.sender.send(to, message).is_err() {
            warn!(to = %to, "unable to send message");
        }
    }
}

/// Splits a fully qualified name into subject name and zone.
fn split_fqdn(fqdn: &str) -> (&str, &str) {
    match fqdn.split_once('.') {
        Some((name, zone)) if !zone.is_empty() => (name, zone),
        _ => (fqdn.trim_end_matches('.'), "."),
    }
}

/// Bounds a delegated key's validity by its carrying assertion's.
fn effective_key(key: &PublicKey, valid_since: i64, valid_until: i64) -> PublicKey {
    let mut key = key.clone();
    if key.valid_since == 0 && key.valid_until == 0 {
        key.valid_since = valid_since;
        key.valid_until = valid_until;
    }
    key
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::SecretKey;
    use crate::keys::PublicKeyID;
    use crate::section::Signature;
    use crate::server::{Config, SendError, Sender};
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::net::Ipv4Addr;

    #[derive(Default)]
    struct MockSender {
        sent: Mutex<Vec<(ConnInfo, Message)>>,
        queries: Mutex<Vec<Query>>,
    }

    impl Sender for MockSender {
        fn send(&self, to: ConnInfo, message: Message) -> Result<(), SendError> {
            self.sent.lock().push((to, message));
            Ok(())
        }

        fn send_query(&self, query: Query) -> Result<(), SendError> {
            self.queries.lock().push(query);
            Ok(())
        }
    }

    fn context() -> (Arc<MockSender>, ServerContext) {
        let sender = Arc::new(MockSender::default());
        let ctx = ServerContext::new(Config::default(), sender.clone());
        (sender, ctx)
    }

    fn peer() -> ConnInfo {
        ConnInfo::tcp(([192, 0, 2, 1], 5022).into())
    }

    fn signed_assertion(secret: &SecretKey, phase: u32) -> SignableSection {
        let now = unix_now();
        let mut section: SignableSection = Assertion::new(
            "ethz",
            "ch",
            ".",
            vec![Object::Ip4(Ipv4Addr::new(127, 0, 0, 1))],
        )
        .into();
        siglib::sign_section(
            &mut section,
            secret,
            Signature::template(
                PublicKeyID::ed25519(phase),
                now,
                now + 3600,
            ),
        )
        .unwrap();
        section
    }

    fn install_zone_key(ctx: &ServerContext, secret: &SecretKey, phase: u32) {
        let now = unix_now();
        ctx.zone_keys.add(
            KeyCacheKey::new(
                ".",
                "ch",
                crate::base::algo::SignatureAlgo::Ed25519,
            ),
            PublicKey::new(
                PublicKeyID::ed25519(phase),
                Bytes::from(secret.public_key_bytes()),
                now - 10,
                now + 7200,
            ),
            false,
        );
    }

    #[test]
    fn verified_section_lands_in_cache() {
        let (_, ctx) = context();
        let secret = SecretKey::from_seed(&[1u8; 32]).unwrap();
        install_zone_key(&ctx, &secret, 0);
        ctx.process_signable(SectionSender {
            sender: peer(),
            section: signed_assertion(&secret, 0),
            token: Token::mint(),
        });
        assert_eq!(ctx.assertions.len(), 1);
        assert!(ctx.pending_signatures.is_empty());
    }

    #[test]
    fn missing_key_parks_and_queries_delegation() {
        let (sender, ctx) = context();
        let secret = SecretKey::from_seed(&[1u8; 32]).unwrap();
        ctx.process_signable(SectionSender {
            sender: peer(),
            section: signed_assertion(&secret, 0),
            token: Token::mint(),
        });
        assert_eq!(ctx.assertions.len(), 0);
        assert_eq!(ctx.pending_signatures.len(), 1);
        let queries = sender.queries.lock();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].name, "ch");
        assert_eq!(queries[0].query_type, ObjectType::Delegation);

        // A second parked section joins without a second query.
        drop(queries);
        ctx.process_signable(SectionSender {
            sender: peer(),
            section: signed_assertion(&secret, 0),
            token: Token::mint(),
        });
        assert_eq!(sender.queries.lock().len(), 1);
        assert_eq!(ctx.pending_signatures.len(), 2);
    }

    #[test]
    fn delegation_arrival_drains_parked_sections() {
        let (_, ctx) = context();
        let zone_secret = SecretKey::from_seed(&[1u8; 32]).unwrap();
        ctx.process_signable(SectionSender {
            sender: peer(),
            section: signed_assertion(&zone_secret, 0),
            token: Token::mint(),
        });
        assert_eq!(ctx.pending_signatures.len(), 1);

        // The root signs a delegation of "ch" to the zone key.
        let root_secret = SecretKey::from_seed(&[2u8; 32]).unwrap();
        let now = unix_now();
        ctx.zone_keys.add(
            KeyCacheKey::new(
                ".",
                ".",
                crate::base::algo::SignatureAlgo::Ed25519,
            ),
            PublicKey::new(
                PublicKeyID::ed25519(0),
                Bytes::from(root_secret.public_key_bytes()),
                now - 10,
                now + 7200,
            ),
            true,
        );
        let mut delegation: SignableSection = Assertion::new(
            "ch",
            ".",
            ".",
            vec![Object::Delegation(PublicKey::new(
                PublicKeyID::ed25519(0),
                Bytes::from(zone_secret.public_key_bytes()),
                0,
                0,
            ))],
        )
        .into();
        siglib::sign_section(
            &mut delegation,
            &root_secret,
            Signature::template(PublicKeyID::ed25519(0), now, now + 3600),
        )
        .unwrap();
        ctx.process_signable(SectionSender {
            sender: peer(),
            section: delegation,
            token: Token::mint(),
        });

        // The parked section was re-verified and cached.
        assert!(ctx.pending_signatures.is_empty());
        assert_eq!(
            ctx.assertions
                .get(".", "ch", "ethz", ObjectType::Ip4, false)
                .len(),
            1
        );
    }

    #[test]
    fn query_answered_from_cache() {
        let (sender, ctx) = context();
        let secret = SecretKey::from_seed(&[1u8; 32]).unwrap();
        install_zone_key(&ctx, &secret, 0);
        ctx.process_signable(SectionSender {
            sender: peer(),
            section: signed_assertion(&secret, 0),
            token: Token::mint(),
        });

        let token = Token::mint();
        ctx.process_query(
            peer(),
            Query {
                context: ".".into(),
                name: "ethz.ch".into(),
                query_type: ObjectType::Ip4,
                expires: unix_now() + 10,
                token,
                options: Vec::new(),
            },
        );
        let sent = sender.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.token, token);
        assert_eq!(sent[0].1.content.len(), 1);
    }

    #[test]
    fn unanswerable_query_is_parked() {
        let (sender, ctx) = context();
        let token = Token::mint();
        ctx.process_query(
            peer(),
            Query {
                context: ".".into(),
                name: "epfl.ch".into(),
                query_type: ObjectType::Ip4,
                expires: unix_now() + 10,
                token,
                options: Vec::new(),
            },
        );
        assert_eq!(ctx.pending_queries.len(), 1);
        let queries = sender.queries.lock();
        assert_eq!(queries.len(), 1);
        // The upstream query runs under a fresh server-side token.
        assert_ne!(queries[0].token, token);
    }

    #[test]
    fn cached_answers_only_gets_notification() {
        let (sender, ctx) = context();
        ctx.process_query(
            peer(),
            Query {
                context: ".".into(),
                name: "epfl.ch".into(),
                query_type: ObjectType::Ip4,
                expires: unix_now() + 10,
                token: Token::mint(),
                options: vec![QueryOption::CachedAnswersOnly],
            },
        );
        assert!(ctx.pending_queries.is_empty());
        let sent = sender.sent.lock();
        assert_eq!(sent.len(), 1);
        match &sent[0].1.content[0] {
            Section::Notification(notification) => assert_eq!(
                notification.notification_type,
                NotificationType::NoAssertionAvail
            ),
            other => panic!("expected a notification, got {:?}", other),
        }
    }

    #[test]
    fn arriving_answer_reaches_parked_queriers() {
        let (sender, ctx) = context();
        let secret = SecretKey::from_seed(&[1u8; 32]).unwrap();
        install_zone_key(&ctx, &secret, 0);

        let client_token = Token::mint();
        ctx.process_query(
            peer(),
            Query {
                context: ".".into(),
                name: "ethz.ch".into(),
                query_type: ObjectType::Ip4,
                expires: unix_now() + 10,
                token: client_token,
                options: Vec::new(),
            },
        );
        let upstream_token = sender.queries.lock()[0].token;

        // The upstream answer arrives under the server's token.
        ctx.process_signable(SectionSender {
            sender: peer(),
            section: signed_assertion(&secret, 0),
            token: upstream_token,
        });

        let sent = sender.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.token, client_token);
        assert_eq!(sent[0].1.content.len(), 1);
    }

    #[test]
    fn out_of_range_shard_is_rejected() {
        let (_, ctx) = context();
        let secret = SecretKey::from_seed(&[1u8; 32]).unwrap();
        install_zone_key(&ctx, &secret, 0);
        let now = unix_now();
        let mut shard = crate::section::Shard::new("ch", ".", "aaa", "mmm");
        shard
            .content
            .push(Assertion::new("zzz", "", "", Vec::new()));
        let mut section: SignableSection = shard.into();
        siglib::sign_section(
            &mut section,
            &secret,
            crate::section::Signature::template(
                PublicKeyID::ed25519(0),
                now,
                now + 3600,
            ),
        )
        .unwrap();
        ctx.process_signable(SectionSender {
            sender: peer(),
            section,
            token: Token::mint(),
        });
        assert_eq!(ctx.negatives.len(), 0);
        assert_eq!(ctx.assertions.len(), 0);
    }

    #[test]
    fn split_fqdn_variants() {
        assert_eq!(split_fqdn("ethz.ch"), ("ethz", "ch"));
        assert_eq!(split_fqdn("ch"), ("ch", "."));
        assert_eq!(split_fqdn("ch."), ("ch", "."));
        assert_eq!(split_fqdn("a.b.c"), ("a", "b.c"));
    }
}
