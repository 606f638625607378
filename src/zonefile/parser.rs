//! The zone-file parser.
//!
//! A hand-written recursive-descent parser over the token stream. The
//! grammar is LL(1) once each section's leading tag is consumed, except
//! for the optional `zone context` pair in shards and pshards, which a
//! two-token lookahead settles.
//!
//! The parser is total: errors are recorded, the offending tokens are
//! skipped, and parsing resumes at the next recognisable position.

use crate::base::algo::{HashAlgo, SignatureAlgo};
use crate::base::interval::{TOTAL_INTERVAL_BEGIN, TOTAL_INTERVAL_END};
use crate::keys::{PublicKey, PublicKeyID, ED25519_PUBLIC_KEY_LEN};
use crate::object::{
    Certificate, CertificateUsage, NameObject, Object, ObjectType,
    ProtocolType, ServiceInfo,
};
use crate::section::{
    Assertion, BitArray, BloomFilter, ModeOfOperation, Pshard, Shard,
    Signable, SignableSection, Signature, Zone, ZoneContent,
};
use crate::zonefile::error::DecodeError;
use crate::zonefile::scan::Tokens;
use bytes::Bytes;
use tracing::error;

/// The tags that may start a top-level section.
const TOP_TAGS: [&str; 4] = [":A:", ":S:", ":P:", ":Z:"];

/// The tokens ending a free-text run.
const TEXT_STOPS: [&str; 4] = ["[", "]", "(", ")"];

//------------ Parser --------------------------------------------------------

/// The parser state.
pub struct Parser<'a> {
    tokens: Tokens<'a>,
    errors: Vec<DecodeError>,
}

impl<'a> Parser<'a> {
    /// Creates a parser over an input.
    pub fn new(input: &'a str) -> Self {
        Parser {
            tokens: Tokens::new(input),
            errors: Vec::new(),
        }
    }

    /// Parses the whole input.
    ///
    /// Returns the decoded sections and every error encountered along
    /// the way.
    pub fn parse(mut self) -> (Vec<SignableSection>, Vec<DecodeError>) {
        let mut sections = Vec::new();
        while let Some(tag) = self.tokens.peek() {
            let result = match tag {
                ":A:" => self.parse_assertion().map(SignableSection::from),
                ":S:" => self.parse_shard().map(SignableSection::from),
                ":P:" => self.parse_pshard().map(SignableSection::from),
                ":Z:" => self.parse_zone().map(SignableSection::from),
                _ => Err(self.syntax_here("a section tag")),
            };
            match result {
                Ok(section) => sections.push(section),
                Err(err) => {
                    self.record(err);
                    // Resume at the next section tag. If the error left
                    // us on one, try it as a fresh top-level section;
                    // its parser always makes progress.
                    if let Some(token) = self.tokens.peek() {
                        if !TOP_TAGS.contains(&token) {
                            self.tokens.next();
                            self.tokens.skip_until(&TOP_TAGS);
                        }
                    }
                }
            }
        }
        (sections, self.errors)
    }

    //--- sections

    fn parse_assertion(&mut self) -> Result<Assertion, DecodeError> {
        self.expect(":A:")?;
        let subject_name = self.next_id("a subject name")?.to_string();
        let (subject_zone, context) = if self.tokens.peek() == Some("[") {
            (String::new(), String::new())
        } else {
            (
                self.next_id("a zone")?.to_string(),
                self.next_id("a context")?.to_string(),
            )
        };
        self.expect("[")?;
        let content = self.parse_objects()?;
        let mut assertion = Assertion {
            subject_name,
            subject_zone,
            context,
            content,
            signatures: Vec::new(),
        };
        self.parse_annotation(&mut assertion)?;
        Ok(assertion)
    }

    fn parse_shard(&mut self) -> Result<Shard, DecodeError> {
        self.expect(":S:")?;
        let (subject_zone, context) = self.parse_optional_zone_context("(")?;
        let range_from = self.parse_range_bound(TOTAL_INTERVAL_BEGIN)?;
        let range_to = self.parse_range_bound(TOTAL_INTERVAL_END)?;
        self.expect("(")?;
        let mut content = Vec::new();
        loop {
            match self.tokens.peek() {
                Some(")") => {
                    self.tokens.next();
                    break;
                }
                Some(":A:") => content.push(self.parse_assertion()?),
                _ => return Err(self.syntax_here("an assertion or `)`")),
            }
        }
        let mut shard = Shard {
            subject_zone,
            context,
            range_from,
            range_to,
            content,
            signatures: Vec::new(),
        };
        self.parse_annotation(&mut shard)?;
        Ok(shard)
    }

    fn parse_pshard(&mut self) -> Result<Pshard, DecodeError> {
        self.expect(":P:")?;
        let (subject_zone, context) =
            self.parse_optional_zone_context(":bloom:")?;
        let range_from = self.parse_range_bound(TOTAL_INTERVAL_BEGIN)?;
        let range_to = self.parse_range_bound(TOTAL_INTERVAL_END)?;
        let datastructure = self.parse_bloom_filter()?;
        let mut pshard = Pshard {
            subject_zone,
            context,
            range_from,
            range_to,
            datastructure,
            signatures: Vec::new(),
        };
        self.parse_annotation(&mut pshard)?;
        Ok(pshard)
    }

    fn parse_zone(&mut self) -> Result<Zone, DecodeError> {
        self.expect(":Z:")?;
        let subject_zone = self.next_id("a zone")?.to_string();
        let context = self.next_id("a context")?.to_string();
        self.expect("(")?;
        let mut content = Vec::new();
        loop {
            match self.tokens.peek() {
                Some(")") => {
                    self.tokens.next();
                    break;
                }
                Some(":A:") => content
                    .push(ZoneContent::Assertion(self.parse_assertion()?)),
                Some(":S:") => {
                    content.push(ZoneContent::Shard(self.parse_shard()?))
                }
                _ => {
                    return Err(
                        self.syntax_here("an assertion, a shard or `)`")
                    )
                }
            }
        }
        let mut zone = Zone {
            subject_zone,
            context,
            content,
            signatures: Vec::new(),
        };
        self.parse_annotation(&mut zone)?;
        Ok(zone)
    }

    /// Parses the optional `zone context` pair of shards and pshards.
    ///
    /// Both bounds of the range are still to come, so the pair is
    /// present iff the terminator is four tokens ahead rather than two.
    fn parse_optional_zone_context(
        &mut self,
        terminator: &str,
    ) -> Result<(String, String), DecodeError> {
        if self.tokens.peek_at(2) == Some(terminator) {
            Ok((String::new(), String::new()))
        } else if self.tokens.peek_at(4) == Some(terminator) {
            Ok((
                self.next_id("a zone")?.to_string(),
                self.next_id("a context")?.to_string(),
            ))
        } else {
            Err(self.syntax_here("a shard range"))
        }
    }

    fn parse_range_bound(
        &mut self,
        open: &'static str,
    ) -> Result<String, DecodeError> {
        let token = self.next_id("a range bound")?;
        if token == TOTAL_INTERVAL_BEGIN || token == TOTAL_INTERVAL_END {
            // `<` and `>` are kept literally; other tokens are names.
            if token != open {
                return Err(DecodeError::semantic(
                    self.tokens.line(),
                    format!("range bound {} on the wrong side", token),
                ));
            }
        }
        Ok(token.to_string())
    }

    //--- objects

    fn parse_objects(&mut self) -> Result<Vec<Object>, DecodeError> {
        let mut objects = Vec::new();
        loop {
            let token = match self.tokens.peek() {
                Some("]") => {
                    self.tokens.next();
                    return Ok(objects);
                }
                Some(token) => token,
                None => return Err(self.syntax_here("an object or `]`")),
            };
            match self.parse_object(token) {
                Ok(Some(object)) => objects.push(object),
                Ok(None) => {}
                Err(err) => {
                    // Drop the object, skip the offending token, and
                    // keep the rest of the list.
                    self.record(err);
                    if self.tokens.peek() == Some(token) {
                        self.tokens.next();
                    }
                }
            }
        }
    }

    /// Parses one object. `Ok(None)` means the object was recognised
    /// but semantically invalid and has been dropped.
    fn parse_object(
        &mut self,
        tag: &str,
    ) -> Result<Option<Object>, DecodeError> {
        match tag {
            ":name:" => {
                self.tokens.next();
                let name = self.next_id("a name")?.to_string();
                self.expect("[")?;
                let mut types = Vec::new();
                loop {
                    let token = self.next_id("an object type or `]`")?;
                    if token == "]" {
                        break;
                    }
                    match ObjectType::from_token(token) {
                        Some(ty) => types.push(ty),
                        None => self.record_semantic(format!(
                            "unknown object type {}",
                            token
                        )),
                    }
                }
                Ok(Some(Object::Name(NameObject { name, types })))
            }
            ":ip4:" => {
                self.tokens.next();
                let addr = self.next_id("an IPv4 address")?;
                match addr.parse() {
                    Ok(addr) => Ok(Some(Object::Ip4(addr))),
                    Err(_) => {
                        self.record_semantic(format!(
                            "malformed IPv4 address {}",
                            addr
                        ));
                        Ok(None)
                    }
                }
            }
            ":ip6:" => {
                self.tokens.next();
                let addr = self.next_id("an IPv6 address")?;
                match addr.parse() {
                    Ok(addr) => Ok(Some(Object::Ip6(addr))),
                    Err(_) => {
                        self.record_semantic(format!(
                            "malformed IPv6 address {}",
                            addr
                        ));
                        Ok(None)
                    }
                }
            }
            ":redir:" => {
                self.tokens.next();
                let name = self.next_id("a redirection name")?.to_string();
                Ok(Some(Object::Redirection(name)))
            }
            ":deleg:" => {
                self.tokens.next();
                Ok(self.parse_public_key()?.map(Object::Delegation))
            }
            ":infra:" => {
                self.tokens.next();
                Ok(self.parse_public_key()?.map(Object::InfraKey))
            }
            ":extra:" => {
                self.tokens.next();
                Ok(self.parse_public_key()?.map(Object::ExtraKey))
            }
            ":next:" => {
                self.tokens.next();
                let key = self.parse_public_key()?;
                let valid_since = self.parse_timestamp()?;
                let valid_until = self.parse_timestamp()?;
                Ok(key.map(|mut key| {
                    key.valid_since = valid_since.unwrap_or_default();
                    key.valid_until = valid_until.unwrap_or_default();
                    Object::NextKey(key)
                }))
            }
            ":nameset:" => {
                self.tokens.next();
                Ok(Some(Object::Nameset(self.parse_free_text()?)))
            }
            ":regr:" => {
                self.tokens.next();
                Ok(Some(Object::Registrar(self.parse_free_text()?)))
            }
            ":regt:" => {
                self.tokens.next();
                Ok(Some(Object::Registrant(self.parse_free_text()?)))
            }
            ":cert:" => {
                self.tokens.next();
                let proto = self.next_id("a protocol type")?;
                let proto = ProtocolType::from_token(proto);
                let usage = self.next_id("a certificate usage")?;
                let usage = CertificateUsage::from_token(usage);
                let hash = self.next_id("a hash algorithm")?;
                let hash = HashAlgo::from_token(hash);
                let data = self.parse_hex("certificate data")?;
                match (proto, usage, hash, data) {
                    (
                        Some(protocol_type),
                        Some(usage),
                        Some(hash_algo),
                        Some(data),
                    ) => Ok(Some(Object::CertInfo(Certificate {
                        protocol_type,
                        usage,
                        hash_algo,
                        data,
                    }))),
                    _ => {
                        self.record_semantic(
                            "malformed certificate object".to_string(),
                        );
                        Ok(None)
                    }
                }
            }
            ":srv:" => {
                self.tokens.next();
                let name = self.next_id("a service name")?.to_string();
                let port = self.next_id("a port")?;
                let port: Option<u16> = port.parse().ok();
                let priority = self.next_id("a priority")?;
                let priority: Option<u32> = priority.parse().ok();
                match (port, priority) {
                    (Some(port), Some(priority)) => {
                        Ok(Some(Object::ServiceInfo(ServiceInfo {
                            name,
                            port,
                            priority,
                        })))
                    }
                    (None, _) => {
                        self.record_semantic(
                            "port is not a number or out of range"
                                .to_string(),
                        );
                        Ok(None)
                    }
                    _ => {
                        self.record_semantic(
                            "priority is not a number or negative"
                                .to_string(),
                        );
                        Ok(None)
                    }
                }
            }
            _ => Err(self.syntax_here("an object type tag")),
        }
    }

    /// Parses `:ed25519: keyPhase hex32`.
    ///
    /// Returns `Ok(None)` after recording a semantic error for a bad
    /// phase or key; the tokens are consumed either way.
    fn parse_public_key(
        &mut self,
    ) -> Result<Option<PublicKey>, DecodeError> {
        let algo = self.next_id("a signature algorithm")?;
        if SignatureAlgo::from_token(algo).is_none() {
            return Err(DecodeError::semantic(
                self.tokens.line(),
                format!("unknown signature algorithm {}", algo),
            ));
        }
        let phase = self.next_id("a key phase")?;
        let phase: Option<u32> = phase.parse().ok();
        let key = self.parse_hex("public key data")?;
        match (phase, key) {
            (Some(phase), Some(key)) => {
                if key.len() != ED25519_PUBLIC_KEY_LEN {
                    self.record_semantic(format!(
                        "wrong public key length: got {}, want: {}",
                        key.len(),
                        ED25519_PUBLIC_KEY_LEN
                    ));
                    return Ok(None);
                }
                Ok(Some(PublicKey::new(
                    PublicKeyID::ed25519(phase),
                    key,
                    0,
                    0,
                )))
            }
            (None, _) => {
                self.record_semantic("keyphase is not a number".to_string());
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    //--- the bloom filter

    fn parse_bloom_filter(&mut self) -> Result<BloomFilter, DecodeError> {
        self.expect(":bloom:")?;
        self.expect("[")?;
        let mut hash_family = Vec::new();
        loop {
            let token = self.next_id("a hash algorithm or `]`")?;
            if token == "]" {
                break;
            }
            match HashAlgo::from_token(token) {
                Some(algo) => hash_family.push(algo),
                None => self.record_semantic(format!(
                    "unknown hash algorithm {}",
                    token
                )),
            }
        }
        let funcs = self.next_id("a number of hash functions")?;
        let nof_hash_functions: u32 = match funcs.parse() {
            Ok(funcs) => funcs,
            Err(_) => {
                self.record_semantic(
                    "nofHashFunctions is not a number".to_string(),
                );
                0
            }
        };
        let mode = self.next_id("a mode of operation")?;
        let mode_of_operation = match ModeOfOperation::from_token(mode) {
            Some(mode) => mode,
            None => {
                return Err(DecodeError::semantic(
                    self.tokens.line(),
                    format!("unknown mode of operation {}", mode),
                ))
            }
        };
        let filter = self
            .parse_hex("filter data")?
            .map(|bytes| BitArray::from_bytes(bytes.to_vec()))
            .unwrap_or_default();
        Ok(BloomFilter {
            hash_family,
            nof_hash_functions,
            mode_of_operation,
            filter,
        })
    }

    //--- signatures

    /// Parses the optional `( :sig: … )` annotation of a section.
    fn parse_annotation(
        &mut self,
        section: &mut impl Signable,
    ) -> Result<(), DecodeError> {
        if self.tokens.peek() != Some("(")
            || self.tokens.peek_at(1) != Some(":sig:")
        {
            return Ok(());
        }
        self.tokens.next();
        while self.tokens.peek() == Some(":sig:") {
            if let Some(sig) = self.parse_signature()? {
                section.add_signature(sig);
            }
        }
        self.expect(")")?;
        Ok(())
    }

    /// Parses `:sig: :ed25519: keyPhase validSince validUntil [hex]`.
    ///
    /// An optional `:rains:` key-space token after the algorithm is
    /// accepted for older zone files. Signature data arrives as hex and
    /// may be absent on not-yet-signed sections.
    fn parse_signature(
        &mut self,
    ) -> Result<Option<Signature>, DecodeError> {
        self.expect(":sig:")?;
        let algo = self.next_id("a signature algorithm")?;
        if SignatureAlgo::from_token(algo).is_none() {
            return Err(DecodeError::semantic(
                self.tokens.line(),
                format!("unknown signature algorithm {}", algo),
            ));
        }
        if self.tokens.peek() == Some(":rains:") {
            self.tokens.next();
        }
        let phase = self.next_id("a key phase")?;
        let phase: Option<u32> = phase.parse().ok();
        let valid_since = self.parse_timestamp()?;
        let valid_until = self.parse_timestamp()?;
        let data = if matches!(self.tokens.peek(), Some(")") | Some(":sig:"))
        {
            Some(Bytes::new())
        } else {
            self.parse_hex("signature data")?
        };
        match (phase, valid_since, valid_until, data) {
            (Some(phase), Some(valid_since), Some(valid_until), Some(data)) => {
                Ok(Some(Signature {
                    public_key_id: PublicKeyID::ed25519(phase),
                    valid_since,
                    valid_until,
                    data,
                }))
            }
            (None, ..) => {
                self.record_semantic("keyphase is not a number".to_string());
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    //--- helpers

    /// Parses a run of free-text words up to the next structural token.
    fn parse_free_text(&mut self) -> Result<String, DecodeError> {
        let mut words: Vec<&str> = Vec::new();
        while let Some(token) = self.tokens.peek() {
            if TEXT_STOPS.contains(&token)
                || ObjectType::from_token(token).is_some()
            {
                break;
            }
            words.push(token);
            self.tokens.next();
        }
        if words.is_empty() {
            return Err(self.syntax_here("free text"));
        }
        Ok(words.join(" "))
    }

    /// Parses a non-negative decimal timestamp.
    ///
    /// Returns `Ok(None)` after recording a semantic error for a
    /// malformed value; the token is consumed either way.
    fn parse_timestamp(&mut self) -> Result<Option<i64>, DecodeError> {
        let token = self.next_id("a timestamp")?;
        match token.parse::<i64>() {
            Ok(value) if value >= 0 => Ok(Some(value)),
            _ => {
                self.record_semantic(format!(
                    "timestamp {} is not a number or negative",
                    token
                ));
                Ok(None)
            }
        }
    }

    /// Parses a lowercase-hex blob.
    ///
    /// Returns `Ok(None)` after recording a semantic error for bad hex;
    /// the token is consumed either way.
    fn parse_hex(
        &mut self,
        what: &'static str,
    ) -> Result<Option<Bytes>, DecodeError> {
        let token = self.next_id(what)?;
        match decode_hex(token) {
            Some(bytes) => Ok(Some(Bytes::from(bytes))),
            None => {
                self.record_semantic(format!("malformed hex in {}", what));
                Ok(None)
            }
        }
    }

    fn expect(&mut self, token: &'static str) -> Result<(), DecodeError> {
        match self.tokens.peek() {
            Some(found) if found == token => {
                self.tokens.next();
                Ok(())
            }
            _ => Err(self.syntax_here(token)),
        }
    }

    fn next_id(
        &mut self,
        expected: &'static str,
    ) -> Result<&'a str, DecodeError> {
        let line = self.tokens.line();
        self.tokens.next().ok_or(DecodeError::Syntax {
            line,
            got: String::new(),
            expected,
        })
    }

    fn syntax_here(&self, expected: &'static str) -> DecodeError {
        DecodeError::Syntax {
            line: self.tokens.line(),
            got: self.tokens.peek().unwrap_or_default().to_string(),
            expected,
        }
    }

    fn record(&mut self, err: DecodeError) {
        error!(%err, "zonefile decode error");
        self.errors.push(err);
    }

    fn record_semantic(&mut self, msg: String) {
        let err = DecodeError::semantic(self.tokens.line(), msg);
        self.record(err);
    }
}

//------------ decode_hex ----------------------------------------------------

/// Decodes a lowercase hex string. The empty string is valid.
pub(crate) fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = hex_digit(pair[0])?;
            let lo = hex_digit(pair[1])?;
            Some(hi << 4 | lo)
        })
        .collect()
}

fn hex_digit(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}
