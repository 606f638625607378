//! Signing and verification.
//!
//! This module implements the signature protocols on top of the
//! [canonical encoding][crate::canonical]: how a signature is attached
//! to a section or message and how attached signatures are re-checked.
//!
//! Every signature covers the canonical encoding of its section with the
//! signature list cleared. Verification therefore strips the whole list,
//! checks each signature against the signature-free encoding, and puts
//! the list back; a section carrying several signatures stays verifiable
//! after any subset of them is removed.
//!
//! Verification never treats a *missing* public key as a failure. The
//! verdict reports the key as missing so the caller can park the section
//! in the pending-signature cache and issue a delegation query.

use crate::base::unix_now;
use crate::canonical;
use crate::crypto::{self, SecretKey};
use crate::keys::PublicKey;
use crate::sanitize;
use crate::section::{Message, SectionKind, Signable, SignableSection, Signature};
use bytes::Bytes;
use core::fmt;
use tracing::{debug, warn};

//------------ MaxCacheValidity ----------------------------------------------

/// The per-kind bound on how long a verified section may stay cached.
///
/// The effective expiry of a section is the maximum over its live
/// signatures of `min(sig.valid_until, now + bound(kind))`. All values
/// are in seconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct MaxCacheValidity {
    /// The bound for assertions.
    pub assertion: i64,

    /// The bound for shards.
    pub shard: i64,

    /// The bound for pshards.
    pub pshard: i64,

    /// The bound for zones.
    pub zone: i64,

    /// The bound for address assertions.
    pub address_assertion: i64,

    /// The bound for address zones.
    pub address_zone: i64,
}

impl MaxCacheValidity {
    /// Returns the bound for a section kind.
    pub fn for_kind(&self, kind: SectionKind) -> i64 {
        match kind {
            SectionKind::Assertion => self.assertion,
            SectionKind::Shard => self.shard,
            SectionKind::Pshard => self.pshard,
            SectionKind::Zone => self.zone,
            SectionKind::AddressAssertion => self.address_assertion,
            SectionKind::AddressZone => self.address_zone,
        }
    }
}

impl Default for MaxCacheValidity {
    fn default() -> Self {
        const YEAR: i64 = 365 * 24 * 3600;
        MaxCacheValidity {
            assertion: YEAR,
            shard: YEAR,
            pshard: YEAR,
            zone: YEAR,
            address_assertion: YEAR,
            address_zone: YEAR,
        }
    }
}

//------------ sign_section --------------------------------------------------

/// Signs a section, appending the completed signature.
///
/// The `template` supplies the key identity and validity window of the
/// signature to make; its data field is ignored. Signatures already
/// present are preserved: they are taken off for the canonicalisation
/// and reattached afterwards, followed by the new signature.
pub fn sign_section(
    section: &mut SignableSection,
    key: &SecretKey,
    template: Signature,
) -> Result<(), SignError> {
    if !sanitize::check_signable_fields(section) {
        return Err(SignError::UncleanSection);
    }
    let snapshot = section.take_signatures();
    let blob = canonical::encode_signable(section);
    let data = key.sign(blob.as_bytes());
    section.set_signatures(snapshot);
    section.add_signature(Signature {
        data: Bytes::from(data),
        ..template
    });
    Ok(())
}

/// Signs a message, appending the completed signature.
///
/// The message's token and capabilities participate in the canonical
/// input.
pub fn sign_message(
    message: &mut Message,
    key: &SecretKey,
    template: Signature,
) -> Result<(), SignError> {
    if !sanitize::check_message_string_fields(message) {
        return Err(SignError::UncleanSection);
    }
    let snapshot = std::mem::take(&mut message.signatures);
    let blob = canonical::encode_message(message);
    let data = key.sign(blob.as_bytes());
    message.signatures = snapshot;
    message.signatures.push(Signature {
        data: Bytes::from(data),
        ..template
    });
    Ok(())
}

//------------ Verdict -------------------------------------------------------

/// The outcome of verifying the signatures on a section or message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// At least one signature verified and none failed.
    ///
    /// The window states how long the caches may serve the section; the
    /// upper bound is already clamped by [`MaxCacheValidity`].
    Valid {
        /// The earliest moment any live signature is valid.
        valid_since: i64,

        /// The clamped expiry of the section.
        valid_until: i64,
    },

    /// A signature failed under a present and covering key, the section
    /// is unclean, or no live signature remains.
    Invalid,

    /// No signature failed, but none could be checked because its public
    /// key is not known. The section should be parked until the
    /// delegation for its zone arrives.
    MissingKey,
}

impl Verdict {
    /// Returns whether the verdict is valid.
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid { .. })
    }
}

//------------ check_section_signatures --------------------------------------

/// Re-checks all signatures attached to a section.
///
/// `keys` holds the candidate public keys for the section's context and
/// zone. A signature is matched against a key with the same identity
/// whose own validity window covers the signature's `valid_since`.
/// Signatures already expired at call time are dropped from the section
/// and take no part in the verdict.
pub fn check_section_signatures(
    section: &mut SignableSection,
    keys: &[PublicKey],
    max_validity: &MaxCacheValidity,
) -> Verdict {
    if !sanitize::check_signable_fields(section) {
        warn!(
            context = section.context(),
            zone = section.subject_zone(),
            "malformed section rejected at sanitiser"
        );
        return Verdict::Invalid;
    }
    let bound = max_validity.for_kind(section.kind());
    let sigs = section.take_signatures();
    let blob = canonical::encode_signable(section);
    let verdict = check_signatures(&sigs, keys, blob.as_bytes(), bound);
    let now = unix_now();
    section.set_signatures(
        sigs.into_iter().filter(|sig| !sig.expired(now)).collect(),
    );
    verdict
}

/// Re-checks all signatures attached to a message.
///
/// Messages are not cached, so no kind-specific validity clamp applies;
/// the verdict's window is bounded by the signatures alone.
pub fn check_message_signatures(
    message: &mut Message,
    keys: &[PublicKey],
) -> Verdict {
    if !sanitize::check_message_string_fields(message) {
        warn!(token = %message.token, "malformed message rejected at sanitiser");
        return Verdict::Invalid;
    }
    let sigs = std::mem::take(&mut message.signatures);
    let blob = canonical::encode_message(message);
    let verdict = check_signatures(&sigs, keys, blob.as_bytes(), i64::MAX);
    let now = unix_now();
    message.signatures =
        sigs.into_iter().filter(|sig| !sig.expired(now)).collect();
    verdict
}

/// Checks a signature list against the signature-free canonical blob.
fn check_signatures(
    sigs: &[Signature],
    keys: &[PublicKey],
    blob: &[u8],
    max_validity: i64,
) -> Verdict {
    let now = unix_now();
    let mut passed = 0usize;
    let mut missing = 0usize;
    let mut valid_since = i64::MAX;
    let mut valid_until = i64::MIN;
    for sig in sigs {
        if sig.expired(now) {
            debug!(sig = %sig, "skipping expired signature");
            continue;
        }
        let key = keys.iter().find(|key| {
            key.id == sig.public_key_id && key.covers(sig.valid_since)
        });
        let key = match key {
            Some(key) => key,
            None => {
                missing += 1;
                continue;
            }
        };
        if crypto::verify_ed25519(blob, &sig.data, &key.key) {
            passed += 1;
            valid_since = valid_since.min(sig.valid_since);
            valid_until = valid_until
                .max(sig.valid_until.min(now.saturating_add(max_validity)));
        } else {
            debug!(sig = %sig, "signature failed verification");
            return Verdict::Invalid;
        }
    }
    if passed > 0 {
        Verdict::Valid {
            valid_since,
            valid_until,
        }
    } else if missing > 0 {
        Verdict::MissingKey
    } else {
        Verdict::Invalid
    }
}

//============ Error Types ===================================================

//------------ SignError -----------------------------------------------------

/// Signing failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignError {
    /// A string field embeds a zone-file type token.
    UncleanSection,
}

impl fmt::Display for SignError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignError::UncleanSection => {
                f.write_str("malformed section rejected at sanitiser")
            }
        }
    }
}

impl std::error::Error for SignError {}

//============ Test ==========================================================
