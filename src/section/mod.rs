//! The section data model.
//!
//! Everything that can appear in a RAINS message is a *section*. Sections
//! come in two families: the signable sections carrying authoritative
//! content ([`Assertion`], [`Shard`], [`Pshard`], [`Zone`],
//! [`AddressAssertion`] and [`AddressZone`]), and the unsigned control
//! sections [`Query`], [`AddressQuery`] and [`Notification`].
//!
//! The [`Signable`] trait provides the uniform capabilities every
//! signable variant exposes: access to the signature list and to context
//! and zone. The [`SignableSection`] enum is the closed union of the
//! signable variants; [`Section`] is the union of everything.

pub mod addr;
pub mod assertion;
pub mod message;
pub mod notification;
pub mod pshard;
pub mod query;
pub mod shard;
pub mod signature;
pub mod zone;

pub use self::addr::{AddressAssertion, AddressZone};
pub use self::assertion::Assertion;
pub use self::message::Message;
pub use self::notification::{Notification, NotificationType};
pub use self::pshard::{BitArray, BloomFilter, ModeOfOperation, Pshard};
pub use self::query::{AddressQuery, Query, QueryOption};
pub use self::shard::Shard;
pub use self::signature::Signature;
pub use self::zone::{Zone, ZoneContent};

use crate::base::token::Token;

//------------ SectionKind ---------------------------------------------------

/// The kind of a signable section.
///
/// Used where policy differs per kind, most notably the maximum cache
/// validity table.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SectionKind {
    /// An assertion.
    Assertion,

    /// A shard.
    Shard,

    /// A pshard.
    Pshard,

    /// A zone.
    Zone,

    /// An address assertion.
    AddressAssertion,

    /// An address zone.
    AddressZone,
}

//------------ Signable ------------------------------------------------------

/// The uniform capabilities of every signable section.
pub trait Signable {
    /// Returns the attached signatures.
    fn signatures(&self) -> &[Signature];

    /// Returns the signature list for modification.
    fn signatures_mut(&mut self) -> &mut Vec<Signature>;

    /// Returns the context of the section.
    fn context(&self) -> &str;

    /// Returns the zone of the section.
    ///
    /// Address sections have no subject zone and return the empty string.
    fn subject_zone(&self) -> &str;

    /// Returns the kind of the section.
    fn kind(&self) -> SectionKind;

    /// Attaches a signature.
    fn add_signature(&mut self, sig: Signature) {
        self.signatures_mut().push(sig);
    }

    /// Removes and returns all attached signatures.
    fn take_signatures(&mut self) -> Vec<Signature> {
        std::mem::take(self.signatures_mut())
    }

    /// Replaces the attached signatures.
    fn set_signatures(&mut self, sigs: Vec<Signature>) {
        *self.signatures_mut() = sigs;
    }
}

macro_rules! impl_signable {
    ($type:ident, $kind:ident, zone_field = $zone_field:ident) => {
        impl Signable for $type {
            fn signatures(&self) -> &[Signature] {
                &self.signatures
            }

            fn signatures_mut(&mut self) -> &mut Vec<Signature> {
                &mut self.signatures
            }

            fn context(&self) -> &str {
                &self.context
            }

            fn subject_zone(&self) -> &str {
                &self.$zone_field
            }

            fn kind(&self) -> SectionKind {
                SectionKind::$kind
            }
        }
    };
    ($type:ident, $kind:ident, zone_field = "") => {
        impl Signable for $type {
            fn signatures(&self) -> &[Signature] {
                &self.signatures
            }

            fn signatures_mut(&mut self) -> &mut Vec<Signature> {
                &mut self.signatures
            }

            fn context(&self) -> &str {
                &self.context
            }

            fn subject_zone(&self) -> &str {
                ""
            }

            fn kind(&self) -> SectionKind {
                SectionKind::$kind
            }
        }
    };
}

impl_signable!(Assertion, Assertion, zone_field = subject_zone);
impl_signable!(Shard, Shard, zone_field = subject_zone);
impl_signable!(Pshard, Pshard, zone_field = subject_zone);
impl_signable!(Zone, Zone, zone_field = subject_zone);
impl_signable!(AddressAssertion, AddressAssertion, zone_field = "");
impl_signable!(AddressZone, AddressZone, zone_field = "");

//------------ SignableSection -----------------------------------------------

/// A section that can carry signatures.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SignableSection {
    /// An assertion.
    Assertion(Assertion),

    /// A shard.
    Shard(Shard),

    /// A pshard.
    Pshard(Pshard),

    /// A zone.
    Zone(Zone),

    /// An address assertion.
    AddressAssertion(AddressAssertion),

    /// An address zone.
    AddressZone(AddressZone),
}

impl SignableSection {
    /// Returns a stable key identifying the section's content.
    ///
    /// The key is the canonical encoding including any attached
    /// signatures; two sections with equal keys are interchangeable.
    pub fn hash_key(&self) -> String {
        crate::canonical::encode_signable(self)
    }
}

macro_rules! delegate_signable {
    ($self:ident, $inner:ident, $body:expr) => {
        match $self {
            SignableSection::Assertion($inner) => $body,
            SignableSection::Shard($inner) => $body,
            SignableSection::Pshard($inner) => $body,
            SignableSection::Zone($inner) => $body,
            SignableSection::AddressAssertion($inner) => $body,
            SignableSection::AddressZone($inner) => $body,
        }
    };
}

impl Signable for SignableSection {
    fn signatures(&self) -> &[Signature] {
        delegate_signable!(self, inner, inner.signatures())
    }

    fn signatures_mut(&mut self) -> &mut Vec<Signature> {
        delegate_signable!(self, inner, inner.signatures_mut())
    }

    fn context(&self) -> &str {
        delegate_signable!(self, inner, inner.context())
    }

    fn subject_zone(&self) -> &str {
        delegate_signable!(self, inner, inner.subject_zone())
    }

    fn kind(&self) -> SectionKind {
        delegate_signable!(self, inner, inner.kind())
    }
}

//--- From

impl From<Assertion> for SignableSection {
    fn from(section: Assertion) -> Self {
        SignableSection::Assertion(section)
    }
}

impl From<Shard> for SignableSection {
    fn from(section: Shard) -> Self {
        SignableSection::Shard(section)
    }
}

impl From<Pshard> for SignableSection {
    fn from(section: Pshard) -> Self {
        SignableSection::Pshard(section)
    }
}

impl From<Zone> for SignableSection {
    fn from(section: Zone) -> Self {
        SignableSection::Zone(section)
    }
}

impl From<AddressAssertion> for SignableSection {
    fn from(section: AddressAssertion) -> Self {
        SignableSection::AddressAssertion(section)
    }
}

impl From<AddressZone> for SignableSection {
    fn from(section: AddressZone) -> Self {
        SignableSection::AddressZone(section)
    }
}

//------------ Section -------------------------------------------------------

/// Anything that can appear in a message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Section {
    /// A signable section.
    Signable(SignableSection),

    /// A question about a name.
    Query(Query),

    /// A question about an address prefix.
    AddressQuery(AddressQuery),

    /// An out-of-band control message.
    Notification(Notification),
}

impl Section {
    /// Returns the signable section if this is one.
    pub fn as_signable(&self) -> Option<&SignableSection> {
        match self {
            Section::Signable(section) => Some(section),
            _ => None,
        }
    }

    /// Returns the token carried by the section, if any.
    ///
    /// Only queries and notifications carry their own token.
    pub fn token(&self) -> Option<Token> {
        match self {
            Section::Signable(_) => None,
            Section::Query(query) => Some(query.token),
            Section::AddressQuery(query) => Some(query.token),
            Section::Notification(notification) => Some(notification.token),
        }
    }
}

impl From<SignableSection> for Section {
    fn from(section: SignableSection) -> Self {
        Section::Signable(section)
    }
}

impl From<Assertion> for Section {
    fn from(section: Assertion) -> Self {
        Section::Signable(section.into())
    }
}

impl From<Shard> for Section {
    fn from(section: Shard) -> Self {
        Section::Signable(section.into())
    }
}

impl From<Pshard> for Section {
    fn from(section: Pshard) -> Self {
        Section::Signable(section.into())
    }
}

impl From<Zone> for Section {
    fn from(section: Zone) -> Self {
        Section::Signable(section.into())
    }
}

impl From<AddressAssertion> for Section {
    fn from(section: AddressAssertion) -> Self {
        Section::Signable(section.into())
    }
}

impl From<AddressZone> for Section {
    fn from(section: AddressZone) -> Self {
        Section::Signable(section.into())
    }
}

impl From<Query> for Section {
    fn from(section: Query) -> Self {
        Section::Query(section)
    }
}

impl From<AddressQuery> for Section {
    fn from(section: AddressQuery) -> Self {
        Section::AddressQuery(section)
    }
}

impl From<Notification> for Section {
    fn from(section: Notification) -> Self {
        Section::Notification(section)
    }
}

//============ Test ==========================================================
