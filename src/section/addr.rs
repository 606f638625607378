//! Address sections.
//!
//! Address assertions and address zones are the reverse-lookup analogues
//! of assertions and zones: they are keyed by a CIDR prefix instead of a
//! name.

use crate::base::prefix::Prefix;
use crate::object::Object;
use crate::section::signature::Signature;

//------------ AddressAssertion ----------------------------------------------

/// A positive statement about an address prefix in a context.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AddressAssertion {
    /// The prefix the assertion is about.
    pub subject_addr: Prefix,

    /// The context of the assertion.
    pub context: String,

    /// What is being asserted.
    pub content: Vec<Object>,

    /// The signatures attached to the assertion.
    pub signatures: Vec<Signature>,
}

impl AddressAssertion {
    /// Creates an unsigned address assertion.
    pub fn new(subject_addr: Prefix, context: impl Into<String>, content: Vec<Object>) -> Self {
        AddressAssertion {
            subject_addr,
            context: context.into(),
            content,
            signatures: Vec::new(),
        }
    }
}

//------------ AddressZone ---------------------------------------------------

/// The authoritative set of address assertions under a prefix.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AddressZone {
    /// The prefix the zone covers.
    pub subject_addr: Prefix,

    /// The context of the zone.
    pub context: String,

    /// The address assertions inside the prefix.
    pub content: Vec<AddressAssertion>,

    /// The signatures attached to the zone.
    pub signatures: Vec<Signature>,
}

impl AddressZone {
    /// Creates an unsigned, empty address zone.
    pub fn new(subject_addr: Prefix, context: impl Into<String>) -> Self {
        AddressZone {
            subject_addr,
            context: context.into(),
            content: Vec::new(),
            signatures: Vec::new(),
        }
    }
}
