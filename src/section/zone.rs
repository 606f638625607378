//! Zones.

use crate::base::interval::{Interval, TOTAL_INTERVAL_BEGIN, TOTAL_INTERVAL_END};
use crate::section::assertion::Assertion;
use crate::section::shard::Shard;
use crate::section::signature::Signature;

//------------ ZoneContent ---------------------------------------------------

/// An element of a zone's content.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ZoneContent {
    /// A single assertion.
    Assertion(Assertion),

    /// A shard of assertions.
    Shard(Shard),
}

//------------ Zone ----------------------------------------------------------

/// The full authoritative set of a zone in a context.
///
/// A verified zone recursively authorises everything it contains; its
/// content does not need signatures of its own.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Zone {
    /// The name of the zone.
    pub subject_zone: String,

    /// The context of the zone.
    pub context: String,

    /// The content of the zone.
    pub content: Vec<ZoneContent>,

    /// The signatures attached to the zone.
    pub signatures: Vec<Signature>,
}

impl Zone {
    /// Creates an unsigned, empty zone.
    pub fn new(subject_zone: impl Into<String>, context: impl Into<String>) -> Self {
        Zone {
            subject_zone: subject_zone.into(),
            context: context.into(),
            content: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Returns an iterator over all assertions in the zone.
    ///
    /// Assertions contained in shards are included.
    pub fn assertions(&self) -> impl Iterator<Item = &Assertion> {
        self.content.iter().flat_map(|content| match content {
            ZoneContent::Assertion(assertion) => {
                std::slice::from_ref(assertion).iter()
            }
            ZoneContent::Shard(shard) => shard.content.iter(),
        })
    }
}

impl Interval for Zone {
    fn begin(&self) -> &str {
        TOTAL_INTERVAL_BEGIN
    }

    fn end(&self) -> &str {
        TOTAL_INTERVAL_END
    }
}
