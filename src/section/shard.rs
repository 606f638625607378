//! Shards.

use crate::base::interval::Interval;
use crate::section::assertion::Assertion;
use crate::section::signature::Signature;

//------------ Shard ---------------------------------------------------------

/// An authoritative set of assertions covering a lexicographic range.
///
/// A shard states that its content is *all* the assertions the authority
/// has for names strictly between `range_from` and `range_to`. The
/// absence of a name from a verified shard covering it therefore proves
/// nonexistence.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Shard {
    /// The zone the shard belongs to.
    pub subject_zone: String,

    /// The context of the shard.
    pub context: String,

    /// The exclusive lower bound of the covered range, `<` for open.
    pub range_from: String,

    /// The exclusive upper bound of the covered range, `>` for open.
    pub range_to: String,

    /// All assertions for names inside the range.
    pub content: Vec<Assertion>,

    /// The signatures attached to the shard.
    pub signatures: Vec<Signature>,
}

impl Shard {
    /// Creates an unsigned, empty shard covering a range.
    pub fn new(
        subject_zone: impl Into<String>,
        context: impl Into<String>,
        range_from: impl Into<String>,
        range_to: impl Into<String>,
    ) -> Self {
        Shard {
            subject_zone: subject_zone.into(),
            context: context.into(),
            range_from: range_from.into(),
            range_to: range_to.into(),
            content: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Returns whether all contained assertions lie inside the range.
    pub fn content_in_range(&self) -> bool {
        self.content
            .iter()
            .all(|a| self.contains_name(&a.subject_name))
    }
}

impl Interval for Shard {
    fn begin(&self) -> &str {
        &self.range_from
    }

    fn end(&self) -> &str {
        &self.range_to
    }
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn range_check() {
        let mut shard = Shard::new("ch", ".", "aaa", "zzz");
        shard
            .content
            .push(Assertion::new("ethz", "", "", Vec::new()));
        assert!(shard.content_in_range());
        shard
            .content
            .push(Assertion::new("zzzz", "", "", Vec::new()));
        assert!(!shard.content_in_range());
    }
}
