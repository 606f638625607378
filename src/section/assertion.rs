//! Assertions.

use crate::base::interval::Interval;
use crate::object::{Object, ObjectType};
use crate::section::signature::Signature;

//------------ Assertion -----------------------------------------------------

/// A positive statement about one name in one zone and context.
///
/// An assertion binds a subject name to a list of [objects][Object]. A
/// bare assertion carries its own signatures; an assertion contained in a
/// signed shard or zone may leave its signature list empty and inherit
/// authority from the container.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Assertion {
    /// The name the assertion is about, relative to the subject zone.
    pub subject_name: String,

    /// The zone the subject name belongs to.
    ///
    /// Empty for assertions contained in a shard or zone, which supply
    /// the zone for their content.
    pub subject_zone: String,

    /// The context of the assertion.
    pub context: String,

    /// What is being asserted.
    pub content: Vec<Object>,

    /// The signatures attached to the assertion.
    pub signatures: Vec<Signature>,
}

impl Assertion {
    /// Creates an unsigned assertion.
    pub fn new(
        subject_name: impl Into<String>,
        subject_zone: impl Into<String>,
        context: impl Into<String>,
        content: Vec<Object>,
    ) -> Self {
        Assertion {
            subject_name: subject_name.into(),
            subject_zone: subject_zone.into(),
            context: context.into(),
            content,
            signatures: Vec::new(),
        }
    }

    /// Returns whether the assertion carries an object of the given type.
    pub fn has_object_type(&self, ty: ObjectType) -> bool {
        self.content.iter().any(|obj| obj.object_type() == ty)
    }

    /// Returns the object types present on this assertion.
    pub fn object_types(&self) -> impl Iterator<Item = ObjectType> + '_ {
        self.content.iter().map(Object::object_type)
    }

    /// Returns a copy with subject zone and context filled in.
    ///
    /// Contained assertions omit zone and context; when they are lifted
    /// out of their container for caching they need both restored.
    pub fn with_zone_and_context(&self, zone: &str, context: &str) -> Self {
        let mut res = self.clone();
        if res.subject_zone.is_empty() {
            res.subject_zone = zone.into();
        }
        if res.context.is_empty() {
            res.context = context.into();
        }
        res
    }
}

impl Interval for Assertion {
    fn begin(&self) -> &str {
        &self.subject_name
    }

    fn end(&self) -> &str {
        &self.subject_name
    }
}
