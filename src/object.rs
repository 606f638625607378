//! Objects.
//!
//! An object is the typed payload of an assertion: the thing being
//! asserted about a name. Thirteen object types are recognised, from
//! plain IP addresses to the delegation keys that anchor the trust
//! hierarchy.

use crate::base::algo::HashAlgo;
use crate::keys::PublicKey;
use bytes::Bytes;
use core::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

//------------ ObjectType ----------------------------------------------------

/// The type of an object.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ObjectType {
    /// A name associated with the subject.
    Name,

    /// An IPv4 address of the subject.
    Ip4,

    /// An IPv6 address of the subject.
    Ip6,

    /// The name of a RAINS server answering for the subject zone.
    Redirection,

    /// A public key delegated to the subject zone.
    Delegation,

    /// An expression constraining names in the subject zone.
    Nameset,

    /// A certificate description for the subject.
    CertInfo,

    /// A service description for the subject.
    ServiceInfo,

    /// The name of the subject's registrar.
    Registrar,

    /// Registrant information for the subject.
    Registrant,

    /// A key of the subject's RAINS infrastructure.
    InfraKey,

    /// A key in a key space outside of RAINS.
    ExtraKey,

    /// The subject zone's next delegation key.
    NextKey,
}

impl ObjectType {
    /// All object types in their canonical order.
    pub const ALL: [ObjectType; 13] = [
        ObjectType::Name,
        ObjectType::Ip4,
        ObjectType::Ip6,
        ObjectType::Redirection,
        ObjectType::Delegation,
        ObjectType::Nameset,
        ObjectType::CertInfo,
        ObjectType::ServiceInfo,
        ObjectType::Registrar,
        ObjectType::Registrant,
        ObjectType::InfraKey,
        ObjectType::ExtraKey,
        ObjectType::NextKey,
    ];

    /// Returns the zone-file token of the type.
    pub fn token(self) -> &'static str {
        match self {
            ObjectType::Name => ":name:",
            ObjectType::Ip4 => ":ip4:",
            ObjectType::Ip6 => ":ip6:",
            ObjectType::Redirection => ":redir:",
            ObjectType::Delegation => ":deleg:",
            ObjectType::Nameset => ":nameset:",
            ObjectType::CertInfo => ":cert:",
            ObjectType::ServiceInfo => ":srv:",
            ObjectType::Registrar => ":regr:",
            ObjectType::Registrant => ":regt:",
            ObjectType::InfraKey => ":infra:",
            ObjectType::ExtraKey => ":extra:",
            ObjectType::NextKey => ":next:",
        }
    }

    /// Returns the type for a zone-file token.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| ty.token() == token)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.token())
    }
}

//------------ ProtocolType --------------------------------------------------

/// The transport protocol a certificate applies to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ProtocolType {
    /// The certificate applies to any connection to the subject.
    Unspecified,

    /// The certificate applies to TLS over TCP.
    Tls,
}

impl ProtocolType {
    /// Returns the zone-file token of the protocol type.
    pub fn token(self) -> &'static str {
        match self {
            ProtocolType::Unspecified => ":unspecified:",
            ProtocolType::Tls => ":tls:",
        }
    }

    /// Returns the protocol type for a zone-file token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            ":unspecified:" => Some(ProtocolType::Unspecified),
            ":tls:" => Some(ProtocolType::Tls),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.token())
    }
}

//------------ CertificateUsage ----------------------------------------------

/// The role of a certificate.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CertificateUsage {
    /// The certificate is a trust anchor.
    TrustAnchor,

    /// The certificate identifies the end entity itself.
    EndEntity,
}

impl CertificateUsage {
    /// Returns the zone-file token of the usage.
    pub fn token(self) -> &'static str {
        match self {
            CertificateUsage::TrustAnchor => ":trustAnchor:",
            CertificateUsage::EndEntity => ":endEntity:",
        }
    }

    /// Returns the usage for a zone-file token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            ":trustAnchor:" => Some(CertificateUsage::TrustAnchor),
            ":endEntity:" => Some(CertificateUsage::EndEntity),
            _ => None,
        }
    }
}

impl fmt::Display for CertificateUsage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.token())
    }
}

//------------ Certificate ---------------------------------------------------

/// A certificate description.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Certificate {
    /// The protocol the certificate applies to.
    pub protocol_type: ProtocolType,

    /// The role of the certificate.
    pub usage: CertificateUsage,

    /// The hash algorithm `data` was produced with.
    pub hash_algo: HashAlgo,

    /// The certificate or certificate hash.
    pub data: Bytes,
}

//------------ ServiceInfo ---------------------------------------------------

/// Connection information for a named service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceInfo {
    /// The host providing the service.
    pub name: String,

    /// The port the service listens on.
    pub port: u16,

    /// The priority of this entry among its siblings, smaller is better.
    pub priority: u32,
}

//------------ NameObject ----------------------------------------------------

/// Another name for the subject, constrained to a set of object types.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NameObject {
    /// The other name.
    pub name: String,

    /// The object types for which the name is valid.
    pub types: Vec<ObjectType>,
}

//------------ Object --------------------------------------------------------

/// The typed payload of an assertion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Object {
    /// A name associated with the subject.
    Name(NameObject),

    /// An IPv4 address of the subject.
    Ip4(Ipv4Addr),

    /// An IPv6 address of the subject.
    Ip6(Ipv6Addr),

    /// The name of a RAINS server answering for the subject zone.
    Redirection(String),

    /// A public key delegated to the subject zone.
    Delegation(PublicKey),

    /// An expression constraining names in the subject zone.
    Nameset(String),

    /// A certificate description for the subject.
    CertInfo(Certificate),

    /// A service description for the subject.
    ServiceInfo(ServiceInfo),

    /// The name of the subject's registrar.
    Registrar(String),

    /// Registrant information for the subject.
    Registrant(String),

    /// A key of the subject's RAINS infrastructure.
    InfraKey(PublicKey),

    /// A key in a key space outside of RAINS.
    ExtraKey(PublicKey),

    /// The subject zone's next delegation key.
    NextKey(PublicKey),
}

impl Object {
    /// Returns the type of the object.
    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Name(_) => ObjectType::Name,
            Object::Ip4(_) => ObjectType::Ip4,
            Object::Ip6(_) => ObjectType::Ip6,
            Object::Redirection(_) => ObjectType::Redirection,
            Object::Delegation(_) => ObjectType::Delegation,
            Object::Nameset(_) => ObjectType::Nameset,
            Object::CertInfo(_) => ObjectType::CertInfo,
            Object::ServiceInfo(_) => ObjectType::ServiceInfo,
            Object::Registrar(_) => ObjectType::Registrar,
            Object::Registrant(_) => ObjectType::Registrant,
            Object::InfraKey(_) => ObjectType::InfraKey,
            Object::ExtraKey(_) => ObjectType::ExtraKey,
            Object::NextKey(_) => ObjectType::NextKey,
        }
    }

    /// Returns the delegated public key if this is a delegation object.
    pub fn as_delegation(&self) -> Option<&PublicKey> {
        match self {
            Object::Delegation(key) => Some(key),
            _ => None,
        }
    }
}

//============ Test ==========================================================
