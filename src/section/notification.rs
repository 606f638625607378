//! Notifications.

use crate::base::token::Token;
use core::fmt;

//------------ NotificationType ----------------------------------------------

/// The kind of a notification, loosely modelled on HTTP status codes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NotificationType {
    /// A connection keep-alive.
    Heartbeat,

    /// The peer advertised a capability hash we do not know.
    CapHashNotKnown,

    /// The received message was malformed.
    BadMessage,

    /// The received message was inconsistent.
    RcvInconsistentMsg,

    /// No assertion exists for the queried name.
    NoAssertionsExist,

    /// The received message exceeded the size limit.
    MsgTooLarge,

    /// An unspecified server error occurred.
    ServerError,

    /// The server does not support the requested capability.
    ServerNotCapable,

    /// The server has no assertion available to answer with.
    NoAssertionAvail,
}

impl NotificationType {
    /// Returns the numeric code of the notification type.
    pub fn code(self) -> u16 {
        match self {
            NotificationType::Heartbeat => 100,
            NotificationType::CapHashNotKnown => 399,
            NotificationType::BadMessage => 400,
            NotificationType::RcvInconsistentMsg => 403,
            NotificationType::NoAssertionsExist => 404,
            NotificationType::MsgTooLarge => 413,
            NotificationType::ServerError => 500,
            NotificationType::ServerNotCapable => 501,
            NotificationType::NoAssertionAvail => 504,
        }
    }

    /// Returns the notification type for a numeric code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            100 => Some(NotificationType::Heartbeat),
            399 => Some(NotificationType::CapHashNotKnown),
            400 => Some(NotificationType::BadMessage),
            403 => Some(NotificationType::RcvInconsistentMsg),
            404 => Some(NotificationType::NoAssertionsExist),
            413 => Some(NotificationType::MsgTooLarge),
            500 => Some(NotificationType::ServerError),
            501 => Some(NotificationType::ServerNotCapable),
            504 => Some(NotificationType::NoAssertionAvail),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

//------------ Notification --------------------------------------------------

/// An out-of-band message about the state of an exchange.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    /// The token of the exchange the notification refers to.
    pub token: Token,

    /// What happened.
    pub notification_type: NotificationType,

    /// Free-form additional data.
    pub data: String,
}

impl Notification {
    /// Creates a notification without additional data.
    pub fn new(token: Token, notification_type: NotificationType) -> Self {
        Notification {
            token,
            notification_type,
            data: String::new(),
        }
    }
}
