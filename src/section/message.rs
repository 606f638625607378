//! Messages.

use crate::base::capability::Capability;
use crate::base::token::Token;
use crate::section::Section;

//------------ Message -------------------------------------------------------

/// A RAINS message.
///
/// A message carries any number of sections plus the sender's
/// capabilities and a token correlating it with the exchange it belongs
/// to. Messages themselves can be signed; message signatures cover the
/// token and capabilities as well as the content.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    /// The token of the exchange.
    pub token: Token,

    /// The sender's capabilities, or a hash of a previously sent set.
    pub capabilities: Vec<Capability>,

    /// The sections the message carries.
    pub content: Vec<Section>,

    /// The signatures attached to the message as a whole.
    pub signatures: Vec<crate::section::Signature>,
}

impl Message {
    /// Creates an empty message with a fresh token.
    pub fn new() -> Self {
        Message {
            token: Token::mint(),
            capabilities: Vec::new(),
            content: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Creates an empty message with the given token.
    pub fn with_token(token: Token) -> Self {
        Message {
            token,
            capabilities: Vec::new(),
            content: Vec::new(),
            signatures: Vec::new(),
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}
