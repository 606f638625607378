//! Decoder errors.

use core::fmt;

//------------ DecodeError ---------------------------------------------------

/// An error found while decoding a zone file.
///
/// The decoder never gives up on the whole input: it records the error,
/// skips the offending tokens and resumes at the next recognisable
/// position. The caller decides whether a decode with errors is usable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// The token stream does not follow the grammar.
    Syntax {
        /// The line the offending token is on.
        line: usize,

        /// What was found, empty at end of input.
        got: String,

        /// What the parser was looking for.
        expected: &'static str,
    },

    /// A token is grammatically fine but semantically off.
    Semantic {
        /// The line the offending token is on.
        line: usize,

        /// What is wrong.
        msg: String,
    },
}

impl DecodeError {
    /// Creates a semantic error.
    pub fn semantic(line: usize, msg: impl Into<String>) -> Self {
        DecodeError::Semantic {
            line,
            msg: msg.into(),
        }
    }

    /// Returns the line the error was found on.
    pub fn line(&self) -> usize {
        match self {
            DecodeError::Syntax { line, .. } => *line,
            DecodeError::Semantic { line, .. } => *line,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::Syntax {
                line,
                got,
                expected,
            } => {
                if got.is_empty() {
                    write!(
                        f,
                        "syntax error: line {}: unexpected end of input, \
                         expected {}",
                        line, expected
                    )
                } else {
                    write!(
                        f,
                        "syntax error: line {}: found {:?}, expected {}",
                        line, got, expected
                    )
                }
            }
            DecodeError::Semantic { line, msg } => {
                write!(f, "semantic error: line {}: {}", line, msg)
            }
        }
    }
}

impl std::error::Error for DecodeError {}
