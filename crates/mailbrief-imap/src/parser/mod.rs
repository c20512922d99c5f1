//! IMAP response grammar parser.
//!
//! A sans-I/O recursive-descent parser over one framed region of the receive
//! buffer (a CRLF-terminated line, plus any literal payload bytes that follow
//! it). The parser never touches the network; the framer decides which byte
//! range it sees.
//!
//! # Parse outcomes
//!
//! Every routine returns `Result<T, ParseError>` with two failure cases that
//! callers branch on explicitly:
//!
//! - [`ParseError::Incomplete`]: the grammar requires bytes that are not yet
//!   buffered. This is a control signal, not an error; it can only arise from
//!   the literal-string production (`{N}` followed by N raw bytes). The
//!   framer reacts by re-parsing the same region once more data arrives.
//! - [`ParseError::Malformed`]: the input does not match the grammar. The
//!   diagnostic names the expected token and the byte position.

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{
    Address, BodyStructure, Envelope, PartFields, ReplyLine, TaggedReply, parse_body_reply,
    parse_body_structure, parse_envelope, parse_fetch_reply, parse_reply_line,
};

use crate::Error;

/// Failure cases of a parse routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The grammar requires bytes not yet buffered (literal payload short).
    Incomplete,
    /// The input does not match the grammar.
    Malformed {
        /// Byte position in the parsed region.
        position: usize,
        /// Description naming the expected token.
        message: String,
    },
}

impl ParseError {
    /// Returns true for the needs-more-input control signal.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incomplete => write!(f, "need more input"),
            Self::Malformed { position, message } => {
                write!(f, "malformed at {position}: {message}")
            }
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        match err {
            // Surfacing Incomplete as a hard error means a caller failed to
            // branch on it; keep the diagnostic honest.
            ParseError::Incomplete => Self::Protocol("incomplete response escaped framer".into()),
            ParseError::Malformed { position, message } => Self::Parse { position, message },
        }
    }
}

/// Result of a parse routine.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
