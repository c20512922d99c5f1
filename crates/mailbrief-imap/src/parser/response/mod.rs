//! Response line classification and data parsing.

mod fetch;
mod types;

pub use fetch::{
    parse_address_list, parse_body_reply, parse_body_structure, parse_envelope, parse_fetch_reply,
};
pub use types::{Address, BodyStructure, Envelope, PartFields};

use crate::parser::lexer::{Lexer, Token};
use crate::parser::{ParseError, ParseResult};

/// A tagged command-completion reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedReply {
    /// The decimal tag echoed from the command.
    pub tag: u32,
    /// True when the status atom was `OK`.
    pub ok: bool,
    /// The raw status atom (`OK`, `NO`, `BAD`, ...).
    pub status: String,
    /// Remaining human-readable text.
    pub text: String,
}

/// The leading classification of one response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyLine {
    /// Untagged server data; the lexer is left positioned at the data.
    Untagged,
    /// Tagged command completion, fully consumed.
    Tagged(TaggedReply),
}

/// Classifies a response line by its leading token.
///
/// Untagged lines keep their data unconsumed so the session can parse it
/// according to its current state.
pub fn parse_reply_line(lexer: &mut Lexer<'_>) -> ParseResult<ReplyLine> {
    match lexer.next_token()? {
        Token::Asterisk => Ok(ReplyLine::Untagged),
        Token::Number(tag) => {
            let status = lexer.read_atom()?.to_string();
            let text = lexer.rest_text();
            let ok = status.eq_ignore_ascii_case("OK");
            Ok(ReplyLine::Tagged(TaggedReply {
                tag,
                ok,
                status,
                text,
            }))
        }
        token => Err(ParseError::Malformed {
            position: lexer.position(),
            message: format!("expected '*' or a numeric tag, got {}", token.describe()),
        }),
    }
}
