//! FETCH reply parsing.
//!
//! These routines interpret the data portion of untagged FETCH lines: the
//! metadata group produced by `FETCH 1:* full` and the `BODY[TEXT]` reply
//! produced by a single-message body fetch.

use crate::parser::lexer::{Lexer, Token};
use crate::parser::{ParseError, ParseResult};

use super::types::{Address, BodyStructure, Envelope, PartFields};

/// Parses the parenthesized field group of an untagged FETCH reply.
///
/// Field order is not significant. `INTERNALDATE`, `RFC822.SIZE`, `FLAGS`
/// and `BODY` are consumed to keep the cursor synchronized but their values
/// are discarded; only `ENVELOPE` contributes to the result. Unknown fields
/// are skipped with a diagnostic.
pub fn parse_fetch_reply(lexer: &mut Lexer<'_>) -> ParseResult<Envelope> {
    lexer.expect(&Token::LParen)?;

    let mut envelope = Envelope::default();
    loop {
        match lexer.peek_nonspace() {
            Some(b')') => {
                lexer.advance();
                break;
            }
            None => {
                return Err(ParseError::Malformed {
                    position: lexer.position(),
                    message: "unterminated fetch reply".into(),
                });
            }
            Some(_) => {}
        }

        let field = lexer.read_atom()?;
        match field.to_ascii_uppercase().as_str() {
            "INTERNALDATE" => {
                let _date = lexer.read_string()?;
            }
            "RFC822.SIZE" => {
                let _size = lexer.read_number()?;
            }
            "FLAGS" => skip_flag_list(lexer)?,
            "ENVELOPE" => envelope = parse_envelope(lexer)?,
            "BODY" => {
                let _structure = parse_body_structure(lexer)?;
            }
            other => {
                tracing::debug!(field = other, "unknown fetch field, skipping");
                skip_field_value(lexer)?;
            }
        }
    }
    Ok(envelope)
}

/// Parses the data portion of a `FETCH <id> BODY[TEXT]` reply and returns
/// the body text bytes.
pub fn parse_body_reply(lexer: &mut Lexer<'_>) -> ParseResult<Vec<u8>> {
    lexer.expect(&Token::LParen)?;

    let keyword = lexer.read_atom()?;
    if !keyword.eq_ignore_ascii_case("BODY") {
        return Err(ParseError::Malformed {
            position: lexer.position(),
            message: "expected BODY".into(),
        });
    }

    lexer.expect(&Token::LBracket)?;
    let section = lexer.read_atom()?;
    if !section.eq_ignore_ascii_case("TEXT") {
        return Err(ParseError::Malformed {
            position: lexer.position(),
            message: "expected TEXT".into(),
        });
    }
    lexer.expect(&Token::RBracket)?;

    // Anything after the string (trailing fields, the closing paren) is
    // irrelevant once the body is in hand.
    lexer.read_string_bytes()
}

/// Parses the fixed 10-field envelope structure.
///
/// All ten fields are read even when ignored downstream so the cursor stays
/// synchronized with the rest of the line.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> ParseResult<Envelope> {
    lexer.expect(&Token::LParen)?;

    let mut envelope = Envelope {
        date: lexer.read_string()?,
        subject: lexer.read_string()?,
        ..Envelope::default()
    };
    envelope.from = parse_address_list(lexer)?;
    envelope.sender = parse_address_list(lexer)?;
    envelope.reply_to = parse_address_list(lexer)?;
    envelope.to = parse_address_list(lexer)?;
    envelope.cc = parse_address_list(lexer)?;
    envelope.bcc = parse_address_list(lexer)?;
    envelope.parent_id = lexer.read_string()?;
    envelope.message_id = lexer.read_string()?;

    lexer.expect(&Token::RParen)?;
    Ok(envelope)
}

/// Parses `NIL` or a parenthesized sequence of address 4-tuples.
pub fn parse_address_list(lexer: &mut Lexer<'_>) -> ParseResult<Vec<Address>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut addresses = Vec::new();
            loop {
                match lexer.peek_nonspace() {
                    Some(b')') => {
                        lexer.advance();
                        break;
                    }
                    Some(b'(') => addresses.push(parse_address(lexer)?),
                    _ => {
                        return Err(ParseError::Malformed {
                            position: lexer.position(),
                            message: "expected '(' or ')' in address list".into(),
                        });
                    }
                }
            }
            Ok(addresses)
        }
        token => Err(ParseError::Malformed {
            position: lexer.position(),
            message: format!("expected an address list or NIL, got {}", token.describe()),
        }),
    }
}

/// Parses one `(name adl mailbox host)` tuple.
fn parse_address(lexer: &mut Lexer<'_>) -> ParseResult<Address> {
    lexer.expect(&Token::LParen)?;

    let name = lexer.read_string()?;
    let _adl = lexer.read_string()?;
    let mailbox = lexer.read_string()?;
    let host = lexer.read_string()?;

    lexer.expect(&Token::RParen)?;
    Ok(Address {
        name,
        email: format!("{mailbox}@{host}"),
    })
}

/// Parses a body-structure tree: a multipart container or a single leaf
/// part with its type-dependent trailing fields.
pub fn parse_body_structure(lexer: &mut Lexer<'_>) -> ParseResult<BodyStructure> {
    lexer.expect(&Token::LParen)?;

    if lexer.peek_nonspace() == Some(b'(') {
        // A sequence of nested body structures followed by the subtype.
        let mut parts = Vec::new();
        while lexer.peek_nonspace() == Some(b'(') {
            parts.push(parse_body_structure(lexer)?);
        }
        let subtype = lexer.read_string()?;
        lexer.expect(&Token::RParen)?;
        return Ok(BodyStructure::Multipart { parts, subtype });
    }

    let fields = PartFields {
        media_type: lexer.read_string()?,
        subtype: lexer.read_string()?,
        params: parse_param_list(lexer)?,
        id: lexer.read_string()?,
        description: lexer.read_string()?,
        encoding: lexer.read_string()?,
        size: lexer.read_number()?,
    };

    let part = if fields.media_type.eq_ignore_ascii_case("TEXT") {
        let lines = lexer.read_number()?;
        BodyStructure::Text { fields, lines }
    } else if fields.media_type.eq_ignore_ascii_case("MESSAGE")
        && fields.subtype.eq_ignore_ascii_case("RFC822")
    {
        let envelope = Box::new(parse_envelope(lexer)?);
        let body = Box::new(parse_body_structure(lexer)?);
        let lines = lexer.read_number()?;
        BodyStructure::Message {
            fields,
            envelope,
            body,
            lines,
        }
    } else {
        BodyStructure::Basic(fields)
    };

    lexer.expect(&Token::RParen)?;
    Ok(part)
}

/// Parses `NIL` or a `(key value ...)` parameter list.
fn parse_param_list(lexer: &mut Lexer<'_>) -> ParseResult<Vec<(String, String)>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut params = Vec::new();
            loop {
                if lexer.peek_nonspace() == Some(b')') {
                    lexer.advance();
                    break;
                }
                let key = lexer.read_string()?;
                let value = lexer.read_string()?;
                params.push((key, value));
            }
            Ok(params)
        }
        token => Err(ParseError::Malformed {
            position: lexer.position(),
            message: format!("expected a parameter list or NIL, got {}", token.describe()),
        }),
    }
}

/// Skips a parenthesized flag list without interpreting it.
fn skip_flag_list(lexer: &mut Lexer<'_>) -> ParseResult<()> {
    lexer.expect(&Token::LParen)?;
    loop {
        match lexer.peek_nonspace() {
            Some(b')') => {
                lexer.advance();
                return Ok(());
            }
            None => {
                return Err(ParseError::Malformed {
                    position: lexer.position(),
                    message: "unterminated flag list".into(),
                });
            }
            Some(_) => {
                lexer.read_atom()?;
            }
        }
    }
}

/// Skips the value of an unknown fetch field: either one token or one
/// balanced parenthesized group.
fn skip_field_value(lexer: &mut Lexer<'_>) -> ParseResult<()> {
    let mut depth = 0usize;
    loop {
        match lexer.peek_nonspace() {
            Some(b'(') => {
                lexer.advance();
                depth += 1;
            }
            Some(b')') => {
                if depth == 0 {
                    // Closing paren of the enclosing fetch group.
                    return Ok(());
                }
                lexer.advance();
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            None => return Ok(()),
            Some(_) => {
                lexer.next_token()?;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
    }
}
