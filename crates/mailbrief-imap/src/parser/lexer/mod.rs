//! Lexer for IMAP server responses.
//!
//! Tokenizes one framed region of the receive buffer. Unlike a general
//! streaming lexer it knows about exactly one incompleteness case: a literal
//! whose declared byte length runs past the end of the region, which is
//! reported as [`ParseError::Incomplete`] so the framer can retry once the
//! payload has arrived.

mod token;

pub use token::Token;

use super::{ParseError, ParseResult};

/// Cursor over one framed region of input.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given region.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the current byte position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Peeks at the current byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Advances by one byte and returns it.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skips any run of blank characters.
    pub fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    /// Skips blanks, then peeks at the next significant byte.
    pub fn peek_nonspace(&mut self) -> Option<u8> {
        self.skip_spaces();
        self.peek()
    }

    /// Reads the next token, skipping leading blanks.
    pub fn next_token(&mut self) -> ParseResult<Token<'a>> {
        self.skip_spaces();
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        match byte {
            b'(' => {
                self.advance();
                Ok(Token::LParen)
            }
            b')' => {
                self.advance();
                Ok(Token::RParen)
            }
            b'[' => {
                self.advance();
                Ok(Token::LBracket)
            }
            b']' => {
                self.advance();
                Ok(Token::RBracket)
            }
            b'*' if !self
                .input
                .get(self.pos + 1)
                .copied()
                .is_some_and(is_atom_char) =>
            {
                self.advance();
                Ok(Token::Asterisk)
            }
            b'"' => self.read_quoted(),
            b'{' => self.read_literal(),
            _ if is_atom_char(byte) => self.read_atom_run(),
            _ => Err(self.malformed(format!("unexpected character {byte:#04x}"))),
        }
    }

    /// Reads a quoted string with `\"` and `\\` escapes.
    fn read_quoted(&mut self) -> ParseResult<Token<'a>> {
        self.advance(); // opening quote

        let mut out = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    // Escaped char, used by Gmail's IMAP server
                    Some(c @ (b'"' | b'\\')) => out.push(c),
                    Some(_) => return Err(self.malformed("invalid escaped character")),
                    None => return Err(self.malformed("unterminated quoted string")),
                },
                Some(c) => out.push(c),
                None => return Err(self.malformed("unterminated quoted string")),
            }
        }
        Ok(Token::QuotedString(out))
    }

    /// Reads a literal `{n}` CRLF plus n raw bytes.
    ///
    /// The CRLF after the length prefix is the line terminator the framer
    /// scanned past, so reaching end of region anywhere before the payload is
    /// fully buffered yields `Incomplete`, not a grammar error.
    fn read_literal(&mut self) -> ParseResult<Token<'a>> {
        self.advance(); // {

        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        if self.pos == start {
            return Err(self.malformed("expected a literal length"));
        }
        let digits = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.malformed("invalid literal length"))?;
        let length: usize = digits
            .parse()
            .map_err(|_| self.malformed("literal length out of range"))?;

        if self.advance() != Some(b'}') {
            return Err(self.malformed("expected '}' after literal length"));
        }

        // Only blanks may sit between the prefix and the CRLF.
        loop {
            match self.peek() {
                None => return Err(ParseError::Incomplete),
                Some(b'\r') => break,
                Some(b' ' | b'\t') => {
                    self.advance();
                }
                Some(_) => return Err(self.malformed("junk before CRLF in literal")),
            }
        }
        self.advance(); // CR
        match self.advance() {
            Some(b'\n') => {}
            Some(_) => return Err(self.malformed("expected LF after CR")),
            None => return Err(ParseError::Incomplete),
        }

        if self.input.len() - self.pos < length {
            return Err(ParseError::Incomplete);
        }
        let data = self.input[self.pos..self.pos + length].to_vec();
        self.pos += length;
        Ok(Token::Literal(data))
    }

    /// Reads an atom run, classifying all-digit runs as numbers.
    fn read_atom_run(&mut self) -> ParseResult<Token<'a>> {
        let start = self.pos;
        let mut all_digits = true;
        while let Some(b) = self.peek() {
            if !is_atom_char(b) {
                break;
            }
            if !b.is_ascii_digit() {
                all_digits = false;
            }
            self.advance();
        }

        let s = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.malformed("invalid UTF-8 in atom"))?;

        if all_digits {
            let n: u32 = s
                .parse()
                .map_err(|_| self.malformed("number out of range"))?;
            Ok(Token::Number(n))
        } else if s.eq_ignore_ascii_case("NIL") {
            Ok(Token::Nil)
        } else {
            Ok(Token::Atom(s))
        }
    }

    /// Expects a token of the given shape.
    pub fn expect(&mut self, expected: &Token<'_>) -> ParseResult<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(expected) {
            Ok(())
        } else {
            Err(self.malformed(format!(
                "expected {}, got {}",
                expected.describe(),
                token.describe()
            )))
        }
    }

    /// Reads an atom string.
    pub fn read_atom(&mut self) -> ParseResult<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            Token::Nil => Ok("NIL"),
            token => Err(self.malformed(format!("expected an atom, got {}", token.describe()))),
        }
    }

    /// Reads a decimal number.
    pub fn read_number(&mut self) -> ParseResult<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.malformed(format!("expected a number, got {}", token.describe()))),
        }
    }

    /// Reads a string production as text. NIL yields the empty string;
    /// non-UTF-8 content is replaced rather than rejected (transcoding is a
    /// collaborator's concern).
    pub fn read_string(&mut self) -> ParseResult<String> {
        Ok(String::from_utf8_lossy(&self.read_string_bytes()?).into_owned())
    }

    /// Reads a string production as raw bytes. NIL yields an empty buffer.
    pub fn read_string_bytes(&mut self) -> ParseResult<Vec<u8>> {
        match self.next_token()? {
            Token::Nil => Ok(Vec::new()),
            Token::QuotedString(v) | Token::Literal(v) => Ok(v),
            token => Err(self.malformed(format!(
                "expected a string or NIL, got {}",
                token.describe()
            ))),
        }
    }

    /// Consumes and returns the rest of the region as display text.
    pub fn rest_text(&mut self) -> String {
        self.skip_spaces();
        let text = String::from_utf8_lossy(&self.input[self.pos..]).into_owned();
        self.pos = self.input.len();
        text
    }

    fn malformed(&self, message: impl Into<String>) -> ParseError {
        ParseError::Malformed {
            position: self.pos,
            message: message.into(),
        }
    }
}

/// Returns true if the byte can appear in an atom.
///
/// Anything that is not whitespace or a structural character counts; this is
/// looser than the RFC grammar but matches what servers actually emit for
/// flags (`\Seen`) and message ids.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    !matches!(
        b,
        b' ' | b'\t' | b'\r' | b'\n' | b'(' | b')' | b'{' | b'[' | b']' | b'"'
    )
}
