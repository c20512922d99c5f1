//! IMAP token types.

/// Token types produced by the lexer.
///
/// Leading whitespace is consumed before every token, so the grammar
/// routines never see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom (unquoted run without whitespace or structural characters).
    Atom(&'a str),
    /// Quoted string with backslash escapes resolved.
    QuotedString(Vec<u8>),
    /// Literal string `{n}` CRLF followed by n raw bytes.
    Literal(Vec<u8>),
    /// Decimal number.
    Number(u32),
    /// Opening parenthesis.
    LParen,
    /// Closing parenthesis.
    RParen,
    /// Opening bracket.
    LBracket,
    /// Closing bracket.
    RBracket,
    /// Asterisk (untagged response prefix).
    Asterisk,
    /// NIL keyword.
    Nil,
    /// End of the framed region.
    Eof,
}

impl Token<'_> {
    /// Short grammar name used in diagnostics.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Token::Atom(_) => "atom",
            Token::QuotedString(_) => "quoted string",
            Token::Literal(_) => "literal",
            Token::Number(_) => "number",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::LBracket => "'['",
            Token::RBracket => "']'",
            Token::Asterisk => "'*'",
            Token::Nil => "NIL",
            Token::Eof => "end of line",
        }
    }
}
