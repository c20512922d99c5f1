//! Outbound command building.
//!
//! Commands go on the wire as `<tag> <command>\r\n` where tags are decimal
//! integers assigned sequentially from 1 at send time.

mod tags;

pub use tags::TagWindow;

use bytes::BytesMut;

/// The command subset this client issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `LOGIN <user> <pass>`.
    Login {
        /// Account user name.
        user: &'a str,
        /// Account password.
        pass: &'a str,
    },
    /// `SELECT <mailbox>`.
    Select(&'a str),
    /// `FETCH 1:* full` — metadata for every message in the mailbox.
    FetchAll,
    /// `FETCH <id> BODY[TEXT]` — the text part of one message.
    FetchBody(u32),
}

impl Command<'_> {
    /// Serializes the tagged command line into the outbound buffer.
    pub fn write(&self, tag: u32, buf: &mut BytesMut) {
        let mut line = Vec::new();
        line.extend_from_slice(tag.to_string().as_bytes());
        line.push(b' ');
        match self {
            Self::Login { user, pass } => {
                line.extend_from_slice(b"LOGIN ");
                write_astring(&mut line, user);
                line.push(b' ');
                write_astring(&mut line, pass);
            }
            Self::Select(mailbox) => {
                line.extend_from_slice(b"SELECT ");
                write_astring(&mut line, mailbox);
            }
            Self::FetchAll => line.extend_from_slice(b"FETCH 1:* full"),
            Self::FetchBody(id) => {
                line.extend_from_slice(format!("FETCH {id} BODY[TEXT]").as_bytes());
            }
        }
        line.extend_from_slice(b"\r\n");
        buf.extend_from_slice(&line);
    }

    /// Command keyword, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "LOGIN",
            Self::Select(_) => "SELECT",
            Self::FetchAll | Self::FetchBody(_) => "FETCH",
        }
    }
}

/// Writes an astring: bare when safe, quoted with escapes otherwise.
fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b == 0x7F
}
