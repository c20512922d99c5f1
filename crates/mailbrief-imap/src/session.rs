//! Protocol state machine for one account connection.
//!
//! A [`Session`] owns no socket. It consumes framed reply lines, emits
//! command bytes into an outbound buffer supplied by the caller, and tracks
//! where the conversation stands. Keeping it transport-free means the whole
//! login/select/fetch flow is testable against byte slices.

use bytes::BytesMut;

use crate::command::{Command, TagWindow};
use crate::connection::LineOutcome;
use crate::handler::{AccountId, MailHandler};
use crate::parser::{
    Lexer, ParseError, ParseResult, ReplyLine, TaggedReply, Token, parse_body_reply,
    parse_fetch_reply, parse_reply_line,
};
use crate::{Error, Result};

/// Only mailbox this client ever opens.
const MAILBOX: &str = "INBOX";

/// Where the conversation stands.
///
/// Every state except `Idle` and `Connecting` has exactly one command
/// outstanding; its tagged reply drives the next transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Mailbox is open and quiescent; body fetches may be issued.
    Idle,
    /// TCP/TLS establishment is in flight; nothing sent yet.
    Connecting,
    /// LOGIN sent, awaiting its tagged reply.
    Authenticating,
    /// SELECT sent, awaiting its tagged reply.
    Selecting,
    /// `FETCH 1:* full` sent; untagged FETCH lines carry envelopes.
    FetchingSummaries,
    /// `FETCH <id> BODY[TEXT]` sent; one untagged line carries the body.
    FetchingBody,
}

impl SessionState {
    /// Short name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Selecting => "selecting",
            Self::FetchingSummaries => "fetching-summaries",
            Self::FetchingBody => "fetching-body",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// State machine for one account's IMAP conversation.
pub struct Session<H: MailHandler> {
    account: AccountId,
    username: String,
    password: String,
    state: SessionState,
    tags: TagWindow,
    handler: H,
}

// Manual impl so the password never lands in logs.
impl<H: MailHandler> std::fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("account", &self.account)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("state", &self.state)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

impl<H: MailHandler> Session<H> {
    /// Creates a session in the `Connecting` state.
    pub fn new(
        account: AccountId,
        username: impl Into<String>,
        password: impl Into<String>,
        handler: H,
    ) -> Self {
        Self {
            account,
            username: username.into(),
            password: password.into(),
            state: SessionState::Connecting,
            tags: TagWindow::new(),
            handler,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Account this session serves.
    #[must_use]
    pub const fn account(&self) -> AccountId {
        self.account
    }

    /// Mutable access to the result handler.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Consumes the session and returns the handler.
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Called once the TLS handshake completes; sends LOGIN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the session is `Connecting`.
    pub fn connected(&mut self, out: &mut BytesMut) -> Result<()> {
        if self.state != SessionState::Connecting {
            return Err(Error::InvalidState(format!(
                "connected while {}",
                self.state
            )));
        }
        let tag = self.tags.assign();
        Command::Login {
            user: &self.username,
            pass: &self.password,
        }
        .write(tag, out);
        self.state = SessionState::Authenticating;
        tracing::debug!(account = %self.account, tag, "login sent");
        Ok(())
    }

    /// Requests the plaintext body of one message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the session is `Idle`; a body
    /// fetch never overlaps another command.
    pub fn fetch_body(&mut self, id: u32, out: &mut BytesMut) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(Error::InvalidState(format!(
                "body fetch requested while {}",
                self.state
            )));
        }
        let tag = self.tags.assign();
        Command::FetchBody(id).write(tag, out);
        self.state = SessionState::FetchingBody;
        tracing::debug!(account = %self.account, tag, id, "body fetch sent");
        Ok(())
    }

    /// Processes one framed reply line (terminating CRLF excluded).
    ///
    /// Returns [`LineOutcome::NeedMore`] when the line ends inside a literal
    /// and must be re-presented with more bytes. Malformed lines are logged
    /// and consumed; only protocol violations and rejected commands error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] or [`Error::Select`] when the server rejects
    /// LOGIN or SELECT, and [`Error::Protocol`] on tag violations. All are
    /// fatal to the connection.
    pub fn handle_line(&mut self, line: &[u8], out: &mut BytesMut) -> Result<LineOutcome> {
        let mut lexer = Lexer::new(line);
        let reply = match parse_reply_line(&mut lexer) {
            Ok(reply) => reply,
            Err(ParseError::Incomplete) => return Ok(LineOutcome::NeedMore),
            Err(ParseError::Malformed { position, message }) => {
                tracing::warn!(
                    account = %self.account,
                    state = %self.state,
                    position,
                    %message,
                    raw = %String::from_utf8_lossy(line),
                    "discarding malformed reply line",
                );
                return Ok(LineOutcome::Consumed);
            }
        };

        match reply {
            ReplyLine::Untagged => self.handle_untagged(line, &mut lexer),
            ReplyLine::Tagged(tagged) => {
                self.handle_tagged(&tagged, out)?;
                Ok(LineOutcome::Consumed)
            }
        }
    }

    fn handle_untagged(&mut self, line: &[u8], lexer: &mut Lexer<'_>) -> Result<LineOutcome> {
        match self.state {
            SessionState::FetchingSummaries => {
                self.handle_fetch_data(line, lexer, Self::deliver_summary)
            }
            SessionState::FetchingBody => self.handle_fetch_data(line, lexer, Self::deliver_body),
            _ => {
                // Greeting, SELECT mailbox data, EXISTS counts and the like.
                tracing::trace!(account = %self.account, state = %self.state, "untagged line ignored");
                Ok(LineOutcome::Consumed)
            }
        }
    }

    /// Runs `deliver` on the data portion of an untagged `<id> FETCH` line.
    ///
    /// Untagged lines that are not FETCH data are consumed silently; a
    /// malformed FETCH line costs only that one message.
    fn handle_fetch_data(
        &mut self,
        line: &[u8],
        lexer: &mut Lexer<'_>,
        deliver: fn(&mut Self, u32, &mut Lexer<'_>) -> ParseResult<()>,
    ) -> Result<LineOutcome> {
        let id = match fetch_preamble(lexer) {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::debug!(
                    account = %self.account,
                    state = %self.state,
                    "non-FETCH untagged line during fetch",
                );
                return Ok(LineOutcome::Consumed);
            }
            Err(ParseError::Incomplete) => return Ok(LineOutcome::NeedMore),
            Err(ParseError::Malformed { position, message }) => {
                tracing::warn!(
                    account = %self.account,
                    position,
                    %message,
                    raw = %String::from_utf8_lossy(line),
                    "malformed untagged line",
                );
                return Ok(LineOutcome::Consumed);
            }
        };

        match deliver(self, id, lexer) {
            Ok(()) => Ok(LineOutcome::Consumed),
            Err(ParseError::Incomplete) => Ok(LineOutcome::NeedMore),
            Err(ParseError::Malformed { position, message }) => {
                tracing::warn!(
                    account = %self.account,
                    id,
                    position,
                    %message,
                    raw = %String::from_utf8_lossy(line),
                    "malformed FETCH data, message skipped",
                );
                Ok(LineOutcome::Consumed)
            }
        }
    }

    fn deliver_summary(&mut self, id: u32, lexer: &mut Lexer<'_>) -> ParseResult<()> {
        let mut envelope = parse_fetch_reply(lexer)?;
        envelope.id = id;
        self.handler.on_summary(self.account, envelope);
        Ok(())
    }

    fn deliver_body(&mut self, _id: u32, lexer: &mut Lexer<'_>) -> ParseResult<()> {
        let body = parse_body_reply(lexer)?;
        self.handler.on_body(self.account, body);
        Ok(())
    }

    fn handle_tagged(&mut self, reply: &TaggedReply, out: &mut BytesMut) -> Result<()> {
        self.tags.accept(reply.tag)?;

        match self.state {
            SessionState::Authenticating => {
                if !reply.ok {
                    return Err(Error::Auth(format!("{} {}", reply.status, reply.text)));
                }
                let tag = self.tags.assign();
                Command::Select(MAILBOX).write(tag, out);
                self.state = SessionState::Selecting;
                tracing::debug!(account = %self.account, tag, mailbox = MAILBOX, "select sent");
            }
            SessionState::Selecting => {
                if !reply.ok {
                    return Err(Error::Select(format!("{} {}", reply.status, reply.text)));
                }
                let tag = self.tags.assign();
                Command::FetchAll.write(tag, out);
                self.state = SessionState::FetchingSummaries;
                tracing::debug!(account = %self.account, tag, "summary fetch sent");
            }
            SessionState::FetchingSummaries | SessionState::FetchingBody => {
                if !reply.ok {
                    tracing::warn!(
                        account = %self.account,
                        state = %self.state,
                        status = %reply.status,
                        text = %reply.text,
                        "fetch rejected",
                    );
                }
                self.state = SessionState::Idle;
            }
            SessionState::Idle | SessionState::Connecting => {
                // TagWindow rejects replies with nothing outstanding, so a
                // tagged line can only land here through a client bug.
                return Err(Error::Protocol(format!(
                    "tagged reply {} while {}",
                    reply.tag, self.state
                )));
            }
        }
        Ok(())
    }
}

/// Reads the `<id> FETCH` preamble of an untagged line.
///
/// Returns `None` when the line is untagged data of some other shape.
fn fetch_preamble(lexer: &mut Lexer<'_>) -> ParseResult<Option<u32>> {
    let Token::Number(id) = lexer.next_token()? else {
        return Ok(None);
    };
    let keyword = lexer.read_atom()?;
    if keyword.eq_ignore_ascii_case("FETCH") {
        Ok(Some(id))
    } else {
        Ok(None)
    }
}
