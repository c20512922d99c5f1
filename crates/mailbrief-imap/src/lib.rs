//! # mailbrief-imap
//!
//! A minimal asynchronous IMAP4 client core for mailbox summarization: it
//! logs in over implicit TLS, opens INBOX, fetches every message's envelope
//! metadata, and retrieves individual plaintext bodies on demand.
//!
//! ## Features
//!
//! - **Sans-I/O protocol core**: The reply parser and the session state
//!   machine work on byte slices and buffers; the transport driver is the
//!   only code that touches a socket
//! - **Literal-aware framing**: `{N}` literals that embed CRLFs are
//!   reassembled before parsing, regardless of how reads split them
//! - **Per-line error containment**: A malformed reply costs one line (or
//!   one message), not the connection
//! - **TLS via rustls**: Implicit TLS on port 993 with bundled webpki roots
//! - **Poll-based driver**: One poll function per connection; the write
//!   half is watched only while command bytes are queued
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailbrief_imap::{AccountId, Config, Connection, LoggingHandler};
//!
//! #[tokio::main]
//! async fn main() -> mailbrief_imap::Result<()> {
//!     let config = Config::new("imap.example.com")
//!         .credentials("user@example.com", "password");
//!
//!     let (connection, handle) =
//!         Connection::open(&config, AccountId(1), LoggingHandler).await?;
//!
//!     // Summaries arrive at the handler as the connection runs; request
//!     // a body whenever the session is idle.
//!     handle.fetch_body(1)?;
//!     drop(handle);
//!
//!     connection.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Conversation States
//!
//! Each connection walks a fixed command sequence, one command outstanding
//! at a time:
//!
//! ```text
//! Connecting ── TLS done, LOGIN ──→ Authenticating
//! Authenticating ── OK, SELECT INBOX ──→ Selecting
//! Selecting ── OK, FETCH 1:* full ──→ FetchingSummaries
//! FetchingSummaries ── tagged reply ──→ Idle
//! Idle ── fetch_body(id) ──→ FetchingBody ── tagged reply ──→ Idle
//! ```
//!
//! ## Modules
//!
//! - [`command`]: Command serialization and tag correlation
//! - [`connection`]: TLS establishment, framing and the poll driver
//! - [`handler`]: The delivery seam for summaries and bodies
//! - [`parser`]: Sans-I/O reply lexer and grammar
//! - [`session`]: The per-connection state machine

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod handler;
pub mod parser;
pub mod session;

pub use command::{Command, TagWindow};
pub use connection::{
    Config, Connection, ConnectionHandle, ConnectionSet, LineOutcome, connect_tls,
    create_tls_connector, drain_lines,
};
pub use error::{Error, Result};
pub use handler::{AccountId, CollectingHandler, LoggingHandler, MailEvent, MailHandler, NoopHandler};
pub use parser::{
    Address, BodyStructure, Envelope, ParseError, ParseResult, PartFields, ReplyLine, TaggedReply,
};
pub use session::{Session, SessionState};
