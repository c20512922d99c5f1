//! Error types for the IMAP client core.

use thiserror::Error;

/// Errors that can terminate or degrade a connection.
///
/// Per-response parse failures are reported through [`Error::Parse`] but are
/// only fatal when the session cannot continue without the affected line;
/// everything else here tears down the connection it occurred on.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Response grammar error.
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte position in the offending line.
        position: usize,
        /// Description naming the expected token.
        message: String,
    },

    /// Server rejected LOGIN.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server rejected SELECT.
    #[error("Mailbox selection failed: {0}")]
    Select(String),

    /// Tag mismatch, unexpected reply, or other protocol violation.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Operation requested in a state that does not allow it.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
