//! Delivery seam toward presentation/cache collaborators.
//!
//! The session forwards completed results through this trait: one
//! [`Envelope`] per message during the summary fetch and the plaintext body
//! bytes after a single-message body fetch. Each event carries the
//! [`AccountId`] of the connection it originated on, so a caller driving
//! several accounts can route results without shared state.

use crate::parser::Envelope;

/// Identifies the account a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub u32);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "account#{}", self.0)
    }
}

/// Receiver for completed parse results.
///
/// Invoked synchronously from inside the connection's readiness handling;
/// implementations should hand data off rather than block.
pub trait MailHandler: Send {
    /// Called once per message during the summary fetch.
    fn on_summary(&mut self, account: AccountId, envelope: Envelope) {
        let _ = (account, envelope);
    }

    /// Called with the plaintext body after a single-message body fetch.
    fn on_body(&mut self, account: AccountId, body: Vec<u8>) {
        let _ = (account, body);
    }
}

/// A handler that discards all results.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl MailHandler for NoopHandler {}

/// A handler that logs results using tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl MailHandler for LoggingHandler {
    fn on_summary(&mut self, account: AccountId, envelope: Envelope) {
        tracing::debug!(%account, id = envelope.id, subject = %envelope.subject, "summary");
    }

    fn on_body(&mut self, account: AccountId, body: Vec<u8>) {
        tracing::debug!(%account, len = body.len(), "body");
    }
}

/// A result delivered to a [`CollectingHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailEvent {
    /// One message summary.
    Summary(AccountId, Envelope),
    /// One message body.
    Body(AccountId, Vec<u8>),
}

/// A handler that collects results for later inspection.
///
/// Useful for tests and batch processing.
#[derive(Debug, Default, Clone)]
pub struct CollectingHandler {
    /// Collected results, in delivery order.
    pub events: Vec<MailEvent>,
}

impl CollectingHandler {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes all collected events, leaving the collector empty.
    pub fn take(&mut self) -> Vec<MailEvent> {
        std::mem::take(&mut self.events)
    }
}

impl MailHandler for CollectingHandler {
    fn on_summary(&mut self, account: AccountId, envelope: Envelope) {
        self.events.push(MailEvent::Summary(account, envelope));
    }

    fn on_body(&mut self, account: AccountId, body: Vec<u8>) {
        self.events.push(MailEvent::Body(account, body));
    }
}

impl<H: MailHandler + ?Sized> MailHandler for &mut H {
    fn on_summary(&mut self, account: AccountId, envelope: Envelope) {
        (**self).on_summary(account, envelope);
    }

    fn on_body(&mut self, account: AccountId, body: Vec<u8>) {
        (**self).on_body(account, body);
    }
}
