//! Transport plumbing for one account connection.
//!
//! A [`Connection`] owns the TLS stream, the receive and send buffers and
//! the [`Session`] state machine, and drives all three from a single poll
//! function. The write half is polled only while the send buffer holds
//! bytes, so an idle connection costs one read watch and nothing else.
//! Body-fetch requests arrive over an unbounded channel through a
//! [`ConnectionHandle`] and wait their turn until the session is idle; the
//! caller keeps the handle, or drops it to let the connection wind down
//! once its work is drained.

mod config;
mod framed;
mod stream;

pub use config::Config;
pub use framed::{LineOutcome, drain_lines};
pub use stream::{connect_tls, create_tls_connector};

use std::collections::VecDeque;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::client::TlsStream;

use crate::handler::{AccountId, MailHandler};
use crate::session::{Session, SessionState};
use crate::{Error, Result};

/// Read chunk size per poll.
const READ_CHUNK: usize = 4096;

/// Hard cap on buffered reply bytes awaiting a complete line.
const MAX_RECV_BUFFER: usize = 64 * 1024 * 1024;

enum Request {
    FetchBody(u32),
}

/// Cloneable handle for issuing requests to a running [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Request>,
}

impl ConnectionHandle {
    /// Asks the connection to fetch the plaintext body of one message.
    ///
    /// Requests are queued and issued one at a time, each the next time the
    /// session is idle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when the connection has shut down.
    pub fn fetch_body(&self, id: u32) -> Result<()> {
        self.tx
            .send(Request::FetchBody(id))
            .map_err(|_| Error::InvalidState("connection closed".into()))
    }
}

/// Caller-owned list of live connections, keyed by account.
///
/// There is no process-wide registry; whoever opens connections keeps their
/// handles here (or anywhere else) and drops them to shut down.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    entries: Vec<(AccountId, ConnectionHandle)>,
}

impl ConnectionSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds a connection's handle, replacing any previous handle for the
    /// same account.
    pub fn insert(&mut self, account: AccountId, handle: ConnectionHandle) {
        self.remove(account);
        self.entries.push((account, handle));
    }

    /// Looks up the handle for an account.
    #[must_use]
    pub fn get(&self, account: AccountId) -> Option<&ConnectionHandle> {
        self.entries
            .iter()
            .find(|(id, _)| *id == account)
            .map(|(_, handle)| handle)
    }

    /// Drops the handle for an account, returning it if present.
    pub fn remove(&mut self, account: AccountId) -> Option<ConnectionHandle> {
        let at = self.entries.iter().position(|(id, _)| *id == account)?;
        Some(self.entries.remove(at).1)
    }

    /// Number of tracked connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over tracked connections.
    pub fn iter(&self) -> impl Iterator<Item = (AccountId, &ConnectionHandle)> {
        self.entries.iter().map(|(id, handle)| (*id, handle))
    }
}

/// One account's connection: stream, buffers and session in one object.
///
/// Generic over the stream so the whole driver runs against in-memory
/// streams in tests; production code uses [`Connection::open`].
pub struct Connection<S, H: MailHandler> {
    stream: S,
    session: Session<H>,
    recv_buf: BytesMut,
    send_buf: BytesMut,
    requests: mpsc::UnboundedReceiver<Request>,
    pending: VecDeque<u32>,
}

impl<H: MailHandler> Connection<TlsStream<TcpStream>, H> {
    /// Connects with TLS and sends LOGIN.
    ///
    /// # Errors
    ///
    /// Fails on TCP connect, TLS handshake or server-name errors.
    pub async fn open(
        config: &Config,
        account: AccountId,
        handler: H,
    ) -> Result<(Self, ConnectionHandle)> {
        let stream = stream::connect_tls(config).await?;
        Self::establish(
            stream,
            account,
            &config.username,
            &config.password,
            handler,
        )
    }
}

impl<S, H> Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: MailHandler,
{
    /// Wraps an already-established stream and queues LOGIN.
    ///
    /// # Errors
    ///
    /// Currently infallible for a fresh session; kept fallible so callers
    /// handle establishment uniformly with [`Connection::open`].
    pub fn establish(
        stream: S,
        account: AccountId,
        username: &str,
        password: &str,
        handler: H,
    ) -> Result<(Self, ConnectionHandle)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = Session::new(account, username, password, handler);
        let mut send_buf = BytesMut::with_capacity(READ_CHUNK);
        session.connected(&mut send_buf)?;

        let connection = Self {
            stream,
            session,
            recv_buf: BytesMut::with_capacity(READ_CHUNK),
            send_buf,
            requests: rx,
            pending: VecDeque::new(),
        };
        Ok((connection, ConnectionHandle { tx }))
    }

    /// The session this connection drives.
    #[must_use]
    pub const fn session(&self) -> &Session<H> {
        &self.session
    }

    /// Mutable access to the session (mainly its handler).
    pub fn session_mut(&mut self) -> &mut Session<H> {
        &mut self.session
    }

    /// Drives the connection until a fatal error, or until every handle is
    /// dropped and the session has drained back to idle.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: transport faults, rejected LOGIN or
    /// SELECT, and protocol violations.
    pub async fn run(mut self) -> Result<H> {
        poll_fn(|cx| self.poll_drive(cx)).await?;
        Ok(self.session.into_handler())
    }

    /// One pass over requests, writes and reads.
    ///
    /// Ready only on a fatal error or on graceful shutdown; otherwise every
    /// wait source has a waker registered before returning `Pending`.
    fn poll_drive(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let mut requests_closed = false;
        loop {
            match self.requests.poll_recv(cx) {
                Poll::Ready(Some(Request::FetchBody(id))) => self.pending.push_back(id),
                Poll::Ready(None) => {
                    requests_closed = true;
                    break;
                }
                Poll::Pending => break,
            }
        }
        if let Err(error) = self.issue_pending() {
            return Poll::Ready(Err(error));
        }

        if let Poll::Ready(Err(error)) = self.poll_send(cx) {
            return Poll::Ready(Err(error));
        }

        if let Poll::Ready(Err(error)) = self.poll_receive(cx) {
            return Poll::Ready(Err(error));
        }

        // Handling replies may have returned the session to idle, freeing a
        // queued request, or queued the next command itself.
        if let Err(error) = self.issue_pending() {
            return Poll::Ready(Err(error));
        }
        if let Poll::Ready(Err(error)) = self.poll_send(cx) {
            return Poll::Ready(Err(error));
        }

        if requests_closed
            && self.pending.is_empty()
            && self.session.state() == SessionState::Idle
            && self.send_buf.is_empty()
        {
            tracing::debug!(account = %self.session.account(), "all handles dropped, shutting down");
            return Poll::Ready(Ok(()));
        }
        Poll::Pending
    }

    /// Issues the oldest queued body fetch if the session is idle.
    fn issue_pending(&mut self) -> Result<()> {
        if self.session.state() == SessionState::Idle
            && let Some(id) = self.pending.pop_front()
        {
            self.session.fetch_body(id, &mut self.send_buf)?;
        }
        Ok(())
    }

    /// Writes buffered command bytes. Never touches the stream's write half
    /// while the send buffer is empty.
    fn poll_send(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        if self.send_buf.is_empty() {
            return Poll::Ready(Ok(()));
        }

        while !self.send_buf.is_empty() {
            match Pin::new(&mut self.stream).poll_write(cx, &self.send_buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(0)) => {
                    return Poll::Ready(Err(Error::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "server accepted no bytes",
                    ))));
                }
                Poll::Ready(Ok(n)) => self.send_buf.advance(n),
                Poll::Ready(Err(error)) => return Poll::Ready(Err(error.into())),
            }
        }

        match Pin::new(&mut self.stream).poll_flush(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
            Poll::Ready(Err(error)) => Poll::Ready(Err(error.into())),
        }
    }

    /// Reads until the stream has nothing more, handing each complete line
    /// to the session. Only returns `Ready` with an error; progress is made
    /// through side effects on the session and send buffer.
    fn poll_receive(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        loop {
            let mut chunk = [0u8; READ_CHUNK];
            let mut buf = ReadBuf::new(&mut chunk);
            match Pin::new(&mut self.stream).poll_read(cx, &mut buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(error)) => return Poll::Ready(Err(error.into())),
                Poll::Ready(Ok(())) => {
                    if buf.filled().is_empty() {
                        return Poll::Ready(Err(Error::Io(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "server closed the connection",
                        ))));
                    }
                    self.recv_buf.extend_from_slice(buf.filled());
                    if let Err(error) = self.process_recv() {
                        return Poll::Ready(Err(error));
                    }
                }
            }
        }
    }

    /// Feeds complete lines to the session and discards consumed bytes.
    fn process_recv(&mut self) -> Result<()> {
        let Self {
            recv_buf,
            send_buf,
            session,
            ..
        } = self;
        let consumed = drain_lines(recv_buf, |line| session.handle_line(line, send_buf))?;
        recv_buf.advance(consumed);

        if recv_buf.len() > MAX_RECV_BUFFER {
            return Err(Error::Protocol(format!(
                "reply exceeds {MAX_RECV_BUFFER} buffered bytes without completing"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::handler::{CollectingHandler, MailEvent};
    use std::collections::VecDeque;
    use std::task::Waker;

    /// In-memory stream that records write activity.
    #[derive(Default)]
    struct ScriptedStream {
        reads: VecDeque<Vec<u8>>,
        eof_after_reads: bool,
        written: Vec<u8>,
        write_polls: usize,
        max_write: Option<usize>,
    }

    impl AsyncRead for ScriptedStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            match this.reads.pop_front() {
                Some(chunk) => {
                    buf.put_slice(&chunk);
                    Poll::Ready(Ok(()))
                }
                None if this.eof_after_reads => Poll::Ready(Ok(())),
                None => Poll::Pending,
            }
        }
    }

    impl AsyncWrite for ScriptedStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            this.write_polls += 1;
            let take = this.max_write.map_or(buf.len(), |cap| buf.len().min(cap));
            this.written.extend_from_slice(&buf[..take]);
            Poll::Ready(Ok(take))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn establish(
        stream: ScriptedStream,
    ) -> (
        Connection<ScriptedStream, CollectingHandler>,
        ConnectionHandle,
    ) {
        Connection::establish(
            stream,
            AccountId(1),
            "user",
            "secret",
            CollectingHandler::new(),
        )
        .unwrap()
    }

    #[test]
    fn idle_connection_never_polls_the_write_half() {
        let (mut connection, _handle) = establish(ScriptedStream::default());
        let waker = Waker::noop();
        let mut cx = Context::from_waker(waker);

        // First pass flushes LOGIN.
        assert!(connection.poll_drive(&mut cx).is_pending());
        assert_eq!(&connection.stream.written[..], b"1 LOGIN user secret\r\n");
        let polls_after_login = connection.stream.write_polls;

        // Nothing queued: further passes leave the write half alone.
        assert!(connection.poll_drive(&mut cx).is_pending());
        assert!(connection.poll_drive(&mut cx).is_pending());
        assert_eq!(connection.stream.write_polls, polls_after_login);
    }

    #[test]
    fn partial_writes_drain_then_release_the_write_half() {
        let mut stream = ScriptedStream::default();
        stream.max_write = Some(8);

        let (mut connection, _handle) = establish(stream);
        let waker = Waker::noop();
        let mut cx = Context::from_waker(waker);

        // The 21-byte LOGIN line goes out in 8+8+5 slices within one pass.
        assert!(connection.poll_drive(&mut cx).is_pending());
        assert_eq!(&connection.stream.written[..], b"1 LOGIN user secret\r\n");
        assert_eq!(connection.stream.write_polls, 3);

        // Buffer drained: later passes stay away from the write half.
        assert!(connection.poll_drive(&mut cx).is_pending());
        assert_eq!(connection.stream.write_polls, 3);
    }

    #[test]
    fn drives_login_select_fetch_from_scripted_replies() {
        let mut stream = ScriptedStream::default();
        stream.reads.push_back(b"1 OK LOGIN completed\r\n".to_vec());
        stream.reads.push_back(b"* 1 EXISTS\r\n2 OK SELECT completed\r\n".to_vec());
        stream.reads.push_back(
            b"* 1 FETCH (ENVELOPE (NIL \"hi\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n\
              3 OK FETCH completed\r\n"
                .to_vec(),
        );

        let (mut connection, _handle) = establish(stream);
        let waker = Waker::noop();
        let mut cx = Context::from_waker(waker);
        assert!(connection.poll_drive(&mut cx).is_pending());

        let written = String::from_utf8(connection.stream.written.clone()).unwrap();
        assert_eq!(
            written,
            "1 LOGIN user secret\r\n2 SELECT INBOX\r\n3 FETCH 1:* full\r\n"
        );
        assert_eq!(connection.session.state(), SessionState::Idle);

        let events = connection.session_mut().handler_mut().take();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], MailEvent::Summary(_, e) if e.subject == "hi"));
    }

    #[test]
    fn handle_request_sends_body_fetch_and_drop_shuts_down() {
        let mut stream = ScriptedStream::default();
        stream.reads.push_back(b"1 OK\r\n2 OK\r\n3 OK\r\n".to_vec());

        let (mut connection, handle) = establish(stream);
        let waker = Waker::noop();
        let mut cx = Context::from_waker(waker);
        assert!(connection.poll_drive(&mut cx).is_pending());
        assert_eq!(connection.session.state(), SessionState::Idle);

        handle.fetch_body(7).unwrap();
        connection
            .stream
            .reads
            .push_back(b"* 7 FETCH (BODY[TEXT] {2}\r\nok)\r\n4 OK\r\n".to_vec());
        assert!(connection.poll_drive(&mut cx).is_pending());

        let written = String::from_utf8(connection.stream.written.clone()).unwrap();
        assert!(written.ends_with("4 FETCH 7 BODY[TEXT]\r\n"));
        let events = connection.session_mut().handler_mut().take();
        assert_eq!(events, vec![MailEvent::Body(AccountId(1), b"ok".to_vec())]);

        // Dropping the last handle lets the idle connection finish.
        drop(handle);
        assert!(matches!(
            connection.poll_drive(&mut cx),
            Poll::Ready(Ok(()))
        ));
    }

    #[test]
    fn early_request_waits_until_the_session_is_idle() {
        let (mut connection, handle) = establish(ScriptedStream::default());
        let waker = Waker::noop();
        let mut cx = Context::from_waker(waker);

        // Still authenticating: the request is queued, not issued.
        handle.fetch_body(9).unwrap();
        assert!(connection.poll_drive(&mut cx).is_pending());
        assert_eq!(connection.session.state(), SessionState::Authenticating);
        assert_eq!(&connection.stream.written[..], b"1 LOGIN user secret\r\n");

        // Once replies drive the session to idle, the queued fetch goes out.
        connection
            .stream
            .reads
            .push_back(b"1 OK\r\n2 OK\r\n3 OK\r\n".to_vec());
        assert!(connection.poll_drive(&mut cx).is_pending());
        assert_eq!(connection.session.state(), SessionState::FetchingBody);
        let written = String::from_utf8(connection.stream.written.clone()).unwrap();
        assert!(written.ends_with("4 FETCH 9 BODY[TEXT]\r\n"));
    }

    #[test]
    fn server_close_is_a_transport_fault() {
        let mut stream = ScriptedStream::default();
        stream.eof_after_reads = true;

        let (mut connection, _handle) = establish(stream);
        let waker = Waker::noop();
        let mut cx = Context::from_waker(waker);

        let Poll::Ready(Err(Error::Io(error))) = connection.poll_drive(&mut cx) else {
            panic!("expected transport fault");
        };
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn split_reads_reassemble_before_parsing() {
        let mut stream = ScriptedStream::default();
        stream.reads.push_back(b"1 OK\r\n2 OK\r\n3 OK\r\n".to_vec());

        let (mut connection, handle) = establish(stream);
        let waker = Waker::noop();
        let mut cx = Context::from_waker(waker);
        assert!(connection.poll_drive(&mut cx).is_pending());
        handle.fetch_body(1).unwrap();

        // Body reply arrives split inside the literal and across the CRLFs.
        for chunk in [
            b"* 1 FETCH (BODY[TEXT] {9}\r\nhi".to_vec(),
            b"\r\nthere)".to_vec(),
            b"\r\n4 OK\r\n".to_vec(),
        ] {
            connection.stream.reads.push_back(chunk);
        }
        assert!(connection.poll_drive(&mut cx).is_pending());

        let events = connection.session_mut().handler_mut().take();
        assert_eq!(
            events,
            vec![MailEvent::Body(AccountId(1), b"hi\r\nthere".to_vec())]
        );
        assert_eq!(connection.session.state(), SessionState::Idle);
    }

    #[test]
    fn connection_set_tracks_handles_by_account() {
        let (_c1, h1) = establish(ScriptedStream::default());
        let (_c2, h2) = establish(ScriptedStream::default());

        let mut set = ConnectionSet::new();
        assert!(set.is_empty());
        set.insert(AccountId(1), h1);
        set.insert(AccountId(2), h2);
        assert_eq!(set.len(), 2);
        assert!(set.get(AccountId(1)).is_some());
        assert!(set.get(AccountId(3)).is_none());

        set.remove(AccountId(1)).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().count(), 1);
    }
}
