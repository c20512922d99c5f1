//! End-to-end tests against in-memory streams.
//!
//! The duplex tests play the server side of a real conversation; the
//! proptest exercises the framing invariant that read-boundary placement
//! never changes what the session delivers.

use bytes::{Buf, BytesMut};
use proptest::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use mailbrief_imap::{
    AccountId, CollectingHandler, Connection, Error, LineOutcome, MailEvent, Session, drain_lines,
};

#[tokio::test]
async fn full_conversation_over_duplex() {
    let (client, server) = tokio::io::duplex(4096);
    let (connection, handle) = Connection::establish(
        client,
        AccountId(3),
        "user",
        "pw",
        CollectingHandler::new(),
    )
    .unwrap();
    let task = tokio::spawn(connection.run());

    let (server_read, mut server_write) = tokio::io::split(server);
    let mut commands = BufReader::new(server_read);
    let mut line = String::new();

    commands.read_line(&mut line).await.unwrap();
    assert_eq!(line, "1 LOGIN user pw\r\n");
    server_write
        .write_all(b"* OK ready\r\n1 OK LOGIN completed\r\n")
        .await
        .unwrap();

    line.clear();
    commands.read_line(&mut line).await.unwrap();
    assert_eq!(line, "2 SELECT INBOX\r\n");
    server_write
        .write_all(b"* 2 EXISTS\r\n* FLAGS (\\Seen)\r\n2 OK SELECT completed\r\n")
        .await
        .unwrap();

    line.clear();
    commands.read_line(&mut line).await.unwrap();
    assert_eq!(line, "3 FETCH 1:* full\r\n");
    server_write
        .write_all(
            b"* 1 FETCH (ENVELOPE (\"Mon, 2 Feb\" \"first\" \
              ((\"Ann\" NIL \"ann\" \"example.com\")) NIL NIL NIL NIL NIL NIL \"<m1>\"))\r\n\
              * 2 FETCH (ENVELOPE (NIL \"second\" NIL NIL NIL NIL NIL NIL \"<m1>\" \"<m2>\"))\r\n\
              3 OK FETCH completed\r\n",
        )
        .await
        .unwrap();

    // May arrive before the summaries finish; it waits its turn.
    handle.fetch_body(1).unwrap();

    line.clear();
    commands.read_line(&mut line).await.unwrap();
    assert_eq!(line, "4 FETCH 1 BODY[TEXT]\r\n");
    server_write
        .write_all(b"* 1 FETCH (BODY[TEXT] {12}\r\nHello\r\nWorld)\r\n4 OK FETCH completed\r\n")
        .await
        .unwrap();

    drop(handle);
    let handler = task.await.unwrap().unwrap();

    assert_eq!(handler.events.len(), 3);
    let MailEvent::Summary(account, first) = &handler.events[0] else {
        panic!("expected first summary");
    };
    assert_eq!(*account, AccountId(3));
    assert_eq!(first.id, 1);
    assert_eq!(first.subject, "first");
    assert_eq!(first.from[0].email, "ann@example.com");
    let MailEvent::Summary(_, second) = &handler.events[1] else {
        panic!("expected second summary");
    };
    assert_eq!(second.id, 2);
    assert_eq!(second.parent_id, "<m1>");
    assert_eq!(
        handler.events[2],
        MailEvent::Body(AccountId(3), b"Hello\r\nWorld".to_vec())
    );
}

#[tokio::test]
async fn server_disconnect_fails_the_run() {
    let (client, server) = tokio::io::duplex(4096);
    let (connection, _handle) = Connection::establish(
        client,
        AccountId(1),
        "user",
        "pw",
        CollectingHandler::new(),
    )
    .unwrap();
    drop(server);

    let error = connection.run().await.unwrap_err();
    assert!(matches!(error, Error::Io(_)), "expected transport fault, got {error}");
}

#[tokio::test]
async fn rejected_login_fails_the_run() {
    let stream = tokio_test::io::Builder::new()
        .write(b"1 LOGIN user pw\r\n")
        .read(b"1 NO invalid credentials\r\n")
        .build();

    let (connection, _handle) =
        Connection::establish(stream, AccountId(1), "user", "pw", CollectingHandler::new())
            .unwrap();

    let error = connection.run().await.unwrap_err();
    assert!(matches!(error, Error::Auth(_)), "got {error}");
}

/// Replies the property test feeds, including a literal subject that embeds
/// a CRLF.
const SCRIPT: &[u8] = b"* OK ready\r\n\
    1 OK\r\n\
    2 OK\r\n\
    * 1 FETCH (ENVELOPE (\"Mon\" {9}\r\nhi\r\nthere \
    ((\"A\" NIL \"a\" \"example.com\")) NIL NIL NIL NIL NIL NIL \"<m>\"))\r\n\
    3 OK\r\n";

/// Feeds the script split at the given cut points and returns what the
/// session delivered.
fn deliveries(cuts: &[usize]) -> Vec<MailEvent> {
    let mut session = Session::new(AccountId(9), "u", "p", CollectingHandler::new());
    let mut out = BytesMut::new();
    session.connected(&mut out).unwrap();

    let mut bounds: Vec<usize> = cuts.to_vec();
    bounds.push(0);
    bounds.push(SCRIPT.len());
    bounds.sort_unstable();

    let mut recv = BytesMut::new();
    for window in bounds.windows(2) {
        recv.extend_from_slice(&SCRIPT[window[0]..window[1]]);
        let consumed = drain_lines(&recv, |line| session.handle_line(line, &mut out)).unwrap();
        recv.advance(consumed);
    }
    assert!(recv.is_empty(), "script left unframed bytes");
    session.into_handler().events
}

proptest! {
    /// Read-boundary placement must never change what gets delivered.
    #[test]
    fn chunking_is_invisible_to_the_session(
        cuts in prop::collection::vec(0..SCRIPT.len(), 0..6),
    ) {
        let expected = deliveries(&[]);
        prop_assert_eq!(deliveries(&cuts), expected);
    }
}

#[test]
fn scripted_replies_deliver_one_summary() {
    let events = deliveries(&[]);
    assert_eq!(events.len(), 1);
    let MailEvent::Summary(_, envelope) = &events[0] else {
        panic!("expected summary");
    };
    assert_eq!(envelope.id, 1);
    assert_eq!(envelope.subject, "hi\r\nthere");
    assert_eq!(envelope.from[0].email, "a@example.com");
}

#[test]
fn drain_lines_reports_consumed_prefix() {
    let consumed = drain_lines(b"* OK ready\r\npartial", |line| {
        assert_eq!(line, b"* OK ready");
        Ok(LineOutcome::Consumed)
    })
    .unwrap();
    assert_eq!(consumed, 12);
}
