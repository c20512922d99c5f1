//! CRLF framing over the raw receive buffer.
//!
//! A server reply normally ends at the first CRLF, but a literal
//! (`{N}` followed by CRLF and N octets) embeds CRLFs that belong to the
//! payload, and the framer cannot know that without parsing. The split is
//! handled with two cursors: `begin` marks the start of the current reply
//! and `scan` the next CRLF candidate. Each candidate extends the region
//! `begin..crlf` handed to the caller; when the caller reports
//! [`LineOutcome::NeedMore`] only `scan` advances, so the next attempt
//! re-parses the whole region from scratch with more bytes appended.
//! Re-parsing a reply is quadratic in its CRLF count, which is fine at
//! mail-header sizes and keeps the framer free of protocol knowledge.

/// What the caller concluded about one candidate region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// The region held one complete reply (well-formed or not); drop it.
    Consumed,
    /// The region ended inside a literal; extend it to the next CRLF.
    NeedMore,
}

/// Feeds each CRLF-terminated region of `buf` to `handle` and returns how
/// many leading bytes are fully consumed.
///
/// The slice passed to `handle` excludes the terminating CRLF. Bytes after
/// the last CRLF (a partial line still in flight) are never passed and never
/// counted as consumed; the caller keeps them buffered for the next read.
///
/// # Errors
///
/// Propagates the first error returned by `handle`; the buffer position at
/// that point is unspecified because the connection is torn down anyway.
pub fn drain_lines<F>(buf: &[u8], mut handle: F) -> crate::Result<usize>
where
    F: FnMut(&[u8]) -> crate::Result<LineOutcome>,
{
    let mut begin = 0;
    let mut scan = 0;

    while let Some(at) = find_crlf(&buf[scan..]) {
        let crlf = scan + at;
        match handle(&buf[begin..crlf])? {
            LineOutcome::Consumed => {
                begin = crlf + 2;
                scan = begin;
            }
            LineOutcome::NeedMore => {
                scan = crlf + 2;
            }
        }
    }

    Ok(begin)
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_lines(buf: &[u8]) -> (Vec<Vec<u8>>, usize) {
        let mut lines = Vec::new();
        #[allow(clippy::unwrap_used)]
        let consumed = drain_lines(buf, |line| {
            lines.push(line.to_vec());
            Ok(LineOutcome::Consumed)
        })
        .unwrap();
        (lines, consumed)
    }

    #[test]
    fn splits_on_crlf() {
        let (lines, consumed) = collect_lines(b"* OK ready\r\na1 OK done\r\n");
        assert_eq!(lines, vec![b"* OK ready".to_vec(), b"a1 OK done".to_vec()]);
        assert_eq!(consumed, 24);
    }

    #[test]
    fn partial_tail_is_not_consumed() {
        let (lines, consumed) = collect_lines(b"* OK ready\r\n* 1 FETCH (");
        assert_eq!(lines, vec![b"* OK ready".to_vec()]);
        assert_eq!(consumed, 12);
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let (lines, consumed) = collect_lines(b"");
        assert!(lines.is_empty());
        assert_eq!(consumed, 0);
    }

    #[test]
    fn need_more_extends_the_region() {
        // A literal payload containing a CRLF: the first candidate region
        // stops inside the literal, the caller asks for more, and the next
        // candidate re-presents the region from its beginning.
        let buf = b"* 1 FETCH (BODY[TEXT] {6}\r\nab\r\ncd)\r\ntail\r\n";
        let mut regions: Vec<Vec<u8>> = Vec::new();
        #[allow(clippy::unwrap_used)]
        let consumed = drain_lines(buf, |line| {
            regions.push(line.to_vec());
            // Pretend the parser needs the literal completed once.
            if line.ends_with(b"{6}") || line.ends_with(b"ab") {
                Ok(LineOutcome::NeedMore)
            } else {
                Ok(LineOutcome::Consumed)
            }
        })
        .unwrap();

        assert_eq!(regions.len(), 4);
        assert_eq!(regions[0], b"* 1 FETCH (BODY[TEXT] {6}".to_vec());
        assert_eq!(regions[1], b"* 1 FETCH (BODY[TEXT] {6}\r\nab".to_vec());
        assert_eq!(
            regions[2],
            b"* 1 FETCH (BODY[TEXT] {6}\r\nab\r\ncd)".to_vec()
        );
        assert_eq!(regions[3], b"tail".to_vec());
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn outcome_resets_begin_only_on_consumed() {
        let buf = b"one\r\ntwo\r\n";
        let mut first = true;
        #[allow(clippy::unwrap_used)]
        let consumed = drain_lines(buf, |line| {
            if first {
                first = false;
                assert_eq!(line, b"one");
                Ok(LineOutcome::NeedMore)
            } else {
                assert_eq!(line, b"one\r\ntwo");
                Ok(LineOutcome::Consumed)
            }
        })
        .unwrap();
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn handler_error_propagates() {
        let result = drain_lines(b"bad\r\n", |_| {
            Err(crate::Error::Protocol("boom".into()))
        });
        assert!(matches!(result, Err(crate::Error::Protocol(_))));
    }
}
