/*
 * response.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Gemello, a Gemini protocol client.
 *
 * Gemello is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Gemello is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Gemello.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Response framing: `<2-digit status><SP><meta><CRLF>` followed by the body.
//!
//! Only success (2x) responses have a body. For every other category the body is
//! empty by contract: `lines()` yields nothing and `read_to_string()` returns ""
//! without reading from the connection.
//!
//! Body lines longer than `MAX_BODY_LINE_LEN` bytes are delivered in pieces of at
//! most that size, split on a character boundary, so memory stays bounded whatever
//! the server sends.

use std::io::{self, BufRead, BufReader, Read};

use crate::document::Document;
use crate::error::GeminiError;
use crate::gemtext::GemtextParser;
use crate::meta::MimeType;
use crate::net::{CancelHandle, Connection};
use crate::status::Status;

/// Maximum meta length in bytes.
pub const MAX_META_LEN: usize = 1024;

/// Status (2) + space (1) + meta + CRLF (2).
const MAX_STATUS_LINE_LEN: usize = 2 + 1 + MAX_META_LEN + 2;

/// Longest body line returned in one piece, in bytes.
pub const MAX_BODY_LINE_LEN: usize = 64 * 1024;

/// One response. Owns the connection until dropped or closed.
pub struct Response<S: Read = Box<dyn Connection>> {
    status: Status,
    meta: String,
    reader: BufReader<S>,
    body_done: bool,
    cancel: Option<CancelHandle>,
    /// Incomplete UTF-8 sequence cut off the end of an over-long line.
    carry: Vec<u8>,
}

impl<S: Read> std::fmt::Debug for Response<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("meta", &self.meta)
            .field("body_done", &self.body_done)
            .finish()
    }
}

impl<S: Read> Response<S> {
    /// Read and parse the status line from `stream`; the rest of the stream is the body.
    pub fn read_from(stream: S) -> Result<Self, GeminiError> {
        Self::read_with_cancel(stream, None)
    }

    pub(crate) fn read_with_cancel(
        stream: S,
        cancel: Option<CancelHandle>,
    ) -> Result<Self, GeminiError> {
        let mut reader = BufReader::with_capacity(1024, stream);
        let mut line = Vec::with_capacity(64);
        let read = (&mut reader)
            .take(MAX_STATUS_LINE_LEN as u64)
            .read_until(b'\n', &mut line);
        if let Err(e) = read {
            return Err(read_error(&cancel, e));
        }
        if line.len() < 3 {
            if is_cancelled(&cancel) {
                return Err(cancelled());
            }
            return Err(GeminiError::protocol(format!(
                "status line truncated after {} bytes",
                line.len()
            )));
        }
        if !line.ends_with(b"\n") && line.len() == MAX_STATUS_LINE_LEN {
            return Err(GeminiError::protocol("status line too long"));
        }
        let (status, meta) = parse_status_line(&line)?;
        log::debug!("[gemini] status {} meta {:?}", status, meta);
        Ok(Self {
            status,
            meta,
            reader,
            body_done: !status.is_success(),
            cancel,
            carry: Vec::new(),
        })
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn status_code(&self) -> u8 {
        self.status.code()
    }

    /// Prompt, MIME type, redirect target or error message, depending on the status category.
    pub fn meta(&self) -> &str {
        &self.meta
    }

    /// MIME type of a success response. None for other categories or unparsable meta.
    pub fn mime_type(&self) -> Option<MimeType> {
        if self.status.is_success() {
            MimeType::parse(&self.meta)
        } else {
            None
        }
    }

    pub fn has_body(&self) -> bool {
        self.status.is_success()
    }

    /// Handle that aborts a pending body read from another thread.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.cancel.clone()
    }

    /// Body lines without terminators, read lazily. Single pass: lines consumed are gone.
    pub fn lines(&mut self) -> Lines<'_, S> {
        Lines { response: self }
    }

    /// Drain the remaining body, joining lines with `\n` (no trailing terminator).
    pub fn read_to_string(&mut self) -> Result<String, GeminiError> {
        let mut out = String::new();
        for (i, line) in self.lines().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&line?);
        }
        Ok(out)
    }

    /// Drain the remaining body through the gemtext parser.
    pub fn read_document(&mut self) -> Result<Document, GeminiError> {
        let mut parser = GemtextParser::new();
        for line in self.lines() {
            parser.push_line(&line?);
        }
        Ok(parser.finish())
    }

    /// Give up the response and return the underlying stream (buffered bytes are lost).
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    fn next_line(&mut self) -> Option<Result<String, GeminiError>> {
        if self.body_done {
            return None;
        }
        let mut buf = std::mem::take(&mut self.carry);
        let limit = MAX_BODY_LINE_LEN.saturating_sub(buf.len()) as u64;
        let read = (&mut self.reader).take(limit).read_until(b'\n', &mut buf);
        match read {
            Ok(0) if buf.is_empty() => {
                self.body_done = true;
                if is_cancelled(&self.cancel) {
                    return Some(Err(cancelled()));
                }
                None
            }
            Ok(_) => {
                if buf.ends_with(b"\n") {
                    buf.pop();
                    strip_cr(&mut buf);
                } else if buf.len() >= MAX_BODY_LINE_LEN {
                    let cut = incomplete_utf8_start(&buf);
                    if cut < buf.len() {
                        self.carry = buf.split_off(cut);
                    } else {
                        // Line ends exactly at the limit: consume its terminator.
                        let terminator = self.pending_terminator_len();
                        self.reader.consume(terminator);
                        if terminator > 0 {
                            strip_cr(&mut buf);
                        }
                    }
                }
                Some(Ok(String::from_utf8_lossy(&buf).into_owned()))
            }
            Err(e) => {
                self.body_done = true;
                Some(Err(read_error(&self.cancel, e)))
            }
        }
    }

    /// Length of a LF or CRLF waiting at the front of the read buffer, 0 if none.
    fn pending_terminator_len(&mut self) -> usize {
        match self.reader.fill_buf() {
            Ok(b) if b.starts_with(b"\n") => 1,
            Ok(b) if b.starts_with(b"\r\n") => 2,
            _ => 0,
        }
    }
}

impl<S: Connection> Response<S> {
    /// Release the connection now (TLS close_notify where applicable).
    pub fn close(mut self) -> Result<(), GeminiError> {
        self.body_done = true;
        self.reader.get_mut().close().map_err(GeminiError::from_transfer)
    }
}

/// Lazy body line iterator; see `Response::lines`.
pub struct Lines<'a, S: Read> {
    response: &'a mut Response<S>,
}

impl<S: Read> Iterator for Lines<'_, S> {
    type Item = Result<String, GeminiError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.response.next_line()
    }
}

fn parse_status_line(line: &[u8]) -> Result<(Status, String), GeminiError> {
    let status = Status::from_digits(line[0], line[1]).ok_or_else(|| {
        GeminiError::protocol(format!(
            "invalid status {:?}",
            String::from_utf8_lossy(&line[..2])
        ))
    })?;
    let mut rest = &line[2..];
    if rest.ends_with(b"\n") {
        rest = &rest[..rest.len() - 1];
    }
    if rest.ends_with(b"\r") {
        rest = &rest[..rest.len() - 1];
    }
    let meta = match rest.split_first() {
        None => &[][..],
        Some((b' ', meta)) => meta,
        Some(_) => return Err(GeminiError::protocol("expected space after status code")),
    };
    if meta.len() > MAX_META_LEN {
        return Err(GeminiError::protocol("meta longer than 1024 bytes"));
    }
    let meta = std::str::from_utf8(meta)
        .map_err(|_| GeminiError::protocol("meta is not valid UTF-8"))?;
    Ok((status, meta.to_string()))
}

fn strip_cr(buf: &mut Vec<u8>) {
    if buf.ends_with(b"\r") {
        buf.pop();
    }
}

/// Start of a trailing incomplete UTF-8 sequence, or `buf.len()` if the tail is complete.
fn incomplete_utf8_start(buf: &[u8]) -> usize {
    for back in 1..=buf.len().min(3) {
        let i = buf.len() - back;
        let b = buf[i];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let needed = match b {
            0xF0..=0xFF => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if needed > back { i } else { buf.len() };
    }
    buf.len()
}

fn is_cancelled(cancel: &Option<CancelHandle>) -> bool {
    cancel.as_ref().is_some_and(CancelHandle::is_cancelled)
}

fn cancelled() -> GeminiError {
    GeminiError::Io(io::Error::new(io::ErrorKind::Interrupted, "request cancelled"))
}

fn read_error(cancel: &Option<CancelHandle>, e: io::Error) -> GeminiError {
    if is_cancelled(cancel) {
        cancelled()
    } else {
        GeminiError::from_transfer(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Element;
    use std::io::Cursor;

    fn response(raw: &[u8]) -> Result<Response<Cursor<Vec<u8>>>, GeminiError> {
        Response::read_from(Cursor::new(raw.to_vec()))
    }

    #[test]
    fn every_valid_code_round_trips() {
        for code in 10..=69u8 {
            let raw = format!("{} some meta text\r\n", code);
            let r = response(raw.as_bytes()).unwrap();
            assert_eq!(r.status_code(), code);
            assert_eq!(r.meta(), "some meta text");
        }
    }

    #[test]
    fn short_status_line_is_protocol_error() {
        for raw in [&b""[..], b"2", b"20"] {
            let err = response(raw).unwrap_err();
            assert!(matches!(err, GeminiError::Protocol(_)), "{:?}", raw);
        }
    }

    #[test]
    fn non_digit_or_out_of_range_status_rejected() {
        for raw in [&b"2x text/gemini\r\n"[..], b"ab\r\n", b"00 x\r\n", b"70 x\r\n", b"99\r\n"] {
            assert!(matches!(response(raw).unwrap_err(), GeminiError::Protocol(_)));
        }
    }

    #[test]
    fn missing_space_rejected_but_empty_meta_allowed() {
        assert!(matches!(
            response(b"20text/gemini\r\n").unwrap_err(),
            GeminiError::Protocol(_)
        ));
        let r = response(b"20\r\nbody").unwrap();
        assert_eq!(r.meta(), "");
        let r = response(b"20 \n").unwrap();
        assert_eq!(r.meta(), "");
    }

    #[test]
    fn overlong_meta_rejected() {
        let mut raw = b"20 ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(2000));
        raw.extend_from_slice(b"\r\n");
        assert!(matches!(response(&raw).unwrap_err(), GeminiError::Protocol(_)));
    }

    #[test]
    fn invalid_utf8_meta_rejected() {
        assert!(matches!(
            response(b"51 \xff\xfe\r\n").unwrap_err(),
            GeminiError::Protocol(_)
        ));
    }

    #[test]
    fn read_to_string_strips_final_terminator() {
        let mut r = response(b"20 text/gemini\r\na\nb\r\nc\n").unwrap();
        assert_eq!(r.read_to_string().unwrap(), "a\nb\nc");
        // Single pass: nothing left.
        assert_eq!(r.read_to_string().unwrap(), "");
    }

    #[test]
    fn body_without_final_terminator() {
        let mut r = response(b"20 text/plain\r\nlast").unwrap();
        assert_eq!(r.read_to_string().unwrap(), "last");
    }

    #[test]
    fn invalid_utf8_body_is_replaced() {
        let mut r = response(b"20 text/plain\r\nok \xff\n").unwrap();
        assert_eq!(r.read_to_string().unwrap(), "ok \u{fffd}");
    }

    #[test]
    fn failure_has_no_body() {
        let mut r = response(b"51 Not found\r\nstray bytes\r\n").unwrap();
        assert!(!r.has_body());
        assert!(r.mime_type().is_none());
        assert_eq!(r.lines().count(), 0);
        assert_eq!(r.read_to_string().unwrap(), "");
    }

    #[test]
    fn lines_are_lazy() {
        let mut r = response(b"20 text/gemini\r\none\ntwo\nthree\n").unwrap();
        let first: Vec<String> = r.lines().take(1).map(Result::unwrap).collect();
        assert_eq!(first, vec!["one"]);
        assert_eq!(r.read_to_string().unwrap(), "two\nthree");
    }

    #[test]
    fn read_document_parses_gemtext() {
        let mut r = response(b"20 text/gemini; lang=en\r\n# Hi\r\n* a\r\n* b\r\n").unwrap();
        assert_eq!(r.mime_type().unwrap().languages(), vec!["en"]);
        let doc = r.read_document().unwrap();
        assert_eq!(doc.title(), Some("Hi"));
        assert_eq!(doc.elements()[1], Element::List(vec!["a".into(), "b".into()]));
    }

    fn body_lines(raw: Vec<u8>) -> Vec<String> {
        let mut r = Response::read_from(Cursor::new(raw)).unwrap();
        r.lines().map(Result::unwrap).collect()
    }

    #[test]
    fn over_long_line_is_split() {
        let mut raw = b"20 text/plain\r\n".to_vec();
        raw.extend(std::iter::repeat(b'a').take(MAX_BODY_LINE_LEN + 10));
        raw.extend_from_slice(b"\nnext\n");
        let lines = body_lines(raw);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), MAX_BODY_LINE_LEN);
        assert_eq!(lines[1], "a".repeat(10));
        assert_eq!(lines[2], "next");
    }

    #[test]
    fn split_keeps_multibyte_characters_whole() {
        let mut raw = b"20 text/plain\r\n".to_vec();
        raw.extend(std::iter::repeat(b'a').take(MAX_BODY_LINE_LEN - 1));
        raw.extend_from_slice("é\nz".as_bytes());
        let lines = body_lines(raw);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "a".repeat(MAX_BODY_LINE_LEN - 1));
        assert_eq!(lines[1], "é");
        assert_eq!(lines[2], "z");
    }

    #[test]
    fn line_of_exactly_the_limit_is_not_split() {
        for terminator in [&b"\n"[..], b"\r\n"] {
            let mut raw = b"20 text/plain\r\n".to_vec();
            raw.extend(std::iter::repeat(b'a').take(MAX_BODY_LINE_LEN));
            raw.extend_from_slice(terminator);
            raw.extend_from_slice(b"x");
            let lines = body_lines(raw);
            assert_eq!(lines.len(), 2, "{:?}", terminator);
            assert_eq!(lines[0].len(), MAX_BODY_LINE_LEN);
            assert_eq!(lines[1], "x");
        }
    }

    struct FailingAfterHeader {
        header: Cursor<Vec<u8>>,
    }

    impl Read for FailingAfterHeader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.header.read(buf)?;
            if n == 0 {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            } else {
                Ok(n)
            }
        }
    }

    #[test]
    fn mid_body_failure_is_io_error_and_ends_iteration() {
        let stream = FailingAfterHeader {
            header: Cursor::new(b"20 text/gemini\r\npartial\n".to_vec()),
        };
        let mut r = Response::read_from(stream).unwrap();
        let lines: Vec<_> = r.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].as_deref().unwrap(), "partial");
        assert!(matches!(lines[1], Err(GeminiError::Io(_))));
        assert!(r.lines().next().is_none());
    }
}
