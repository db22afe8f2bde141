//! Incremental framing of request arrays over a growing byte buffer.
//!
//! A connection appends whatever the socket delivered and repeatedly asks for
//! the next complete request. Truncated input is never an error: the parser
//! rolls back to the start of the attempt and reports that it needs more
//! bytes. Structural violations inside an otherwise complete prefix are
//! errors and the connection is expected to close.
//!
//! Each framed [`Request`] keeps the exact byte range it was decoded from.
//! Replication propagates those received bytes verbatim and offset accounting
//! counts them, so they must never be re-encoded.

use bytes::BytesMut;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FrameError {
    #[error("expected '*' at start of request, found 0x{0:02x}")]
    MissingArrayPrefix(u8),
    #[error("expected '$' at start of argument, found 0x{0:02x}")]
    MissingBulkPrefix(u8),
    #[error("invalid length in frame header")]
    InvalidLength,
    #[error("bulk string is not terminated by CRLF")]
    MissingTerminator,
    #[error("request contains invalid UTF-8")]
    InvalidUtf8,
}

/// One framed client request: its decoded arguments and the raw bytes it was
/// parsed from.
#[derive(Debug, PartialEq, Clone)]
pub struct Request {
    pub arguments: Vec<String>,
    pub raw: Vec<u8>,
}

/// Stateful parser over an append-only byte buffer.
///
/// The unconsumed tail survives across calls, so arbitrarily fragmented
/// reads (one byte at a time, several requests in one chunk, a request split
/// across chunks) all frame identically.
#[derive(Debug, Default)]
pub struct RequestParser {
    buffer: BytesMut,
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Creates a parser seeded with bytes that were read ahead of it, e.g.
    /// the tail of the replication handshake exchange.
    pub fn with_leftover(bytes: &[u8]) -> Self {
        Self {
            buffer: BytesMut::from(bytes),
        }
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of buffered bytes not yet consumed by a framed request.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Attempts to frame the next complete request.
    ///
    /// Returns `Ok(None)` when the buffer holds only a prefix of a request;
    /// nothing is consumed in that case and the caller should read more
    /// bytes. On success the request's bytes are drained from the buffer.
    pub fn try_next(&mut self) -> Result<Option<Request>, FrameError> {
        let mut cursor = 0;

        let Some(header) = read_line(&self.buffer, &mut cursor) else {
            return Ok(None);
        };
        if header.is_empty() {
            return Err(FrameError::InvalidLength);
        }
        if header[0] != b'*' {
            return Err(FrameError::MissingArrayPrefix(header[0]));
        }
        let count = parse_decimal(&header[1..])?;

        let mut arguments = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(length_line) = read_line(&self.buffer, &mut cursor) else {
                return Ok(None);
            };
            if length_line.is_empty() {
                return Err(FrameError::InvalidLength);
            }
            if length_line[0] != b'$' {
                return Err(FrameError::MissingBulkPrefix(length_line[0]));
            }
            let length = parse_decimal(&length_line[1..])?;

            if self.buffer.len() < cursor + length + 2 {
                return Ok(None);
            }
            let payload = &self.buffer[cursor..cursor + length];
            if &self.buffer[cursor + length..cursor + length + 2] != b"\r\n" {
                return Err(FrameError::MissingTerminator);
            }
            let argument =
                String::from_utf8(payload.to_vec()).map_err(|_| FrameError::InvalidUtf8)?;
            arguments.push(argument);
            cursor += length + 2;
        }

        let raw = self.buffer.split_to(cursor).to_vec();
        Ok(Some(Request { arguments, raw }))
    }
}

/// Returns the line starting at `*cursor` without its CRLF terminator and
/// advances the cursor past it, or `None` when the terminator has not
/// arrived yet.
fn read_line<'a>(buffer: &'a [u8], cursor: &mut usize) -> Option<&'a [u8]> {
    let start = *cursor;
    let position = buffer[start..]
        .windows(2)
        .position(|window| window == b"\r\n")?;
    *cursor = start + position + 2;
    Some(&buffer[start..start + position])
}

fn parse_decimal(digits: &[u8]) -> Result<usize, FrameError> {
    let text = std::str::from_utf8(digits).map_err(|_| FrameError::InvalidLength)?;
    text.parse::<usize>().map_err(|_| FrameError::InvalidLength)
}
