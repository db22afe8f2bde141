//! Stream entry identifiers and append arbitration.
//!
//! Entry IDs order numerically on the `(ms, seq)` pair. String comparison is
//! never used: `10-0` sorts after `9-0`.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum StreamIdError {
    #[error("The ID specified in XADD must be greater than 0-0")]
    ZeroId,
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    NotGreaterThanTop,
    #[error("Invalid stream ID specified as stream command argument")]
    Malformed,
}

/// A stream entry identifier: milliseconds part and sequence part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamEntryId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamEntryId {
    pub const ZERO: StreamEntryId = StreamEntryId { ms: 0, seq: 0 };
    pub const MAX: StreamEntryId = StreamEntryId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }
}

impl fmt::Display for StreamEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// One appended stream entry. Field names keep their insertion order and may
/// repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamEntryId,
    pub fields: Vec<(String, String)>,
}

/// The three ID forms a client may request in XADD.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum RequestedId {
    /// `*`: both parts chosen by the server.
    Auto,
    /// `<ms>-*`: fixed milliseconds, sequence chosen by the server.
    AutoSequence(u64),
    /// `<ms>-<seq>`: fully explicit.
    Explicit(StreamEntryId),
}

impl RequestedId {
    pub fn parse(input: &str) -> Result<Self, StreamIdError> {
        if input == "*" {
            return Ok(RequestedId::Auto);
        }

        let (ms_part, seq_part) = input.split_once('-').ok_or(StreamIdError::Malformed)?;
        let ms = ms_part
            .parse::<u64>()
            .map_err(|_| StreamIdError::Malformed)?;

        if seq_part == "*" {
            return Ok(RequestedId::AutoSequence(ms));
        }

        let seq = seq_part
            .parse::<u64>()
            .map_err(|_| StreamIdError::Malformed)?;

        Ok(RequestedId::Explicit(StreamEntryId::new(ms, seq)))
    }
}

/// Decides the ID a new entry is appended under, given the stream's current
/// top entry.
///
/// Explicit `0-0` is always rejected; any ID not strictly greater than the
/// top entry is rejected.
pub fn arbitrate(
    top: Option<StreamEntryId>,
    requested: RequestedId,
    now_ms: u64,
) -> Result<StreamEntryId, StreamIdError> {
    match requested {
        RequestedId::Auto => arbitrate(top, RequestedId::AutoSequence(now_ms), now_ms),
        RequestedId::AutoSequence(ms) => match top {
            None => {
                // An empty stream starts at seq 0, except at ms 0 where 0-0
                // is forbidden.
                let seq = if ms == 0 { 1 } else { 0 };
                Ok(StreamEntryId::new(ms, seq))
            }
            Some(top) => {
                if ms < top.ms {
                    Err(StreamIdError::NotGreaterThanTop)
                } else if ms == top.ms {
                    let seq = top
                        .seq
                        .checked_add(1)
                        .ok_or(StreamIdError::NotGreaterThanTop)?;
                    Ok(StreamEntryId::new(ms, seq))
                } else {
                    Ok(StreamEntryId::new(ms, 0))
                }
            }
        },
        RequestedId::Explicit(id) => {
            if id == StreamEntryId::ZERO {
                return Err(StreamIdError::ZeroId);
            }
            if let Some(top) = top {
                if id <= top {
                    return Err(StreamIdError::NotGreaterThanTop);
                }
            }
            Ok(id)
        }
    }
}

/// Parses an inclusive XRANGE start bound; `-` is the smallest ID and a bare
/// `<ms>` means `<ms>-0`.
pub fn parse_range_start(input: &str) -> Result<StreamEntryId, StreamIdError> {
    if input == "-" {
        return Ok(StreamEntryId::ZERO);
    }
    parse_bound(input, 0)
}

/// Parses an inclusive XRANGE end bound; `+` is the largest ID and a bare
/// `<ms>` means `<ms>-<max>`.
pub fn parse_range_end(input: &str) -> Result<StreamEntryId, StreamIdError> {
    if input == "+" {
        return Ok(StreamEntryId::MAX);
    }
    parse_bound(input, u64::MAX)
}

/// Parses an exclusive XREAD start position; a bare `<ms>` means `<ms>-0`.
/// The `$` placeholder is resolved by the caller against the live stream.
pub fn parse_read_start(input: &str) -> Result<StreamEntryId, StreamIdError> {
    parse_bound(input, 0)
}

fn parse_bound(input: &str, default_seq: u64) -> Result<StreamEntryId, StreamIdError> {
    match input.split_once('-') {
        None => {
            let ms = input.parse::<u64>().map_err(|_| StreamIdError::Malformed)?;
            Ok(StreamEntryId::new(ms, default_seq))
        }
        Some((ms_part, seq_part)) => {
            let ms = ms_part
                .parse::<u64>()
                .map_err(|_| StreamIdError::Malformed)?;
            let seq = seq_part
                .parse::<u64>()
                .map_err(|_| StreamIdError::Malformed)?;
            Ok(StreamEntryId::new(ms, seq))
        }
    }
}
