//! The handshake a freshly started follower performs against its leader:
//! `PING`, `REPLCONF listening-port`, `REPLCONF capa psync2`, `PSYNC ? -1`,
//! then the full snapshot transfer.

use bytes::BytesMut;
use regex::Regex;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::resp::RespValue;

#[derive(Error, Debug, PartialEq)]
pub enum HandshakeError {
    #[error("I/O error during handshake: {0}")]
    Io(String),
    #[error("leader closed the connection during handshake")]
    ConnectionClosed,
    #[error("unexpected leader reply: {0}")]
    UnexpectedReply(String),
    #[error("invalid FULLRESYNC header: {0}")]
    InvalidFullResync(String),
    #[error("invalid snapshot framing")]
    InvalidSnapshotFraming,
}

/// What the handshake produced: the leader's identity, the snapshot payload,
/// and any propagated bytes that were read ahead of the snapshot.
#[derive(Debug)]
pub struct HandshakeOutcome {
    pub master_replid: String,
    pub snapshot: Vec<u8>,
    /// Bytes past the snapshot already sitting in the read buffer. They are
    /// the head of the propagated command stream and must be parsed first.
    pub leftover: Vec<u8>,
}

pub async fn perform_handshake(
    stream: &mut TcpStream,
    listening_port: u16,
) -> Result<HandshakeOutcome, HandshakeError> {
    let mut buffer = BytesMut::new();

    send_command(stream, &["PING"]).await?;
    expect_simple_string(stream, &mut buffer, "PONG").await?;

    let port = listening_port.to_string();
    send_command(stream, &["REPLCONF", "listening-port", &port]).await?;
    expect_simple_string(stream, &mut buffer, "OK").await?;

    send_command(stream, &["REPLCONF", "capa", "psync2"]).await?;
    expect_simple_string(stream, &mut buffer, "OK").await?;

    send_command(stream, &["PSYNC", "?", "-1"]).await?;
    let header = read_line(stream, &mut buffer).await?;
    let master_replid = parse_fullresync(&header)?;

    // The snapshot is framed like a bulk string but carries no trailing
    // CRLF: `$<len>\r\n<bytes>`.
    let length_line = read_line(stream, &mut buffer).await?;
    let length = length_line
        .strip_prefix('$')
        .and_then(|digits| digits.parse::<usize>().ok())
        .ok_or(HandshakeError::InvalidSnapshotFraming)?;
    let snapshot = read_exact(stream, &mut buffer, length).await?;

    Ok(HandshakeOutcome {
        master_replid,
        snapshot,
        leftover: buffer.to_vec(),
    })
}

/// Extracts the replication ID out of `+FULLRESYNC <replid> <offset>`.
fn parse_fullresync(header: &str) -> Result<String, HandshakeError> {
    let parts: Vec<&str> = header
        .strip_prefix('+')
        .unwrap_or(header)
        .split_whitespace()
        .collect();

    if parts.len() != 3 || parts[0] != "FULLRESYNC" {
        return Err(HandshakeError::InvalidFullResync(header.to_string()));
    }
    if !is_valid_replid(parts[1]) || parts[2].parse::<u64>().is_err() {
        return Err(HandshakeError::InvalidFullResync(header.to_string()));
    }

    Ok(parts[1].to_string())
}

fn is_valid_replid(replid: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9]{40}$").unwrap();
    re.is_match(replid)
}

async fn send_command(stream: &mut TcpStream, parts: &[&str]) -> Result<(), HandshakeError> {
    let encoded = RespValue::command(parts).encode();
    stream
        .write_all(encoded.as_bytes())
        .await
        .map_err(|error| HandshakeError::Io(error.to_string()))?;
    stream
        .flush()
        .await
        .map_err(|error| HandshakeError::Io(error.to_string()))
}

async fn expect_simple_string(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
    expected: &str,
) -> Result<(), HandshakeError> {
    let line = read_line(stream, buffer).await?;
    if line != format!("+{}", expected) {
        return Err(HandshakeError::UnexpectedReply(line));
    }
    Ok(())
}

/// Reads one CRLF-terminated line, pulling more bytes off the socket as
/// needed. The terminator is consumed but not returned.
async fn read_line(stream: &mut TcpStream, buffer: &mut BytesMut) -> Result<String, HandshakeError> {
    loop {
        if let Some(position) = buffer.windows(2).position(|window| window == b"\r\n") {
            let line = buffer.split_to(position + 2);
            return String::from_utf8(line[..position].to_vec())
                .map_err(|_| HandshakeError::UnexpectedReply("<non-utf8 reply>".to_string()));
        }
        fill(stream, buffer).await?;
    }
}

async fn read_exact(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
    count: usize,
) -> Result<Vec<u8>, HandshakeError> {
    while buffer.len() < count {
        fill(stream, buffer).await?;
    }
    Ok(buffer.split_to(count).to_vec())
}

async fn fill(stream: &mut TcpStream, buffer: &mut BytesMut) -> Result<(), HandshakeError> {
    let mut chunk = [0u8; 4096];
    let read = stream
        .read(&mut chunk)
        .await
        .map_err(|error| HandshakeError::Io(error.to_string()))?;
    if read == 0 {
        return Err(HandshakeError::ConnectionClosed);
    }
    buffer.extend_from_slice(&chunk[..read]);
    Ok(())
}
