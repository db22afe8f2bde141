//! Read-only parsing of the RDB snapshot format.
//!
//! The loader covers just enough of the format to bootstrap the keyspace:
//! string values, both expiry opcodes, and the auxiliary/bookkeeping records
//! that surround them. The trailing checksum is consumed but not validated.

mod length;
mod loader;

use thiserror::Error;

pub use loader::{load_snapshot_file, parse_snapshot, Snapshot};

#[derive(Error, Debug, PartialEq)]
pub enum RdbError {
    #[error("snapshot is truncated")]
    Truncated,
    #[error("snapshot does not start with the REDIS magic header")]
    BadMagic,
    #[error("unsupported length encoding 0x{0:02x}")]
    UnsupportedLength(u8),
    #[error("unsupported value type 0x{0:02x}")]
    UnsupportedValueType(u8),
    #[error("snapshot contains an invalid UTF-8 string")]
    InvalidUtf8,
    #[error("snapshot contains an invalid expiry timestamp")]
    InvalidExpiry,
    #[error("failed to read snapshot file: {0}")]
    Io(String),
}

/// The canonical empty snapshot a leader serves to a freshly attached
/// replica: header, auxiliary fields, EOF marker and checksum, no keys.
const EMPTY_SNAPSHOT_HEX: &str = "524544495330303131fa0972656469732d76657205372e322e30fa0a7265\
6469732d62697473c040fa056374696d65c26d08bc65fa08757365642d6d656dc2b0c41000fa08616f662d6261\
7365c000fff06e3bfec0ff5aa2";

/// Decodes the canonical empty snapshot into its byte form.
pub fn empty_snapshot() -> Vec<u8> {
    decode_hex(EMPTY_SNAPSHOT_HEX)
}

fn decode_hex(hex: &str) -> Vec<u8> {
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            let high = (pair[0] as char).to_digit(16).unwrap_or(0) as u8;
            let low = (pair[1] as char).to_digit(16).unwrap_or(0) as u8;
            (high << 4) | low
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{empty_snapshot, parse_snapshot};

    #[test]
    fn test_empty_snapshot_is_parseable() {
        let bytes = empty_snapshot();
        assert_eq!(bytes.len(), 88);
        assert_eq!(&bytes[..5], b"REDIS");

        let snapshot = parse_snapshot(&bytes).unwrap();
        assert_eq!(snapshot.version, "0011");
        assert!(snapshot.entries.is_empty());
        assert_eq!(
            snapshot.aux.get("redis-ver"),
            Some(&"7.2.0".to_string())
        );
    }
}
