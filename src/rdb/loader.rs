//! Snapshot loading: the opcode loop that turns RDB bytes into keyspace
//! entries.

use std::collections::HashMap;
use std::path::Path;

use jiff::Timestamp;

use crate::keyspace::{DataType, Value};

use super::length::{read_plain_length, read_string, take};
use super::RdbError;

const OPCODE_AUX: u8 = 0xFA;
const OPCODE_RESIZEDB: u8 = 0xFB;
const OPCODE_EXPIRETIME_MS: u8 = 0xFC;
const OPCODE_EXPIRETIME: u8 = 0xFD;
const OPCODE_SELECTDB: u8 = 0xFE;
const OPCODE_EOF: u8 = 0xFF;
const VALUE_TYPE_STRING: u8 = 0x00;

/// Everything a parsed snapshot yields. Auxiliary fields are stored but not
/// interpreted; hash-table size hints are consumed and dropped.
#[derive(Debug, Default, PartialEq)]
pub struct Snapshot {
    pub version: String,
    pub aux: HashMap<String, String>,
    pub entries: Vec<(String, Value)>,
}

/// Parses a complete snapshot held in memory.
pub fn parse_snapshot(bytes: &[u8]) -> Result<Snapshot, RdbError> {
    let mut cursor = 0;

    let magic = take(bytes, &mut cursor, 5)?;
    if magic != b"REDIS" {
        return Err(RdbError::BadMagic);
    }
    let version_raw = take(bytes, &mut cursor, 4)?;
    let version = String::from_utf8(version_raw.to_vec()).map_err(|_| RdbError::InvalidUtf8)?;

    let mut snapshot = Snapshot {
        version,
        aux: HashMap::new(),
        entries: Vec::new(),
    };

    loop {
        let opcode = take(bytes, &mut cursor, 1)?[0];

        match opcode {
            OPCODE_AUX => {
                let name = read_string(bytes, &mut cursor)?;
                let value = read_string(bytes, &mut cursor)?;
                snapshot.aux.insert(name, value);
            }
            OPCODE_RESIZEDB => {
                read_plain_length(bytes, &mut cursor)?;
                read_plain_length(bytes, &mut cursor)?;
            }
            OPCODE_SELECTDB => {
                read_plain_length(bytes, &mut cursor)?;
            }
            OPCODE_EXPIRETIME_MS => {
                let raw = take(bytes, &mut cursor, 8)?;
                let ms = u64::from_le_bytes([
                    raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
                ]);
                let expiration =
                    Timestamp::from_millisecond(ms as i64).map_err(|_| RdbError::InvalidExpiry)?;
                let entry = read_typed_entry(bytes, &mut cursor, Some(expiration))?;
                snapshot.entries.push(entry);
            }
            OPCODE_EXPIRETIME => {
                let raw = take(bytes, &mut cursor, 4)?;
                let seconds = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                let expiration = Timestamp::from_second(seconds as i64)
                    .map_err(|_| RdbError::InvalidExpiry)?;
                let entry = read_typed_entry(bytes, &mut cursor, Some(expiration))?;
                snapshot.entries.push(entry);
            }
            OPCODE_EOF => {
                // An 8-byte CRC64 follows when the writer emitted one; it is
                // not validated.
                break;
            }
            value_type => {
                let entry = read_value_of_type(value_type, bytes, &mut cursor, None)?;
                snapshot.entries.push(entry);
            }
        }
    }

    Ok(snapshot)
}

/// Reads the `<value-type> <key> <value>` triple that follows an expiry
/// opcode.
fn read_typed_entry(
    bytes: &[u8],
    cursor: &mut usize,
    expiration: Option<Timestamp>,
) -> Result<(String, Value), RdbError> {
    let value_type = take(bytes, cursor, 1)?[0];
    read_value_of_type(value_type, bytes, cursor, expiration)
}

fn read_value_of_type(
    value_type: u8,
    bytes: &[u8],
    cursor: &mut usize,
    expiration: Option<Timestamp>,
) -> Result<(String, Value), RdbError> {
    if value_type != VALUE_TYPE_STRING {
        return Err(RdbError::UnsupportedValueType(value_type));
    }

    let key = read_string(bytes, cursor)?;
    let value = read_string(bytes, cursor)?;

    Ok((
        key,
        Value {
            data: DataType::String(value),
            expiration,
        },
    ))
}

/// Loads and parses the snapshot at `<dir>/<dbfilename>`. A missing file is
/// not an error: the server boots with an empty keyspace.
pub async fn load_snapshot_file(dir: &str, dbfilename: &str) -> Result<Option<Snapshot>, RdbError> {
    let path = Path::new(dir).join(dbfilename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(RdbError::Io(error.to_string())),
    };

    parse_snapshot(&bytes).map(Some)
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use crate::keyspace::{DataType, Value};

    use super::{parse_snapshot, RdbError};

    /// Builds snapshot bytes from parts: header, records, EOF, fake checksum.
    fn snapshot_bytes(records: &[&[u8]]) -> Vec<u8> {
        let mut bytes = b"REDIS0011".to_vec();
        for record in records {
            bytes.extend_from_slice(record);
        }
        bytes.push(0xFF);
        bytes.extend_from_slice(&[0u8; 8]);
        bytes
    }

    fn string_record(key: &str, value: &str) -> Vec<u8> {
        let mut record = vec![0x00, key.len() as u8];
        record.extend_from_slice(key.as_bytes());
        record.push(value.len() as u8);
        record.extend_from_slice(value.as_bytes());
        record
    }

    #[test]
    fn test_parse_plain_keys() {
        let bytes = snapshot_bytes(&[
            &[0xFE, 0x00],
            &[0xFB, 0x02, 0x00],
            &string_record("foo", "bar"),
            &string_record("baz", "qux"),
        ]);

        let snapshot = parse_snapshot(&bytes).unwrap();
        assert_eq!(snapshot.version, "0011");
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(
            snapshot.entries[0],
            (
                "foo".to_string(),
                Value {
                    data: DataType::String("bar".to_string()),
                    expiration: None
                }
            )
        );
    }

    #[test]
    fn test_parse_expiry_records() {
        // 0xFC: absolute ms, little-endian. 2032-01-01T00:00:00Z in ms.
        let ms: u64 = 1_956_528_000_000;
        let mut ms_record = vec![0xFC];
        ms_record.extend_from_slice(&ms.to_le_bytes());
        ms_record.extend_from_slice(&string_record("orange", "raspberry"));

        // 0xFD: absolute seconds, little-endian u32.
        let seconds: u32 = 1_956_528_000;
        let mut s_record = vec![0xFD];
        s_record.extend_from_slice(&seconds.to_le_bytes());
        s_record.extend_from_slice(&string_record("mango", "pineapple"));

        let bytes = snapshot_bytes(&[&ms_record, &s_record]);
        let snapshot = parse_snapshot(&bytes).unwrap();

        let expected = "2032-01-01T00:00:00Z".parse::<Timestamp>().unwrap();
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.entries[0].1.expiration, Some(expected));
        assert_eq!(snapshot.entries[1].1.expiration, Some(expected));
        assert_eq!(
            snapshot.entries[1].1.data,
            DataType::String("pineapple".to_string())
        );
    }

    #[test]
    fn test_parse_aux_fields() {
        let mut aux = vec![0xFA, 0x09];
        aux.extend_from_slice(b"redis-ver");
        aux.push(0x05);
        aux.extend_from_slice(b"7.2.0");
        // Integer-format aux value.
        aux.extend_from_slice(&[0xFA, 0x0a]);
        aux.extend_from_slice(b"redis-bits");
        aux.extend_from_slice(&[0xc0, 0x40]);

        let bytes = snapshot_bytes(&[&aux]);
        let snapshot = parse_snapshot(&bytes).unwrap();

        assert_eq!(snapshot.aux.get("redis-ver"), Some(&"7.2.0".to_string()));
        assert_eq!(snapshot.aux.get("redis-bits"), Some(&"64".to_string()));
        assert!(snapshot.entries.is_empty());
    }

    #[test]
    fn test_rejects_bad_input() {
        let test_cases: Vec<(Vec<u8>, RdbError)> = vec![
            (b"NOTRD0011".to_vec(), RdbError::BadMagic),
            (b"REDIS00".to_vec(), RdbError::Truncated),
            // Unsupported value type (a list) is fatal.
            (
                snapshot_bytes(&[&[0x01, 0x01, b'k', 0x01, b'v']]),
                RdbError::UnsupportedValueType(0x01),
            ),
            // Opcode loop runs off the end without an EOF marker.
            (b"REDIS0011".to_vec(), RdbError::Truncated),
        ];

        for (input, expected) in test_cases {
            assert_eq!(parse_snapshot(&input), Err(expected), "parsing {:02x?}", input);
        }
    }
}
