//! RESP (Redis Serialization Protocol) value encoding.
//!
//! Only encoding lives here; decoding of inbound requests is the job of the
//! incremental parser in [`crate::request`].

/// A RESP value that can be rendered to its wire representation.
#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    /// The null bulk string, `$-1\r\n`.
    NullBulkString,
    Array(Vec<RespValue>),
    /// The null array, `*-1\r\n`.
    NullArray,
}

impl RespValue {
    /// Encodes the value as RESP wire bytes.
    ///
    /// Bulk string lengths are byte counts and every line is terminated by
    /// `\r\n`, so the output can be written to a socket as-is.
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(value) => format!("+{}\r\n", value),
            RespValue::Error(message) => format!("-{}\r\n", message),
            RespValue::Integer(value) => format!(":{}\r\n", value),
            RespValue::BulkString(value) => format!("${}\r\n{}\r\n", value.len(), value),
            RespValue::NullBulkString => "$-1\r\n".to_string(),
            RespValue::Array(elements) => {
                let mut encoded = format!("*{}\r\n", elements.len());
                for element in elements {
                    encoded.push_str(&element.encode());
                }
                encoded
            }
            RespValue::NullArray => "*-1\r\n".to_string(),
        }
    }

    /// Builds the array-of-bulk-strings frame used for commands on the wire.
    pub fn command(parts: &[&str]) -> RespValue {
        RespValue::Array(
            parts
                .iter()
                .map(|part| RespValue::BulkString(part.to_string()))
                .collect(),
        )
    }
}
