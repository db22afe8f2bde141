//! Shared RESP shaping for stream read replies.

use crate::resp::RespValue;
use crate::stream::StreamEntry;

/// Encodes entries as XRANGE does: an array of `[id, [field, value, ...]]`
/// pairs, fields in insertion order.
pub fn encode_entries(entries: &[StreamEntry]) -> RespValue {
    RespValue::Array(
        entries
            .iter()
            .map(|entry| {
                let mut fields = Vec::with_capacity(entry.fields.len() * 2);
                for (name, value) in &entry.fields {
                    fields.push(RespValue::BulkString(name.clone()));
                    fields.push(RespValue::BulkString(value.clone()));
                }

                RespValue::Array(vec![
                    RespValue::BulkString(entry.id.to_string()),
                    RespValue::Array(fields),
                ])
            })
            .collect(),
    )
}

/// Encodes an XREAD reply: an array of `[key, entries]` pairs.
pub fn encode_streams(streams: &[(String, Vec<StreamEntry>)]) -> RespValue {
    RespValue::Array(
        streams
            .iter()
            .map(|(key, entries)| {
                RespValue::Array(vec![
                    RespValue::BulkString(key.clone()),
                    encode_entries(entries),
                ])
            })
            .collect(),
    )
}
