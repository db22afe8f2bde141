//! Length and string decoding primitives shared by the snapshot loader.

use super::RdbError;

/// Outcome of decoding a length marker. The top two bits of the first byte
/// select the shape; `11` switches to one of the special integer formats.
#[derive(Debug, PartialEq)]
pub(crate) enum Length {
    /// A plain byte count.
    Bytes(usize),
    /// Special format 0: the value is a 1-byte integer.
    Int8,
    /// Special format 1: the value is a 2-byte little-endian integer.
    Int16,
    /// Special format 2: the value is a 4-byte little-endian integer.
    Int32,
}

pub(crate) fn take<'a>(
    bytes: &'a [u8],
    cursor: &mut usize,
    count: usize,
) -> Result<&'a [u8], RdbError> {
    let end = cursor.checked_add(count).ok_or(RdbError::Truncated)?;
    if end > bytes.len() {
        return Err(RdbError::Truncated);
    }
    let slice = &bytes[*cursor..end];
    *cursor = end;
    Ok(slice)
}

pub(crate) fn read_length(bytes: &[u8], cursor: &mut usize) -> Result<Length, RdbError> {
    let first = take(bytes, cursor, 1)?[0];

    match first >> 6 {
        0b00 => Ok(Length::Bytes((first & 0b0011_1111) as usize)),
        0b01 => {
            // 14-bit length: low six bits of the marker are the high bits.
            let second = take(bytes, cursor, 1)?[0];
            let high = ((first & 0b0011_1111) as usize) << 8;
            Ok(Length::Bytes(high | second as usize))
        }
        0b10 => {
            let raw = take(bytes, cursor, 4)?;
            let length = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
            Ok(Length::Bytes(length as usize))
        }
        _ => match first & 0b0011_1111 {
            0 => Ok(Length::Int8),
            1 => Ok(Length::Int16),
            2 => Ok(Length::Int32),
            _ => Err(RdbError::UnsupportedLength(first)),
        },
    }
}

/// Decodes a string record. Integer formats come back as their decimal text.
pub(crate) fn read_string(bytes: &[u8], cursor: &mut usize) -> Result<String, RdbError> {
    match read_length(bytes, cursor)? {
        Length::Bytes(count) => {
            let raw = take(bytes, cursor, count)?;
            String::from_utf8(raw.to_vec()).map_err(|_| RdbError::InvalidUtf8)
        }
        Length::Int8 => {
            let raw = take(bytes, cursor, 1)?;
            Ok(raw[0].to_string())
        }
        Length::Int16 => {
            let raw = take(bytes, cursor, 2)?;
            Ok(u16::from_le_bytes([raw[0], raw[1]]).to_string())
        }
        Length::Int32 => {
            let raw = take(bytes, cursor, 4)?;
            Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]).to_string())
        }
    }
}

/// Reads a plain (non-special-format) length, as used by RESIZEDB and
/// SELECTDB records.
pub(crate) fn read_plain_length(bytes: &[u8], cursor: &mut usize) -> Result<usize, RdbError> {
    let marker = bytes.get(*cursor).copied().unwrap_or(0);
    match read_length(bytes, cursor)? {
        Length::Bytes(count) => Ok(count),
        _ => Err(RdbError::UnsupportedLength(marker)),
    }
}
