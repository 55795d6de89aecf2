//! Variable-length signed integers.
//!
//! ```text
//! first byte:  C S m m m m m m    C = more bytes follow, S = negative, m = low 6 bits
//! next bytes:  C m m m m m m m    7 more magnitude bits each
//! ```
//!
//! The magnitude is stored, not the two's complement value, so `-1` is a
//! single byte `0x41`.

use bytes::BufMut;

use crate::error::{BlazeError, Result};

/// Longest valid encoding (6 + 9 * 7 = 69 bits of magnitude).
pub const MAX_VARINT_LEN: usize = 10;

const CONTINUE: u8 = 0x80;
const NEGATIVE: u8 = 0x40;

/// Append the varint encoding of `value` to `buf`.
pub fn write_varint<B: BufMut>(buf: &mut B, value: i64) {
    let mut magnitude = value.unsigned_abs();

    let mut first = (magnitude & 0x3F) as u8;
    if value < 0 {
        first |= NEGATIVE;
    }
    magnitude >>= 6;
    if magnitude > 0 {
        first |= CONTINUE;
    }
    buf.put_u8(first);

    while magnitude > 0 {
        let mut byte = (magnitude & 0x7F) as u8;
        magnitude >>= 7;
        if magnitude > 0 {
            byte |= CONTINUE;
        }
        buf.put_u8(byte);
    }
}

/// Number of bytes `write_varint` produces for `value`.
pub fn varint_len(value: i64) -> usize {
    let mut magnitude = value.unsigned_abs() >> 6;
    let mut len = 1;
    while magnitude > 0 {
        magnitude >>= 7;
        len += 1;
    }
    len
}

/// Decode a varint starting at `offset`.
///
/// Returns the value and the offset just past it.
pub fn read_varint(buf: &[u8], offset: usize) -> Result<(i64, usize)> {
    let first = *buf.get(offset).ok_or(BlazeError::UnexpectedEof {
        offset,
        needed: 1,
        available: buf.len().saturating_sub(offset),
    })?;

    let negative = first & NEGATIVE != 0;
    let mut magnitude = u64::from(first & 0x3F);
    let mut more = first & CONTINUE != 0;
    let mut shift = 6u32;
    let mut pos = offset + 1;

    while more {
        if pos - offset >= MAX_VARINT_LEN {
            return Err(BlazeError::MalformedVarint(offset));
        }
        let byte = *buf.get(pos).ok_or(BlazeError::UnexpectedEof {
            offset: pos,
            needed: 1,
            available: 0,
        })?;
        magnitude |= u64::from(byte & 0x7F) << shift;
        shift += 7;
        more = byte & CONTINUE != 0;
        pos += 1;
    }

    // i64::MIN has magnitude 2^63, which wraps back onto itself.
    let value = if negative {
        (magnitude as i64).wrapping_neg()
    } else {
        magnitude as i64
    };
    Ok((value, pos))
}
