//! TDF decoding.
//!
//! [`TdfDecoder`] walks a byte slice with a cursor. Every read either
//! advances past a complete value or fails without side effects the
//! caller relies on; a failed frame is discarded as a whole.

use bytes::Bytes;

use super::tag::{Tag, TAG_SIZE};
use super::value::{List, Map, Struct, TdfType, Union, Value, UNION_EMPTY};
use super::varint::read_varint;
use crate::error::{BlazeError, Result};

/// Deepest container nesting accepted before a frame is rejected.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Cursor over an encoded TDF buffer.
pub struct TdfDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> TdfDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self::at(buf, 0)
    }

    /// Start reading at `offset`.
    pub fn at(buf: &'a [u8], offset: usize) -> Self {
        Self {
            buf,
            pos: offset,
            depth: 0,
        }
    }

    /// Current cursor position.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(BlazeError::UnexpectedEof {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_varint(&mut self) -> Result<i64> {
        let (value, end) = read_varint(self.buf, self.pos)?;
        self.pos = end;
        Ok(value)
    }

    fn read_length(&mut self) -> Result<usize> {
        let offset = self.pos;
        let len = self.read_varint()?;
        usize::try_from(len)
            .map_err(|_| BlazeError::Protocol(format!("negative length {} at offset {}", len, offset)))
    }

    fn read_type(&mut self) -> Result<TdfType> {
        let offset = self.pos;
        let code = self.read_u8()?;
        TdfType::from_u8(code).ok_or(BlazeError::UnknownType {
            type_code: code,
            offset,
        })
    }

    /// Read a 3-byte tag followed by its type byte.
    pub fn read_member_header(&mut self) -> Result<(Tag, TdfType)> {
        let packed = self.take(TAG_SIZE)?;
        let tag = Tag::unpack([packed[0], packed[1], packed[2]]);
        let ty = self.read_type()?;
        Ok((tag, ty))
    }

    /// Read a string, tolerating junk after valid UTF-8.
    ///
    /// The length prefix counts the trailing NUL. When the bytes are not
    /// valid UTF-8 the longest valid prefix is kept.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_length()?;
        let raw = self.take(len)?;
        let text = match raw.split_last() {
            Some((0, rest)) => rest,
            _ => raw,
        };
        match std::str::from_utf8(text) {
            Ok(s) => Ok(s.to_string()),
            Err(e) => {
                let valid = e.valid_up_to();
                tracing::debug!(
                    "Recovered {} of {} string bytes after invalid UTF-8",
                    valid,
                    text.len()
                );
                // valid_up_to() marks a char boundary, so this cannot fail.
                Ok(std::str::from_utf8(&text[..valid])
                    .unwrap_or_default()
                    .to_string())
            }
        }
    }

    pub fn read_blob(&mut self) -> Result<Bytes> {
        let len = self.read_length()?;
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }

    /// Read a top-level member sequence, ending at end of buffer or at a
    /// `0x00` terminator.
    pub fn read_members(&mut self) -> Result<Struct> {
        let mut members = Struct::new();
        loop {
            match self.buf.get(self.pos) {
                None => break,
                Some(0) => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {}
            }
            let (tag, ty) = self.read_member_header()?;
            let value = self.read_value(ty)?;
            members.push(tag, value);
        }
        Ok(members)
    }

    /// Read a nested struct. It must end with a `0x00` terminator.
    pub fn read_struct(&mut self) -> Result<Struct> {
        let mut members = Struct::new();
        loop {
            if self.peek_u8()? == 0 {
                self.pos += 1;
                break;
            }
            let (tag, ty) = self.read_member_header()?;
            let value = self.read_value(ty)?;
            members.push(tag, value);
        }
        Ok(members)
    }

    fn peek_u8(&self) -> Result<u8> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(BlazeError::UnexpectedEof {
                offset: self.pos,
                needed: 1,
                available: 0,
            })
    }

    /// Fail when an element read consumed nothing, so a huge count cannot
    /// spin without reaching end of buffer.
    fn ensure_progress(&self, start: usize) -> Result<()> {
        if self.pos == start {
            return Err(BlazeError::Protocol(format!(
                "container element at offset {} consumed no bytes",
                start
            )));
        }
        Ok(())
    }

    fn read_list(&mut self) -> Result<List> {
        let element_type = self.read_type()?;
        let count = self.read_length()?;
        // Cap preallocation by what the buffer could possibly hold.
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            let start = self.pos;
            items.push(self.read_value(element_type)?);
            self.ensure_progress(start)?;
        }
        Ok(List {
            element_type,
            items,
        })
    }

    fn read_map(&mut self) -> Result<Map> {
        let key_type = self.read_type()?;
        let value_type = self.read_type()?;
        let count = self.read_length()?;
        let mut entries = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            let start = self.pos;
            let key = self.read_value(key_type)?;
            let value = self.read_value(value_type)?;
            self.ensure_progress(start)?;
            entries.push((key, value));
        }
        Ok(Map {
            key_type,
            value_type,
            entries,
        })
    }

    fn read_union(&mut self) -> Result<Union> {
        let selector = self.read_u8()?;
        if selector == UNION_EMPTY {
            return Ok(Union::Empty);
        }
        let (tag, ty) = self.read_member_header()?;
        let value = self.read_value(ty)?;
        Ok(Union::Set {
            selector,
            tag,
            value: Box::new(value),
        })
    }

    fn read_int_list(&mut self) -> Result<Vec<i64>> {
        let count = self.read_length()?;
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(self.read_varint()?);
        }
        Ok(items)
    }

    fn read_float(&mut self) -> Result<f32> {
        let raw = self.take(4)?;
        Ok(f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Run a container read one nesting level deeper.
    fn nested<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(BlazeError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
                offset: self.pos,
            });
        }
        self.depth += 1;
        let result = read(self);
        self.depth -= 1;
        result
    }

    /// Read one value of the given type.
    pub fn read_value(&mut self, ty: TdfType) -> Result<Value> {
        Ok(match ty {
            TdfType::Integer => Value::Integer(self.read_varint()?),
            TdfType::String => Value::String(self.read_string()?),
            TdfType::Blob => Value::Blob(self.read_blob()?),
            TdfType::Struct => Value::Struct(self.nested(Self::read_struct)?),
            TdfType::List => Value::List(self.nested(Self::read_list)?),
            TdfType::Map => Value::Map(self.nested(Self::read_map)?),
            TdfType::Union => Value::Union(self.nested(Self::read_union)?),
            TdfType::IntList => Value::IntList(self.read_int_list()?),
            TdfType::Double => Value::Double(self.read_varint()?, self.read_varint()?),
            TdfType::Tripple => Value::Tripple(
                self.read_varint()?,
                self.read_varint()?,
                self.read_varint()?,
            ),
            TdfType::Float => Value::Float(self.read_float()?),
        })
    }
}

/// Decode a packet payload: a bare member sequence ending at end of buffer.
pub fn decode_struct(buf: &[u8]) -> Result<Struct> {
    let mut decoder = TdfDecoder::new(buf);
    let members = decoder.read_members()?;
    if decoder.remaining() > 0 {
        tracing::debug!(
            "Ignoring {} bytes after struct terminator",
            decoder.remaining()
        );
    }
    Ok(members)
}

/// Decode one value of type `ty` at `offset`, returning the value and the
/// offset just past it.
pub fn decode_value(ty: TdfType, buf: &[u8], offset: usize) -> Result<(Value, usize)> {
    let mut decoder = TdfDecoder::at(buf, offset);
    let value = decoder.read_value(ty)?;
    Ok((value, decoder.position()))
}
