//! TDF encoding, the inverse of [`decode`](super::decode).

use bytes::{BufMut, Bytes, BytesMut};

use super::tag::Tag;
use super::value::{List, Map, Struct, Union, Value, UNION_EMPTY};
use super::varint::write_varint;
use crate::error::{BlazeError, Result};

/// Growable buffer that TDF values are written into.
pub struct TdfEncoder {
    buf: BytesMut,
}

impl TdfEncoder {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    fn write_length(&mut self, len: usize) -> Result<()> {
        let len = i64::try_from(len)
            .map_err(|_| BlazeError::Protocol(format!("length {} too large", len)))?;
        write_varint(&mut self.buf, len);
        Ok(())
    }

    pub fn write_member_header(&mut self, tag: &Tag, value: &Value) {
        self.buf.put_slice(&tag.pack());
        self.buf.put_u8(value.tdf_type().code());
    }

    /// Write one member: tag, type, value.
    pub fn write_member(&mut self, tag: &Tag, value: &Value) -> Result<()> {
        self.write_member_header(tag, value);
        self.write_value(value)
    }

    /// Write struct members. Nested structs carry a trailing `0x00`; the
    /// packet payload does not.
    pub fn write_struct(&mut self, members: &Struct, terminate: bool) -> Result<()> {
        for (tag, value) in members.iter() {
            self.write_member(tag, value)?;
        }
        if terminate {
            self.buf.put_u8(0);
        }
        Ok(())
    }

    fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_length(s.len() + 1)?;
        self.buf.put_slice(s.as_bytes());
        self.buf.put_u8(0);
        Ok(())
    }

    fn write_blob(&mut self, b: &[u8]) -> Result<()> {
        self.write_length(b.len())?;
        self.buf.put_slice(b);
        Ok(())
    }

    fn write_list(&mut self, list: &List) -> Result<()> {
        list.check()?;
        self.buf.put_u8(list.element_type.code());
        self.write_length(list.items.len())?;
        for item in &list.items {
            self.write_value(item)?;
        }
        Ok(())
    }

    fn write_map(&mut self, map: &Map) -> Result<()> {
        map.check()?;
        self.buf.put_u8(map.key_type.code());
        self.buf.put_u8(map.value_type.code());
        self.write_length(map.entries.len())?;
        for (key, value) in &map.entries {
            self.write_value(key)?;
            self.write_value(value)?;
        }
        Ok(())
    }

    fn write_union(&mut self, union: &Union) -> Result<()> {
        match union {
            Union::Empty => self.buf.put_u8(UNION_EMPTY),
            Union::Set {
                selector,
                tag,
                value,
            } => {
                if *selector == UNION_EMPTY {
                    return Err(BlazeError::Protocol(
                        "union selector 0x7f is reserved for the empty union".into(),
                    ));
                }
                self.buf.put_u8(*selector);
                self.write_member(tag, value)?;
            }
        }
        Ok(())
    }

    /// Write a value without a member header.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Integer(v) => write_varint(&mut self.buf, *v),
            Value::String(s) => self.write_string(s)?,
            Value::Blob(b) => self.write_blob(b)?,
            Value::Struct(s) => self.write_struct(s, true)?,
            Value::List(l) => self.write_list(l)?,
            Value::Map(m) => self.write_map(m)?,
            Value::Union(u) => self.write_union(u)?,
            Value::IntList(items) => {
                self.write_length(items.len())?;
                for item in items {
                    write_varint(&mut self.buf, *item);
                }
            }
            Value::Double(a, b) => {
                write_varint(&mut self.buf, *a);
                write_varint(&mut self.buf, *b);
            }
            Value::Tripple(a, b, c) => {
                write_varint(&mut self.buf, *a);
                write_varint(&mut self.buf, *b);
                write_varint(&mut self.buf, *c);
            }
            Value::Float(v) => self.buf.put_f32(*v),
        }
        Ok(())
    }
}

impl Default for TdfEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a packet payload (members without a terminator).
pub fn encode_struct(members: &Struct) -> Result<Bytes> {
    let mut encoder = TdfEncoder::new();
    encoder.write_struct(members, false)?;
    Ok(encoder.finish())
}

/// Encode a single value without a member header.
pub fn encode_value(value: &Value) -> Result<Bytes> {
    let mut encoder = TdfEncoder::new();
    encoder.write_value(value)?;
    Ok(encoder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode::{decode_struct, decode_value};
    use crate::codec::value::{ObjectId, ObjectType, TdfType};

    fn roundtrip(value: Value) {
        let bytes = encode_value(&value).unwrap();
        let (decoded, end) = decode_value(value.tdf_type(), &bytes, 0).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(end, bytes.len(), "decoder must consume every byte");
    }

    fn tag(name: &str) -> Tag {
        Tag::new(name).unwrap()
    }

    #[test]
    fn test_roundtrip_scalars() {
        roundtrip(Value::Integer(0));
        roundtrip(Value::Integer(-5));
        roundtrip(Value::Integer(1 << 35));
        roundtrip(Value::Integer(-(1 << 35) - 3));
        roundtrip(Value::String("hello".into()));
        roundtrip(Value::String("Привет, 世界 🎮".into()));
        roundtrip(Value::String(String::new()));
        roundtrip(Value::Blob(Bytes::from_static(&[0, 1, 2, 0xFF])));
        roundtrip(Value::Float(3.5));
        roundtrip(Value::Float(-0.001));
    }

    #[test]
    fn test_roundtrip_numeric_groups() {
        roundtrip(Value::IntList(vec![1, -2, 1 << 40, 0]));
        roundtrip(Value::IntList(Vec::new()));
        roundtrip(Value::Double(4, -1));
        roundtrip(Value::Tripple(0x7802, 1, 1_004_198_901_867));
        roundtrip(ObjectType::new(4, 1).into());
        roundtrip(ObjectId::new(30722, 1, 987_654_321).into());
    }

    #[test]
    fn test_roundtrip_containers() {
        let inner = Struct::new()
            .with("NAME", "Operation Locker")
            .unwrap()
            .with("SIZE", 64)
            .unwrap();
        roundtrip(Value::Struct(inner.clone()));

        let mut players = List::new(TdfType::Struct);
        players.push(inner.clone());
        players.push(Struct::new().with("PID", 42).unwrap());
        roundtrip(Value::List(players));

        roundtrip(Value::List(List::new(TdfType::String)));

        let mut attrs = Map::new(TdfType::String, TdfType::String);
        attrs.insert("region", "EU");
        attrs.insert("mode", "conquest");
        roundtrip(Value::Map(attrs));

        let mut by_id = Map::new(TdfType::Integer, TdfType::Struct);
        by_id.insert(1, inner);
        roundtrip(Value::Map(by_id));
    }

    #[test]
    fn test_roundtrip_unions() {
        roundtrip(Value::Union(Union::Empty));
        roundtrip(Value::Union(Union::set(0, tag("VALU"), 99)));
        roundtrip(Value::Union(Union::set(
            2,
            tag("VALU"),
            Struct::new().with("IP", 0x7F00_0001u32).unwrap(),
        )));
    }

    #[test]
    fn test_struct_payload_has_no_terminator() {
        let members = Struct::new().with("GID", 1).unwrap();
        let bytes = encode_struct(&members).unwrap();
        assert_eq!(&bytes[..], &[0x9E, 0x99, 0x00, 0x00, 0x01]);
        assert_eq!(decode_struct(&bytes).unwrap(), members);
    }

    #[test]
    fn test_nested_struct_has_terminator() {
        let members = Struct::new()
            .with("INNR", Struct::new().with("A", 1).unwrap())
            .unwrap();
        let bytes = encode_struct(&members).unwrap();
        assert_eq!(*bytes.last().unwrap(), 0x00);
        assert_eq!(decode_struct(&bytes).unwrap(), members);
    }

    #[test]
    fn test_string_length_counts_nul() {
        let bytes = encode_value(&Value::from("ab")).unwrap();
        assert_eq!(&bytes[..], &[0x03, b'a', b'b', 0x00]);
    }

    #[test]
    fn test_float_is_big_endian() {
        let bytes = encode_value(&Value::Float(1.0)).unwrap();
        assert_eq!(&bytes[..], &[0x3F, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_heterogeneous_list_rejected() {
        let list = List {
            element_type: TdfType::Integer,
            items: vec![Value::from(1), Value::from("two")],
        };
        assert!(encode_value(&Value::List(list)).is_err());
    }

    #[test]
    fn test_reserved_union_selector_rejected() {
        let union = Union::set(UNION_EMPTY, tag("VALU"), 1);
        assert!(encode_value(&Value::Union(union)).is_err());
    }

    #[test]
    fn test_full_packet_body_roundtrip() {
        let mut ids = List::new(TdfType::Integer);
        ids.push(1);
        ids.push(2);

        let body = Struct::new()
            .with("GAME", "tunguska")
            .unwrap()
            .with("GID", 123_456)
            .unwrap()
            .with("IDS", ids)
            .unwrap()
            .with("BLOB", vec![9u8, 8, 7])
            .unwrap()
            .with("ADDR", Union::set(0, tag("VALU"), "10.0.0.1"))
            .unwrap()
            .with("NONE", Union::Empty)
            .unwrap()
            .with("OID", ObjectId::new(0x7802, 1, 77))
            .unwrap()
            .with("RATE", 0.25f32)
            .unwrap();

        let bytes = encode_struct(&body).unwrap();
        assert_eq!(decode_struct(&bytes).unwrap(), body);
    }
}
