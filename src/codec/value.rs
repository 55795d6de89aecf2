//! TDF value model.
//!
//! [`Value`] is the tagged union every struct member carries. [`Struct`]
//! keeps members in wire order, which matters to the backend for some
//! requests.

use std::fmt;

use bytes::Bytes;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::tag::Tag;
use crate::error::{BlazeError, Result};

/// Union selector meaning "no member set".
pub const UNION_EMPTY: u8 = 0x7F;

/// Wire type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TdfType {
    Integer = 0x00,
    String = 0x01,
    Blob = 0x02,
    Struct = 0x03,
    List = 0x04,
    Map = 0x05,
    Union = 0x06,
    IntList = 0x07,
    /// Two varints. Carries [`ObjectType`] values.
    Double = 0x08,
    /// Three varints. Carries [`ObjectId`] values.
    Tripple = 0x09,
    Float = 0x0A,
}

impl TdfType {
    /// Parse a wire type code.
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => TdfType::Integer,
            0x01 => TdfType::String,
            0x02 => TdfType::Blob,
            0x03 => TdfType::Struct,
            0x04 => TdfType::List,
            0x05 => TdfType::Map,
            0x06 => TdfType::Union,
            0x07 => TdfType::IntList,
            0x08 => TdfType::Double,
            0x09 => TdfType::Tripple,
            0x0A => TdfType::Float,
            _ => return None,
        })
    }

    /// The wire type code.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A single TDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    String(String),
    Blob(Bytes),
    Struct(Struct),
    List(List),
    Map(Map),
    Union(Union),
    IntList(Vec<i64>),
    Double(i64, i64),
    Tripple(i64, i64, i64),
    Float(f32),
}

impl Value {
    /// The wire type this value encodes as.
    pub fn tdf_type(&self) -> TdfType {
        match self {
            Value::Integer(_) => TdfType::Integer,
            Value::String(_) => TdfType::String,
            Value::Blob(_) => TdfType::Blob,
            Value::Struct(_) => TdfType::Struct,
            Value::List(_) => TdfType::List,
            Value::Map(_) => TdfType::Map,
            Value::Union(_) => TdfType::Union,
            Value::IntList(_) => TdfType::IntList,
            Value::Double(..) => TdfType::Double,
            Value::Tripple(..) => TdfType::Tripple,
            Value::Float(_) => TdfType::Float,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Integer(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Blob(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(Bytes::from(v))
    }
}

impl From<Struct> for Value {
    fn from(v: Struct) -> Self {
        Value::Struct(v)
    }
}

impl From<List> for Value {
    fn from(v: List) -> Self {
        Value::List(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Value::Map(v)
    }
}

impl From<Union> for Value {
    fn from(v: Union) -> Self {
        Value::Union(v)
    }
}

impl From<ObjectType> for Value {
    fn from(v: ObjectType) -> Self {
        Value::Double(v.component.into(), v.type_id.into())
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::Tripple(
            v.object_type.component.into(),
            v.object_type.type_id.into(),
            v.id,
        )
    }
}

/// Ordered struct members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Struct {
    members: Vec<(Tag, Value)>,
}

impl Struct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert by tag name.
    ///
    /// ```
    /// use blaze_client::codec::Struct;
    ///
    /// let data = Struct::new()
    ///     .with("GAME", "tunguska").unwrap()
    ///     .with("GID", 123456).unwrap();
    /// assert_eq!(data.get_int("GID"), Some(123456));
    /// ```
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.insert(Tag::new(name)?, value);
        Ok(self)
    }

    /// Insert or replace a member. New members go to the end.
    pub fn insert(&mut self, tag: Tag, value: impl Into<Value>) {
        let value = value.into();
        match self.members.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, slot)) => *slot = value,
            None => self.members.push((tag, value)),
        }
    }

    /// Append without checking for duplicates (decoder path).
    pub(crate) fn push(&mut self, tag: Tag, value: Value) {
        self.members.push((tag, value));
    }

    pub fn get_tag(&self, tag: &Tag) -> Option<&Value> {
        self.members
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, v)| v)
    }

    /// Look up a member by name. Invalid names find nothing.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let tag = Tag::new(name).ok()?;
        self.get_tag(&tag)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_struct(&self, name: &str) -> Option<&Struct> {
        self.get(name).and_then(Value::as_struct)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let tag = Tag::new(name).ok()?;
        let index = self.members.iter().position(|(t, _)| *t == tag)?;
        Some(self.members.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &Value)> {
        self.members.iter().map(|(t, v)| (t, v))
    }
}

impl IntoIterator for Struct {
    type Item = (Tag, Value);
    type IntoIter = std::vec::IntoIter<(Tag, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_iter()
    }
}

impl FromIterator<(Tag, Value)> for Struct {
    fn from_iter<I: IntoIterator<Item = (Tag, Value)>>(iter: I) -> Self {
        let mut s = Struct::new();
        for (tag, value) in iter {
            s.insert(tag, value);
        }
        s
    }
}

/// Homogeneous list. The element type is kept so empty lists encode.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub element_type: TdfType,
    pub items: Vec<Value>,
}

impl List {
    pub fn new(element_type: TdfType) -> Self {
        Self {
            element_type,
            items: Vec::new(),
        }
    }

    /// Build from items; the element type is taken from the first item.
    pub fn of(items: Vec<Value>) -> Result<Self> {
        let element_type = items
            .first()
            .map(Value::tdf_type)
            .ok_or_else(|| BlazeError::Protocol("cannot infer type of empty list".into()))?;
        let list = Self {
            element_type,
            items,
        };
        list.check()?;
        Ok(list)
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.items.push(value.into());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn check(&self) -> Result<()> {
        match self
            .items
            .iter()
            .find(|v| v.tdf_type() != self.element_type)
        {
            Some(v) => Err(BlazeError::Protocol(format!(
                "list of {:?} contains {:?}",
                self.element_type,
                v.tdf_type()
            ))),
            None => Ok(()),
        }
    }
}

/// Homogeneous key/value pairs in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    pub key_type: TdfType,
    pub value_type: TdfType,
    pub entries: Vec<(Value, Value)>,
}

impl Map {
    pub fn new(key_type: TdfType, value_type: TdfType) -> Self {
        Self {
            key_type,
            value_type,
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn check(&self) -> Result<()> {
        for (k, v) in &self.entries {
            if k.tdf_type() != self.key_type || v.tdf_type() != self.value_type {
                return Err(BlazeError::Protocol(format!(
                    "map of {:?} -> {:?} contains {:?} -> {:?}",
                    self.key_type,
                    self.value_type,
                    k.tdf_type(),
                    v.tdf_type()
                )));
            }
        }
        Ok(())
    }
}

/// Tagged union: either empty (`0x7F` on the wire) or one active member.
#[derive(Debug, Clone, PartialEq)]
pub enum Union {
    Empty,
    Set {
        selector: u8,
        tag: Tag,
        value: Box<Value>,
    },
}

impl Union {
    pub fn set(selector: u8, tag: Tag, value: impl Into<Value>) -> Self {
        Union::Set {
            selector,
            tag,
            value: Box::new(value.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Union::Empty)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Union::Empty => None,
            Union::Set { value, .. } => Some(value),
        }
    }
}

/// Component id + type id pair, carried as a [`TdfType::Double`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectType {
    pub component: u16,
    pub type_id: u16,
}

impl ObjectType {
    pub fn new(component: u16, type_id: u16) -> Self {
        Self { component, type_id }
    }
}

impl TryFrom<&Value> for ObjectType {
    type Error = BlazeError;

    fn try_from(value: &Value) -> Result<Self> {
        match *value {
            Value::Double(c, t) => Ok(Self {
                component: narrow(c)?,
                type_id: narrow(t)?,
            }),
            _ => Err(BlazeError::Protocol(format!(
                "expected object type, found {:?}",
                value.tdf_type()
            ))),
        }
    }
}

/// Object type + entity id, carried as a [`TdfType::Tripple`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub object_type: ObjectType,
    pub id: i64,
}

impl ObjectId {
    pub fn new(component: u16, type_id: u16, id: i64) -> Self {
        Self {
            object_type: ObjectType::new(component, type_id),
            id,
        }
    }
}

impl TryFrom<&Value> for ObjectId {
    type Error = BlazeError;

    fn try_from(value: &Value) -> Result<Self> {
        match *value {
            Value::Tripple(c, t, id) => Ok(Self {
                object_type: ObjectType {
                    component: narrow(c)?,
                    type_id: narrow(t)?,
                },
                id,
            }),
            _ => Err(BlazeError::Protocol(format!(
                "expected object id, found {:?}",
                value.tdf_type()
            ))),
        }
    }
}

fn narrow(v: i64) -> Result<u16> {
    u16::try_from(v).map_err(|_| BlazeError::Protocol(format!("{} does not fit in u16", v)))
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.object_type.component, self.object_type.type_id, self.id
        )
    }
}

// JSON view of decoded packets. Struct members become object keys by tag
// name; Double/Tripple become arrays; an empty union becomes null. Map keys
// that are not integers or strings are rendered as text.

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Blob(b) => serializer.serialize_bytes(b),
            Value::Struct(s) => s.serialize(serializer),
            Value::List(l) => serializer.collect_seq(&l.items),
            Value::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.entries.len()))?;
                for (k, v) in &m.entries {
                    map.serialize_entry(&MapKey(k), v)?;
                }
                map.end()
            }
            Value::Union(u) => u.serialize(serializer),
            Value::IntList(items) => serializer.collect_seq(items),
            Value::Double(a, b) => serializer.collect_seq([a, b]),
            Value::Tripple(a, b, c) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(a)?;
                seq.serialize_element(b)?;
                seq.serialize_element(c)?;
                seq.end()
            }
            Value::Float(v) => serializer.serialize_f32(*v),
        }
    }
}

struct MapKey<'a>(&'a Value);

impl Serialize for MapKey<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Double(a, b) => serializer.collect_str(&format_args!("{}/{}", a, b)),
            Value::Tripple(a, b, c) => {
                serializer.collect_str(&format_args!("{}/{}/{}", a, b, c))
            }
            Value::Float(v) => serializer.collect_str(v),
            other => {
                let text = serde_json::to_string(other).map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&text)
            }
        }
    }
}

impl Serialize for Struct {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.members.len()))?;
        for (tag, value) in &self.members {
            map.serialize_entry(tag.name(), value)?;
        }
        map.end()
    }
}

impl Serialize for Union {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Union::Empty => serializer.serialize_none(),
            Union::Set { tag, value, .. } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(tag.name(), value)?;
                map.end()
            }
        }
    }
}
