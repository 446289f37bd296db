use bytes::BufMut;

use crate::error::EncodeError;
use crate::tag::Tag;
use crate::value::{Integer, Key, Repr, Value};

/// Encode a value into a fresh buffer
///
/// Integers use the narrowest width class that holds them; lengths and
/// counts use the narrowest header. Floats are always written as float64.
pub fn encode(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    encode_into(value, &mut buf)?;
    Ok(buf)
}

/// Append the encoding of `value` to `buf`
///
/// On error `buf` may hold a partial encoding.
pub fn encode_into(value: &Value, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
    match value {
        Value::Nil => buf.put_u8(Tag::Nil.byte()),
        Value::Bool(false) => buf.put_u8(Tag::False.byte()),
        Value::Bool(true) => buf.put_u8(Tag::True.byte()),
        Value::Integer(i) => put_integer(*i, buf),
        Value::Float(f) => {
            buf.put_u8(Tag::Float64.byte());
            buf.put_f64(*f);
        }
        Value::String(s) => {
            put_header(Family::Str, s.len(), buf)?;
            buf.put_slice(s.as_bytes());
        }
        Value::Binary(b) => {
            put_header(Family::Bin, b.len(), buf)?;
            buf.put_slice(b);
        }
        Value::Array(items) => {
            put_header(Family::Array, items.len(), buf)?;
            for item in items {
                encode_into(item, buf)?;
            }
        }
        Value::Map(entries) => {
            put_header(Family::Map, entries.len(), buf)?;
            for (key, value) in entries {
                put_key(key, buf)?;
                encode_into(value, buf)?;
            }
        }
    }
    Ok(())
}

fn put_key(key: &Key, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
    match key {
        Key::Integer(i) => put_integer(*i, buf),
        Key::String(s) => {
            put_header(Family::Str, s.len(), buf)?;
            buf.put_slice(s.as_bytes());
        }
    }
    Ok(())
}

fn put_integer(i: Integer, buf: &mut Vec<u8>) {
    match i.0 {
        Repr::Pos(n) if n <= 0x7f => buf.put_u8(Tag::PosFixInt(n as u8).byte()),
        Repr::Pos(n) => {
            if let Ok(n) = u8::try_from(n) {
                buf.put_u8(Tag::Uint8.byte());
                buf.put_u8(n);
            } else if let Ok(n) = u16::try_from(n) {
                buf.put_u8(Tag::Uint16.byte());
                buf.put_u16(n);
            } else if let Ok(n) = u32::try_from(n) {
                buf.put_u8(Tag::Uint32.byte());
                buf.put_u32(n);
            } else {
                buf.put_u8(Tag::Uint64.byte());
                buf.put_u64(n);
            }
        }
        Repr::Neg(n) if n >= -32 => buf.put_u8(Tag::NegFixInt(n as i8).byte()),
        Repr::Neg(n) => {
            if let Ok(n) = i8::try_from(n) {
                buf.put_u8(Tag::Int8.byte());
                buf.put_i8(n);
            } else if let Ok(n) = i16::try_from(n) {
                buf.put_u8(Tag::Int16.byte());
                buf.put_i16(n);
            } else if let Ok(n) = i32::try_from(n) {
                buf.put_u8(Tag::Int32.byte());
                buf.put_i32(n);
            } else {
                buf.put_u8(Tag::Int64.byte());
                buf.put_i64(n);
            }
        }
    }
}

/// Length-prefixed value families
#[derive(Clone, Copy)]
enum Family {
    Str,
    Bin,
    Array,
    Map,
}

impl Family {
    fn name(self) -> &'static str {
        match self {
            Family::Str => "string",
            Family::Bin => "binary",
            Family::Array => "array",
            Family::Map => "map",
        }
    }

    /// Inline-count tag when `len` fits in the tag byte itself
    fn fixed(self, len: usize) -> Option<Tag> {
        match self {
            Family::Str if len < 32 => Some(Tag::FixStr(len as u8)),
            Family::Array if len < 16 => Some(Tag::FixArray(len as u8)),
            Family::Map if len < 16 => Some(Tag::FixMap(len as u8)),
            _ => None,
        }
    }

    fn tags(self) -> (Option<Tag>, Tag, Tag) {
        match self {
            Family::Str => (Some(Tag::Str8), Tag::Str16, Tag::Str32),
            Family::Bin => (Some(Tag::Bin8), Tag::Bin16, Tag::Bin32),
            Family::Array => (None, Tag::Array16, Tag::Array32),
            Family::Map => (None, Tag::Map16, Tag::Map32),
        }
    }
}

fn put_header(family: Family, len: usize, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
    let len32 = u32::try_from(len).map_err(|_| EncodeError::TooLong {
        kind: family.name(),
        len,
    })?;
    if let Some(tag) = family.fixed(len) {
        buf.put_u8(tag.byte());
        return Ok(());
    }

    let (tag8, tag16, tag32) = family.tags();
    match (tag8, u8::try_from(len32), u16::try_from(len32)) {
        (Some(tag), Ok(n), _) => {
            buf.put_u8(tag.byte());
            buf.put_u8(n);
        }
        (_, _, Ok(n)) => {
            buf.put_u8(tag16.byte());
            buf.put_u16(n);
        }
        _ => {
            buf.put_u8(tag32.byte());
            buf.put_u32(len32);
        }
    }
    Ok(())
}
