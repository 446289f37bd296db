use std::collections::BTreeMap;

use crate::error::DecodeError;
use crate::tag::Tag;
use crate::value::{Key, Value};

/// Arrays and maps nested deeper than this are rejected
pub const MAX_DEPTH: usize = 512;

/// Most elements reserved up front for one array; more grow on demand
const PREALLOC_LIMIT: usize = 4096;

type Result<T> = std::result::Result<T, DecodeError>;

/// Decode exactly one value spanning the whole input
pub fn decode(bytes: &[u8]) -> Result<Value> {
    let (value, consumed) = decode_prefix(bytes)?;
    if consumed < bytes.len() {
        return Err(DecodeError::TrailingBytes {
            offset: consumed,
            remaining: bytes.len() - consumed,
        });
    }
    Ok(value)
}

/// Decode one value from the front of the input
///
/// Returns the value and the number of bytes it occupied; anything after
/// that is left untouched.
pub fn decode_prefix(bytes: &[u8]) -> Result<(Value, usize)> {
    let mut decoder = Decoder {
        buf: bytes,
        pos: 0,
    };
    let value = decoder.value()?;
    Ok((value, decoder.pos))
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: n - remaining,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        self.array().map(u16::from_be_bytes)
    }

    fn u32(&mut self) -> Result<u32> {
        self.array().map(u32::from_be_bytes)
    }

    fn len8(&mut self) -> Result<usize> {
        self.u8().map(usize::from)
    }

    fn len16(&mut self) -> Result<usize> {
        self.u16().map(usize::from)
    }

    fn len32(&mut self) -> Result<usize> {
        self.u32().map(|n| n as usize)
    }

    /// Decode one value, keeping open containers on an explicit stack
    ///
    /// Nesting depth costs heap, not native stack, so hostile input cannot
    /// overflow the thread running the decoder.
    fn value(&mut self) -> Result<Value> {
        let mut open: Vec<Container> = Vec::new();

        loop {
            let offset = self.pos;
            let (mut value, mut start) = match self.item(offset)? {
                Item::Value(value) => (value, offset),
                Item::Open(container) => {
                    if open.len() >= MAX_DEPTH {
                        return Err(DecodeError::TooDeep {
                            limit: MAX_DEPTH,
                            offset,
                        });
                    }
                    if !container.is_full() {
                        open.push(container);
                        continue;
                    }
                    container.finish()
                }
            };

            // Hand the finished value to its parent, closing every container it fills
            loop {
                let Some(mut parent) = open.pop() else {
                    return Ok(value);
                };
                parent.push(value, start)?;
                if !parent.is_full() {
                    open.push(parent);
                    break;
                }
                (value, start) = parent.finish();
            }
        }
    }

    /// Read one scalar, or the header of a container
    fn item(&mut self, offset: usize) -> Result<Item> {
        let byte = self.u8()?;

        let value = match Tag::from_byte(byte) {
            Tag::PosFixInt(n) => Value::Integer(n.into()),
            Tag::NegFixInt(n) => Value::Integer(n.into()),
            Tag::Nil => Value::Nil,
            Tag::False => Value::Bool(false),
            Tag::True => Value::Bool(true),

            Tag::Uint8 => Value::Integer(self.u8()?.into()),
            Tag::Uint16 => Value::Integer(self.u16()?.into()),
            Tag::Uint32 => Value::Integer(self.u32()?.into()),
            Tag::Uint64 => Value::Integer(u64::from_be_bytes(self.array()?).into()),
            Tag::Int8 => Value::Integer(i8::from_be_bytes(self.array()?).into()),
            Tag::Int16 => Value::Integer(i16::from_be_bytes(self.array()?).into()),
            Tag::Int32 => Value::Integer(i32::from_be_bytes(self.array()?).into()),
            Tag::Int64 => Value::Integer(i64::from_be_bytes(self.array()?).into()),

            Tag::Float32 => Value::Float(f32::from_be_bytes(self.array()?).into()),
            Tag::Float64 => Value::Float(f64::from_be_bytes(self.array()?)),

            Tag::FixStr(len) => self.string(usize::from(len))?,
            Tag::Str8 => {
                let len = self.len8()?;
                self.string(len)?
            }
            Tag::Str16 => {
                let len = self.len16()?;
                self.string(len)?
            }
            Tag::Str32 => {
                let len = self.len32()?;
                self.string(len)?
            }

            Tag::Bin8 => {
                let len = self.len8()?;
                Value::Binary(self.take(len)?.to_vec())
            }
            Tag::Bin16 => {
                let len = self.len16()?;
                Value::Binary(self.take(len)?.to_vec())
            }
            Tag::Bin32 => {
                let len = self.len32()?;
                Value::Binary(self.take(len)?.to_vec())
            }

            Tag::FixArray(len) => return Ok(self.array_of(offset, usize::from(len))),
            Tag::Array16 => {
                let len = self.len16()?;
                return Ok(self.array_of(offset, len));
            }
            Tag::Array32 => {
                let len = self.len32()?;
                return Ok(self.array_of(offset, len));
            }

            Tag::FixMap(len) => return Ok(Self::map_of(offset, usize::from(len))),
            Tag::Map16 => {
                let len = self.len16()?;
                return Ok(Self::map_of(offset, len));
            }
            Tag::Map32 => {
                let len = self.len32()?;
                return Ok(Self::map_of(offset, len));
            }

            Tag::Reserved => return Err(DecodeError::Reserved { tag: byte, offset }),
            Tag::Ext8
            | Tag::Ext16
            | Tag::Ext32
            | Tag::FixExt1
            | Tag::FixExt2
            | Tag::FixExt4
            | Tag::FixExt8
            | Tag::FixExt16 => return Err(DecodeError::Extension { tag: byte, offset }),
        };
        Ok(Item::Value(value))
    }

    fn string(&mut self, len: usize) -> Result<Value> {
        let offset = self.pos;
        let bytes = self.take(len)?;
        let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { offset })?;
        Ok(Value::String(s.to_owned()))
    }

    fn array_of(&self, start: usize, len: usize) -> Item {
        // Each element takes at least one byte, so never reserve past the input,
        // and nested headers must not multiply the reservation.
        Item::Open(Container::Array {
            start,
            remaining: len,
            items: Vec::with_capacity(len.min(self.remaining()).min(PREALLOC_LIMIT)),
        })
    }

    fn map_of(start: usize, len: usize) -> Item {
        Item::Open(Container::Map {
            start,
            remaining: len,
            entries: BTreeMap::new(),
            key: None,
        })
    }
}

enum Item {
    Value(Value),
    Open(Container),
}

/// A container whose elements are still being decoded
enum Container {
    Array {
        start: usize,
        remaining: usize,
        items: Vec<Value>,
    },
    Map {
        start: usize,
        remaining: usize,
        entries: BTreeMap<Key, Value>,
        key: Option<Key>,
    },
}

impl Container {
    fn is_full(&self) -> bool {
        match self {
            Container::Array { remaining, .. } | Container::Map { remaining, .. } => {
                *remaining == 0
            }
        }
    }

    /// Add a finished element that started at `offset`
    fn push(&mut self, value: Value, offset: usize) -> Result<()> {
        match self {
            Container::Array {
                remaining, items, ..
            } => {
                items.push(value);
                *remaining -= 1;
            }
            Container::Map {
                remaining,
                entries,
                key,
                ..
            } => match key.take() {
                Some(key) => {
                    entries.insert(key, value);
                    *remaining -= 1;
                }
                None => {
                    *key = Some(match value {
                        Value::Integer(i) => Key::Integer(i),
                        Value::String(s) => Key::String(s),
                        _ => return Err(DecodeError::InvalidKey { offset }),
                    });
                }
            },
        }
        Ok(())
    }

    fn finish(self) -> (Value, usize) {
        match self {
            Container::Array { start, items, .. } => (Value::Array(items), start),
            Container::Map { start, entries, .. } => (Value::Map(entries), start),
        }
    }
}
