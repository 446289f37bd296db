use std::collections::BTreeMap;
use std::fmt;

use crate::error::EncodeError;

/// Integer in the range `i64::MIN..=u64::MAX`
///
/// Non-negative values are always held unsigned, so two integers compare
/// equal regardless of the wire width they were decoded from.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Integer(pub(crate) Repr);

// Variant order gives numeric ordering: every `Neg` is below every `Pos`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Repr {
    Neg(i64),
    Pos(u64),
}

impl Integer {
    pub fn as_i64(self) -> Option<i64> {
        match self.0 {
            Repr::Neg(n) => Some(n),
            Repr::Pos(n) => i64::try_from(n).ok(),
        }
    }

    pub fn as_u64(self) -> Option<u64> {
        match self.0 {
            Repr::Neg(_) => None,
            Repr::Pos(n) => Some(n),
        }
    }

    pub fn is_negative(self) -> bool {
        matches!(self.0, Repr::Neg(_))
    }

    pub fn as_i128(self) -> i128 {
        match self.0 {
            Repr::Neg(n) => n.into(),
            Repr::Pos(n) => n.into(),
        }
    }
}

impl fmt::Debug for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Neg(n) => write!(f, "{n}"),
            Repr::Pos(n) => write!(f, "{n}"),
        }
    }
}

macro_rules! integer_from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for Integer {
            fn from(n: $t) -> Self {
                Integer(Repr::Pos(n as u64))
            }
        }
    )*};
}

macro_rules! integer_from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for Integer {
            fn from(n: $t) -> Self {
                if n < 0 {
                    Integer(Repr::Neg(n as i64))
                } else {
                    Integer(Repr::Pos(n as u64))
                }
            }
        }
    )*};
}

integer_from_unsigned!(u8, u16, u32, u64, usize);
integer_from_signed!(i8, i16, i32, i64, isize);

impl TryFrom<i128> for Integer {
    type Error = EncodeError;

    fn try_from(n: i128) -> Result<Self, EncodeError> {
        if let Ok(n) = u64::try_from(n) {
            Ok(Integer(Repr::Pos(n)))
        } else if let Ok(n) = i64::try_from(n) {
            Ok(Integer(Repr::Neg(n)))
        } else {
            Err(EncodeError::IntegerOverflow(n.to_string()))
        }
    }
}

impl TryFrom<u128> for Integer {
    type Error = EncodeError;

    fn try_from(n: u128) -> Result<Self, EncodeError> {
        u64::try_from(n)
            .map(|n| Integer(Repr::Pos(n)))
            .map_err(|_| EncodeError::IntegerOverflow(n.to_string()))
    }
}

/// Map key: only strings and integers may index a map
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Integer(Integer),
    String(String),
}

impl Key {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::String(s) => Some(s),
            Key::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<Integer> {
        match self {
            Key::Integer(i) => Some(*i),
            Key::String(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Integer(i) => write!(f, "{i}"),
            Key::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::String(s)
    }
}

impl From<Integer> for Key {
    fn from(i: Integer) -> Self {
        Key::Integer(i)
    }
}

macro_rules! key_from_int {
    ($($t:ty),*) => {$(
        impl From<$t> for Key {
            fn from(n: $t) -> Self {
                Key::Integer(n.into())
            }
        }
    )*};
}

key_from_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl TryFrom<Value> for Key {
    type Error = Value;

    /// Hands the value back when it cannot be used as a key
    fn try_from(value: Value) -> Result<Self, Value> {
        match value {
            Value::Integer(i) => Ok(Key::Integer(i)),
            Value::String(s) => Ok(Key::String(s)),
            other => Err(other),
        }
    }
}

/// Structured value exchanged between client and server
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Integer(Integer),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Array(Vec<Value>),
    Map(BTreeMap<Key, Value>),
}

impl Value {
    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<Integer> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(Integer::as_i64)
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_integer().and_then(Integer::as_u64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<Key, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a map entry; `None` for missing keys and non-map values
    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(&key.into()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Integer> for Value {
    fn from(i: Integer) -> Self {
        Value::Integer(i)
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Integer(n.into())
            }
        }
    )*};
}

value_from_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Binary(b.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(a)
    }
}

impl From<BTreeMap<Key, Value>> for Value {
    fn from(m: BTreeMap<Key, Value>) -> Self {
        Value::Map(m)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Integer(i) => Value::Integer(i),
            Key::String(s) => Value::String(s),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::Array(iter.into_iter().collect())
    }
}

impl FromIterator<(Key, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (Key, Value)>>(iter: I) -> Self {
        Value::Map(iter.into_iter().collect())
    }
}
