//! Leading type byte of every encoded value
//!
//! Every byte value maps to exactly one [`Tag`]; the fix* variants carry the
//! payload packed into the low bits of the byte.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// 0x00..=0x7f
    PosFixInt(u8),
    /// 0x80..=0x8f, entry count
    FixMap(u8),
    /// 0x90..=0x9f, element count
    FixArray(u8),
    /// 0xa0..=0xbf, byte length
    FixStr(u8),
    Nil,
    /// 0xc1, never assigned
    Reserved,
    False,
    True,
    Bin8,
    Bin16,
    Bin32,
    Ext8,
    Ext16,
    Ext32,
    Float32,
    Float64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    FixExt1,
    FixExt2,
    FixExt4,
    FixExt8,
    FixExt16,
    Str8,
    Str16,
    Str32,
    Array16,
    Array32,
    Map16,
    Map32,
    /// 0xe0..=0xff
    NegFixInt(i8),
}

impl Tag {
    pub fn from_byte(byte: u8) -> Tag {
        match byte {
            0x00..=0x7f => Tag::PosFixInt(byte),
            0x80..=0x8f => Tag::FixMap(byte & 0x0f),
            0x90..=0x9f => Tag::FixArray(byte & 0x0f),
            0xa0..=0xbf => Tag::FixStr(byte & 0x1f),
            0xc0 => Tag::Nil,
            0xc1 => Tag::Reserved,
            0xc2 => Tag::False,
            0xc3 => Tag::True,
            0xc4 => Tag::Bin8,
            0xc5 => Tag::Bin16,
            0xc6 => Tag::Bin32,
            0xc7 => Tag::Ext8,
            0xc8 => Tag::Ext16,
            0xc9 => Tag::Ext32,
            0xca => Tag::Float32,
            0xcb => Tag::Float64,
            0xcc => Tag::Uint8,
            0xcd => Tag::Uint16,
            0xce => Tag::Uint32,
            0xcf => Tag::Uint64,
            0xd0 => Tag::Int8,
            0xd1 => Tag::Int16,
            0xd2 => Tag::Int32,
            0xd3 => Tag::Int64,
            0xd4 => Tag::FixExt1,
            0xd5 => Tag::FixExt2,
            0xd6 => Tag::FixExt4,
            0xd7 => Tag::FixExt8,
            0xd8 => Tag::FixExt16,
            0xd9 => Tag::Str8,
            0xda => Tag::Str16,
            0xdb => Tag::Str32,
            0xdc => Tag::Array16,
            0xdd => Tag::Array32,
            0xde => Tag::Map16,
            0xdf => Tag::Map32,
            0xe0..=0xff => Tag::NegFixInt(byte as i8),
        }
    }

    /// The wire byte for this tag
    ///
    /// Fix* payloads are masked to their field width.
    pub fn byte(self) -> u8 {
        match self {
            Tag::PosFixInt(n) => n & 0x7f,
            Tag::FixMap(n) => 0x80 | (n & 0x0f),
            Tag::FixArray(n) => 0x90 | (n & 0x0f),
            Tag::FixStr(n) => 0xa0 | (n & 0x1f),
            Tag::Nil => 0xc0,
            Tag::Reserved => 0xc1,
            Tag::False => 0xc2,
            Tag::True => 0xc3,
            Tag::Bin8 => 0xc4,
            Tag::Bin16 => 0xc5,
            Tag::Bin32 => 0xc6,
            Tag::Ext8 => 0xc7,
            Tag::Ext16 => 0xc8,
            Tag::Ext32 => 0xc9,
            Tag::Float32 => 0xca,
            Tag::Float64 => 0xcb,
            Tag::Uint8 => 0xcc,
            Tag::Uint16 => 0xcd,
            Tag::Uint32 => 0xce,
            Tag::Uint64 => 0xcf,
            Tag::Int8 => 0xd0,
            Tag::Int16 => 0xd1,
            Tag::Int32 => 0xd2,
            Tag::Int64 => 0xd3,
            Tag::FixExt1 => 0xd4,
            Tag::FixExt2 => 0xd5,
            Tag::FixExt4 => 0xd6,
            Tag::FixExt8 => 0xd7,
            Tag::FixExt16 => 0xd8,
            Tag::Str8 => 0xd9,
            Tag::Str16 => 0xda,
            Tag::Str32 => 0xdb,
            Tag::Array16 => 0xdc,
            Tag::Array32 => 0xdd,
            Tag::Map16 => 0xde,
            Tag::Map32 => 0xdf,
            Tag::NegFixInt(n) => (n as u8) | 0xe0,
        }
    }
}
