use std::fmt::Display;

use thiserror::Error;

/// Failure to turn a value into wire bytes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("{kind} of length {len} exceeds the 32-bit size limit")]
    TooLong { kind: &'static str, len: usize },

    #[error("integer {0} does not fit in 64 bits")]
    IntegerOverflow(String),

    #[error("map keys must be strings or integers, got {0}")]
    InvalidKey(&'static str),

    #[error("{0}")]
    Custom(String),
}

impl serde::ser::Error for EncodeError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

/// Failure to turn wire bytes back into a value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("input truncated at offset {offset}: {needed} more bytes needed")]
    Truncated { offset: usize, needed: usize },

    #[error("reserved type byte 0x{tag:02x} at offset {offset}")]
    Reserved { tag: u8, offset: usize },

    #[error("extension type 0x{tag:02x} at offset {offset} is not supported")]
    Extension { tag: u8, offset: usize },

    #[error("map key at offset {offset} must be a string or integer")]
    InvalidKey { offset: usize },

    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("nesting deeper than {limit} levels at offset {offset}")]
    TooDeep { limit: usize, offset: usize },

    #[error("{remaining} trailing bytes after value ending at offset {offset}")]
    TrailingBytes { offset: usize, remaining: usize },

    #[error("{0}")]
    Message(String),
}

impl DecodeError {
    /// Whether more input could have completed the value
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

impl serde::de::Error for DecodeError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::Message(msg.to_string())
    }
}
