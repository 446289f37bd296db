//! Socklink Core - Value model and binary codec
//!
//! A MessagePack-compatible encoding of a small structured [`Value`] type.
//! Pure byte-level code: no I/O.
//!
//! # Example
//!
//! ```
//! use socklink_core::{decode, encode, Value};
//!
//! let value = Value::Array(vec![Value::from("hello"), Value::from(42u8)]);
//! let bytes = encode(&value).unwrap();
//! assert_eq!(bytes, [0x92, 0xa5, b'h', b'e', b'l', b'l', b'o', 0x2a]);
//! assert_eq!(decode(&bytes).unwrap(), value);
//! ```

pub mod de;
pub mod decode;
pub mod encode;
pub mod error;
pub mod scan;
pub mod ser;
pub mod tag;
pub mod value;

// Re-exports for convenience
pub use de::from_value;
pub use decode::{decode, decode_prefix};
pub use encode::{encode, encode_into};
pub use error::{DecodeError, EncodeError};
pub use scan::Scanner;
pub use ser::to_value;
pub use tag::Tag;
pub use value::{Integer, Key, Value};
