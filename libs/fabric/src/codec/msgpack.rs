use serde::{Deserialize, Serialize};
use socklink_core::{decode, encode, from_value, to_value};

use crate::codec::Codec;
use crate::error::Result;

/// MessagePack codec going through the dynamic [`socklink_core::Value`] model
///
/// Produces exactly the bytes [`socklink_core::encode`] would for the same
/// value, so typed and untyped peers interoperate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let value = to_value(value)?;
        Ok(encode(&value)?)
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T> {
        let value = decode(bytes)?;
        Ok(from_value(value)?)
    }
}
