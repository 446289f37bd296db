//! Incremental detection of where an encoded value ends
//!
//! [`Scanner`] walks the structure of a value without building it. It is
//! fed the same growing buffer again and again and picks up where it left
//! off, so finding the end of a value that arrives in many pieces costs time
//! linear in its length.

use crate::decode::MAX_DEPTH;
use crate::error::DecodeError;
use crate::tag::Tag;

/// Resumable structural scan over a growing buffer
#[derive(Debug, Clone)]
pub struct Scanner {
    /// Offset of the first item not yet stepped over
    pos: usize,
    /// Items still expected at each open level; the bottom entry is the root
    pending: Vec<usize>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            pos: 0,
            pending: vec![1],
        }
    }

    /// Bytes already stepped over
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Continue scanning `buf`
    ///
    /// `buf` must extend the buffer passed on the previous call. Returns the
    /// length of the first value once it is complete, `None` while more bytes
    /// are needed, or the structural error that makes the value undecodable.
    /// String contents and key types are not checked; decoding does that.
    pub fn scan(&mut self, buf: &[u8]) -> Result<Option<usize>, DecodeError> {
        loop {
            while self.pending.last() == Some(&0) {
                self.pending.pop();
            }
            if self.pending.is_empty() {
                return Ok(Some(self.pos));
            }

            let Some(step) = header(buf, self.pos)? else {
                return Ok(None);
            };
            let end = self.pos.saturating_add(step.len);
            if end > buf.len() {
                return Ok(None);
            }

            if let Some(children) = step.children {
                // The root slot is not a container
                if self.pending.len() > MAX_DEPTH {
                    return Err(DecodeError::TooDeep {
                        limit: MAX_DEPTH,
                        offset: self.pos,
                    });
                }
                self.finish_item();
                self.pending.push(children);
            } else {
                self.finish_item();
            }
            self.pos = end;
        }
    }

    fn finish_item(&mut self) {
        if let Some(top) = self.pending.last_mut() {
            *top -= 1;
        }
    }
}

struct Step {
    /// Header plus inline payload
    len: usize,
    /// Element count for arrays, key and value count for maps
    children: Option<usize>,
}

type Parsed = Result<Option<Step>, DecodeError>;

/// Parse the item header at `pos`, or `None` if it is not all there yet
fn header(buf: &[u8], pos: usize) -> Parsed {
    let Some(&byte) = buf.get(pos) else {
        return Ok(None);
    };
    let field = |width: usize| -> Option<usize> {
        let bytes = buf.get(pos + 1..pos + 1 + width)?;
        Some(bytes.iter().fold(0usize, |n, &b| (n << 8) | usize::from(b)))
    };
    let fixed = |len: usize| -> Parsed { Ok(Some(Step { len, children: None })) };
    let sized = |width: usize| -> Parsed {
        Ok(field(width).map(|n| Step {
            len: (1 + width).saturating_add(n),
            children: None,
        }))
    };
    let counted = |width: usize, per_entry: usize| -> Parsed {
        Ok(field(width).map(|n| Step {
            len: 1 + width,
            children: Some(n.saturating_mul(per_entry)),
        }))
    };

    match Tag::from_byte(byte) {
        Tag::PosFixInt(_) | Tag::NegFixInt(_) | Tag::Nil | Tag::False | Tag::True => fixed(1),
        Tag::Uint8 | Tag::Int8 => fixed(2),
        Tag::Uint16 | Tag::Int16 => fixed(3),
        Tag::Uint32 | Tag::Int32 | Tag::Float32 => fixed(5),
        Tag::Uint64 | Tag::Int64 | Tag::Float64 => fixed(9),

        Tag::FixStr(len) => fixed(1 + usize::from(len)),
        Tag::Str8 | Tag::Bin8 => sized(1),
        Tag::Str16 | Tag::Bin16 => sized(2),
        Tag::Str32 | Tag::Bin32 => sized(4),

        Tag::FixArray(len) => Ok(Some(Step {
            len: 1,
            children: Some(usize::from(len)),
        })),
        Tag::Array16 => counted(2, 1),
        Tag::Array32 => counted(4, 1),
        Tag::FixMap(len) => Ok(Some(Step {
            len: 1,
            children: Some(usize::from(len) * 2),
        })),
        Tag::Map16 => counted(2, 2),
        Tag::Map32 => counted(4, 2),

        Tag::Reserved => Err(DecodeError::Reserved { tag: byte, offset: pos }),
        Tag::Ext8
        | Tag::Ext16
        | Tag::Ext32
        | Tag::FixExt1
        | Tag::FixExt2
        | Tag::FixExt4
        | Tag::FixExt8
        | Tag::FixExt16 => Err(DecodeError::Extension { tag: byte, offset: pos }),
    }
}
