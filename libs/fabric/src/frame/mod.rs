//! Sentinel-delimited framing over byte streams
//!
//! A frame on the wire is `<payload><SENTINEL>`. Writers emit it in chunks of
//! at most [`CHUNK_SIZE`] bytes; readers accumulate chunks from either a
//! pull-style or a push-style source until the frame ends.

pub mod read;
pub mod write;

pub use self::read::{
    push_source, read_frame, Boundary, ChunkSource, FrameReader, PushHandle, PushSource,
    StreamSource,
};
pub use self::write::{write_frame, ChunkSink, StreamSink};

/// Byte terminating every frame
pub const SENTINEL: u8 = 0x00;

/// Largest chunk handed to a sink in one write
pub const CHUNK_SIZE: usize = 1024;
