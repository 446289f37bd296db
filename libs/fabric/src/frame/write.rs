use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::frame::{CHUNK_SIZE, SENTINEL};

/// Byte sink accepting one chunk at a time
#[async_trait::async_trait]
pub trait ChunkSink: Send {
    /// Write a chunk, returning once it has been drained to the peer
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;
}

/// Sink writing chunks to an [`AsyncWrite`], flushing after each one
#[derive(Debug)]
pub struct StreamSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Shut down the write side of the underlying stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> ChunkSink for StreamSink<W> {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.writer.write_all(chunk).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Write `payload` followed by the sentinel as one frame
///
/// Chunks go out strictly in order, each awaited before the next; the first
/// sink error aborts the remaining chunks.
pub async fn write_frame<S: ChunkSink + ?Sized>(sink: &mut S, payload: &[u8]) -> Result<()> {
    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.push(SENTINEL);

    for chunk in frame.chunks(CHUNK_SIZE) {
        sink.write_chunk(chunk).await?;
    }
    tracing::trace!(len = payload.len(), "frame written");
    Ok(())
}
