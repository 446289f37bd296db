use bytes::{Bytes, BytesMut};
use socklink_core::Scanner;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::frame::{CHUNK_SIZE, SENTINEL};

/// Pull-style byte source
///
/// Push-style producers are adapted through [`push_source`].
#[async_trait::async_trait]
pub trait ChunkSource: Send {
    /// Next chunk, or `None` once the source has completed
    ///
    /// After returning `None` a source keeps returning `None` without waiting.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// Source pulling chunks from an [`AsyncRead`]
#[derive(Debug)]
pub struct StreamSource<R> {
    reader: R,
    done: bool,
}

impl<R: AsyncRead + Unpin + Send> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[async_trait::async_trait]
impl<R: AsyncRead + Unpin + Send> ChunkSource for StreamSource<R> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.done {
            return Ok(None);
        }

        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        if self.reader.read_buf(&mut buf).await? == 0 {
            self.done = true;
            return Ok(None);
        }
        Ok(Some(buf.freeze()))
    }
}

enum PushEvent {
    Data(Bytes),
    End,
    Failed(std::io::Error),
}

/// Producer side of a push-style source
///
/// Cloneable, so data and end-of-input callbacks can each hold one.
#[derive(Debug, Clone)]
pub struct PushHandle {
    tx: mpsc::UnboundedSender<PushEvent>,
}

impl PushHandle {
    /// Deliver a chunk; returns `false` once the reading side is gone
    pub fn push(&self, chunk: impl Into<Bytes>) -> bool {
        self.tx.send(PushEvent::Data(chunk.into())).is_ok()
    }

    /// Signal end of input; chunks pushed afterwards are never read
    pub fn end(&self) {
        let _ = self.tx.send(PushEvent::End);
    }

    /// Signal a source failure to the reader
    pub fn fail(&self, error: std::io::Error) {
        let _ = self.tx.send(PushEvent::Failed(error));
    }
}

impl std::fmt::Debug for PushEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushEvent::Data(chunk) => write!(f, "Data({} bytes)", chunk.len()),
            PushEvent::End => f.write_str("End"),
            PushEvent::Failed(err) => write!(f, "Failed({err})"),
        }
    }
}

/// Reader side of a push-style source
///
/// Completes on [`PushHandle::end`] or once every handle is dropped.
#[derive(Debug)]
pub struct PushSource {
    rx: mpsc::UnboundedReceiver<PushEvent>,
    done: bool,
}

/// Create a connected push handle and source
pub fn push_source() -> (PushHandle, PushSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PushHandle { tx }, PushSource { rx, done: false })
}

#[async_trait::async_trait]
impl ChunkSource for PushSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.done {
            return Ok(None);
        }

        match self.rx.recv().await {
            Some(PushEvent::Data(chunk)) => Ok(Some(chunk)),
            Some(PushEvent::Failed(err)) => {
                self.done = true;
                Err(err.into())
            }
            Some(PushEvent::End) | None => {
                self.done = true;
                self.rx.close();
                Ok(None)
            }
        }
    }
}

/// Where a frame ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boundary {
    /// The first chunk whose last byte is the sentinel ends the frame
    #[default]
    Sentinel,
    /// A trailing sentinel ends the frame only when the bytes before it hold
    /// one complete encoded value
    ///
    /// Payload bytes equal to the sentinel that happen to end a chunk are
    /// kept instead of cutting the frame short.
    Codec,
}

/// Accumulates chunks from a [`ChunkSource`] into one frame payload
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameReader {
    boundary: Boundary,
}

impl FrameReader {
    pub fn new(boundary: Boundary) -> Self {
        Self { boundary }
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    /// Read one frame, sentinel stripped
    ///
    /// A source completing before the sentinel is seen ends the frame with
    /// whatever arrived. Bytes after a sentinel inside the same chunk are not
    /// treated as a following frame.
    pub async fn read<S: ChunkSource + ?Sized>(&self, source: &mut S) -> Result<Vec<u8>> {
        let mut frame = Vec::new();
        let mut scanner = Scanner::new();

        while let Some(chunk) = source.next_chunk().await? {
            let Some((&last, body)) = chunk.split_last() else {
                continue;
            };
            if last != SENTINEL {
                frame.extend_from_slice(&chunk);
                continue;
            }

            match self.boundary {
                Boundary::Sentinel => {
                    frame.extend_from_slice(body);
                    tracing::trace!(len = frame.len(), "frame complete");
                    return Ok(frame);
                }
                Boundary::Codec => {
                    frame.extend_from_slice(&chunk);
                    let payload = frame.len() - 1;
                    if holds_value(&mut scanner, &frame[..payload]) {
                        frame.truncate(payload);
                        tracing::trace!(len = payload, "frame complete");
                        return Ok(frame);
                    }
                }
            }
        }

        tracing::trace!(len = frame.len(), "source completed before sentinel");
        Ok(frame)
    }
}

/// Read one frame using the plain sentinel boundary
pub async fn read_frame<S: ChunkSource + ?Sized>(source: &mut S) -> Result<Vec<u8>> {
    FrameReader::default().read(source).await
}

/// Whether `bytes` already hold a complete value
///
/// The scanner resumes where the previous check stopped, since every check
/// sees an extension of the bytes the last one saw. Malformed input counts as
/// complete; decoding reports it later.
fn holds_value(scanner: &mut Scanner, bytes: &[u8]) -> bool {
    !matches!(scanner.scan(bytes), Ok(None))
}
