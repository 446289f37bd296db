use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};

use crate::error::{Error, Result};
use crate::frame::{write_frame, Boundary, FrameReader, StreamSink, StreamSource};
use crate::transport::Transport;

/// Unix domain socket transport with sentinel framing
///
/// Frames are the payload followed by a single `0x00` byte, written in
/// 1024-byte chunks. Incoming frames end at a trailing sentinel once the
/// bytes before it hold one complete encoded value.
pub struct UnixTransport {
    source: StreamSource<OwnedReadHalf>,
    sink: StreamSink<OwnedWriteHalf>,
    reader: FrameReader,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
}

impl UnixTransport {
    /// Connect to a Unix socket with no timeouts
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().path(path).connect().await
    }

    /// Connect with a connect timeout
    pub async fn connect_timeout(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        Self::builder()
            .path(path)
            .connect_timeout(timeout)
            .connect()
            .await
    }

    /// Create a builder for configuring the transport
    pub fn builder() -> UnixTransportBuilder {
        UnixTransportBuilder::new()
    }

    /// Create from an existing UnixStream
    pub fn from_stream(stream: UnixStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            source: StreamSource::new(read),
            sink: StreamSink::new(write),
            reader: FrameReader::new(Boundary::Codec),
            send_timeout: None,
            receive_timeout: None,
        }
    }

    fn with_timeouts(mut self, send: Option<Duration>, receive: Option<Duration>) -> Self {
        self.send_timeout = send;
        self.receive_timeout = receive;
        self
    }
}

impl std::fmt::Debug for UnixTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixTransport")
            .field("boundary", &self.reader.boundary())
            .field("send_timeout", &self.send_timeout)
            .field("receive_timeout", &self.receive_timeout)
            .finish_non_exhaustive()
    }
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    what: &str,
    op: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, op)
            .await
            .map_err(|_| Error::Custom(format!("{what} timeout exceeded")))?,
        None => op.await,
    }
}

#[async_trait::async_trait]
impl Transport for UnixTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        with_timeout(self.send_timeout, "Send", write_frame(&mut self.sink, bytes)).await
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        let reader = self.reader;
        with_timeout(self.receive_timeout, "Receive", reader.read(&mut self.source)).await
    }

    /// Reads and writes concurrently; bounded by the receive timeout
    async fn exchange(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        let reader = self.reader;
        let source = &mut self.source;
        let sink = &mut self.sink;
        let exchange = async move {
            tokio::try_join!(reader.read(source), write_frame(sink, bytes))
                .map(|(response, ())| response)
        };
        with_timeout(self.receive_timeout, "Receive", exchange).await
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.shutdown().await
    }
}

/// Unix socket listener for accepting incoming connections
#[derive(Debug)]
pub struct UnixTransportListener {
    listener: UnixListener,
    path: PathBuf,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
}

impl UnixTransportListener {
    /// Bind to a Unix socket path
    ///
    /// A file left at `path` by an earlier process is removed first.
    pub async fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        remove_stale_socket(&path);

        let listener = UnixListener::bind(&path)?;
        Ok(Self {
            listener,
            path,
            send_timeout: None,
            receive_timeout: None,
        })
    }

    /// Send timeout applied to every accepted connection
    pub fn send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Receive timeout applied to every accepted connection
    pub fn receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Accept an incoming connection
    pub async fn accept(&self) -> Result<UnixTransport> {
        let (stream, _) = self.listener.accept().await?;
        Ok(UnixTransport::from_stream(stream).with_timeouts(self.send_timeout, self.receive_timeout))
    }

    /// Get the path this listener is bound to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the listener and remove the socket file
    pub async fn close(&mut self) -> Result<()> {
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

fn remove_stale_socket(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove stale socket"
        ),
    }
}

impl Drop for UnixTransportListener {
    fn drop(&mut self) {
        // Clean up socket file on drop
        let _ = std::fs::remove_file(&self.path);
    }
}

#[async_trait::async_trait]
impl crate::transport::TransportListener for UnixTransportListener {
    type Transport = UnixTransport;

    async fn accept(&self) -> Result<Self::Transport> {
        UnixTransportListener::accept(self).await
    }

    async fn close(&mut self) -> Result<()> {
        UnixTransportListener::close(self).await
    }
}

/// Builder for configuring Unix socket transport
#[derive(Debug, Default, Clone)]
pub struct UnixTransportBuilder {
    path: Option<PathBuf>,
    connect_timeout: Option<Duration>,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
}

impl UnixTransportBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path to connect to
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Set the receive timeout
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    /// Connect with the configured settings
    pub async fn connect(self) -> Result<UnixTransport> {
        let path = self
            .path
            .ok_or_else(|| Error::Custom("Path not set".to_string()))?;

        let connect_op = UnixStream::connect(&path);

        let connected = if let Some(timeout) = self.connect_timeout {
            tokio::time::timeout(timeout, connect_op)
                .await
                .map_err(|_| Error::Custom("Connect timeout exceeded".to_string()))?
        } else {
            connect_op.await
        };
        let stream = connected.map_err(|source| Error::Connect { path, source })?;

        Ok(UnixTransport::from_stream(stream)
            .with_timeouts(self.send_timeout, self.receive_timeout))
    }
}
