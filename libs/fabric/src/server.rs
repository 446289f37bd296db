//! Concurrent single-exchange server
//!
//! Each accepted connection carries exactly one request and one response.
//! Connections are served independently; a failure on one is reported on the
//! [`ErrorEvents`] stream and never affects the others or the accept loop.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use socklink_core::{decode, encode, Value};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, Error, Result};
use crate::transport::{Transport, TransportListener, UnixTransportListener};

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Failures held for [`ErrorEvents`] before newer ones are dropped
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Turns one request value into one response value
///
/// Implemented for any `Fn(Value) -> impl Future<Output = Result<Value, BoxError>>`,
/// so plain async functions can be used directly.
#[async_trait::async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, request: Value) -> std::result::Result<Value, BoxError>;
}

#[async_trait::async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Value, BoxError>> + Send + 'static,
{
    async fn handle(&self, request: Value) -> std::result::Result<Value, BoxError> {
        (self)(request).await
    }
}

/// Where in the connection pipeline a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Accept,
    Read,
    Decode,
    Handle,
    Encode,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Accept => "accept",
            Stage::Read => "read",
            Stage::Decode => "decode",
            Stage::Handle => "handle",
            Stage::Encode => "encode",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// A failure isolated to one connection
#[derive(Debug, thiserror::Error)]
#[error("connection {connection} failed during {stage}: {error}")]
pub struct ConnectionError {
    /// Sequence number of the connection, starting at 1
    pub connection: u64,
    pub stage: Stage,
    #[source]
    pub error: Error,
}

impl ConnectionError {
    fn new(connection: u64, stage: Stage, error: impl Into<Error>) -> Self {
        Self {
            connection,
            stage,
            error: error.into(),
        }
    }
}

/// Stream of per-connection failures
///
/// Holds a bounded number of undrained failures; while it is full, further
/// failures are only logged. Ends once the server has shut down and every
/// connection task has finished.
#[derive(Debug)]
pub struct ErrorEvents {
    rx: mpsc::Receiver<ConnectionError>,
}

impl ErrorEvents {
    /// Wait for the next failure
    pub async fn recv(&mut self) -> Option<ConnectionError> {
        self.rx.recv().await
    }

    /// Take the next failure if one is already queued
    pub fn try_recv(&mut self) -> Option<ConnectionError> {
        self.rx.try_recv().ok()
    }

    /// Take every failure queued so far
    pub fn drain(&mut self) -> Vec<ConnectionError> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Handle to a running server
#[derive(Debug)]
pub struct ServerHandle {
    path: Option<PathBuf>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Socket path, when started through [`listen`] or [`ServerBuilder::listen`]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the accept loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop accepting, release the listener, and wait for the accept loop
    ///
    /// Connections already accepted keep running until they finish.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| Error::Custom(format!("Accept loop failed: {e}")))
    }
}

/// Entry point for configuring a server
#[derive(Debug)]
pub struct Server;

impl Server {
    /// Create a builder for configuring the server
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }
}

/// Builder for a Unix socket server
#[derive(Debug, Default, Clone)]
pub struct ServerBuilder {
    path: Option<PathBuf>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    event_capacity: Option<usize>,
}

impl ServerBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the socket path to listen on
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Limit how long a connection may take to deliver its request
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Limit how long writing a response may take
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// How many undrained failures [`ErrorEvents`] keeps, at least one
    ///
    /// Defaults to [`DEFAULT_EVENT_CAPACITY`].
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Bind the socket and start serving with `handler`
    ///
    /// Binding failures are returned here; everything after that is reported
    /// on the returned [`ErrorEvents`].
    pub async fn listen<H: Handler>(self, handler: H) -> Result<(ServerHandle, ErrorEvents)> {
        let path = self
            .path
            .ok_or_else(|| Error::Custom("Path not set".to_string()))?;

        let listener = UnixTransportListener::bind(&path)
            .await?
            .send_timeout(self.write_timeout)
            .receive_timeout(self.read_timeout);
        tracing::info!(path = %path.display(), "server listening");

        let capacity = self.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY);
        let (mut handle, events) = spawn(listener, handler, capacity);
        handle.path = Some(path);
        Ok((handle, events))
    }
}

/// Listen on `path` with default settings
///
/// Failures queue on the returned [`ErrorEvents`] up to
/// [`DEFAULT_EVENT_CAPACITY`]; a caller that never drains it loses the newest
/// failures rather than growing memory.
pub async fn listen<H: Handler>(
    path: impl AsRef<Path>,
    handler: H,
) -> Result<(ServerHandle, ErrorEvents)> {
    Server::builder().path(path).listen(handler).await
}

/// Serve connections from an already bound listener
///
/// Must be called from within a Tokio runtime.
pub fn serve<L, H>(listener: L, handler: H) -> (ServerHandle, ErrorEvents)
where
    L: TransportListener + 'static,
    H: Handler,
{
    spawn(listener, handler, DEFAULT_EVENT_CAPACITY)
}

fn spawn<L, H>(listener: L, handler: H, capacity: usize) -> (ServerHandle, ErrorEvents)
where
    L: TransportListener + 'static,
    H: Handler,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let cancel = CancellationToken::new();
    let task = tokio::spawn(accept_loop(listener, Arc::new(handler), tx, cancel.clone()));

    let handle = ServerHandle {
        path: None,
        cancel,
        task,
    };
    (handle, ErrorEvents { rx })
}

async fn accept_loop<L, H>(
    mut listener: L,
    handler: Arc<H>,
    events: mpsc::Sender<ConnectionError>,
    cancel: CancellationToken,
) where
    L: TransportListener,
    H: Handler,
{
    let mut next_id: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("server shutting down");
                break;
            }
            accepted = listener.accept() => {
                next_id += 1;
                let id = next_id;

                let transport = match accepted {
                    Ok(transport) => transport,
                    Err(e) => {
                        report(&events, ConnectionError::new(id, Stage::Accept, e));
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };

                tracing::debug!(connection = id, "accepted connection");
                let handler = handler.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    match handle_connection(id, transport, handler.as_ref()).await {
                        Ok(()) => tracing::debug!(connection = id, "connection finished"),
                        Err(e) => report(&events, e),
                    }
                });
            }
        }
    }

    if let Err(e) = listener.close().await {
        tracing::debug!(error = %e, "closing listener failed");
    }
}

/// Read one request, answer it, and close
async fn handle_connection<T, H>(
    id: u64,
    mut transport: T,
    handler: &H,
) -> std::result::Result<(), ConnectionError>
where
    T: Transport,
    H: Handler + ?Sized,
{
    let request = transport
        .receive()
        .await
        .map_err(|e| ConnectionError::new(id, Stage::Read, e))?;
    let request = decode(&request).map_err(|e| ConnectionError::new(id, Stage::Decode, e))?;

    let response = handler
        .handle(request)
        .await
        .map_err(|e| ConnectionError::new(id, Stage::Handle, Error::Handler(e)))?;

    let response = encode(&response).map_err(|e| ConnectionError::new(id, Stage::Encode, e))?;
    transport
        .send(&response)
        .await
        .map_err(|e| ConnectionError::new(id, Stage::Write, e))?;

    if let Err(e) = transport.close().await {
        tracing::debug!(connection = id, error = %e, "closing connection failed");
    }
    Ok(())
}

fn report(events: &mpsc::Sender<ConnectionError>, error: ConnectionError) {
    tracing::warn!(
        connection = error.connection,
        stage = %error.stage,
        error = %error.error,
        "connection failed"
    );
    match events.try_send(error) {
        Ok(()) => {}
        Err(TrySendError::Full(error)) => tracing::warn!(
            connection = error.connection,
            "error event queue full, dropping event"
        ),
        // Nobody listening is fine; the failure is still logged.
        Err(TrySendError::Closed(_)) => {}
    }
}
