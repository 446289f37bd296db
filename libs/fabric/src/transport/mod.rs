use crate::error::Result;

pub mod unix;

pub use self::unix::{UnixTransport, UnixTransportBuilder, UnixTransportListener};

/// Transport trait for sending and receiving frames
///
/// Each transport instance represents a single connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive one frame
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Send a request frame and receive the response frame
    ///
    /// The default sends before it starts reading. Transports that can read
    /// while writing should override this, since a peer may start answering
    /// before the request is fully written.
    async fn exchange(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        self.send(bytes).await?;
        self.receive().await
    }

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;
}

/// Listener producing one transport per accepted connection
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync {
    type Transport: Transport + 'static;

    /// Accept an incoming connection
    async fn accept(&self) -> Result<Self::Transport>;

    /// Stop listening and release the listening address
    async fn close(&mut self) -> Result<()>;
}
