use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::Result;
use crate::transport::{Transport, UnixTransport, UnixTransportBuilder};

/// High-level channel for typed messages
///
/// Combines a transport and codec. The server side answers one request per
/// connection, so a channel is normally used for a single [`Channel::request`].
pub struct Channel<C> {
    transport: Box<dyn Transport>,
    codec: C,
}

impl<C: Codec> Channel<C> {
    /// Create a channel from an existing transport
    pub fn from_transport(transport: impl Transport + 'static, codec: C) -> Self {
        Self {
            transport: Box::new(transport),
            codec,
        }
    }

    /// Open a Unix socket channel
    pub async fn unix(path: impl AsRef<Path>, codec: C) -> Result<Self> {
        let transport = UnixTransport::connect(path).await?;
        Ok(Self::from_transport(transport, codec))
    }

    /// Open a Unix socket channel with builder settings
    pub async fn connect(builder: UnixTransportBuilder, codec: C) -> Result<Self> {
        let transport = builder.connect().await?;
        Ok(Self::from_transport(transport, codec))
    }

    /// Send a message over the channel
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let bytes = self.codec.encode(message)?;
        self.transport.send(&bytes).await
    }

    /// Receive a message from the channel
    pub async fn receive<T: for<'de> Deserialize<'de>>(&mut self) -> Result<T> {
        let bytes = self.transport.receive().await?;
        self.codec.decode(&bytes)
    }

    /// Send a request and wait for its response
    ///
    /// The response is read while the request is still being written.
    pub async fn request<Req, Res>(&mut self, request: &Req) -> Result<Res>
    where
        Req: Serialize,
        Res: for<'de> Deserialize<'de>,
    {
        let bytes = self.codec.encode(request)?;
        let response = self.transport.exchange(&bytes).await?;
        self.codec.decode(&response)
    }

    /// Close the channel
    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }
}
