use std::path::Path;

use serde::{Deserialize, Serialize};
use socklink_core::{decode, encode, Value};

use crate::channel::Channel;
use crate::codec::Codec;
use crate::error::Result;
use crate::transport::{Transport, UnixTransport, UnixTransportBuilder};

/// Perform a one-off request/response against the server at `path`
///
/// Opens a connection, writes the encoded request as one frame, reads one
/// response frame, and closes the connection. Connection failures surface as
/// [`crate::Error::Connect`]; a response that does not decode surfaces as
/// [`crate::Error::Decode`].
pub async fn request(path: impl AsRef<Path>, value: &Value) -> Result<Value> {
    request_with(UnixTransport::builder().path(path), value).await
}

/// Like [`request`], using the path and timeouts configured on `builder`
pub async fn request_with(builder: UnixTransportBuilder, value: &Value) -> Result<Value> {
    let payload = encode(value)?;

    let mut transport = builder.connect().await?;
    let response = transport.exchange(&payload).await?;
    if let Err(e) = transport.close().await {
        tracing::debug!(error = %e, "closing after response failed");
    }

    Ok(decode(&response)?)
}

/// Perform a one-off typed request/response over a Unix socket
pub async fn request_unix<Req, Res, C>(
    path: impl AsRef<Path>,
    request: &Req,
    codec: C,
) -> Result<Res>
where
    Req: Serialize,
    Res: for<'de> Deserialize<'de>,
    C: Codec,
{
    let mut channel = Channel::unix(path, codec).await?;
    let response = channel.request(request).await?;
    if let Err(e) = channel.close().await {
        tracing::debug!(error = %e, "closing after response failed");
    }
    Ok(response)
}
