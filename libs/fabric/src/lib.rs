//! Socklink Fabric - Framed request/response over Unix sockets
//!
//! Provides sentinel-delimited framing over pull- and push-style byte
//! streams, a Unix socket transport, a one-exchange client, and a concurrent
//! server that isolates failures per connection.
//!
//! # Example
//!
//! ```no_run
//! use socklink_core::Value;
//! use socklink_fabric::{listen, request, BoxError};
//!
//! async fn uppercase(value: Value) -> Result<Value, BoxError> {
//!     match value {
//!         Value::String(s) => Ok(Value::String(s.to_uppercase())),
//!         other => Err(format!("expected a string, got {}", other.kind()).into()),
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (server, mut errors) = listen("/tmp/uppercase.sock", uppercase).await?;
//!
//! let response = request("/tmp/uppercase.sock", &Value::from("hello")).await?;
//! assert_eq!(response, Value::from("HELLO"));
//!
//! server.shutdown().await?;
//! while let Some(failure) = errors.recv().await {
//!     eprintln!("{failure}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod codec;
pub mod error;
pub mod frame;
pub mod request;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use channel::Channel;
pub use error::{BoxError, Error, Result};
pub use request::{request, request_unix, request_with};
pub use server::{
    listen, serve, ConnectionError, ErrorEvents, Handler, Server, ServerBuilder, ServerHandle,
    Stage, DEFAULT_EVENT_CAPACITY,
};
