//! Worker channel boundary.
//!
//! The kernel talks to its process supervisor through an opaque
//! request/response channel. Framing, TLS and HTTP/2 all live on the
//! supervisor side; here a request is just a body plus a header segment.

pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;

pub use memory::{Frame, MemoryChannel};

/// One unit of transport traffic: binary body + header segment.
///
/// For requests the header segment carries the JSON metadata envelope
/// (`{service, method, context}`); for responses it carries the accumulated
/// response headers as a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    pub body: Bytes,
    pub header: Bytes,
}

impl Payload {
    pub fn new(body: impl Into<Bytes>, header: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            header: header.into(),
        }
    }
}

/// Request/response channel to the external process supervisor.
///
/// Implementations own the actual wire; the kernel only pulls payloads,
/// writes responses and writes error-channel messages. `wait_payload`
/// returning `None` is the clean-shutdown signal, not an error.
#[async_trait]
pub trait WorkerChannel: Send {
    /// Block until the next request payload arrives. `None` means the
    /// channel closed and the worker should stop.
    async fn wait_payload(&mut self) -> std::io::Result<Option<Payload>>;

    /// Write a unary response.
    async fn respond(&mut self, payload: Payload) -> std::io::Result<()>;

    /// Write one chunk of a server-streaming response.
    async fn respond_chunk(&mut self, payload: Payload) -> std::io::Result<()>;

    /// Terminate a server-streaming response.
    async fn close_stream(&mut self) -> std::io::Result<()>;

    /// Write a message on the transport's distinguished error channel.
    async fn error(&mut self, message: Vec<u8>) -> std::io::Result<()>;
}
