//! In-memory worker channel.
//!
//! Queues inbound payloads and records everything the kernel writes. Used by
//! the integration tests and by hosts that embed the kernel behind their own
//! transport glue.

use std::collections::VecDeque;

use async_trait::async_trait;

use super::{Payload, WorkerChannel};

/// One recorded outbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Unary response payload.
    Response(Payload),
    /// Server-streaming chunk.
    Chunk(Payload),
    /// End of a server-streaming response.
    StreamEnd,
    /// Error-channel message.
    Error(Vec<u8>),
}

/// Channel backed by in-process queues. `wait_payload` yields queued
/// requests in order and signals a closed channel once drained.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    incoming: VecDeque<Payload>,
    sent: Vec<Frame>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound request payload.
    pub fn push_request(&mut self, payload: Payload) -> &mut Self {
        self.incoming.push_back(payload);
        self
    }

    /// Everything written by the kernel so far, in write order.
    pub fn sent(&self) -> &[Frame] {
        &self.sent
    }

    /// Take the recorded frames, clearing the log.
    pub fn take_sent(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.sent)
    }
}

#[async_trait]
impl WorkerChannel for MemoryChannel {
    async fn wait_payload(&mut self) -> std::io::Result<Option<Payload>> {
        Ok(self.incoming.pop_front())
    }

    async fn respond(&mut self, payload: Payload) -> std::io::Result<()> {
        self.sent.push(Frame::Response(payload));
        Ok(())
    }

    async fn respond_chunk(&mut self, payload: Payload) -> std::io::Result<()> {
        self.sent.push(Frame::Chunk(payload));
        Ok(())
    }

    async fn close_stream(&mut self) -> std::io::Result<()> {
        self.sent.push(Frame::StreamEnd);
        Ok(())
    }

    async fn error(&mut self, message: Vec<u8>) -> std::io::Result<()> {
        self.sent.push(Frame::Error(message));
        Ok(())
    }
}
