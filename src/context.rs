//! Per-request invocation context.
//!
//! Carries the inbound call metadata (headers from the supervisor envelope)
//! and a mutable slot for outgoing response headers. One context lives for
//! exactly one request and is discarded after the response is written.

use std::collections::HashMap;

use crate::types::Result;

/// Inbound metadata map: header name → ordered values.
pub type Metadata = HashMap<String, Vec<String>>;

/// Per-request metadata carrier, passed by reference through the call chain
/// so a handler may attach outgoing headers before the response is packed.
#[derive(Debug, Default, Clone)]
pub struct InvocationContext {
    metadata: Metadata,
    response_headers: HashMap<String, String>,
}

impl InvocationContext {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            response_headers: HashMap::new(),
        }
    }

    /// All values for an inbound header, if present.
    pub fn values(&self, key: &str) -> Option<&[String]> {
        self.metadata.get(key).map(Vec::as_slice)
    }

    /// First value for an inbound header, if present.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Full inbound metadata map.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Attach an outgoing response header.
    pub fn set_response_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.response_headers.insert(key.into(), value.into());
    }

    /// Accumulated outgoing headers.
    pub fn response_headers(&self) -> &HashMap<String, String> {
        &self.response_headers
    }

    /// Serialize the outgoing headers for the response envelope.
    ///
    /// Always produces a JSON object, `{}` when no headers were set.
    pub fn pack_response_headers(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.response_headers)?)
    }
}
