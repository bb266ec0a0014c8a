//! Protobuf message codec boundary.
//!
//! Thin adapter over `prost`: the worker never interprets message contents,
//! it only moves them between wire bytes and the typed values handlers see.

use prost::Message;

use crate::types::{Error, Result};

/// Decode a message from its wire bytes.
///
/// An empty buffer decodes to the default-constructed message, matching the
/// protocol convention that an absent request body means "empty input".
pub fn decode<M: Message + Default>(bytes: &[u8]) -> Result<M> {
    M::decode(bytes).map_err(|e| {
        Error::invoke(format!(
            "failed to decode {}: {e}",
            std::any::type_name::<M>()
        ))
    })
}

/// Encode a message to its wire bytes.
pub fn encode<M: Message>(message: &M) -> Vec<u8> {
    message.encode_to_vec()
}
