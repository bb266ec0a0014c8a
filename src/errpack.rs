//! Error packer for the worker's error channel.
//!
//! Wire format (internal agreement with the client-side stub):
//!
//! ```text
//! code|:|message|:|detail1|:|detail2|:|...
//! ```
//!
//! Details are serialized `google.protobuf.Any` messages appended after the
//! code and message, all joined with the `|:|` delimiter. The delimiter is
//! never escaped: protobuf serialization of the detail payloads does not
//! produce the literal sequence in practice, but this is a known limitation
//! of the format, kept as-is because deployed clients split on it verbatim.

use prost::Message;

use crate::types::{Error, ProtocolError, Result, StatusCode};

/// Field delimiter shared with the client-side unpacker.
pub const DELIMITER: &[u8] = b"|:|";

/// Pack a protocol error into the single error-channel payload.
///
/// Deterministic: packing the same error twice yields identical bytes.
pub fn pack(error: &ProtocolError) -> Vec<u8> {
    let mut parts: Vec<Vec<u8>> = Vec::with_capacity(2 + error.details.len());
    parts.push(error.code.code().to_string().into_bytes());
    parts.push(error.message.clone().into_bytes());
    for detail in &error.details {
        parts.push(detail.encode_to_vec());
    }
    parts.join(DELIMITER)
}

/// A packed error split back into its wire fields.
///
/// This is the client side of the agreement; the kernel only packs. Detail
/// payloads are returned as raw `Any` bytes for the caller to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedError {
    pub code: u32,
    pub message: String,
    pub details: Vec<Vec<u8>>,
}

impl PackedError {
    /// Whether this error carries the reserved domain-failure sentinel.
    pub fn is_service_exception(&self) -> bool {
        self.code == StatusCode::ServiceException.code()
    }
}

/// Split a packed error payload back into `(code, message, details)`.
pub fn unpack(raw: &[u8]) -> Result<PackedError> {
    let mut fields = split_on_delimiter(raw);
    let code_field = fields.next().unwrap_or_default();
    let code: u32 = std::str::from_utf8(code_field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::invoke("packed error: malformed status code"))?;
    let message = fields
        .next()
        .map(|m| String::from_utf8_lossy(m).into_owned())
        .ok_or_else(|| Error::invoke("packed error: missing message field"))?;
    let details = fields.map(<[u8]>::to_vec).collect();

    Ok(PackedError {
        code,
        message,
        details,
    })
}

fn split_on_delimiter(raw: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = Some(raw);
    std::iter::from_fn(move || {
        let slice = rest?;
        match slice
            .windows(DELIMITER.len())
            .position(|window| window == DELIMITER)
        {
            Some(at) => {
                rest = Some(&slice[at + DELIMITER.len()..]);
                Some(&slice[..at])
            }
            None => {
                rest = None;
                Some(slice)
            }
        }
    })
}
