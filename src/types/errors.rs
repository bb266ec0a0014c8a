//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation. The enum
//! splits along the propagation policy: configuration errors abort startup,
//! everything else is caught at the serve-loop boundary and reported over the
//! worker's error channel.

use prost::Message;
use prost_types::Any;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Wire status codes, mirroring gRPC numbering, plus the reserved sentinel
/// used to mark expected domain-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StatusCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
    /// Reserved sentinel: expected domain error, message slot carries the
    /// JSON-serialized `{code, message, app_code}` triple.
    ServiceException = 99,
}

impl StatusCode {
    /// Numeric wire value.
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Expected business-rule failure surfaced by a service method.
///
/// Field order matters: it is round-tripped as JSON inside the packed error
/// and the client side reconstructs it by parsing that object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message} (code {code}, app code {app_code})")]
pub struct DomainError {
    pub code: i32,
    pub message: String,
    pub app_code: String,
}

impl DomainError {
    pub fn new(code: i32, message: impl Into<String>, app_code: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            app_code: app_code.into(),
        }
    }

    /// Reconstruct a domain error from the message slot of a sentinel-coded
    /// packed error (the inverse of what the invoker serializes).
    pub fn from_packed_message(message: &str) -> Result<Self> {
        Ok(serde_json::from_str(message)?)
    }
}

/// Structured protocol failure reported through the worker error channel.
///
/// Carries the wire status code, a human-readable message and zero or more
/// `google.protobuf.Any` detail payloads, packed by [`crate::errpack`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolError {
    pub code: StatusCode,
    pub message: String,
    pub details: Vec<Any>,
}

impl ProtocolError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Attach a typed detail payload.
    pub fn with_detail<M: Message + prost::Name>(mut self, detail: &M) -> Result<Self> {
        let any = Any::from_msg(detail)
            .map_err(|e| Error::invoke(format!("failed to pack error detail: {e}")))?;
        self.details.push(any);
        Ok(self)
    }
}

/// Main error enum for the worker kernel.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid service registration (missing name, duplicate method).
    /// Fatal at startup, the process must not start serving.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unknown service or method (wire status NOT_FOUND).
    #[error("{0}")]
    NotFound(String),

    /// Failure during decode/invoke/encode (wire status INTERNAL).
    #[error("{0}")]
    Invoke(String),

    /// Expected domain failure from a handler (wire status 99).
    #[error("service exception: {0}")]
    Service(#[from] DomainError),

    /// Structured protocol failure carrying an explicit status and details.
    #[error("status {}: {}", .0.code.code(), .0.message)]
    Status(ProtocolError),

    /// Serialization/deserialization errors (header envelopes).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors on the worker channel.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convert to the structured protocol form, if this error has one.
    ///
    /// Errors without a protocol form (envelope parse failures, channel I/O)
    /// are reported as plain diagnostic strings instead of packed errors.
    pub fn to_protocol(&self) -> Option<ProtocolError> {
        match self {
            Error::NotFound(msg) => Some(ProtocolError::new(StatusCode::NotFound, msg.clone())),
            Error::Invoke(msg) => Some(ProtocolError::new(StatusCode::Internal, msg.clone())),
            Error::Service(domain) => {
                let message =
                    serde_json::to_string(domain).unwrap_or_else(|_| domain.message.clone());
                Some(ProtocolError::new(StatusCode::ServiceException, message))
            }
            Error::Status(proto) => Some(proto.clone()),
            _ => None,
        }
    }
}

// Convenience constructors
impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invoke(msg: impl Into<String>) -> Self {
        Self::Invoke(msg.into())
    }
}
