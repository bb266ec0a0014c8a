//! Service invoker — marshalling and the actual method call.
//!
//! Adapters here erase a typed handler into the uniform
//! `(&mut InvocationContext, &[u8]) -> Result<ResponseBody>` shape stored in
//! the method table. Input/output typing is enforced by the generic
//! signatures at compile time; what remains at runtime is decoding the input,
//! calling the handler, encoding the result and translating domain failures
//! into the sentinel-coded wire error.

use std::sync::Arc;

use prost::Message;

use crate::codec;
use crate::context::InvocationContext;
use crate::types::{Error, ProtocolError, Result, StatusCode};

/// Raw output of one invocation.
pub enum ResponseBody {
    /// Single encoded output message.
    Unary(Vec<u8>),
    /// Lazy sequence of encoded output messages.
    Stream(Box<dyn Iterator<Item = Vec<u8>> + Send>),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unary(bytes) => f.debug_tuple("Unary").field(bytes).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Type-erased bound method handler.
pub(crate) type BoxedHandler =
    Box<dyn Fn(&mut InvocationContext, &[u8]) -> Result<ResponseBody> + Send + Sync>;

/// Erase a unary handler, binding it to its service instance.
pub(crate) fn unary<S, In, Out, F>(service: Arc<S>, handler: F) -> BoxedHandler
where
    S: Send + Sync + 'static,
    In: Message + Default + 'static,
    Out: Message + 'static,
    F: Fn(&S, &mut InvocationContext, In) -> Result<Out> + Send + Sync + 'static,
{
    Box::new(move |ctx, raw| {
        let input = codec::decode::<In>(raw)?;
        let output = handler(&service, ctx, input).map_err(into_invocation_failure)?;
        Ok(ResponseBody::Unary(codec::encode(&output)))
    })
}

/// Erase a server-streaming handler, binding it to its service instance.
///
/// Output items are encoded lazily as the kernel drains the sequence.
pub(crate) fn server_streaming<S, In, Out, I, F>(service: Arc<S>, handler: F) -> BoxedHandler
where
    S: Send + Sync + 'static,
    In: Message + Default + 'static,
    Out: Message + 'static,
    I: IntoIterator<Item = Out>,
    I::IntoIter: Send + 'static,
    F: Fn(&S, &mut InvocationContext, In) -> Result<I> + Send + Sync + 'static,
{
    Box::new(move |ctx, raw| {
        let input = codec::decode::<In>(raw)?;
        let items = handler(&service, ctx, input).map_err(into_invocation_failure)?;
        let encoded = items.into_iter().map(|item| codec::encode(&item));
        Ok(ResponseBody::Stream(Box::new(encoded)))
    })
}

/// Translate a handler failure into its wire form.
///
/// Expected domain errors become the reserved sentinel status with the
/// `{code, message, app_code}` triple JSON-encoded in the message slot, so
/// the client-side stub can tell them apart from system errors. Everything
/// else passes through for the serve loop to classify.
fn into_invocation_failure(err: Error) -> Error {
    match err {
        Error::Service(domain) => {
            let message = serde_json::to_string(&domain).unwrap_or_else(|_| domain.message.clone());
            Error::Status(ProtocolError::new(StatusCode::ServiceException, message))
        }
        other => other,
    }
}
