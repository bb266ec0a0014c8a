//! Service wrappers — binding service implementations to their method tables.
//!
//! A service declares its wire name and its callable methods through an
//! explicit registration table; there is no runtime shape inspection. The
//! wrapper validates the table once at registration time and afterwards only
//! performs lookups.

pub mod invoker;

use std::collections::HashMap;
use std::sync::Arc;

use prost::Message;

use crate::context::InvocationContext;
use crate::types::{Error, Result};

pub use invoker::ResponseBody;
use invoker::BoxedHandler;

/// A service implementation exposable over the worker protocol.
///
/// Implementors declare the wire-facing service name and register each
/// callable method exactly once. Methods not registered are simply not
/// callable; registration is the single source of truth.
pub trait GrpcService: Send + Sync + Sized + 'static {
    /// Fully qualified service name as it appears on the wire.
    const NAME: &'static str;

    /// Declare the method table for this service.
    fn register(registrar: &mut ServiceRegistrar<Self>);
}

/// Static metadata for one RPC method. Immutable once derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Method name, unique within its service.
    pub name: &'static str,
    /// Rust type name of the input message (diagnostics only).
    pub input_type: &'static str,
    /// Rust type name of the output message (diagnostics only).
    pub output_type: &'static str,
    /// Whether the method produces a stream of output messages.
    pub server_streaming: bool,
}

/// Collects method declarations while [`GrpcService::register`] runs.
#[allow(missing_debug_implementations)]
pub struct ServiceRegistrar<S> {
    entries: Vec<MethodEntry<S>>,
}

struct MethodEntry<S> {
    descriptor: MethodDescriptor,
    bind: Box<dyn FnOnce(Arc<S>) -> BoxedHandler + Send>,
}

impl<S: GrpcService> ServiceRegistrar<S> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Declare a unary method: one input message in, one output message out.
    pub fn unary<In, Out, F>(&mut self, name: &'static str, handler: F) -> &mut Self
    where
        In: Message + Default + 'static,
        Out: Message + 'static,
        F: Fn(&S, &mut InvocationContext, In) -> Result<Out> + Send + Sync + 'static,
    {
        self.entries.push(MethodEntry {
            descriptor: MethodDescriptor {
                name,
                input_type: std::any::type_name::<In>(),
                output_type: std::any::type_name::<Out>(),
                server_streaming: false,
            },
            bind: Box::new(move |service| invoker::unary(service, handler)),
        });
        self
    }

    /// Declare a server-streaming method: one input message in, a lazy
    /// sequence of output messages out.
    pub fn server_streaming<In, Out, I, F>(&mut self, name: &'static str, handler: F) -> &mut Self
    where
        In: Message + Default + 'static,
        Out: Message + 'static,
        I: IntoIterator<Item = Out>,
        I::IntoIter: Send + 'static,
        F: Fn(&S, &mut InvocationContext, In) -> Result<I> + Send + Sync + 'static,
    {
        self.entries.push(MethodEntry {
            descriptor: MethodDescriptor {
                name,
                input_type: std::any::type_name::<In>(),
                output_type: std::any::type_name::<Out>(),
                server_streaming: true,
            },
            bind: Box::new(move |service| invoker::server_streaming(service, handler)),
        });
        self
    }
}

struct BoundMethod {
    descriptor: MethodDescriptor,
    handler: BoxedHandler,
}

/// Binds one service implementation to its callable method table and
/// declared name. Built once at registration; read-only afterwards.
pub struct ServiceWrapper {
    name: &'static str,
    methods: HashMap<&'static str, BoundMethod>,
}

impl std::fmt::Debug for ServiceWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWrapper")
            .field("name", &self.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ServiceWrapper {
    /// Build the wrapper, validating the declared name and method table.
    ///
    /// An empty `NAME` or a duplicate method name is a configuration error:
    /// the process must not start serving with a malformed table.
    pub fn new<S: GrpcService>(service: S) -> Result<Self> {
        if S::NAME.trim().is_empty() {
            return Err(Error::configuration(format!(
                "invalid service `{}`, constant `NAME` is empty",
                std::any::type_name::<S>()
            )));
        }

        let mut registrar = ServiceRegistrar::new();
        S::register(&mut registrar);

        let service = Arc::new(service);
        let mut methods = HashMap::with_capacity(registrar.entries.len());
        for entry in registrar.entries {
            let name = entry.descriptor.name;
            if name.trim().is_empty() {
                return Err(Error::configuration(format!(
                    "service `{}` declares a method with an empty name",
                    S::NAME
                )));
            }
            let bound = BoundMethod {
                descriptor: entry.descriptor,
                handler: (entry.bind)(Arc::clone(&service)),
            };
            if methods.insert(name, bound).is_some() {
                return Err(Error::configuration(format!(
                    "duplicate method `{name}` in service `{}`",
                    S::NAME
                )));
            }
        }

        Ok(Self {
            name: S::NAME,
            methods,
        })
    }

    /// Declared service name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Descriptor for one method, if declared.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name).map(|bound| &bound.descriptor)
    }

    /// All declared method descriptors, in arbitrary order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values().map(|bound| &bound.descriptor)
    }

    /// Invoke a method with raw input bytes, producing raw output.
    pub fn invoke(
        &self,
        method: &str,
        ctx: &mut InvocationContext,
        input: &[u8],
    ) -> Result<ResponseBody> {
        let bound = self.methods.get(method).ok_or_else(|| {
            Error::not_found(format!(
                "Method `{method}` not found in service `{}`.",
                self.name
            ))
        })?;

        tracing::debug!(
            service = self.name,
            method,
            streaming = bound.descriptor.server_streaming,
            "invoking method"
        );
        (bound.handler)(ctx, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[derive(Clone, PartialEq, ::prost::Message)]
    struct Input {
        #[prost(string, tag = "1")]
        text: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    struct Output {
        #[prost(string, tag = "1")]
        text: String,
    }

    struct Echo;

    impl GrpcService for Echo {
        const NAME: &'static str = "Echo";

        fn register(registrar: &mut ServiceRegistrar<Self>) {
            registrar
                .unary("Say", |_s, _ctx, input: Input| {
                    Ok(Output { text: input.text })
                })
                .server_streaming("Repeat", |_s, _ctx, input: Input| {
                    let out = Output { text: input.text };
                    Ok(vec![out.clone(), out])
                });
        }
    }

    struct Unnamed;

    impl GrpcService for Unnamed {
        const NAME: &'static str = "";

        fn register(_registrar: &mut ServiceRegistrar<Self>) {}
    }

    struct Doubled;

    impl GrpcService for Doubled {
        const NAME: &'static str = "Doubled";

        fn register(registrar: &mut ServiceRegistrar<Self>) {
            registrar
                .unary("Say", |_s, _ctx, input: Input| {
                    Ok(Output { text: input.text })
                })
                .unary("Say", |_s, _ctx, _input: Input| {
                    Ok(Output::default())
                });
        }
    }

    #[test]
    fn builds_descriptor_table() {
        let wrapper = ServiceWrapper::new(Echo).unwrap();
        assert_eq!(wrapper.name(), "Echo");
        assert_eq!(wrapper.methods().count(), 2);

        let say = wrapper.method("Say").unwrap();
        assert!(!say.server_streaming);
        assert!(say.input_type.ends_with("Input"));
        assert!(say.output_type.ends_with("Output"));

        let repeat = wrapper.method("Repeat").unwrap();
        assert!(repeat.server_streaming);
    }

    #[test]
    fn missing_service_name_is_a_configuration_error() {
        let err = ServiceWrapper::new(Unnamed).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn duplicate_method_is_a_configuration_error() {
        let err = ServiceWrapper::new(Doubled).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn invoke_round_trips_through_the_codec() {
        let wrapper = ServiceWrapper::new(Echo).unwrap();
        let mut ctx = InvocationContext::default();
        let input = codec::encode(&Input {
            text: "hi".to_string(),
        });

        let body = wrapper.invoke("Say", &mut ctx, &input).unwrap();
        match body {
            ResponseBody::Unary(bytes) => {
                let output: Output = codec::decode(&bytes).unwrap();
                assert_eq!(output.text, "hi");
            }
            ResponseBody::Stream(_) => panic!("expected unary response"),
        }
    }

    #[test]
    fn unknown_method_is_not_found() {
        let wrapper = ServiceWrapper::new(Echo).unwrap();
        let mut ctx = InvocationContext::default();

        let err = wrapper.invoke("Missing", &mut ctx, &[]).unwrap_err();
        match err {
            Error::NotFound(msg) => {
                assert_eq!(msg, "Method `Missing` not found in service `Echo`.");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn streaming_invoke_yields_each_item() {
        let wrapper = ServiceWrapper::new(Echo).unwrap();
        let mut ctx = InvocationContext::default();
        let input = codec::encode(&Input {
            text: "x".to_string(),
        });

        let body = wrapper.invoke("Repeat", &mut ctx, &input).unwrap();
        match body {
            ResponseBody::Stream(items) => {
                let chunks: Vec<Vec<u8>> = items.collect();
                assert_eq!(chunks.len(), 2);
                for chunk in chunks {
                    let output: Output = codec::decode(&chunk).unwrap();
                    assert_eq!(output.text, "x");
                }
            }
            ResponseBody::Unary(_) => panic!("expected streaming response"),
        }
    }
}
