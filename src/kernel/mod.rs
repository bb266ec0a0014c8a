//! Kernel — service registry and the serve loop.
//!
//! The kernel owns every registered [`ServiceWrapper`] and drives the
//! single-request-at-a-time loop against the worker channel. The registry is
//! mutated only during startup; during serving it is read-only, so no
//! locking is needed. Parallelism comes from the supervisor running many
//! identical worker processes, not from concurrency inside one.

use std::collections::HashMap;

use serde::Deserialize;

use crate::context::{InvocationContext, Metadata};
use crate::errpack;
use crate::service::{GrpcService, ResponseBody, ServiceWrapper};
use crate::transport::{Payload, WorkerChannel};
use crate::types::{Error, Result, WorkerConfig};

/// Host application collaborator, bootstrapped at most once per process
/// before the first request is served.
pub trait Application: Send {
    /// Whether the host already ran its startup sequence.
    fn has_been_bootstrapped(&self) -> bool;

    /// Run the startup sequence with the given ordered step names.
    fn bootstrap_with(&mut self, bootstrappers: &[&'static str]) -> Result<()>;
}

/// Serve-loop lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelState {
    /// Not yet serving; registration is allowed.
    Idle,
    /// Actively pulling requests.
    Running,
    /// Channel closed or explicitly stopped.
    Stopped,
}

/// Request metadata envelope carried in the payload header segment.
#[derive(Debug, Deserialize)]
struct RequestEnvelope {
    service: String,
    method: String,
    #[serde(default)]
    context: Metadata,
}

/// Manages the group of registered services and communication with the
/// external process supervisor.
pub struct Kernel {
    config: WorkerConfig,
    services: HashMap<&'static str, ServiceWrapper>,
    application: Option<Box<dyn Application>>,
    bootstrappers: Vec<&'static str>,
    state: KernelState,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("config", &self.config)
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("application", &self.application.is_some())
            .field("bootstrappers", &self.bootstrappers)
            .field("state", &self.state)
            .finish()
    }
}

impl Kernel {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            services: HashMap::new(),
            application: None,
            bootstrappers: Vec::new(),
            state: KernelState::Idle,
        }
    }

    /// Attach the host application collaborator.
    pub fn with_application(mut self, application: Box<dyn Application>) -> Self {
        self.application = Some(application);
        self
    }

    /// Override the ordered bootstrap step names passed to the host.
    pub fn with_bootstrappers(mut self, bootstrappers: Vec<&'static str>) -> Self {
        self.bootstrappers = bootstrappers;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> KernelState {
        self.state
    }

    /// Register a service, building its wrapper and method table.
    ///
    /// Allowed only before serving starts. A duplicate service name or a
    /// malformed method table is a configuration error: the process must not
    /// start serving at all rather than serve a partial registry.
    pub fn register_service<S: GrpcService>(&mut self, service: S) -> Result<&mut Self> {
        if self.state != KernelState::Idle {
            return Err(Error::configuration(format!(
                "cannot register service `{}` after serving started",
                S::NAME
            )));
        }

        let wrapper = ServiceWrapper::new(service)?;
        let name = wrapper.name();
        if self.services.insert(name, wrapper).is_some() {
            return Err(Error::configuration(format!(
                "service `{name}` registered twice"
            )));
        }

        tracing::debug!(service = name, "registered service");
        Ok(self)
    }

    /// Bootstrap the host application. Idempotent; runs the startup sequence
    /// at most once per process. A kernel without a host application is a
    /// no-op here.
    pub fn bootstrap(&mut self) -> Result<()> {
        if let Some(app) = self.application.as_mut() {
            if !app.has_been_bootstrapped() {
                tracing::debug!(
                    steps = self.bootstrappers.len(),
                    "bootstrapping host application"
                );
                app.bootstrap_with(&self.bootstrappers)?;
            }
        }
        Ok(())
    }

    /// Serve requests from the channel until it closes.
    pub async fn serve<C: WorkerChannel>(&mut self, channel: &mut C) -> Result<()> {
        self.serve_with(channel, |_outcome| {}).await
    }

    /// Serve requests, running `finalize` exactly once per request on every
    /// exit path (with the error when one occurred). This is the hook for
    /// per-request cleanup: metrics flushes, connection resets and the like.
    ///
    /// Per-request failures are converted to wire errors and never terminate
    /// the loop; only a closed channel (or a channel I/O failure) ends it.
    /// For streaming responses the hook runs once per stream.
    pub async fn serve_with<C, F>(&mut self, channel: &mut C, mut finalize: F) -> Result<()>
    where
        C: WorkerChannel,
        F: FnMut(Option<&Error>),
    {
        self.bootstrap()?;
        self.state = KernelState::Running;
        tracing::info!(services = self.services.len(), "worker serving");

        while let Some(payload) = channel.wait_payload().await? {
            let mut guard = FinalizeGuard::new(&mut finalize);
            if let Err(err) = self.tick(channel, payload).await {
                tracing::warn!(error = %err, "request failed");
                let wire = match err.to_protocol() {
                    Some(proto) => errpack::pack(&proto),
                    None if self.config.debug => format!("{err:?}").into_bytes(),
                    None => err.to_string().into_bytes(),
                };
                guard.set_error(err);
                channel.error(wire).await?;
            }
            drop(guard);
        }

        self.state = KernelState::Stopped;
        tracing::info!("worker channel closed, stopping");
        Ok(())
    }

    /// Process one request: parse envelope, resolve, invoke, respond.
    async fn tick<C: WorkerChannel>(&self, channel: &mut C, payload: Payload) -> Result<()> {
        if payload.body.len() > self.config.max_body_bytes {
            return Err(Error::invoke(format!(
                "request body too large: {} bytes",
                payload.body.len()
            )));
        }

        let envelope: RequestEnvelope = serde_json::from_slice(&payload.header)?;
        let mut ctx = InvocationContext::new(envelope.context);

        let wrapper = self
            .services
            .get(envelope.service.as_str())
            .ok_or_else(|| Error::not_found(format!("Service `{}` not found.", envelope.service)))?;

        let body = wrapper.invoke(&envelope.method, &mut ctx, &payload.body)?;
        let headers = bytes::Bytes::from(ctx.pack_response_headers()?);

        match body {
            ResponseBody::Unary(bytes) => {
                channel.respond(Payload::new(bytes, headers)).await?;
            }
            ResponseBody::Stream(items) => {
                for chunk in items {
                    channel
                        .respond_chunk(Payload::new(chunk, headers.clone()))
                        .await?;
                }
                channel.close_stream().await?;
            }
        }
        Ok(())
    }
}

/// Runs the finalize hook exactly once when the per-request scope ends,
/// whichever path it ends on.
struct FinalizeGuard<'a, F: FnMut(Option<&Error>)> {
    hook: &'a mut F,
    error: Option<Error>,
}

impl<'a, F: FnMut(Option<&Error>)> FinalizeGuard<'a, F> {
    fn new(hook: &'a mut F) -> Self {
        Self { hook, error: None }
    }

    fn set_error(&mut self, error: Error) {
        self.error = Some(error);
    }
}

impl<F: FnMut(Option<&Error>)> Drop for FinalizeGuard<'_, F> {
    fn drop(&mut self) {
        (self.hook)(self.error.as_ref());
    }
}
