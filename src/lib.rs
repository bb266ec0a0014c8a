//! # gRPC Worker — service dispatch core
//!
//! Exposes application service objects as gRPC methods served by a
//! long-lived worker process. The worker does not speak HTTP/2 itself: an
//! external process supervisor owns the transport and hands requests over an
//! opaque request/response channel. This crate implements the dispatch core:
//!
//! - explicit method tables binding service objects to callable RPC methods
//! - protobuf marshalling at the invocation boundary
//! - a one-request-at-a-time serve loop that survives any per-request failure
//! - structured error packing, including the reserved domain-error sentinel
//!
//! ## Architecture
//!
//! ```text
//!  supervisor channel →  ┌───────────────────────────────┐
//!    (body + headers)    │            Kernel             │
//!                        │  ┌─────────┐   ┌───────────┐  │
//!                        │  │Registry │ → │  Service  │  │
//!                        │  │         │   │  Wrapper  │  │
//!                        │  └─────────┘   └─────┬─────┘  │
//!                        │  ┌─────────┐   ┌─────┴─────┐  │
//!                        │  │  Error  │   │  Invoker  │  │
//!                        │  │ Packer  │   │ (+ codec) │  │
//!                        │  └─────────┘   └───────────┘  │
//!                        └───────────────────────────────┘
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Re-export public API
pub mod codec;
pub mod context;
pub mod errpack;
pub mod kernel;
pub mod service;
pub mod transport;
pub mod types;

// Internal utilities
pub mod observability;

pub use context::InvocationContext;
pub use kernel::{Application, Kernel, KernelState};
pub use service::{GrpcService, MethodDescriptor, ServiceRegistrar, ServiceWrapper};
pub use transport::{Frame, MemoryChannel, Payload, WorkerChannel};
pub use types::{Config, DomainError, Error, ProtocolError, Result, StatusCode, WorkerConfig};
