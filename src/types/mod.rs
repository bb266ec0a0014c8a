//! Shared types: errors and configuration.

pub mod config;
pub mod errors;

pub use config::{Config, ObservabilityConfig, WorkerConfig};
pub use errors::{DomainError, Error, ProtocolError, Result, StatusCode};
