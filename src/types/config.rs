//! Configuration structures.
//!
//! Configuration is embedded by the host process; `Config::from_env` covers
//! the supervisor-driven case where options arrive as environment variables.

use serde::{Deserialize, Serialize};

/// Global worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Serve-loop options.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Build a configuration from `GRPC_WORKER_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(debug) = std::env::var("GRPC_WORKER_DEBUG") {
            config.worker.debug = parse_bool(&debug);
        }
        if let Ok(level) = std::env::var("GRPC_WORKER_LOG_LEVEL") {
            config.observability.log_level = level;
        }
        config
    }
}

/// Serve-loop options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// When set, unexpected failures are reported with the full diagnostic
    /// (including origin). Otherwise only the short message is sent, to avoid
    /// leaking internals to callers.
    pub debug: bool,

    /// Maximum accepted request body size in bytes. Larger requests are
    /// rejected before decoding.
    pub max_body_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            debug: false,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Truthy parsing for supervisor-provided option strings.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_non_debug() {
        let config = Config::default();
        assert!(!config.worker.debug);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn bool_parsing_accepts_common_truthy_forms() {
        for v in ["1", "true", "TRUE", "yes", "on"] {
            assert!(parse_bool(v), "{v} should parse as true");
        }
        for v in ["0", "false", "off", "", "nope"] {
            assert!(!parse_bool(v), "{v} should parse as false");
        }
    }
}
