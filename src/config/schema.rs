//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the traced client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint defaults and connection retention policy.
    pub transport: TransportConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Trace propagation and reporting settings.
    pub tracing: TracingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ClientConfig {
    /// Persistent-connection deployment: bare endpoints resolve to `tcp` on 9080.
    pub fn persistent() -> Self {
        Self::default()
    }

    /// Close-per-call deployment: bare endpoints resolve to `http` on 80.
    pub fn ephemeral() -> Self {
        Self {
            transport: TransportConfig {
                default_scheme: "http".to_string(),
                default_port: 80,
                ..TransportConfig::default()
            },
            ..Self::default()
        }
    }

    /// Default per-call send timeout.
    ///
    /// Values too large for a `Duration` mean no practical deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeouts.request_secs).unwrap_or(Duration::MAX)
    }

    /// Whether connections for `scheme` are closed after every call.
    pub fn is_ephemeral(&self, scheme: &str) -> bool {
        self.transport
            .ephemeral_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(scheme))
    }
}

/// Endpoint defaults and connection retention.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Scheme applied to URIs that carry none.
    pub default_scheme: String,

    /// Port applied when neither the URI nor its scheme supplies one.
    pub default_port: u16,

    /// Schemes whose connections are closed after each call.
    pub ephemeral_schemes: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            default_scheme: "tcp".to_string(),
            default_port: 9080,
            ephemeral_schemes: vec!["http".to_string()],
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Send timeout (request written, response read) in seconds.
    pub request_secs: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30.0,
        }
    }
}

/// Trace reporting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Send call records to the collector.
    pub enabled: bool,

    /// Name of the calling service, stamped on every record.
    pub service_name: String,

    /// Collector endpoint receiving records as JSON (POST).
    pub collector_url: Option<String>,

    /// Upper bound on a single report in milliseconds.
    pub report_timeout_ms: u64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: String::new(),
            collector_url: None,
            report_timeout_ms: 2000,
        }
    }
}

impl TracingConfig {
    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
