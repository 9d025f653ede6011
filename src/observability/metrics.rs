//! Metrics collection.
//!
//! # Metrics
//! - `rpc_client_requests_total` (counter): calls by scheme and outcome
//! - `rpc_client_request_duration_seconds` (histogram): end-to-end call latency
//! - `rpc_client_connections_total` (counter): created/reused/evicted/released
//! - `rpc_client_trace_reports_total` (counter): collector reports by outcome
//!
//! Recorded through the `metrics` facade; the host process installs the
//! exporter. Without one, every call here is a no-op.

use std::time::Duration;

/// Connection cache events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Created,
    Reused,
    Evicted,
    Released,
}

impl ConnectionEvent {
    fn as_str(&self) -> &'static str {
        match self {
            ConnectionEvent::Created => "created",
            ConnectionEvent::Reused => "reused",
            ConnectionEvent::Evicted => "evicted",
            ConnectionEvent::Released => "released",
        }
    }
}

/// Record one finished call. `outcome` is "ok" or an error kind.
pub fn record_call(scheme: &str, outcome: &'static str, elapsed: Duration) {
    metrics::counter!(
        "rpc_client_requests_total",
        "scheme" => scheme.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!(
        "rpc_client_request_duration_seconds",
        "scheme" => scheme.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_connection(event: ConnectionEvent) {
    metrics::counter!("rpc_client_connections_total", "event" => event.as_str()).increment(1);
}

/// Record a collector report. `outcome` is "ok", "error" or "timeout".
pub fn record_report(outcome: &'static str) {
    metrics::counter!("rpc_client_trace_reports_total", "outcome" => outcome).increment(1);
}
