//! Best-effort delivery of call records to a trace collector.
//!
//! # Responsibilities
//! - Define the call record shipped to the collector
//! - Deliver it on a background task, bounded by the report timeout
//! - Contain every collector failure (log + metric, never returned)
//!
//! # Design Decisions
//! - Reporting never adds latency to the business call: `emit` only spawns
//! - Skipped entirely when tracing is disabled or no sink is configured

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

use crate::error::ReportError;
use crate::observability::context::TraceContext;
use crate::observability::logging::TRACE_TARGET;
use crate::observability::metrics;

/// Telemetry for one finished call. Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub service: String,
    pub trace_id: String,
    pub span_id: String,
    pub child_span_id: String,
    pub timestamp: f64,
    pub duration: f64,
    /// Client send: when the call started.
    pub cs: f64,
    /// Client receive: when the response (or failure) arrived.
    pub cr: f64,
    pub uri: String,
    /// Empty on success.
    pub error: String,
}

impl CallRecord {
    pub fn new(
        service: &str,
        trace: &TraceContext,
        child_span_id: String,
        started: SystemTime,
        elapsed: Duration,
        uri: &str,
        error: String,
    ) -> Self {
        let cs = started
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        let duration = elapsed.as_secs_f64();
        Self {
            service: service.to_string(),
            trace_id: trace.trace_id.clone(),
            span_id: trace.span_id.clone(),
            child_span_id,
            timestamp: cs,
            duration,
            cs,
            cr: cs + duration,
            uri: uri.to_string(),
            error,
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// A trace collection sink.
#[async_trait]
pub trait TraceReporter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn report(&self, record: &CallRecord) -> Result<(), ReportError>;
}

/// Posts records as JSON to an HTTP collector.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: reqwest::Client,
    url: String,
}

impl HttpCollector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TraceReporter for HttpCollector {
    fn name(&self) -> &'static str {
        "http-collector"
    }

    async fn report(&self, record: &CallRecord) -> Result<(), ReportError> {
        let response = self.client.post(&self.url).json(record).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Writes records to the log as JSON. For deployments without a collector.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

#[async_trait]
impl TraceReporter for LogReporter {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn report(&self, record: &CallRecord) -> Result<(), ReportError> {
        let json = serde_json::to_string(record).map_err(|e| ReportError::Other(e.to_string()))?;
        tracing::info!(target: TRACE_TARGET, record = %json, "call record");
        Ok(())
    }
}

/// Fire-and-forget front end for a [`TraceReporter`].
#[derive(Clone)]
pub struct Reporter {
    sink: Option<Arc<dyn TraceReporter>>,
    enabled: bool,
    timeout: Duration,
}

impl Reporter {
    pub fn new(sink: Option<Arc<dyn TraceReporter>>, enabled: bool, timeout: Duration) -> Self {
        Self {
            sink,
            enabled,
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, false, Duration::from_secs(1))
    }

    /// Whether `emit` will actually deliver anything.
    pub fn is_active(&self) -> bool {
        self.enabled && self.sink.is_some()
    }

    /// Deliver `record` in the background. Returns the task handle, or `None`
    /// when reporting is inactive.
    pub fn emit(&self, record: Arc<CallRecord>) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }
        let sink = self.sink.clone()?;
        let timeout = self.timeout;

        Some(tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, sink.report(&record)).await {
                Ok(result) => result,
                Err(_) => Err(ReportError::Timeout(timeout)),
            };
            match result {
                Ok(()) => metrics::record_report("ok"),
                Err(e) => {
                    tracing::error!(
                        target: TRACE_TARGET,
                        reporter = sink.name(),
                        trace_id = %record.trace_id,
                        error = %e,
                        "Send to trace collector failed"
                    );
                    metrics::record_report(match e {
                        ReportError::Timeout(_) => "timeout",
                        _ => "error",
                    });
                }
            }
        }))
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("sink", &self.sink.as_ref().map(|s| s.name()))
            .field("enabled", &self.enabled)
            .field("timeout", &self.timeout)
            .finish()
    }
}
