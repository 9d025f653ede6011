//! Per-call dispatch pipeline.
//!
//! # States
//! ```text
//! Start → Resolving → Connecting → Sending → Completed
//!              ↓            ↓          ↓
//!            Failed       Failed     Failed
//! ```
//!
//! Telemetry (log line, metrics, collector record) is produced after the
//! state machine stops, on success and failure alike. The original error is
//! returned to the caller only after that.

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, TransportError};
use crate::http::{request, RequestOptions, Response};
use crate::net::{CachedConnection, ConnectionCache, EndpointResolver, ResolvedTarget};
use crate::observability::context::{child_span_id, TraceContext, TraceSource};
use crate::observability::logging::TRACE_TARGET;
use crate::observability::metrics;
use crate::observability::reporter::{CallRecord, Reporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    Start,
    Resolving,
    Connecting,
    Sending,
    Completed,
    Failed,
}

struct CallProgress {
    state: CallState,
    scheme: Option<String>,
    /// When the send returned; release time is excluded from the duration.
    sent_at: Option<Instant>,
}

impl CallProgress {
    fn new() -> Self {
        Self {
            state: CallState::Start,
            scheme: None,
            sent_at: None,
        }
    }

    fn advance(&mut self, next: CallState) {
        tracing::trace!(from = ?self.state, to = ?next, "Call state");
        self.state = next;
    }
}

/// Runs calls against shared resolver, cache and reporter.
pub struct Dispatcher {
    pub(crate) config: ClientConfig,
    pub(crate) resolver: EndpointResolver,
    pub(crate) cache: ConnectionCache,
    pub(crate) source: Arc<dyn TraceSource>,
    pub(crate) reporter: Reporter,
}

impl Dispatcher {
    pub async fn dispatch(&self, method: &str, uri: &str, options: RequestOptions) -> ClientResult<Response> {
        let trace = TraceContext::begin(self.source.as_ref());
        let started = SystemTime::now();
        let clock = Instant::now();

        let mut progress = CallProgress::new();
        let outcome = self.run(&mut progress, method, uri, &options, &trace).await;
        let elapsed = progress
            .sent_at
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(clock);
        progress.advance(if outcome.is_ok() {
            CallState::Completed
        } else {
            CallState::Failed
        });

        let (child, error) = match &outcome {
            Ok(response) => (child_span_id(response.headers()), String::new()),
            Err(e) => (String::new(), e.to_string()),
        };
        let record = Arc::new(CallRecord::new(
            &self.config.tracing.service_name,
            &trace,
            child,
            started,
            elapsed,
            uri,
            error,
        ));

        tracing::debug!(
            target: TRACE_TARGET,
            service = %record.service,
            trace_id = %record.trace_id,
            span_id = %record.span_id,
            child_span_id = %record.child_span_id,
            cs = record.cs,
            cr = record.cr,
            duration = record.duration,
            uri = %record.uri,
            error = %record.error,
            "Outbound call finished"
        );

        metrics::record_call(
            progress.scheme.as_deref().unwrap_or("unknown"),
            match &outcome {
                Ok(_) => "ok",
                Err(e) => e.kind().as_str(),
            },
            elapsed,
        );

        if options.no_trace {
            tracing::trace!(trace_id = %record.trace_id, "Collector report skipped (no_trace)");
        } else {
            self.reporter.emit(record);
        }

        outcome
    }

    async fn run(
        &self,
        progress: &mut CallProgress,
        method: &str,
        uri: &str,
        options: &RequestOptions,
        trace: &TraceContext,
    ) -> ClientResult<Response> {
        progress.advance(CallState::Resolving);
        let target = self.resolver.resolve(uri, &options.query)?;
        progress.scheme = Some(target.scheme().to_string());

        progress.advance(CallState::Connecting);
        let mut conn = self
            .cache
            .acquire(&target.endpoint)
            .await
            .map_err(ClientError::Connection)?;

        progress.advance(CallState::Sending);
        let result = self.send(&mut conn, method, &target, options, trace).await;
        progress.sent_at = Some(Instant::now());

        // A timed-out connection may still have a response in flight, so it is
        // never reused. Ephemeral schemes never keep their connection.
        let timed_out = matches!(&result, Err(e) if e.is_timeout());
        if self.config.is_ephemeral(target.scheme()) || timed_out {
            conn.release().await;
        }
        result
    }

    async fn send(
        &self,
        conn: &mut CachedConnection,
        method: &str,
        target: &ResolvedTarget,
        options: &RequestOptions,
        trace: &TraceContext,
    ) -> ClientResult<Response> {
        let request = request::build(method, target, options, trace, self.config.request_timeout())
            .map_err(ClientError::Send)?;
        let deadline = request.timeout;

        tracing::trace!(
            connection_id = %conn.id(),
            method = %request.method,
            path = %request.path,
            timeout = ?deadline,
            "Sending request"
        );

        match tokio::time::timeout(deadline, conn.send(request)).await {
            Ok(result) => result.map_err(ClientError::Send),
            Err(_) => Err(ClientError::Send(TransportError::Timeout(deadline))),
        }
    }
}
