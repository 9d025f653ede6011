//! Trace context propagation.
//!
//! # Responsibilities
//! - Read `X-TRACE-ID` / `X-SPAN-ID` from the inbound request being served
//! - Generate fresh ids when either is absent
//! - Attach both ids to every outbound request
//! - Extract the callee's span id from the response
//!
//! The inbound request is reached through a [`TraceSource`] handed to the
//! client at construction. [`TaskLocalSource`] covers the common server case:
//! wrap the handling of one inbound request in [`TaskLocalSource::scope`] and
//! every call made inside that future picks up its ids.

use hyper::header::HeaderName;
use hyper::HeaderMap;
use rand::RngCore;
use std::future::Future;

pub const X_TRACE_ID: &str = "x-trace-id";
pub const X_SPAN_ID: &str = "x-span-id";

/// Random bytes per generated id (hex-encoded to 20 characters).
const ID_BYTES: usize = 10;

/// Trace ids carried by the inbound request, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundTrace {
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

impl InboundTrace {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: Some(trace_id.into()),
            span_id: Some(span_id.into()),
        }
    }

    /// Read both ids from request headers. Empty values count as absent.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            trace_id: read(X_TRACE_ID),
            span_id: read(X_SPAN_ID),
        }
    }
}

/// Supplies the ambient inbound trace ids for a call.
pub trait TraceSource: Send + Sync {
    fn inbound(&self) -> InboundTrace;
}

/// No inbound request: every call starts a new trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInbound;

impl TraceSource for NoInbound {
    fn inbound(&self) -> InboundTrace {
        InboundTrace::default()
    }
}

/// Fixed ids, e.g. for a background job continuing a known trace.
impl TraceSource for InboundTrace {
    fn inbound(&self) -> InboundTrace {
        self.clone()
    }
}

/// Fixed inbound headers.
impl TraceSource for HeaderMap {
    fn inbound(&self) -> InboundTrace {
        InboundTrace::from_headers(self)
    }
}

tokio::task_local! {
    static INBOUND: InboundTrace;
}

/// Reads ids scoped to the current task by [`TaskLocalSource::scope`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskLocalSource;

impl TaskLocalSource {
    /// Run `fut` with `inbound` as the ambient trace.
    pub async fn scope<F: Future>(inbound: InboundTrace, fut: F) -> F::Output {
        INBOUND.scope(inbound, fut).await
    }
}

impl TraceSource for TaskLocalSource {
    fn inbound(&self) -> InboundTrace {
        INBOUND.try_with(InboundTrace::clone).unwrap_or_default()
    }
}

/// Ids attached to one outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
}

impl TraceContext {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
        }
    }

    /// Take the inbound ids, generating whichever is missing.
    pub fn begin(source: &dyn TraceSource) -> Self {
        let inbound = source.inbound();
        Self {
            trace_id: inbound.trace_id.unwrap_or_else(generate_id),
            span_id: inbound.span_id.unwrap_or_else(generate_id),
        }
    }

    /// Headers to put on the outbound request.
    pub fn headers(&self) -> [(HeaderName, String); 2] {
        [
            (HeaderName::from_static(X_TRACE_ID), self.trace_id.clone()),
            (HeaderName::from_static(X_SPAN_ID), self.span_id.clone()),
        ]
    }
}

/// The callee's span id from response headers; multiple values joined by `"; "`.
pub fn child_span_id(headers: &HeaderMap) -> String {
    headers
        .get_all(X_SPAN_ID)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fresh random id: 10 random bytes as lowercase hex.
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_hex_and_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 1000);
        for id in &ids {
            assert_eq!(id.len(), 20);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn inbound_ids_are_kept() {
        let ctx = TraceContext::begin(&InboundTrace::new("t-1", "s-1"));
        assert_eq!(ctx, TraceContext::new("t-1", "s-1"));
    }

    #[test]
    fn missing_ids_are_generated_independently() {
        let source = InboundTrace {
            trace_id: Some("t-1".into()),
            span_id: None,
        };
        let ctx = TraceContext::begin(&source);
        assert_eq!(ctx.trace_id, "t-1");
        assert_eq!(ctx.span_id.len(), 20);

        let a = TraceContext::begin(&NoInbound);
        let b = TraceContext::begin(&NoInbound);
        assert_ne!(a.trace_id, b.trace_id);
        assert_ne!(a.span_id, b.span_id);
    }

    #[test]
    fn empty_header_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert("X-TRACE-ID", HeaderValue::from_static(""));
        headers.insert("X-SPAN-ID", HeaderValue::from_static("s-9"));

        let ctx = TraceContext::begin(&headers);
        assert_eq!(ctx.trace_id.len(), 20);
        assert_eq!(ctx.span_id, "s-9");
    }

    #[test]
    fn child_span_joins_values() {
        let mut headers = HeaderMap::new();
        assert_eq!(child_span_id(&headers), "");

        headers.append("x-span-id", HeaderValue::from_static("c1"));
        assert_eq!(child_span_id(&headers), "c1");

        headers.append("x-span-id", HeaderValue::from_static("c2"));
        assert_eq!(child_span_id(&headers), "c1; c2");
    }

    #[tokio::test]
    async fn task_local_scope() {
        assert_eq!(TaskLocalSource.inbound(), InboundTrace::default());

        let inside = TaskLocalSource::scope(InboundTrace::new("t-7", "s-7"), async {
            TraceContext::begin(&TaskLocalSource)
        })
        .await;
        assert_eq!(inside, TraceContext::new("t-7", "s-7"));
    }
}
