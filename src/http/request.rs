//! Outbound request assembly.
//!
//! # Responsibilities
//! - Upper-case and validate the method
//! - Merge headers: `Host`, then caller headers, then trace headers
//! - Pick the timeout (caller value, else client default)
//! - Encode the body (JSON, else form params, else empty)
//!
//! # Design Decisions
//! - Trace headers are written last so callers cannot override them
//! - Header names are case-insensitive (`HeaderMap`); a caller header
//!   replaces any earlier value with the same name

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE, HOST};
use hyper::{HeaderMap, Method, Request, Uri};
use std::time::Duration;
use url::form_urlencoded;

use crate::error::TransportError;
use crate::http::options::RequestOptions;
use crate::net::endpoint::ResolvedTarget;
use crate::observability::context::TraceContext;

/// A normalized request, ready to hand to a connection.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Path plus query.
    pub path: String,
    pub headers: HeaderMap,
    pub timeout: Duration,
    pub body: Bytes,
}

impl OutboundRequest {
    /// Convert into a hyper request with an origin-form URI.
    pub fn into_http(self) -> Result<Request<Full<Bytes>>, TransportError> {
        let uri: Uri = self
            .path
            .parse()
            .map_err(|e| TransportError::InvalidRequest(format!("path '{}': {}", self.path, e)))?;

        let mut request = Request::new(Full::new(self.body));
        *request.method_mut() = self.method;
        *request.uri_mut() = uri;
        *request.headers_mut() = self.headers;
        Ok(request)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Build the outbound request for `target`.
pub fn build(
    method: &str,
    target: &ResolvedTarget,
    options: &RequestOptions,
    trace: &TraceContext,
    default_timeout: Duration,
) -> Result<OutboundRequest, TransportError> {
    let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| TransportError::InvalidRequest(format!("method '{}'", method)))?;

    let mut headers = HeaderMap::new();
    headers.insert(HOST, header_value(&target.endpoint.host)?);

    for (name, value) in &options.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("header name '{}'", name)))?;
        headers.insert(name, header_value(value)?);
    }

    for (name, value) in trace.headers() {
        headers.insert(name, header_value(&value)?);
    }

    let body = match (&options.json, &options.form_params) {
        (Some(json), _) => {
            let encoded = serde_json::to_vec(json)
                .map_err(|e| TransportError::InvalidRequest(format!("json body: {}", e)))?;
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("application/json"));
            Bytes::from(encoded)
        }
        (None, Some(form)) => {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(form)
                .finish();
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("application/x-www-form-urlencoded"));
            Bytes::from(encoded)
        }
        (None, None) => Bytes::new(),
    };

    Ok(OutboundRequest {
        method,
        path: target.path.clone(),
        headers,
        timeout: options.timeout.unwrap_or(default_timeout),
        body,
    })
}

fn header_value(value: &str) -> Result<HeaderValue, TransportError> {
    HeaderValue::from_str(value)
        .map_err(|_| TransportError::InvalidRequest(format!("header value '{}'", value)))
}
