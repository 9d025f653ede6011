//! Per-call request options.
//!
//! Mirrors the options contract of common HTTP clients: headers, query,
//! timeout, a JSON or form body, plus the `no_trace` opt-out.

use serde::Serialize;
use std::time::Duration;

/// Caller-supplied options for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers. Later entries replace earlier ones with the same name.
    pub headers: Vec<(String, String)>,

    /// Query pairs, URL-encoded and appended to the path.
    pub query: Vec<(String, String)>,

    /// Send timeout overriding the client default.
    pub timeout: Option<Duration>,

    /// JSON body. Takes precedence over `form_params`.
    pub json: Option<serde_json::Value>,

    /// URL-form-encoded body.
    pub form_params: Option<Vec<(String, String)>>,

    /// Skip collector reporting for this call.
    pub no_trace: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Timeout in (possibly fractional) seconds. Non-positive or
    /// out-of-range values are ignored.
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        if let Ok(timeout) = Duration::try_from_secs_f64(secs) {
            if !timeout.is_zero() {
                self.timeout = Some(timeout);
            }
        }
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }

    /// Serialize any value as the JSON body.
    pub fn try_json<T: Serialize>(self, body: &T) -> serde_json::Result<Self> {
        Ok(self.json(serde_json::to_value(body)?))
    }

    pub fn form_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_params
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    pub fn no_trace(mut self, no_trace: bool) -> Self {
        self.no_trace = no_trace;
        self
    }
}
