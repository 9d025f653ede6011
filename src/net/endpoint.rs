//! URI to endpoint resolution.
//!
//! # Responsibilities
//! - Split a URI into scheme, host, port and path+query
//! - Apply the configured default scheme and port
//! - Derive the endpoint key used by the connection cache
//! - Append caller-supplied query parameters (URL-encoded)
//!
//! The URI's own query string is copied verbatim; only the caller's query
//! pairs are encoded, so already-encoded input is never encoded twice.

use url::form_urlencoded;
use url::Url;

use crate::config::TransportConfig;
use crate::error::{ClientError, ClientResult};

/// Canonical `scheme://host:port` identifying a reusable transport target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey(String);

impl EndpointKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A transport target: where a connection goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn key(&self) -> EndpointKey {
        EndpointKey(format!("{}://{}:{}", self.scheme, self.host, self.port))
    }

    /// `host:port`, suitable for a socket connect.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Result of resolving one URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub endpoint: Endpoint,
    /// Path plus query, ready for the request line.
    pub path: String,
}

impl ResolvedTarget {
    pub fn key(&self) -> EndpointKey {
        self.endpoint.key()
    }

    pub fn scheme(&self) -> &str {
        &self.endpoint.scheme
    }
}

/// Turns URIs into endpoints using deployment defaults.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    default_scheme: String,
    default_port: u16,
}

impl EndpointResolver {
    pub fn new(default_scheme: impl Into<String>, default_port: u16) -> Self {
        Self {
            default_scheme: default_scheme.into(),
            default_port,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.default_scheme.clone(), config.default_port)
    }

    /// Resolve `uri`, appending `query` pairs to whatever query it already has.
    ///
    /// Port precedence: explicit port, then the scheme's well-known port
    /// (`http` → 80, `https` → 443), then the configured default.
    pub fn resolve(&self, uri: &str, query: &[(String, String)]) -> ClientResult<ResolvedTarget> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(ClientError::malformed(uri, "empty uri"));
        }

        let absolute = if has_scheme(trimmed) {
            trimmed.to_string()
        } else if let Some(rest) = trimmed.strip_prefix("//") {
            format!("{}://{}", self.default_scheme, rest)
        } else {
            format!("{}://{}", self.default_scheme, trimmed)
        };

        let parsed = Url::parse(&absolute).map_err(|e| ClientError::malformed(uri, e.to_string()))?;

        let host = match parsed.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(ClientError::malformed(uri, "missing host")),
        };
        let port = parsed.port_or_known_default().unwrap_or(self.default_port);

        let mut path = match parsed.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };
        if let Some(raw) = raw_query(trimmed) {
            path.push('?');
            path.push_str(raw);
        }
        if !query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query)
                .finish();
            path.push(if path.contains('?') { '&' } else { '?' });
            path.push_str(&encoded);
        }

        Ok(ResolvedTarget {
            endpoint: Endpoint {
                scheme: parsed.scheme().to_string(),
                host,
                port,
            },
            path,
        })
    }
}

/// True when `uri` starts with `scheme://`. A `://` after the first
/// `/`, `?` or `#` belongs to the path, query or fragment.
fn has_scheme(uri: &str) -> bool {
    match uri.find("://") {
        Some(at) => !uri[..at].contains(['/', '?', '#']),
        None => false,
    }
}

/// The query exactly as written in the URI (fragment stripped).
fn raw_query(uri: &str) -> Option<&str> {
    let without_fragment = uri.split('#').next().unwrap_or(uri);
    without_fragment
        .split_once('?')
        .map(|(_, q)| q)
        .filter(|q| !q.is_empty())
}
