//! Error types for outbound calls.
//!
//! A call can fail in three ways that reach the caller (malformed URI,
//! connection failure, send failure). Collector failures are a fourth kind
//! that is always contained by the reporter and never returned from a call.

use std::time::Duration;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failure raised by the socket transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level failure (connect refused, reset, broken pipe).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// HTTP framing or protocol failure reported by hyper.
    #[error(transparent)]
    Http(#[from] hyper::Error),

    /// The request could not be assembled (bad method, header or body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No response arrived within the deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The connection was already closed when the request was sent.
    #[error("connection closed")]
    Closed,
}

/// Failure of a single outbound call.
///
/// The transport error is kept as-is inside the `Connection` and `Send`
/// variants, so `to_string()` yields the original diagnostic message.
#[derive(Debug, Error)]
pub enum ClientError {
    /// URI could not be parsed or has no host.
    #[error("malformed uri '{uri}': {reason}")]
    MalformedUri { uri: String, reason: String },

    /// Connection could not be created for the endpoint.
    #[error(transparent)]
    Connection(TransportError),

    /// Transport failed or timed out while sending.
    #[error(transparent)]
    Send(TransportError),
}

impl ClientError {
    pub(crate) fn malformed(uri: &str, reason: impl Into<String>) -> Self {
        ClientError::MalformedUri {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }

    /// The error kind, for branching without string matching.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::MalformedUri { .. } => ErrorKind::MalformedUri,
            ClientError::Connection(_) => ErrorKind::Connection,
            ClientError::Send(_) => ErrorKind::Send,
        }
    }

    /// The underlying transport error, if any.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            ClientError::MalformedUri { .. } => None,
            ClientError::Connection(e) | ClientError::Send(e) => Some(e),
        }
    }

    /// True when the send deadline expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Send(TransportError::Timeout(_)))
    }
}

/// Error classification shared by call failures and reporting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedUri,
    Connection,
    Send,
    Reporting,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedUri => "malformed_uri",
            ErrorKind::Connection => "connection",
            ErrorKind::Send => "send",
            ErrorKind::Reporting => "reporting",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trace collector failure. Logged by the reporter, never returned to callers.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Collector could not be reached or rejected the request.
    #[error("collector request failed: {0}")]
    Collector(#[from] reqwest::Error),

    /// Collector answered with a non-success status.
    #[error("collector returned status {0}")]
    Status(u16),

    /// Collector did not answer within the report timeout.
    #[error("collector timed out after {0:?}")]
    Timeout(Duration),

    /// Any other reporter-specific failure.
    #[error("{0}")]
    Other(String),
}

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Reporting
    }
}
