//! Transport connections.
//!
//! # Responsibilities
//! - Define the `Connector` / `Connection` seam the cache and dispatcher use
//! - Generate unique connection IDs for tracing
//! - Provide the default transport: HTTP/1.1 framing over a raw TCP socket
//!
//! # Connection States
//! ```text
//! Connected (idle) → Sending → Connected (idle)
//!        ↓ peer closed / driver ended / close()
//!      Closed (is_alive() == false)
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::http::{OutboundRequest, Response};
use crate::net::endpoint::{Endpoint, EndpointKey};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A stateful transport handle bound to one endpoint.
#[async_trait]
pub trait Connection: Send {
    fn id(&self) -> ConnectionId;

    /// Cheap, non-blocking liveness probe.
    fn is_alive(&self) -> bool;

    /// Send one request and read the full response.
    async fn send(&mut self, request: OutboundRequest) -> Result<Response, TransportError>;

    /// Close the underlying socket. Idempotent.
    async fn close(&mut self);
}

/// Opens connections for endpoints.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, TransportError>;
}

/// Default connector: TCP socket plus an HTTP/1.1 client handshake.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector;

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, TransportError> {
        let stream = TcpStream::connect(endpoint.authority()).await?;
        stream.set_nodelay(true)?;

        let (sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
        let id = ConnectionId::new();
        let key = endpoint.key();

        let driver_key = key.clone();
        let driver = tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(connection_id = %id, endpoint = %driver_key, error = %e, "Connection ended with error");
            }
        });

        tracing::debug!(connection_id = %id, endpoint = %key, "Connection established");
        Ok(Box::new(HttpConnection {
            id,
            key,
            sender,
            driver,
        }))
    }
}

/// HTTP/1.1 connection over TCP. The hyper connection future runs on its
/// own task; dropping or closing this handle aborts it.
#[derive(Debug)]
pub struct HttpConnection {
    id: ConnectionId,
    key: EndpointKey,
    sender: SendRequest<Full<Bytes>>,
    driver: JoinHandle<()>,
}

#[async_trait]
impl Connection for HttpConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_alive(&self) -> bool {
        !self.sender.is_closed() && !self.driver.is_finished()
    }

    async fn send(&mut self, request: OutboundRequest) -> Result<Response, TransportError> {
        if !self.is_alive() {
            return Err(TransportError::Closed);
        }
        let request = request.into_http()?;

        self.sender.ready().await?;
        let response = self.sender.send_request(request).await?;

        let (parts, body) = response.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok(Response::new(parts.status, parts.headers, body))
    }

    async fn close(&mut self) {
        if !self.driver.is_finished() {
            tracing::trace!(connection_id = %self.id, endpoint = %self.key, "Closing connection");
        }
        self.driver.abort();
    }
}

impl Drop for HttpConnection {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
