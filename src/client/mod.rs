//! Caller-facing client.
//!
//! # Data Flow
//! ```text
//! request(method, uri, options)
//!     → dispatch.rs (resolve → acquire → build → send → release?)
//!     → telemetry (log line, metrics, background collector report)
//!     → Response or the original error
//! ```
//!
//! The verb helpers are thin forwards into [`Client::request`].

pub mod builder;
pub mod dispatch;

use std::sync::Arc;

pub use builder::ClientBuilder;

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::http::{RequestOptions, Response};
use crate::net::ConnectionCache;
use dispatch::Dispatcher;

/// Traced, connection-reusing RPC client. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Dispatcher>,
}

impl Client {
    /// Client with the default transport, no inbound trace source, and the
    /// collector from `config` (if any).
    pub fn new(config: ClientConfig) -> Self {
        ClientBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Send one request. `method` is case-insensitive.
    pub async fn request(
        &self,
        method: impl AsRef<str>,
        uri: &str,
        options: RequestOptions,
    ) -> ClientResult<Response> {
        self.inner.dispatch(method.as_ref(), uri, options).await
    }

    pub async fn get(&self, uri: &str, options: RequestOptions) -> ClientResult<Response> {
        self.request("GET", uri, options).await
    }

    pub async fn head(&self, uri: &str, options: RequestOptions) -> ClientResult<Response> {
        self.request("HEAD", uri, options).await
    }

    pub async fn put(&self, uri: &str, options: RequestOptions) -> ClientResult<Response> {
        self.request("PUT", uri, options).await
    }

    pub async fn post(&self, uri: &str, options: RequestOptions) -> ClientResult<Response> {
        self.request("POST", uri, options).await
    }

    pub async fn patch(&self, uri: &str, options: RequestOptions) -> ClientResult<Response> {
        self.request("PATCH", uri, options).await
    }

    pub async fn delete(&self, uri: &str, options: RequestOptions) -> ClientResult<Response> {
        self.request("DELETE", uri, options).await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn connections(&self) -> &ConnectionCache {
        &self.inner.cache
    }

    /// Close every cached connection.
    pub async fn shutdown(&self) {
        self.inner.cache.close_all().await;
        tracing::debug!("Client connections closed");
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("cache", &self.inner.cache)
            .field("reporter", &self.inner.reporter)
            .finish()
    }
}
