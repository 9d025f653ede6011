//! Traced, connection-reusing RPC client library.
//!
//! Callers issue HTTP-shaped requests against `scheme://host:port/path`
//! URIs. Connections are cached per endpoint and reused while alive, every
//! call carries `X-TRACE-ID`/`X-SPAN-ID` headers, and each finished call is
//! logged and optionally reported to a trace collector.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod observability;

pub use client::{Client, ClientBuilder};
pub use config::schema::ClientConfig;
pub use error::{ClientError, ClientResult, ErrorKind, TransportError};
pub use http::{RequestOptions, Response};
