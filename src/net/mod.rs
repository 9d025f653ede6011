//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! URI
//!     → endpoint.rs (scheme/host/port/path, endpoint key)
//!     → cache.rs (lock the key's slot, probe or create the connection)
//!     → connection.rs (HTTP/1.1 over TCP, one request at a time)
//!     → Response handed back to the dispatcher
//!
//! Connection States:
//!     Absent → Connected → (probe ok) Connected
//!                        → (probe failed) Closed → Connected (recreated)
//!                        → (release) Closed, evicted
//! ```
//!
//! # Design Decisions
//! - At most one connection per endpoint key
//! - Liveness is probed before every reuse; no background health checker
//! - The transport is a trait pair so other socket protocols can plug in

pub mod cache;
pub mod connection;
pub mod endpoint;

pub use cache::{CachedConnection, ConnectionCache};
pub use connection::{Connection, ConnectionId, Connector, HttpConnection, HttpConnector};
pub use endpoint::{Endpoint, EndpointKey, EndpointResolver, ResolvedTarget};
