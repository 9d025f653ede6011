//! HTTP-shaped request/response contract.
//!
//! # Data Flow
//! ```text
//! caller options
//!     → options.rs (headers, query, timeout, body, no_trace)
//!     → request.rs (merge with Host and trace headers, encode body)
//!     → [connection sends it]
//!     → response.rs (buffered status, headers, body)
//!     → caller
//! ```

pub mod options;
pub mod request;
pub mod response;

pub use options::RequestOptions;
pub use request::OutboundRequest;
pub use response::Response;
