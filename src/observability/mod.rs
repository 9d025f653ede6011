//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every call produces:
//!     → context.rs (trace/span ids in, child span id out)
//!     → logging.rs (one structured line on the `trace` target)
//!     → metrics.rs (counters, latency histogram)
//!     → reporter.rs (call record to the trace collector, in the background)
//! ```
//!
//! # Design Decisions
//! - Trace ids are always present on outbound calls, generated when absent
//! - The log line is unconditional; collector reporting is opt-out
//! - Reporter failures are contained and only logged

pub mod context;
pub mod logging;
pub mod metrics;
pub mod reporter;

pub use context::{InboundTrace, NoInbound, TaskLocalSource, TraceContext, TraceSource};
pub use reporter::{CallRecord, HttpCollector, LogReporter, Reporter, TraceReporter};
