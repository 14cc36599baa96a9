//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Untrusted values pass through sanitize.rs before they reach a log line.
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all request spans
//! - Metrics are cheap (atomic increments)
//! - Rejection reasons are detailed in logs, generic on the wire

pub mod logging;
pub mod metrics;
pub mod sanitize;

pub use sanitize::{log_safe, sanitize_for_log, Sanitized};
