//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build limiters/verifier → Start listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Stop sweeper → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
