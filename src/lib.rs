//! Inbound webhook admission and trust layer.
//!
//! Verifies that a third-party webhook is legitimate (IP allow-list,
//! constant-time shared-secret check) and not abusive (sliding-window rate
//! limiting) before it reaches business logic.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GateConfig;
pub use http::GateServer;
pub use lifecycle::Shutdown;
