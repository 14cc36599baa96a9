//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID, caller address, span)
//!     → middleware.rs (sliding-window rate limit, X-RateLimit-* headers)
//!     → webhook.rs (verifier, queue accepted deliveries)
//!     → 202 / 401 / 403 / 429 / 503 to the sender
//! ```

pub mod middleware;
pub mod request;
pub mod server;
pub mod webhook;

pub use request::X_REQUEST_ID;
pub use server::{AppState, GateServer};
pub use webhook::AcceptedWebhook;
