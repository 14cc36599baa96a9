//! Security subsystem: the inbound admission and trust layer.
//!
//! # Data Flow
//! ```text
//! Incoming webhook:
//!     → rate_limit.rs (sliding window keyed by "endpoint:ip")
//!     → verifier.rs
//!         → ip_filter.rs (client IP, allow-list, dev bypass)
//!         → secret.rs (constant-time shared-secret check)
//!     → Hand off to business logic
//! ```
//!
//! # Design Decisions
//! - Fail closed: a missing secret rejects everything
//! - No trust in client input; every logged value is sanitized
//! - State is per process; multi-instance deployments multiply limits

pub mod ip_filter;
pub mod rate_limit;
pub mod secret;
pub mod verifier;

pub use ip_filter::{client_ip, ip_matches_cidr, IpAllowList, RuntimeMode};
pub use rate_limit::{
    rate_limit_headers, InMemoryStore, RateLimitConfig, RateLimitResult, RateLimitStore, RateLimiter,
};
pub use secret::verify_webhook_secret;
pub use verifier::{Rejection, VerificationResult, WebhookPolicy, WebhookVerifier};
