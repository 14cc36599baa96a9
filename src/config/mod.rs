//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + environment
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks, warnings)
//!     → GateConfig (validated, immutable)
//!     → WebhookVerifier / RateLimiter built from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the verifier
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Secrets come from the environment as well as the file
//! - Rate limiter state is not reset by a reload

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::AdminConfig;
pub use schema::GateConfig;
pub use schema::ObservabilityConfig;
pub use schema::RateLimitSettings;
pub use schema::WebhookConfig;
