//! Sliding-window rate limiting.
//!
//! Each identifier owns the timestamps of its admitted requests inside the
//! trailing window. A request is admitted while fewer than `max_requests`
//! timestamps are newer than `now - window_ms`. There are no fixed buckets:
//! the window moves with every call.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time;

use crate::observability::metrics;

/// Response header carrying the window's admission ceiling.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// Response header carrying the quota left in the window.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// Response header carrying the window reset time (Unix seconds).
pub const HEADER_RESET: &str = "X-RateLimit-Reset";

/// Probability that a check triggers a sweep of every identifier.
pub const DEFAULT_SWEEP_PROBABILITY: f64 = 0.01;

/// Metric label for checks made through [`check_rate_limit`].
pub const AD_HOC_LIMITER: &str = "ad_hoc";

/// Admission ceiling per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests admitted per window.
    pub max_requests: u32,

    /// Window duration in milliseconds.
    pub window_ms: u64,
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }

    /// Generic webhook traffic: 100 requests per minute.
    pub const WEBHOOK: Self = Self::new(100, 60_000);

    /// Sensitive operations: 10 requests per minute.
    pub const STRICT: Self = Self::new(10, 60_000);
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::WEBHOOK
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    /// Whether the request was admitted.
    pub allowed: bool,
    /// Quota left in the window after this request.
    pub remaining: u32,
    /// Unix seconds at which the current window has fully elapsed.
    pub reset_at: u64,
    /// Requests counted in the window, including this one if admitted.
    pub count: u32,
}

impl RateLimitResult {
    /// Seconds until the window resets, relative to `now_ms`.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_at.saturating_sub(now_ms / 1000).max(1)
    }
}

/// Standard rate-limit response headers derived from a result.
///
/// Pure: the limit is reconstructed as `count + remaining`.
pub fn rate_limit_headers(result: &RateLimitResult) -> BTreeMap<&'static str, String> {
    let limit = u64::from(result.count) + u64::from(result.remaining);
    BTreeMap::from([
        (HEADER_LIMIT, limit.to_string()),
        (HEADER_REMAINING, result.remaining.to_string()),
        (HEADER_RESET, result.reset_at.to_string()),
    ])
}

/// Storage behind the limiter.
///
/// Implementations must make the filter-count-append sequence of `check`
/// atomic per identifier.
pub trait RateLimitStore: Send + Sync {
    /// Run one sliding-window admission check at `now_ms`.
    fn check(&self, identifier: &str, config: &RateLimitConfig, now_ms: u64) -> RateLimitResult;

    /// Forget everything stored for one identifier.
    fn reset(&self, identifier: &str);

    /// Forget everything.
    fn clear(&self);

    /// Drop timestamps at or before `now_ms - window_ms`, and empty entries.
    /// Returns the number of identifiers removed.
    fn sweep(&self, window_ms: u64, now_ms: u64) -> usize;

    /// Number of identifiers currently holding state.
    fn tracked_identifiers(&self) -> usize;
}

/// Process-local store. State does not survive restarts and is not shared
/// between instances.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    windows: DashMap<String, Vec<u64>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryStore {
    fn check(&self, identifier: &str, config: &RateLimitConfig, now_ms: u64) -> RateLimitResult {
        let cutoff = now_ms.saturating_sub(config.window_ms);
        let reset_at = reset_at(config, now_ms);

        // The entry guard holds the shard lock until the end of the scope.
        let mut entry = self.windows.entry(identifier.to_string()).or_default();
        entry.retain(|&ts| ts > cutoff);

        let count = u32::try_from(entry.len()).unwrap_or(u32::MAX);
        if count < config.max_requests {
            entry.push(now_ms);
            RateLimitResult {
                allowed: true,
                remaining: config.max_requests - count - 1,
                reset_at,
                count: count + 1,
            }
        } else {
            RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_at,
                count,
            }
        }
    }

    fn reset(&self, identifier: &str) {
        self.windows.remove(identifier);
    }

    fn clear(&self) {
        self.windows.clear();
    }

    fn sweep(&self, window_ms: u64, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(window_ms);
        let before = self.windows.len();
        self.windows.retain(|_, timestamps| {
            timestamps.retain(|&ts| ts > cutoff);
            !timestamps.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    fn tracked_identifiers(&self) -> usize {
        self.windows.len()
    }
}

fn reset_at(config: &RateLimitConfig, now_ms: u64) -> u64 {
    now_ms.saturating_add(config.window_ms).div_ceil(1000)
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A named limiter binding one configuration to a store.
#[derive(Clone)]
pub struct RateLimiter {
    name: String,
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
    sweep_probability: f64,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("sweep_probability", &self.sweep_probability)
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter with its own configuration over a store.
    pub fn new(name: impl Into<String>, config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            name: name.into(),
            config,
            store,
            sweep_probability: DEFAULT_SWEEP_PROBABILITY,
        }
    }

    /// Limiter for generic webhook traffic (100 requests per minute).
    pub fn webhook(store: Arc<dyn RateLimitStore>) -> Self {
        Self::new("webhook", RateLimitConfig::WEBHOOK, store)
    }

    /// Limiter for sensitive operations (10 requests per minute).
    pub fn strict(store: Arc<dyn RateLimitStore>) -> Self {
        Self::new("strict", RateLimitConfig::STRICT, store)
    }

    /// Keep the preset's name but use different limits.
    pub fn with_config(mut self, config: RateLimitConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the opportunistic sweep probability (clamped to `[0, 1]`).
    pub fn with_sweep_probability(mut self, probability: f64) -> Self {
        self.sweep_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Check an identifier against the wall clock.
    pub fn check(&self, identifier: &str) -> RateLimitResult {
        self.check_at(identifier, now_millis())
    }

    /// Check an identifier at an explicit time.
    pub fn check_at(&self, identifier: &str, now_ms: u64) -> RateLimitResult {
        admit(
            self.store.as_ref(),
            &self.name,
            identifier,
            &self.config,
            now_ms,
            self.sweep_probability,
        )
    }

    /// Remove stale state for every identifier.
    pub fn sweep_at(&self, now_ms: u64) -> usize {
        sweep_store(self.store.as_ref(), &self.name, self.config.window_ms, now_ms)
    }

    /// Forget one identifier, as if it had never been seen.
    pub fn reset(&self, identifier: &str) {
        self.store.reset(identifier);
    }

    /// Forget every identifier.
    pub fn clear_all(&self) {
        self.store.clear();
    }

    pub fn tracked_identifiers(&self) -> usize {
        self.store.tracked_identifiers()
    }
}

/// One-shot sliding-window check against a store with an ad-hoc config.
///
/// Carries the same sampled sweep as a [`RateLimiter`].
pub fn check_rate_limit(
    store: &dyn RateLimitStore,
    identifier: &str,
    config: &RateLimitConfig,
) -> RateLimitResult {
    check_rate_limit_at(store, identifier, config, now_millis(), DEFAULT_SWEEP_PROBABILITY)
}

/// [`check_rate_limit`] with an explicit clock and sweep probability.
pub fn check_rate_limit_at(
    store: &dyn RateLimitStore,
    identifier: &str,
    config: &RateLimitConfig,
    now_ms: u64,
    sweep_probability: f64,
) -> RateLimitResult {
    admit(store, AD_HOC_LIMITER, identifier, config, now_ms, sweep_probability)
}

fn admit(
    store: &dyn RateLimitStore,
    limiter: &str,
    identifier: &str,
    config: &RateLimitConfig,
    now_ms: u64,
    sweep_probability: f64,
) -> RateLimitResult {
    if sweep_probability > 0.0 && fastrand::f64() < sweep_probability {
        sweep_store(store, limiter, config.window_ms, now_ms);
    }

    let result = store.check(identifier, config, now_ms);
    if !result.allowed {
        metrics::record_rate_limited(limiter);
    }
    result
}

fn sweep_store(store: &dyn RateLimitStore, limiter: &str, window_ms: u64, now_ms: u64) -> usize {
    let removed = store.sweep(window_ms, now_ms);
    let tracked = store.tracked_identifiers();
    metrics::record_sweep(limiter, removed, tracked);
    if removed > 0 {
        tracing::debug!(limiter, removed, tracked, "Swept idle rate limit entries");
    }
    removed
}

/// Sweep every limiter on a fixed interval until shutdown.
///
/// Uses the same filter as the opportunistic sweep in [`RateLimiter::check_at`].
pub async fn run_sweeper(
    limiters: Vec<RateLimiter>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Rate limit sweeper starting");
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = now_millis();
                for limiter in &limiters {
                    limiter.sweep_at(now);
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
