//! Client IP extraction and IPv4 allow-listing.
//!
//! # Responsibilities
//! - Resolve the client IP from proxy/CDN headers
//! - Match IPs against exact entries and CIDR ranges
//! - Keep the allow-all and development-bypass states explicit
//!
//! # Design Decisions
//! - Header order: `x-forwarded-for`, `x-real-ip`, `cf-connecting-ip`
//! - IPv4 only; anything unparseable never matches
//! - `0.0.0.0/0` is parsed into a named sentinel so it is easy to audit

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use axum::http::HeaderMap;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The allow-everything range.
pub const ALLOW_ALL_CIDR: &str = "0.0.0.0/0";

/// Headers consulted for the client IP, in priority order.
pub const CLIENT_IP_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Resolve the client IP from proxy headers.
///
/// The first header with a non-empty value decides. For `x-forwarded-for`
/// only the first (client-most) entry is used; if that entry is blank the
/// result is `None` rather than a lower-priority header.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let value = CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    })?;
    let first = value.split(',').next().unwrap_or_default().trim();
    (!first.is_empty()).then(|| first.to_string())
}

/// Whether `ip` falls inside `cidr`.
///
/// A `cidr` without a prefix is compared exactly.
pub fn ip_matches_cidr(ip: &str, cidr: &str) -> bool {
    if cidr == ALLOW_ALL_CIDR {
        return true;
    }
    if !cidr.contains('/') {
        return ip == cidr;
    }
    let Ok(range) = cidr.trim().parse::<Ipv4Net>() else {
        return false;
    };
    Ipv4Addr::from_str(ip.trim()).is_ok_and(|addr| range.contains(&addr))
}

/// Errors from parsing allow-list entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllowListError {
    #[error("invalid IPv4 address in allow-list entry '{0}'")]
    InvalidAddress(String),

    #[error("invalid IPv4 CIDR range in allow-list entry '{0}'")]
    InvalidCidr(String),
}

/// One parsed allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowEntry {
    /// `0.0.0.0/0`: every request passes. Development only.
    AllowAll,
    /// A single address, compared exactly.
    Exact(Ipv4Addr),
    /// A CIDR range, host bits cleared.
    Cidr(Ipv4Net),
}

impl AllowEntry {
    pub fn matches(&self, ip: &str) -> bool {
        match self {
            AllowEntry::AllowAll => true,
            AllowEntry::Exact(expected) => {
                Ipv4Addr::from_str(ip.trim()).is_ok_and(|addr| addr == *expected)
            }
            AllowEntry::Cidr(range) => {
                Ipv4Addr::from_str(ip.trim()).is_ok_and(|addr| range.contains(&addr))
            }
        }
    }
}

impl FromStr for AllowEntry {
    type Err = AllowListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == ALLOW_ALL_CIDR {
            return Ok(AllowEntry::AllowAll);
        }
        if s.contains('/') {
            return s
                .parse::<Ipv4Net>()
                .map(|net| AllowEntry::Cidr(net.trunc()))
                .map_err(|_| AllowListError::InvalidCidr(s.to_string()));
        }
        Ipv4Addr::from_str(s)
            .map(AllowEntry::Exact)
            .map_err(|_| AllowListError::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for AllowEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowEntry::AllowAll => f.write_str(ALLOW_ALL_CIDR),
            AllowEntry::Exact(addr) => write!(f, "{}", addr),
            AllowEntry::Cidr(range) => write!(f, "{}", range),
        }
    }
}

/// Ordered set of trusted source ranges, evaluated with OR semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpAllowList {
    entries: Vec<AllowEntry>,
}

impl IpAllowList {
    /// The unconfigured default: a single allow-all entry.
    pub fn allow_all() -> Self {
        Self {
            entries: vec![AllowEntry::AllowAll],
        }
    }

    /// Parse configured entries, reporting every invalid one.
    ///
    /// An empty input yields the allow-all default.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, Vec<AllowListError>> {
        let mut parsed = Vec::with_capacity(entries.len());
        let mut errors = Vec::new();
        for raw in entries.iter().map(AsRef::as_ref).filter(|e| !e.trim().is_empty()) {
            match raw.parse::<AllowEntry>() {
                Ok(entry) => parsed.push(entry),
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        if parsed.is_empty() {
            return Ok(Self::allow_all());
        }
        Ok(Self { entries: parsed })
    }

    pub fn allows_all(&self) -> bool {
        self.entries.contains(&AllowEntry::AllowAll)
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.entries.iter().any(|entry| entry.matches(ip))
    }

    pub fn entries(&self) -> &[AllowEntry] {
        &self.entries
    }
}

impl Default for IpAllowList {
    fn default() -> Self {
        Self::allow_all()
    }
}

/// Runtime mode. Only `Development` enables the IP-check bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Development,
    #[default]
    Production,
}

impl RuntimeMode {
    /// Interpret an environment value. Anything but `development` is production.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("development") {
            RuntimeMode::Development
        } else {
            RuntimeMode::Production
        }
    }

    pub fn bypasses_ip_check(self) -> bool {
        matches!(self, RuntimeMode::Development)
    }
}

/// Allow-list decision for an optional client IP.
pub fn verify_ip(ip: Option<&str>, allow_list: &IpAllowList, mode: RuntimeMode) -> bool {
    let Some(ip) = ip else {
        return false;
    };
    if mode.bypasses_ip_check() {
        return true;
    }
    allow_list.contains(ip)
}
