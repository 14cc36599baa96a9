//! Shared-secret comparison.

use subtle::ConstantTimeEq;

/// Compare a request-supplied token against the configured secret.
///
/// Empty inputs and length mismatches are rejected up front. Equal-length
/// inputs are compared in constant time, so the duration does not reveal
/// where the first differing byte is.
pub fn verify_webhook_secret(token: &str, secret: &str) -> bool {
    constant_time_eq(token.as_bytes(), secret.as_bytes())
}

/// Constant-time byte comparison with the same guards as
/// [`verify_webhook_secret`].
pub fn constant_time_eq(provided: &[u8], expected: &[u8]) -> bool {
    if provided.is_empty() || expected.is_empty() {
        return false;
    }
    if provided.len() != expected.len() {
        return false;
    }
    provided.ct_eq(expected).into()
}
