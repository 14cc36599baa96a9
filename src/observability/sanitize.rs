//! Log sanitization for untrusted values.
//!
//! # Responsibilities
//! - Neutralize log injection (forged lines via embedded CR/LF)
//! - Strip control characters that terminals or log shippers interpret
//! - Bound the length of anything a client can make us log
//!
//! # Design Decisions
//! - CR/LF are escaped, not removed, so injection attempts stay visible
//! - Truncation happens after escaping and counts characters, not bytes

use std::fmt;

/// Default maximum length of a sanitized value.
pub const DEFAULT_MAX_LOG_LENGTH: usize = 200;

/// Placeholder written for absent values.
pub const NULL_PLACEHOLDER: &str = "[null]";

/// Make an arbitrary value safe to interpolate into a log line.
pub fn sanitize_for_log<T>(input: Option<&T>, max_length: usize) -> String
where
    T: fmt::Display + ?Sized,
{
    let Some(value) = input else {
        return NULL_PLACEHOLDER.to_string();
    };

    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len().min(max_length));
    let mut written = 0usize;

    for c in raw.chars() {
        let replacement: &str = match c {
            '\r' => "\\r",
            '\n' => "\\n",
            '\t' => " ",
            c if is_stripped_control(c) => "",
            _ => {
                if written == max_length {
                    break;
                }
                out.push(c);
                written += 1;
                continue;
            }
        };

        for r in replacement.chars() {
            if written == max_length {
                return out;
            }
            out.push(r);
            written += 1;
        }
    }

    out
}

/// Sanitize a string with the default length limit.
pub fn log_safe(input: &str) -> String {
    sanitize_for_log(Some(input), DEFAULT_MAX_LOG_LENGTH)
}

/// Display adapter that sanitizes on format, for use in tracing fields.
///
/// ```
/// use webhook_gate::observability::sanitize::Sanitized;
/// tracing::warn!(reason = %Sanitized("bad\nline"), "rejected");
/// ```
pub struct Sanitized<T>(pub T);

impl<T: fmt::Display> fmt::Display for Sanitized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&sanitize_for_log(Some(&self.0), DEFAULT_MAX_LOG_LENGTH))
    }
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}'..='\u{1F}' | '\u{7F}'..='\u{9F}')
}
