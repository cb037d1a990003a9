//! Secret redaction
//!
//! 캐시, 로그, 외부 전송 전에 자격 증명 형태의 값을 가립니다.
//!
//! A match is a key from [`SECRET_KEYS`] (case-insensitive, optionally quoted)
//! followed by `=` or `:` and a contiguous value. Only the value is replaced;
//! the key and separator are kept so the surrounding code still reads.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Replacement for redacted values
///
/// Contains none of the value delimiters, so redacting twice is a no-op.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Key names whose values are treated as secrets
pub const SECRET_KEYS: &[&str] = &["api_key", "password", "secret", "token", "jwt", "bearer", "env"];

static SECRET_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn secret_pattern() -> Option<&'static Regex> {
    SECRET_PATTERN
        .get_or_init(|| {
            let keys = SECRET_KEYS.join("|");
            // key may be glued to a prefix by '_' (OPENAI_API_KEY, db_password)
            let pattern = format!(
                r#"(?i)(?P<key>(?:\b|_)(?:{keys})["']?\s*[=:]\s*["']?)(?P<value>[^\s"'`,;)}}=][^\s"'`,;)}}]*)"#
            );
            match Regex::new(&pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!("secret pattern failed to compile: {}", e);
                    None
                }
            }
        })
        .as_ref()
}

/// Redact secret values, borrowing when nothing matched
pub fn redact_cow(text: &str) -> Cow<'_, str> {
    match secret_pattern() {
        Some(re) => re.replace_all(text, |caps: &regex::Captures<'_>| {
            format!("{}{}", &caps["key"], REDACTION_MARKER)
        }),
        None => Cow::Borrowed(text),
    }
}

/// Redact secret values in `text`
///
/// Identity on text without key/value secrets; never fails.
pub fn redact(text: &str) -> String {
    redact_cow(text).into_owned()
}

/// Whether `text` contains anything [`redact`] would change
pub fn contains_secret(text: &str) -> bool {
    secret_pattern()
        .map(|re| {
            re.captures_iter(text)
                .any(|caps| &caps["value"] != REDACTION_MARKER)
        })
        .unwrap_or(false)
}
