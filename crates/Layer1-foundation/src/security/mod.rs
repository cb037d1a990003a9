//! Security - 민감 정보 보호
//!
//! - Secret redaction before caching, logging or sending text outward

mod redact;

pub use redact::{contains_secret, redact, redact_cow, REDACTION_MARKER, SECRET_KEYS};
