//! Provider-specific error types
//!
//! ProviderError는 완성 API 관련 세부 에러를 관리합니다.
//! anvil_foundation::Error와의 변환을 지원합니다.

use anvil_foundation::Error as FoundationError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while obtaining a completion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// API key is missing or invalid
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The remote service refused the request
    #[error("Rate limit exceeded{}", .retry_after_ms.map(|ms| format!(", retry after {}ms", ms)).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },

    /// Context length exceeded
    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// Server error (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Network error (connection failed, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid request (bad parameters)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Streaming error after the stream started
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Provider not configured
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Unknown error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ProviderError {
    /// Transient failures worth retrying later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::ServerError(_)
                | ProviderError::Network(_)
                | ProviderError::StreamError(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited {
                retry_after_ms: Some(ms),
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }

    /// Map an HTTP status and body from an external client
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ProviderError::Authentication(body.to_string()),
            429 => ProviderError::RateLimited {
                retry_after_ms: retry_after_from_body(body),
            },
            400 if body.contains("context") || body.contains("too long") => {
                ProviderError::ContextLengthExceeded(body.to_string())
            }
            400 | 422 => ProviderError::InvalidRequest(body.to_string()),
            500..=599 => ProviderError::ServerError(body.to_string()),
            _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
        }
    }
}

/// `{"error": {"retry_after": <seconds>}}`, in milliseconds
fn retry_after_from_body(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    let secs = json.get("error")?.get("retry_after")?.as_f64()?;
    (secs.is_finite() && secs >= 0.0).then(|| (secs * 1000.0) as u64)
}

// ============================================================================
// anvil_foundation::Error 변환
// ============================================================================

impl From<ProviderError> for FoundationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RateLimited { retry_after_ms } => FoundationError::rate_limited(
                "provider",
                Duration::from_millis(retry_after_ms.unwrap_or(0)),
            ),
            ProviderError::InvalidRequest(msg) => FoundationError::InvalidInput(msg),
            ProviderError::NotConfigured(msg) => FoundationError::Config(msg),
            other => FoundationError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            ProviderError::from_http_status(401, "bad key"),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(400, "context window is too long"),
            ProviderError::ContextLengthExceeded(_)
        ));
        assert!(ProviderError::from_http_status(503, "down").is_retryable());

        let limited = ProviderError::from_http_status(429, r#"{"error":{"retry_after":1.5}}"#);
        assert_eq!(limited.retry_after(), Some(Duration::from_millis(1500)));
        assert!(limited.to_string().contains("1500ms"));
    }

    #[test]
    fn test_into_foundation_error() {
        let err: FoundationError = ProviderError::RateLimited {
            retry_after_ms: Some(200),
        }
        .into();
        assert!(err.is_retryable());

        let err: FoundationError = ProviderError::NotConfigured("no key".into()).into();
        assert!(matches!(err, FoundationError::Config(_)));
    }
}
