//! Error types for Anvil
//!
//! 기반 레이어의 모든 에러를 중앙에서 관리

use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Anvil 기반 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 요청 제어 관련
    // ========================================================================
    #[error("Token budget exceeded: estimated {estimated} tokens, limit {limit}")]
    TokenBudgetExceeded { estimated: usize, limit: usize },

    #[error("Rate limited for context '{context}', retry after {}ms", .retry_after.as_millis())]
    RateLimited {
        context: String,
        retry_after: Duration,
    },

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 재시도 가능한 에러인지 확인
    ///
    /// Rate limiting is retryable later, never immediately; see `retry_after`.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::TokenBudgetExceeded { .. }
                | Error::RateLimited { .. }
                | Error::InvalidInput(_)
                | Error::Config(_)
        )
    }

    /// Suggested wait before retrying, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// 토큰 예산 초과 에러 생성 헬퍼
    pub fn token_budget(estimated: usize, limit: usize) -> Self {
        Error::TokenBudgetExceeded { estimated, limit }
    }

    /// Rate limit 에러 생성 헬퍼
    pub fn rate_limited(context: impl Into<String>, retry_after: Duration) -> Self {
        Error::RateLimited {
            context: context.into(),
            retry_after,
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_retryable() {
        let err = Error::rate_limited("editor-1", Duration::from_millis(1500));
        assert!(err.is_retryable());
        assert!(err.is_user_facing());
        assert_eq!(err.retry_after(), Some(Duration::from_millis(1500)));
        assert!(err.to_string().contains("1500ms"));
    }

    #[test]
    fn test_budget_not_retryable() {
        let err = Error::token_budget(9000, 4096);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("9000"));
        assert_eq!(err.retry_after(), None);
    }
}
