//! # anvil-foundation
//!
//! Foundation layer for Anvil:
//! - Error: 공통 에러 타입 (`Error`, `Result`)
//! - Config: 통합 설정 (`AnvilConfig`, JsonStore 기반 로드)
//! - Clock: 주입 가능한 시계 (TTL 만료, 윈도우 리셋)
//! - Security: 비밀 값 마스킹 (`redact`)
//! - Tokenizer: 단어 기반 토큰 추정 + 예산
//! - Cache: SHA-256 캐시 키 + TTL/LRU 응답 캐시
//! - Governor: 컨텍스트별 요청 속도 제한
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  request {code, language, action}                       │
//! │        │                                                │
//! │        ▼                                                │
//! │  cache_key ──▶ ResponseCache ── hit ──▶ reply           │
//! │        │ miss                                           │
//! │        ▼                                                │
//! │  WordEstimator ──▶ TokenBudget                          │
//! │        │                                                │
//! │        ▼                                                │
//! │  RequestGovernor (AdmissionControl)                     │
//! │        │                                                │
//! │        ▼                                                │
//! │  completion capability (anvil-provider)                 │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod governor;
pub mod security;
pub mod storage;
pub mod tokenizer;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{AnvilConfig, ANVIL_CONFIG_ENV, ANVIL_CONFIG_FILE};

// ============================================================================
// Clock
// ============================================================================
pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};

// ============================================================================
// Security (비밀 값 마스킹)
// ============================================================================
pub use security::{contains_secret, redact, redact_cow, REDACTION_MARKER, SECRET_KEYS};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::JsonStore;

// ============================================================================
// Tokenizer (토큰 추정)
// ============================================================================
pub use tokenizer::{
    EstimateMethod, TokenBudget, TokenCount, Tokenizer, WordEstimator, DEFAULT_TOKEN_MULTIPLIER,
};

// ============================================================================
// Cache (응답 캐시)
// ============================================================================
pub use cache::{
    cache_key, CacheStats, ResponseCache, ResponseCacheConfig, ResponseStore, TtlLruCache,
};

// ============================================================================
// Governor (속도 제한)
// ============================================================================
pub use governor::{AdmissionControl, ContextId, GovernorConfig, RequestGovernor, WindowSnapshot};
