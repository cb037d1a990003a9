//! Tokenizer Module - 요청 전 토큰 추정
//!
//! 외부 완성 API로 요청을 보내기 전에 토큰 사용량을 근사합니다.
//!
//! ## 추정 방식
//!
//! | 방식 | 공식 |
//! |------|------|
//! | WordBased | 단어 수 × 배율(1.0–2.0) + 구두점 × 0.25 |
//! | CharFallback | ceil(바이트 수 / 4 × 배율) |
//!
//! ## 사용법
//!
//! ```ignore
//! use anvil_foundation::tokenizer::{Tokenizer, WordEstimator};
//!
//! let estimator = WordEstimator::new(1.1);
//! let count = estimator.count("fn main() {}");
//!
//! // 보조 파일 포함 (읽기 실패 파일은 건너뜀)
//! let count = estimator.estimate(code, &["src/lib.rs"]).await;
//! ```

mod estimator;
mod traits;
mod types;

pub use estimator::{WordEstimator, PUNCTUATION_WEIGHT};
pub use traits::Tokenizer;
pub use types::{
    clamp_multiplier, EstimateMethod, TokenBudget, TokenCount, DEFAULT_TOKEN_MULTIPLIER,
    MAX_TOKEN_MULTIPLIER, MIN_TOKEN_MULTIPLIER,
};
