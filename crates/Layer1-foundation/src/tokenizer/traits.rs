//! Tokenizer Trait 정의

use super::types::TokenCount;

/// 토크나이저 트레이트
///
/// 동기 추정 인터페이스. 보조 파일을 읽는 비동기 추정은
/// [`super::WordEstimator::estimate`]를 사용합니다.
pub trait Tokenizer: Send + Sync {
    /// 텍스트를 토큰 수로 계산
    fn count(&self, text: &str) -> TokenCount;
}
