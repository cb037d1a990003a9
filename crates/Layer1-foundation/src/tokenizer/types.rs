//! Tokenizer 타입 정의

use serde::{Deserialize, Serialize};

/// Multiplier bounds for the word-based estimate
pub const MIN_TOKEN_MULTIPLIER: f64 = 1.0;
pub const MAX_TOKEN_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_TOKEN_MULTIPLIER: f64 = 1.1;

/// 추정 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateMethod {
    /// 단어 수 × 배율 + 구두점 보정
    #[default]
    WordBased,
    /// 문자 수 / 4 × 배율 (fallback)
    CharFallback,
}

/// 토큰 수 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenCount {
    /// 총 토큰 수
    pub total: usize,
    /// 사용된 추정 방식
    pub method: EstimateMethod,
    /// 공백 기준 단어 수 (본문만)
    pub words: usize,
    /// 구두점 문자 수 (본문만)
    pub punctuation: usize,
    /// 합산된 보조 파일 수
    pub aux_files_counted: usize,
    /// 읽지 못해 건너뛴 보조 파일 수
    pub aux_files_skipped: usize,
}

impl TokenCount {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn word_based(total: usize, words: usize, punctuation: usize) -> Self {
        Self {
            total,
            method: EstimateMethod::WordBased,
            words,
            punctuation,
            ..Default::default()
        }
    }

    pub fn fallback(total: usize) -> Self {
        Self {
            total,
            method: EstimateMethod::CharFallback,
            ..Default::default()
        }
    }

    /// Add the estimate of one auxiliary file
    pub fn add_aux(&mut self, tokens: usize) {
        self.total = self.total.saturating_add(tokens);
        self.aux_files_counted += 1;
    }
}

/// Clamp a configured multiplier into `[1.0, 2.0]`
///
/// Non-finite values fall back to the default.
pub fn clamp_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_finite() {
        multiplier.clamp(MIN_TOKEN_MULTIPLIER, MAX_TOKEN_MULTIPLIER)
    } else {
        DEFAULT_TOKEN_MULTIPLIER
    }
}

/// 요청당 토큰 예산
///
/// Checked against the estimate before any outbound request; `max_tokens`
/// of 0 disables the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBudget {
    pub max_tokens: usize,
}

impl TokenBudget {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    pub fn unlimited() -> Self {
        Self { max_tokens: 0 }
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_tokens == 0
    }

    /// 예산 초과 여부
    pub fn is_over_budget(&self, estimated: usize) -> bool {
        !self.is_unlimited() && estimated > self.max_tokens
    }

    /// 남은 토큰 수
    pub fn remaining(&self, estimated: usize) -> usize {
        if self.is_unlimited() {
            usize::MAX
        } else {
            self.max_tokens.saturating_sub(estimated)
        }
    }

    /// Gate an estimate, failing with `TokenBudgetExceeded`
    pub fn check(&self, count: &TokenCount) -> crate::Result<()> {
        if self.is_over_budget(count.total) {
            return Err(crate::Error::token_budget(count.total, self.max_tokens));
        }
        Ok(())
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self::new(8_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_multiplier() {
        assert_eq!(clamp_multiplier(0.5), 1.0);
        assert_eq!(clamp_multiplier(3.0), 2.0);
        assert_eq!(clamp_multiplier(1.4), 1.4);
        assert_eq!(clamp_multiplier(f64::NAN), DEFAULT_TOKEN_MULTIPLIER);
        assert_eq!(clamp_multiplier(f64::INFINITY), DEFAULT_TOKEN_MULTIPLIER);
    }

    #[test]
    fn test_add_aux_saturates() {
        let mut count = TokenCount::word_based(usize::MAX - 1, 10, 0);
        count.add_aux(5);
        assert_eq!(count.total, usize::MAX);
        assert_eq!(count.aux_files_counted, 1);
    }

    #[test]
    fn test_budget_check() {
        let budget = TokenBudget::new(100);
        assert!(budget.check(&TokenCount::word_based(100, 90, 0)).is_ok());

        let err = budget.check(&TokenCount::word_based(101, 90, 4)).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::TokenBudgetExceeded { estimated: 101, limit: 100 }
        ));
        assert_eq!(budget.remaining(30), 70);
    }

    #[test]
    fn test_unlimited_budget() {
        let budget = TokenBudget::unlimited();
        assert!(budget.check(&TokenCount::fallback(usize::MAX)).is_ok());
    }
}
