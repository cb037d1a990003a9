//! 단어 기반 토큰 추정기
//!
//! 요청 전 예산 확인용. 정확한 BPE 계산이 아니라 빠른 근사치입니다.

use std::path::Path;

use super::traits::Tokenizer;
use super::types::{clamp_multiplier, TokenCount, DEFAULT_TOKEN_MULTIPLIER};

/// Tokens added per ASCII punctuation character
pub const PUNCTUATION_WEIGHT: f64 = 0.25;

/// Characters per token in the fallback estimate
const FALLBACK_CHARS_PER_TOKEN: f64 = 4.0;

/// 단어 수 기반 추정 토크나이저
#[derive(Debug, Clone, Copy)]
pub struct WordEstimator {
    multiplier: f64,
}

impl Default for WordEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_MULTIPLIER)
    }
}

impl WordEstimator {
    /// Multiplier is clamped to `[1.0, 2.0]`
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier: clamp_multiplier(multiplier),
        }
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Single pass: whitespace-delimited words and punctuation density
    fn word_estimate(&self, text: &str) -> Option<TokenCount> {
        let mut words = 0usize;
        let mut punctuation = 0usize;
        let mut in_word = false;

        for c in text.chars() {
            if c.is_whitespace() {
                in_word = false;
                continue;
            }
            if !in_word {
                words += 1;
                in_word = true;
            }
            if c.is_ascii_punctuation() {
                punctuation += 1;
            }
        }

        let raw = words as f64 * self.multiplier + punctuation as f64 * PUNCTUATION_WEIGHT;
        if !raw.is_finite() || raw >= usize::MAX as f64 {
            return None;
        }

        // whitespace-only text still costs something
        let total = (raw.ceil() as usize).max(1);
        Some(TokenCount::word_based(total, words, punctuation))
    }

    /// `ceil(len / 4 × multiplier)`
    fn char_fallback(&self, text: &str) -> TokenCount {
        let raw = (text.len() as f64 / FALLBACK_CHARS_PER_TOKEN * self.multiplier).ceil();
        let total = if raw.is_finite() && raw < usize::MAX as f64 {
            raw as usize
        } else {
            usize::MAX
        };
        TokenCount::fallback(total.max(1))
    }

    /// Estimate a single text blob
    pub fn count_text(&self, text: &str) -> TokenCount {
        if text.is_empty() {
            return TokenCount::empty();
        }

        self.word_estimate(text).unwrap_or_else(|| {
            tracing::debug!("word estimate failed, using character fallback");
            self.char_fallback(text)
        })
    }

    /// Estimate `text` plus the contents of `aux_files`
    ///
    /// Unreadable auxiliary files are skipped with a warning and never abort
    /// the estimate.
    pub async fn estimate<P: AsRef<Path>>(&self, text: &str, aux_files: &[P]) -> TokenCount {
        let mut count = self.count_text(text);

        for path in aux_files {
            let path = path.as_ref();
            match tokio::fs::read_to_string(path).await {
                Ok(content) => {
                    let tokens = self.count_text(&content).total;
                    tracing::debug!("aux file {} ≈ {} tokens", path.display(), tokens);
                    count.add_aux(tokens);
                }
                Err(e) => {
                    tracing::warn!(
                        "skipping unreadable aux file {}: {}",
                        path.display(),
                        e
                    );
                    count.aux_files_skipped += 1;
                }
            }
        }

        count
    }
}

impl Tokenizer for WordEstimator {
    fn count(&self, text: &str) -> TokenCount {
        self.count_text(text)
    }
}
