//! Completion capability trait and common types

use crate::error::ProviderError;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Stream of text deltas
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Parameters forwarded with every completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionParams {
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Ask for a chunked reply
    pub stream: bool,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 8_000,
            temperature: 0.2,
            stream: false,
        }
    }
}

impl CompletionParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// A completion reply: whole text or a stream of deltas
pub enum Completion {
    Text(String),
    Stream(CompletionStream),
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Completion::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Completion::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Text accumulated from a completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    pub text: String,
    /// Stopped early by the cancellation token; `text` is partial
    pub cancelled: bool,
    /// Number of deltas received (1 for a whole-text reply)
    pub chunks: usize,
}

impl Completion {
    /// Drain the reply into a single string
    ///
    /// Cancellation stops reading and keeps what arrived so far. A stream
    /// error discards the partial text.
    pub async fn collect(self, cancel: &CancellationToken) -> Result<Collected, ProviderError> {
        self.collect_with(cancel, |_| {}).await
    }

    /// [`collect`](Self::collect), calling `on_delta` with each piece of text
    pub async fn collect_with<F>(
        self,
        cancel: &CancellationToken,
        mut on_delta: F,
    ) -> Result<Collected, ProviderError>
    where
        F: FnMut(&str) + Send,
    {
        match self {
            // already complete; nothing left to cancel
            Completion::Text(text) => {
                on_delta(&text);
                Ok(Collected {
                    text,
                    cancelled: false,
                    chunks: 1,
                })
            }
            Completion::Stream(mut stream) => {
                let mut collected = Collected::default();
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            tracing::debug!(
                                "completion cancelled after {} chunks",
                                collected.chunks
                            );
                            collected.cancelled = true;
                            break;
                        }
                        next = stream.next() => match next {
                            Some(Ok(delta)) => {
                                on_delta(&delta);
                                collected.text.push_str(&delta);
                                collected.chunks += 1;
                            }
                            Some(Err(e)) => return Err(e),
                            None => break,
                        },
                    }
                }
                Ok(collected)
            }
        }
    }
}

/// Completion capability
///
/// Implemented by the external HTTP client; [`crate::ReplayProvider`] is the
/// in-workspace implementation.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short identifier for logs
    fn name(&self) -> &str;

    /// Send `prompt` and return the reply
    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<Completion, ProviderError>;
}
