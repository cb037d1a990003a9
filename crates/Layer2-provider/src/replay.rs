//! Replay provider
//!
//! Returns a recorded reply instead of calling a remote service. Used by the
//! CLI `run` command and by tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::ProviderError;
use crate::r#trait::{Completion, CompletionParams, CompletionProvider};

/// Provider that replays a fixed reply
pub struct ReplayProvider {
    reply: String,
    /// Characters per streamed chunk
    chunk_chars: usize,
    chunk_delay: Option<Duration>,
    failure: Option<ProviderError>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl ReplayProvider {
    pub const DEFAULT_CHUNK_CHARS: usize = 64;

    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            chunk_chars: Self::DEFAULT_CHUNK_CHARS,
            chunk_delay: None,
            failure: None,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Replay the contents of a recorded reply file
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let reply = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProviderError::NotConfigured(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(Self::new(reply))
    }

    /// Provider whose every call fails with `error`
    pub fn failing(error: ProviderError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(String::new())
        }
    }

    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self
    }

    /// Pause between streamed chunks
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Number of `complete` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().clone()
    }

    fn chunks(&self) -> Vec<String> {
        let chars: Vec<char> = self.reply.chars().collect();
        chars
            .chunks(self.chunk_chars)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }
}

#[async_trait]
impl CompletionProvider for ReplayProvider {
    fn name(&self) -> &str {
        "replay"
    }

    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock() = Some(prompt.to_string());

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        if !params.stream {
            return Ok(Completion::Text(self.reply.clone()));
        }

        let chunks = self.chunks();
        let delay = self.chunk_delay;
        tracing::debug!("replaying {} chunks", chunks.len());

        Ok(Completion::Stream(Box::pin(async_stream::stream! {
            for chunk in chunks {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(chunk);
            }
        })))
    }
}
