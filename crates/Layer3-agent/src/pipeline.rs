//! Request pipeline
//!
//! Every outbound completion goes through, in order:
//!
//! ```text
//! cache_key ─▶ cache.get ── hit ──▶ return cached reply
//!                 │ miss
//!                 ▼
//!          prompt (redacted) ─▶ token estimate ─▶ budget check
//!                 ▼
//!          governor.admit(context)
//!                 ▼
//!          provider.complete ─▶ collect (cancellable) ─▶ redact ─▶ cache.set
//! ```
//!
//! Budget and rate-limit failures return before the provider is called and
//! before the cache is touched again. Cancelled replies are returned but
//! never cached.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anvil_foundation::{
    cache_key, redact, AdmissionControl, AnvilConfig, ContextId, Error as FoundationError,
    RequestGovernor, ResponseCache, ResponseStore, TokenBudget, TokenCount, WordEstimator,
};
use anvil_provider::{CompletionParams, CompletionProvider, ProviderError};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::prompt::PromptBuilder;

/// Inbound request
#[derive(Debug, Clone)]
pub struct CodeRequest {
    pub code: String,
    pub language: String,
    pub action: String,
    /// Extra files counted toward the token estimate
    pub aux_files: Vec<PathBuf>,
    pub context: ContextId,
    /// Ask for `--- FILE:` formatted edits
    pub agent_mode: bool,
    pub file_hint: Option<String>,
}

impl CodeRequest {
    pub fn new(
        code: impl Into<String>,
        language: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            action: action.into(),
            aux_files: Vec::new(),
            context: ContextId::global(),
            agent_mode: false,
            file_hint: None,
        }
    }

    pub fn with_aux_files(mut self, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.aux_files.extend(files);
        self
    }

    pub fn with_context(mut self, context: ContextId) -> Self {
        self.context = context;
        self
    }

    pub fn agent_mode(mut self, enabled: bool) -> Self {
        self.agent_mode = enabled;
        self
    }

    pub fn with_file_hint(mut self, path: impl Into<String>) -> Self {
        self.file_hint = Some(path.into());
        self
    }

    /// Fingerprint used as the cache key
    ///
    /// Agent mode and the file hint change the prompt, so they are folded
    /// into the action component.
    pub fn key(&self) -> String {
        let mut action = String::new();
        if self.agent_mode {
            action.push_str("agent:");
        }
        if let Some(path) = &self.file_hint {
            action.push_str(&format!("file={}:", path));
        }
        action.push_str(self.action.trim());
        cache_key(&self.code, &self.language, &action)
    }

    pub fn prompt(&self) -> String {
        let builder = PromptBuilder::new(&self.code, &self.language, &self.action)
            .agent_mode(self.agent_mode);
        match &self.file_hint {
            Some(path) => builder.file_hint(path.clone()).build(),
            None => builder.build(),
        }
    }
}

/// Reply returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResponse {
    pub key: String,
    /// Redacted reply text (partial when `cancelled`)
    pub text: String,
    /// Reply exactly as received; absent on cache hits, never serialized
    #[serde(skip)]
    pub raw_text: Option<String>,
    pub cache_hit: bool,
    pub cancelled: bool,
    /// Prompt estimate; absent on cache hits
    pub estimated_tokens: Option<usize>,
}

/// Pipeline failure; nothing was sent when this is a governance error
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Governance(#[from] FoundationError),

    #[error("completion failed: {0}")]
    Provider(#[from] ProviderError),
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Governance(e) => e.is_retryable(),
            PipelineError::Provider(e) => e.is_retryable(),
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PipelineError::Governance(e) => e.retry_after(),
            PipelineError::Provider(e) => e.retry_after(),
        }
    }

    pub fn is_budget_exceeded(&self) -> bool {
        matches!(
            self,
            PipelineError::Governance(FoundationError::TokenBudgetExceeded { .. })
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            PipelineError::Governance(FoundationError::RateLimited { .. })
        )
    }
}

/// Cache, budget and rate limiting in front of a completion provider
pub struct RequestPipeline {
    provider: Arc<dyn CompletionProvider>,
    cache: Arc<dyn ResponseStore>,
    governor: Arc<dyn AdmissionControl>,
    estimator: WordEstimator,
    budget: TokenBudget,
    params: CompletionParams,
}

impl RequestPipeline {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        cache: Arc<dyn ResponseStore>,
        governor: Arc<dyn AdmissionControl>,
    ) -> Self {
        Self {
            provider,
            cache,
            governor,
            estimator: WordEstimator::default(),
            budget: TokenBudget::default(),
            params: CompletionParams::default(),
        }
    }

    /// Build the services described by `config`
    pub fn from_config(config: &AnvilConfig, provider: Arc<dyn CompletionProvider>) -> Self {
        let cache = Arc::new(ResponseCache::new(config.cache_config()));
        let governor = Arc::new(RequestGovernor::new(config.governor_config()));
        let params = CompletionParams::new(config.model.clone())
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature)
            .streaming(config.stream);

        Self::new(provider, cache, governor)
            .with_estimator(WordEstimator::new(config.token_multiplier))
            .with_budget(config.token_budget())
            .with_params(params)
    }

    pub fn with_estimator(mut self, estimator: WordEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_budget(mut self, budget: TokenBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_params(mut self, params: CompletionParams) -> Self {
        self.params = params;
        self
    }

    pub fn cache(&self) -> &Arc<dyn ResponseStore> {
        &self.cache
    }

    pub fn governor(&self) -> &Arc<dyn AdmissionControl> {
        &self.governor
    }

    pub fn params(&self) -> &CompletionParams {
        &self.params
    }

    /// Estimate the prompt the request would send
    pub async fn estimate(&self, request: &CodeRequest) -> TokenCount {
        self.estimator
            .estimate(&request.prompt(), &request.aux_files)
            .await
    }

    pub async fn send(
        &self,
        request: &CodeRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineResponse, PipelineError> {
        self.send_observed(request, cancel, |_| {}).await
    }

    /// [`send`](Self::send), calling `on_delta` with each raw reply delta
    ///
    /// Agent-mode requests bypass the cache: their edits are applied from
    /// the unredacted reply, which is never stored.
    pub async fn send_observed<F>(
        &self,
        request: &CodeRequest,
        cancel: &CancellationToken,
        on_delta: F,
    ) -> Result<PipelineResponse, PipelineError>
    where
        F: FnMut(&str) + Send,
    {
        let key = request.key();
        let cacheable = !request.agent_mode;

        if let Some(text) = cacheable.then(|| self.cache.get(&key)).flatten() {
            debug!("cache hit {}", &key[..12]);
            return Ok(PipelineResponse {
                key,
                text,
                raw_text: None,
                cache_hit: true,
                cancelled: false,
                estimated_tokens: None,
            });
        }

        let prompt = request.prompt();
        let tokens = self.estimator.estimate(&prompt, &request.aux_files).await;
        self.budget.check(&tokens)?;

        if cancel.is_cancelled() {
            return Ok(Self::cancelled(key, String::new(), tokens.total));
        }

        self.governor.admit(&request.context)?;

        info!(
            "sending {} request via {} (~{} tokens)",
            redact(request.action.trim()),
            self.provider.name(),
            tokens.total
        );

        let completion = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(Self::cancelled(key, String::new(), tokens.total));
            }
            result = self.provider.complete(&prompt, &self.params) => result?,
        };

        let collected = completion.collect_with(cancel, on_delta).await?;
        let text = redact(&collected.text);

        if collected.cancelled {
            warn!(
                "request cancelled after {} chunks; reply not cached",
                collected.chunks
            );
            return Ok(Self::cancelled(key, collected.text, tokens.total));
        }

        if cacheable {
            self.cache.set(&key, text.clone());
        }
        Ok(PipelineResponse {
            key,
            text,
            raw_text: Some(collected.text),
            cache_hit: false,
            cancelled: false,
            estimated_tokens: Some(tokens.total),
        })
    }

    fn cancelled(key: String, raw_text: String, estimated: usize) -> PipelineResponse {
        PipelineResponse {
            key,
            text: redact(&raw_text),
            raw_text: Some(raw_text),
            cache_hit: false,
            cancelled: true,
            estimated_tokens: Some(estimated),
        }
    }
}
