//! Anvil Config - 통합 설정
//!
//! 설정 UI와 영속화는 외부 책임이며, 여기서는 읽기 전용 입력으로만 소비합니다.
//! Load order: global `~/.config/anvil/config.json`, then the project's
//! `.anvil/config.json` on top. An explicit file (`.json` or `.toml`) replaces
//! both.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::cache::ResponseCacheConfig;
use crate::governor::GovernorConfig;
use crate::storage::{merge_json, JsonStore};
use crate::tokenizer::{clamp_multiplier, TokenBudget, DEFAULT_TOKEN_MULTIPLIER};
use crate::{Error, Result};

/// 설정 파일명
pub const ANVIL_CONFIG_FILE: &str = "config.json";

/// Environment variable naming an explicit config file
pub const ANVIL_CONFIG_ENV: &str = "ANVIL_CONFIG_FILE";

/// Anvil 통합 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnvilConfig {
    // ------------------------------------------------------------------
    // Response cache
    // ------------------------------------------------------------------
    pub enable_cache: bool,
    /// `[10, 1000]`
    pub cache_max_items: usize,
    /// `[1, 1440]`
    pub cache_ttl_minutes: u32,

    // ------------------------------------------------------------------
    // Token estimate / budget
    // ------------------------------------------------------------------
    /// `[1.0, 2.0]`
    pub token_multiplier: f64,
    /// Ceiling on the estimated prompt size; also sent as the completion limit
    pub max_tokens: usize,

    // ------------------------------------------------------------------
    // Rate limiting
    // ------------------------------------------------------------------
    pub max_requests_per_window: u32,
    pub window_length_ms: u64,

    // ------------------------------------------------------------------
    // Completion parameters
    // ------------------------------------------------------------------
    pub model: String,
    pub temperature: f32,
    pub stream: bool,

    // ------------------------------------------------------------------
    // Patch application
    // ------------------------------------------------------------------
    /// Glob patterns (relative to the workspace root) never written to
    pub protected_paths: Vec<String>,
}

impl Default for AnvilConfig {
    fn default() -> Self {
        let cache = ResponseCacheConfig::default();
        let governor = GovernorConfig::default();
        Self {
            enable_cache: cache.enabled,
            cache_max_items: cache.max_items,
            cache_ttl_minutes: cache.ttl_minutes,
            token_multiplier: DEFAULT_TOKEN_MULTIPLIER,
            max_tokens: TokenBudget::default().max_tokens,
            max_requests_per_window: governor.max_requests_per_window,
            window_length_ms: governor.window_length_ms,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            stream: false,
            protected_paths: vec![".git/**".to_string(), "**/.git/**".to_string()],
        }
    }
}

impl AnvilConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    ///
    /// `ANVIL_CONFIG_FILE`, when set, names the only file read.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self> {
        if let Ok(path) = std::env::var(ANVIL_CONFIG_ENV) {
            if !path.trim().is_empty() {
                return Self::from_file(path.trim());
            }
        }

        let global = match JsonStore::global() {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::debug!("skipping global config: {}", e);
                None
            }
        };
        Self::load_layered(global.as_ref(), &JsonStore::project(project_root))
    }

    /// Merge `global` then `project` over the defaults
    ///
    /// Fields missing from both files keep their default values; fields set
    /// only globally survive a project file that omits them.
    pub fn load_layered(global: Option<&JsonStore>, project: &JsonStore) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        for store in global.into_iter().chain(std::iter::once(project)) {
            if let Some(layer) = store.load_value(ANVIL_CONFIG_FILE)? {
                tracing::debug!("config layer {}", store.file_path(ANVIL_CONFIG_FILE).display());
                merge_json(&mut merged, layer);
            }
        }

        let config: Self = serde_json::from_value(merged)
            .map_err(|e| Error::Config(format!("invalid configuration: {}", e)))?;
        Ok(config.normalized())
    }

    /// Load a single `.json` or `.toml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let config: Self = match ext.as_deref() {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => {
                return Err(Error::Config(format!(
                    "unsupported config format: {} (expected .json or .toml)",
                    path.display()
                )))
            }
        };
        Ok(config.normalized())
    }

    /// 프로젝트 설정 저장
    pub fn save_project(&self, project_root: impl AsRef<Path>) -> Result<()> {
        JsonStore::project(project_root).save(ANVIL_CONFIG_FILE, self)
    }

    // ========================================================================
    // Normalization
    // ========================================================================

    /// Clamp every bounded field into its allowed range
    pub fn normalized(mut self) -> Self {
        let cache = self.cache_config();
        self.cache_max_items = cache.max_items;
        self.cache_ttl_minutes = cache.ttl_minutes;

        self.token_multiplier = clamp_multiplier(self.token_multiplier);

        let governor = self.governor_config();
        self.max_requests_per_window = governor.max_requests_per_window;
        self.window_length_ms = governor.window_length_ms;

        self.temperature = if self.temperature.is_finite() {
            self.temperature.clamp(0.0, 2.0)
        } else {
            0.0
        };
        self
    }

    // ========================================================================
    // Component views
    // ========================================================================

    pub fn cache_config(&self) -> ResponseCacheConfig {
        ResponseCacheConfig {
            enabled: self.enable_cache,
            max_items: self.cache_max_items,
            ttl_minutes: self.cache_ttl_minutes,
        }
        .normalized()
    }

    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig::new(self.max_requests_per_window, self.window_length_ms).normalized()
    }

    pub fn token_budget(&self) -> TokenBudget {
        TokenBudget::new(self.max_tokens)
    }

    /// Render as pretty JSON for display
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render as a JSON value (used by `anvil config`)
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
