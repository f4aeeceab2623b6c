use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StepflowError};

/// Top-level Stepflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Embedding models keyed by the name nodes use in `embeddingModel`.
    #[serde(default)]
    pub embedding: BTreeMap<String, EmbeddingConfig>,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

/// Knobs for the graph walker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Hard ceiling on visited nodes per run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Number of trailing chat turns forwarded to generation.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Characters of the final result kept in the output log entry.
    #[serde(default = "default_log_preview_chars")]
    pub log_preview_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            history_window: default_history_window(),
            log_preview_chars: default_log_preview_chars(),
        }
    }
}

fn default_max_iterations() -> usize { 10 }
fn default_history_window() -> usize { 5 }
fn default_log_preview_chars() -> usize { 100 }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: Option<ProviderConfig>,
    #[serde(default)]
    pub gemini: Option<ProviderConfig>,
    #[serde(default)]
    pub cohere: Option<ProviderConfig>,
}

/// Settings for one generation provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model used when a node does not name one.
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Embedding model configuration for knowledge-base search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: "openai", "gemini", "cohere", "ollama", or any
    /// OpenAI-compatible API.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Model name (e.g., "text-embedding-3-small", "nomic-embed-text").
    pub model: String,
    /// Base URL for the embedding API (e.g., "http://localhost:11434/v1").
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_dims")]
    pub dimensions: usize,
}

fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_dims() -> usize { 1536 }

/// Web search credentials. A provider without a key returns no results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default)]
    pub serpapi_key: Option<String>,
    #[serde(default)]
    pub brave_key: Option<String>,
    #[serde(default = "default_search_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            serpapi_key: None,
            brave_key: None,
            max_results: default_search_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_results() -> usize { 5 }
fn default_search_timeout() -> u64 { 10 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database holding knowledge-base chunks.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> String { "~/.stepflow/knowledge.db".to_string() }

/// Retry configuration for generation requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| StepflowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| StepflowError::Config(e.to_string()))?;
        tracing::debug!(
            path = %path.display(),
            embedding_models = config.embedding.len(),
            "Loaded config"
        );
        Ok(config)
    }

    /// Fill missing credentials from the conventional provider env vars.
    pub fn apply_env_defaults(&mut self) {
        fill_key(&mut self.providers.openai, "OPENAI_API_KEY");
        fill_key(&mut self.providers.gemini, "GOOGLE_API_KEY");
        fill_key(&mut self.providers.cohere, "COHERE_API_KEY");

        if self.web_search.serpapi_key.is_none() {
            self.web_search.serpapi_key = env_non_empty("SERPAPI_API_KEY");
        }
        if self.web_search.brave_key.is_none() {
            self.web_search.brave_key = env_non_empty("BRAVE_API_KEY");
        }

        let defaults = [
            ("openai", "OPENAI_API_KEY", "text-embedding-3-small", 1536),
            ("gemini", "GOOGLE_API_KEY", "models/embedding-001", 768),
            ("cohere", "COHERE_API_KEY", "embed-english-v3.0", 1024),
        ];
        for (provider, var, model, dimensions) in defaults {
            if self.embedding.contains_key(provider) {
                continue;
            }
            if let Some(key) = env_non_empty(var) {
                self.embedding.insert(
                    provider.to_string(),
                    EmbeddingConfig {
                        provider: provider.to_string(),
                        model: model.to_string(),
                        base_url: None,
                        api_key: Some(key),
                        dimensions,
                    },
                );
            }
        }
    }

    /// Resolve the knowledge-base database path (expand ~).
    pub fn storage_path(&self) -> PathBuf {
        let p = &self.storage.path;
        if let Some(rest) = p.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(p)
    }
}

fn fill_key(slot: &mut Option<ProviderConfig>, var: &str) {
    let has_key = slot.as_ref().is_some_and(|p| p.api_key.is_some());
    if has_key {
        return;
    }
    if let Some(key) = env_non_empty(var) {
        slot.get_or_insert_with(ProviderConfig::default).api_key = Some(key);
    }
}

fn env_non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Leave unset vars as written
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
