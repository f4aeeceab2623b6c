//! Embedding backends, keyed by the name workflow nodes put in
//! `embeddingModel`.

mod cohere;
mod gemini;
mod openai;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use stepflow_core::config::{AppConfig, EmbeddingConfig};
use stepflow_core::error::{Result, StepflowError};

pub use cohere::CohereEmbeddingProvider;
pub use gemini::GeminiEmbeddingProvider;
pub use openai::HttpEmbeddingProvider;

/// What the text being embedded will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    /// Chunks stored in a knowledge base.
    Document,
    /// A search query compared against stored chunks.
    Query,
}

/// Turns text into vectors for similarity search.
pub trait EmbeddingProvider: Send + Sync + 'static {
    /// Embed a batch of texts, one vector per input, in order.
    fn embed(&self, texts: &[String], input: InputType) -> BoxFuture<'_, Result<Vec<Vec<f32>>>>;

    /// Model identifier, used in error messages.
    fn model(&self) -> &str;

    fn dimensions(&self) -> usize;
}

fn embedding_error(model: &str, message: impl Into<String>) -> StepflowError {
    StepflowError::Embedding {
        model: model.to_string(),
        message: message.into(),
    }
}

fn not_configured(model: &str, vendor: &str, var: &str) -> StepflowError {
    embedding_error(
        model,
        format!(
            "{} API key is not configured. Please set {} environment variable.",
            vendor, var
        ),
    )
}

/// Send a request and decode its JSON body, mapping transport and HTTP
/// failures to embedding errors.
async fn send_json<T: DeserializeOwned>(model: &str, req: reqwest::RequestBuilder) -> Result<T> {
    let resp = req
        .send()
        .await
        .map_err(|e| embedding_error(model, format!("request failed: {}", e)))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(embedding_error(
            model,
            format!("API error {}: {}", status.as_u16(), body),
        ));
    }

    resp.json()
        .await
        .map_err(|e| embedding_error(model, format!("invalid response: {}", e)))
}

fn expect_count(model: &str, vectors: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(embedding_error(
            model,
            format!("expected {} embeddings, got {}", expected, vectors.len()),
        ));
    }
    Ok(vectors)
}

/// Cosine similarity of two vectors; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Build the backend an `[embedding.<name>]` section asks for. Providers
/// other than Gemini and Cohere speak the OpenAI `/embeddings` protocol.
pub fn provider_from_config(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    match config.provider.as_str() {
        "gemini" => Arc::new(GeminiEmbeddingProvider::from_config(config)),
        "cohere" => Arc::new(CohereEmbeddingProvider::from_config(config)),
        _ => Arc::new(HttpEmbeddingProvider::from_config(config)),
    }
}

/// Embedding providers keyed by the name workflow nodes use in
/// `embeddingModel`.
#[derive(Default)]
pub struct EmbeddingRegistry {
    providers: HashMap<String, Arc<dyn EmbeddingProvider>>,
}

impl EmbeddingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One provider per `[embedding.<name>]` section.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new();
        for (name, embedding) in &config.embedding {
            registry.register(name, provider_from_config(embedding));
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn EmbeddingProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EmbeddingProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(provider: &str, model: &str, dimensions: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: provider.into(),
            model: model.into(),
            base_url: None,
            api_key: None,
            dimensions,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[0.5, 0.5], &[1.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[2.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_expect_count() {
        assert_eq!(expect_count("m", vec![vec![1.0]], 1).unwrap(), vec![vec![1.0]]);
        let err = expect_count("m", vec![vec![1.0]], 2).unwrap_err();
        assert!(err.to_string().contains("expected 2 embeddings, got 1"));
    }

    #[test]
    fn test_registry_dispatches_on_provider() {
        let mut config = AppConfig::default();
        config
            .embedding
            .insert("local".into(), section("ollama", "nomic-embed-text", 768));
        config
            .embedding
            .insert("gemini".into(), section("gemini", "embedding-001", 768));
        config
            .embedding
            .insert("cohere".into(), section("cohere", "embed-english-v3.0", 1024));

        let registry = EmbeddingRegistry::from_config(&config);
        assert_eq!(registry.names(), vec!["cohere", "gemini", "local"]);
        assert!(registry.get("openai").is_none());
        assert_eq!(registry.get("local").unwrap().model(), "nomic-embed-text");
        assert_eq!(registry.get("gemini").unwrap().model(), "models/embedding-001");
        assert_eq!(registry.get("cohere").unwrap().dimensions(), 1024);
    }

    #[tokio::test]
    async fn test_missing_key_is_embedding_error() {
        for provider in ["gemini", "cohere"] {
            let backend = provider_from_config(&section(provider, "m", 8));
            let err = backend
                .embed(&["text".to_string()], InputType::Document)
                .await
                .unwrap_err();
            assert!(matches!(err, StepflowError::Embedding { .. }));
            assert!(err.to_string().contains("API key is not configured"));
        }
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        for provider in ["openai", "gemini", "cohere"] {
            let mut config = section(provider, "m", 4);
            config.base_url = Some("http://127.0.0.1:9".into());
            let backend = provider_from_config(&config);
            assert!(backend.embed(&[], InputType::Query).await.unwrap().is_empty());
        }
    }
}
