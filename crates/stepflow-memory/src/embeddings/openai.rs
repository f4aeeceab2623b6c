use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use stepflow_core::config::EmbeddingConfig;
use stepflow_core::error::Result;

use super::{embedding_error, send_json, EmbeddingProvider, InputType};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Embedding provider for OpenAI-compatible `/embeddings` endpoints
/// (OpenAI, Ollama, vLLM and friends).
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dims: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: &str, api_key: Option<&str>, model: &str, dims: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(String::from),
            model: model.to_string(),
            dims,
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let base_url = config.base_url.as_deref().unwrap_or(match config.provider.as_str() {
            "ollama" => OLLAMA_BASE_URL,
            _ => OPENAI_BASE_URL,
        });
        Self::new(
            base_url,
            config.api_key.as_deref(),
            &config.model,
            config.dimensions,
        )
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn embed(&self, texts: &[String], _input: InputType) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        let texts = texts.to_vec();
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let url = format!("{}/embeddings", self.base_url);
            let mut req = self.client.post(&url).json(&EmbeddingRequest {
                model: &self.model,
                input: &texts,
            });
            if let Some(ref key) = self.api_key {
                req = req.bearer_auth(key);
            }

            debug!(model = %self.model, inputs = texts.len(), "Requesting embeddings");
            let body: EmbeddingResponse = send_json(&self.model, req).await?;

            order_embeddings(body.data, texts.len()).map_err(|m| embedding_error(&self.model, m))
        })
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Put vectors back in input order; providers may return them shuffled.
fn order_embeddings(
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> std::result::Result<Vec<Vec<f32>>, String> {
    if data.len() != expected {
        return Err(format!("expected {} embeddings, got {}", expected, data.len()));
    }
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_embeddings_by_index() {
        let data = vec![
            EmbeddingData { index: Some(1), embedding: vec![2.0] },
            EmbeddingData { index: Some(0), embedding: vec![1.0] },
        ];
        assert_eq!(order_embeddings(data, 2).unwrap(), vec![vec![1.0], vec![2.0]]);

        let short = vec![EmbeddingData { index: None, embedding: vec![1.0] }];
        assert!(order_embeddings(short, 2).is_err());
    }

    #[test]
    fn test_request_body() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let body = serde_json::to_value(EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &texts,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"model": "text-embedding-3-small", "input": ["a", "b"]})
        );
    }

    #[test]
    fn test_from_config_base_urls() {
        let config = EmbeddingConfig {
            provider: "ollama".into(),
            model: "nomic-embed-text".into(),
            base_url: None,
            api_key: None,
            dimensions: 768,
        };
        let provider = HttpEmbeddingProvider::from_config(&config);
        assert_eq!(provider.base_url, OLLAMA_BASE_URL);
        assert_eq!(provider.model(), "nomic-embed-text");
        assert_eq!(provider.dimensions(), 768);
        assert!(provider.api_key.is_none());

        let config = EmbeddingConfig {
            provider: "openai".into(),
            base_url: Some("http://proxy/v1/".into()),
            ..config
        };
        assert_eq!(HttpEmbeddingProvider::from_config(&config).base_url, "http://proxy/v1");
    }
}
