use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use stepflow_core::config::EmbeddingConfig;
use stepflow_core::error::Result;

use super::{expect_count, not_configured, send_json, EmbeddingProvider, InputType};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google `batchEmbedContents` backend. Documents and queries are both
/// embedded as retrieval documents so they land in the same space.
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dims: usize,
}

impl GeminiEmbeddingProvider {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: model_path(&config.model),
            dims: config.dimensions,
        }
    }
}

/// The API names models as `models/<id>`; accept either spelling.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn request_body(model: &str, texts: &[String]) -> Value {
    let requests: Vec<Value> = texts
        .iter()
        .map(|text| {
            json!({
                "model": model,
                "content": { "parts": [{ "text": text }] },
                "taskType": "RETRIEVAL_DOCUMENT",
            })
        })
        .collect();
    json!({ "requests": requests })
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn embed(&self, texts: &[String], _input: InputType) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        let texts = texts.to_vec();
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let api_key = self
                .api_key
                .as_deref()
                .ok_or_else(|| not_configured(&self.model, "Google", "GOOGLE_API_KEY"))?;

            let url = format!(
                "{}/{}:batchEmbedContents?key={}",
                self.base_url, self.model, api_key
            );
            let req = self
                .client
                .post(&url)
                .json(&request_body(&self.model, &texts));

            debug!(model = %self.model, inputs = texts.len(), "Requesting embeddings");
            let body: BatchResponse = send_json(&self.model, req).await?;
            let vectors = body.embeddings.into_iter().map(|e| e.values).collect();
            expect_count(&self.model, vectors, texts.len())
        })
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path() {
        assert_eq!(model_path("embedding-001"), "models/embedding-001");
        assert_eq!(model_path("models/embedding-001"), "models/embedding-001");
    }

    #[test]
    fn test_request_body() {
        let body = request_body("models/embedding-001", &["alpha".to_string()]);
        assert_eq!(
            body,
            json!({
                "requests": [{
                    "model": "models/embedding-001",
                    "content": { "parts": [{ "text": "alpha" }] },
                    "taskType": "RETRIEVAL_DOCUMENT"
                }]
            })
        );
    }

    #[test]
    fn test_parse_batch_response() {
        let body: BatchResponse = serde_json::from_value(json!({
            "embeddings": [{ "values": [0.1, 0.2] }, { "values": [0.3, 0.4] }]
        }))
        .unwrap();
        let vectors: Vec<Vec<f32>> = body.embeddings.into_iter().map(|e| e.values).collect();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }
}
