use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use stepflow_core::config::EmbeddingConfig;
use stepflow_core::error::Result;

use super::{expect_count, not_configured, send_json, EmbeddingProvider, InputType};

const DEFAULT_BASE_URL: &str = "https://api.cohere.com/v2";

/// Cohere `/embed` backend. Stored chunks and search queries use distinct
/// input types.
pub struct CohereEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dims: usize,
}

impl CohereEmbeddingProvider {
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
            model: config.model.clone(),
            dims: config.dimensions,
        }
    }
}

fn input_type(input: InputType) -> &'static str {
    match input {
        InputType::Document => "search_document",
        InputType::Query => "search_query",
    }
}

fn request_body(model: &str, texts: &[String], input: InputType) -> Value {
    json!({
        "model": model,
        "texts": texts,
        "input_type": input_type(input),
        "embedding_types": ["float"],
    })
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: EmbeddingsByType,
}

#[derive(Deserialize)]
struct EmbeddingsByType {
    #[serde(default)]
    float: Vec<Vec<f32>>,
}

impl EmbeddingProvider for CohereEmbeddingProvider {
    fn embed(&self, texts: &[String], input: InputType) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        let texts = texts.to_vec();
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let api_key = self
                .api_key
                .as_deref()
                .ok_or_else(|| not_configured(&self.model, "Cohere", "COHERE_API_KEY"))?;

            let req = self
                .client
                .post(format!("{}/embed", self.base_url))
                .bearer_auth(api_key)
                .json(&request_body(&self.model, &texts, input));

            debug!(
                model = %self.model,
                inputs = texts.len(),
                input_type = input_type(input),
                "Requesting embeddings"
            );
            let body: EmbedResponse = send_json(&self.model, req).await?;
            expect_count(&self.model, body.embeddings.float, texts.len())
        })
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
