use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use stepflow_core::config::ProviderConfig;
use stepflow_core::error::Result;

use super::{generation_error, http_client, not_configured, post_json, temperature};
use super::{CompletionInput, ProviderClient};
use crate::prompt::gemini_prompt;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-pro";

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            default_model: config
                .default_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: temperature(config.temperature),
        }
    }

    fn endpoint(&self, model: &str, api_key: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            model,
            api_key
        )
    }
}

impl ProviderClient for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn complete<'a>(
        &'a self,
        input: &'a CompletionInput,
        model: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let api_key = self
                .api_key
                .as_deref()
                .ok_or_else(|| not_configured(self.name(), "GOOGLE_API_KEY"))?;

            let prompt = gemini_prompt(
                input.custom_prompt.as_deref(),
                input.context.as_deref(),
                &input.query,
            );
            let body = json!({
                "contents": [{"role": "user", "parts": [{"text": prompt}]}],
                "generationConfig": {"temperature": self.temperature},
            });
            debug!(model, "Sending Gemini request");

            let request = self.client.post(self.endpoint(model, api_key));
            let response = post_json(self.name(), request, &body).await?;
            parse_response(&response)
        })
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_response(response: &serde_json::Value) -> Result<String> {
    let parts = response["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| generation_error("gemini", "response contained no candidates"))?;

    Ok(parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .concat())
}
