use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use stepflow_core::config::ProviderConfig;
use stepflow_core::error::Result;

use super::{generation_error, http_client, not_configured, post_json, temperature};
use super::{CompletionInput, ProviderClient};
use crate::prompt::openai_system_prompt;

const DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI Chat Completions client. `base_url` may point at any
/// OpenAI-compatible endpoint.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    url: String,
    default_model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            default_model: config
                .default_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: temperature(config.temperature),
        }
    }
}

impl ProviderClient for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
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
                .ok_or_else(|| not_configured(self.name(), "OPENAI_API_KEY"))?;

            let body = request_body(input, model, self.temperature);
            debug!(url = %self.url, model, "Sending OpenAI request");

            let request = self
                .client
                .post(&self.url)
                .header("Authorization", format!("Bearer {}", api_key));
            let response = post_json(self.name(), request, &body).await?;
            parse_response(&response)
        })
    }
}

fn request_body(input: &CompletionInput, model: &str, temperature: f32) -> serde_json::Value {
    let system = openai_system_prompt(input.custom_prompt.as_deref(), input.context.as_deref());
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": input.query},
        ],
        "temperature": temperature,
    })
}

fn parse_response(response: &serde_json::Value) -> Result<String> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| generation_error("openai", "response contained no message content"))
}
