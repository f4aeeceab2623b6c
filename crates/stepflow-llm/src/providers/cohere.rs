use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use stepflow_core::config::ProviderConfig;
use stepflow_core::error::Result;

use super::{generation_error, http_client, not_configured, post_json, temperature};
use super::{CompletionInput, ProviderClient};
use crate::prompt::cohere_preamble;

const DEFAULT_URL: &str = "https://api.cohere.com/v2/chat";
const DEFAULT_MODEL: &str = "command-r-08-2024";

/// Cohere v2 chat client. The preamble travels as the system message.
pub struct CohereClient {
    client: reqwest::Client,
    api_key: Option<String>,
    url: String,
    default_model: String,
    temperature: f32,
}

impl CohereClient {
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

impl ProviderClient for CohereClient {
    fn name(&self) -> &'static str {
        "cohere"
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
                .ok_or_else(|| not_configured(self.name(), "COHERE_API_KEY"))?;

            let preamble =
                cohere_preamble(input.custom_prompt.as_deref(), input.context.as_deref());
            let body = json!({
                "model": model,
                "messages": [
                    {"role": "system", "content": preamble},
                    {"role": "user", "content": input.query},
                ],
                "temperature": self.temperature,
            });
            debug!(url = %self.url, model, "Sending Cohere request");

            let request = self
                .client
                .post(&self.url)
                .header("Authorization", format!("Bearer {}", api_key));
            let response = post_json(self.name(), request, &body).await?;
            parse_response(&response)
        })
    }
}

fn parse_response(response: &serde_json::Value) -> Result<String> {
    let content = response["message"]["content"]
        .as_array()
        .ok_or_else(|| generation_error("cohere", "response contained no message content"))?;

    Ok(content
        .iter()
        .filter(|block| block["type"].as_str().map_or(true, |t| t == "text"))
        .filter_map(|block| block["text"].as_str())
        .collect::<Vec<_>>()
        .concat())
}
