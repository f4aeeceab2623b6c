pub mod cohere;
pub mod gemini;
pub mod openai;

use std::time::Duration;

use futures::future::BoxFuture;

use stepflow_core::error::{Result, StepflowError};

pub use cohere::CohereClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Everything a provider needs to build one completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionInput {
    pub query: String,
    pub context: Option<String>,
    pub custom_prompt: Option<String>,
}

/// A single non-streaming LLM backend.
pub trait ProviderClient: Send + Sync + 'static {
    /// Name nodes use to select this provider.
    fn name(&self) -> &'static str;

    fn default_model(&self) -> &str;

    /// Whether credentials are present.
    fn is_configured(&self) -> bool;

    fn complete<'a>(
        &'a self,
        input: &'a CompletionInput,
        model: &'a str,
    ) -> BoxFuture<'a, Result<String>>;
}

pub(crate) fn http_client(timeout_secs: Option<u64>) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)))
        .build()
        .unwrap_or_default()
}

pub(crate) fn temperature(configured: Option<f32>) -> f32 {
    configured.unwrap_or(DEFAULT_TEMPERATURE)
}

pub(crate) fn generation_error(provider: &str, message: impl Into<String>) -> StepflowError {
    StepflowError::Generation {
        provider: provider.to_string(),
        message: message.into(),
    }
}

pub(crate) fn not_configured(provider: &str, env_var: &str) -> StepflowError {
    generation_error(
        provider,
        format!("API key not configured (set {} or the config file)", env_var),
    )
}

/// Map a transport failure so the retry classifier can recognize it.
pub(crate) fn request_error(provider: &str, e: reqwest::Error) -> StepflowError {
    let message = if e.is_timeout() {
        format!("timeout: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    };
    generation_error(provider, message)
}

/// POST `body` and return the decoded JSON response, or an error carrying
/// the HTTP status and body.
pub(crate) async fn post_json(
    provider: &str,
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let response = request
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| request_error(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(generation_error(
            provider,
            format!("API error {}: {}", status.as_u16(), body),
        ));
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| generation_error(provider, format!("invalid response body: {}", e)))
}
