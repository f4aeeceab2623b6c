use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use stepflow_core::config::WebSearchConfig;
use stepflow_core::error::StepflowError;

const SERPAPI_URL: &str = "https://serpapi.com/search.json";
const BRAVE_URL: &str = "https://api.search.brave.com/res/v1/web/search";

/// Source of web snippets for a generation's context. Implementations
/// return "" rather than failing.
pub trait WebSearch: Send + Sync {
    /// Providers with credentials present.
    fn available(&self) -> Vec<&'static str>;

    /// One `title: snippet` line per result.
    fn search<'a>(&'a self, provider: &'a str, query: &'a str) -> BoxFuture<'a, String>;
}

/// Fetches short web snippets to append to a generation's context.
///
/// Search never fails a run: a missing key, an unknown provider or an HTTP
/// error all come back as an empty string.
pub struct WebSearcher {
    client: reqwest::Client,
    serpapi_key: Option<String>,
    brave_key: Option<String>,
    max_results: usize,
}

impl WebSearcher {
    pub fn new(config: &WebSearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            serpapi_key: config.serpapi_key.clone().filter(|k| !k.is_empty()),
            brave_key: config.brave_key.clone().filter(|k| !k.is_empty()),
            max_results: config.max_results,
        }
    }

    async fn run_search(&self, provider: &str, query: &str) -> String {
        let outcome = match provider {
            "serpapi" => self.search_serpapi(query).await,
            "brave" => self.search_brave(query).await,
            other => {
                warn!(provider = %other, "Unknown web search provider");
                return String::new();
            }
        };

        match outcome {
            Ok(results) => {
                debug!(provider, lines = results.lines().count(), "Web search complete");
                results
            }
            Err(e) => {
                warn!(error = %e, "Web search failed, continuing without results");
                String::new()
            }
        }
    }

    async fn search_serpapi(&self, query: &str) -> Result<String, StepflowError> {
        let Some(key) = self.serpapi_key.as_deref() else {
            return Ok(String::new());
        };
        let max = self.max_results.to_string();
        let response = self
            .client
            .get(SERPAPI_URL)
            .query(&[("q", query), ("api_key", key), ("engine", "google"), ("num", max.as_str())])
            .send()
            .await
            .map_err(|e| search_error("serpapi", e.to_string()))?;
        let body = read_json("serpapi", response).await?;
        Ok(format_serpapi(&body, self.max_results))
    }

    async fn search_brave(&self, query: &str) -> Result<String, StepflowError> {
        let Some(key) = self.brave_key.as_deref() else {
            return Ok(String::new());
        };
        let count = self.max_results.to_string();
        let response = self
            .client
            .get(BRAVE_URL)
            .header("X-Subscription-Token", key)
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", count.as_str())])
            .send()
            .await
            .map_err(|e| search_error("brave", e.to_string()))?;
        let body = read_json("brave", response).await?;
        Ok(format_brave(&body, self.max_results))
    }
}

impl WebSearch for WebSearcher {
    fn available(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.serpapi_key.is_some() {
            out.push("serpapi");
        }
        if self.brave_key.is_some() {
            out.push("brave");
        }
        out
    }

    fn search<'a>(&'a self, provider: &'a str, query: &'a str) -> BoxFuture<'a, String> {
        Box::pin(self.run_search(provider, query))
    }
}

async fn read_json(
    provider: &str,
    response: reqwest::Response,
) -> Result<serde_json::Value, StepflowError> {
    let status = response.status();
    if !status.is_success() {
        return Err(search_error(provider, format!("HTTP {}", status.as_u16())));
    }
    response
        .json()
        .await
        .map_err(|e| search_error(provider, e.to_string()))
}

fn search_error(provider: &str, message: String) -> StepflowError {
    StepflowError::WebSearch {
        provider: provider.to_string(),
        message,
    }
}

fn format_lines(results: Option<&Vec<serde_json::Value>>, text_key: &str, max: usize) -> String {
    results
        .map(|items| {
            items
                .iter()
                .take(max)
                .map(|item| {
                    format!(
                        "{}: {}",
                        item["title"].as_str().unwrap_or_default(),
                        item[text_key].as_str().unwrap_or_default()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

pub fn format_serpapi(body: &serde_json::Value, max: usize) -> String {
    format_lines(body["organic_results"].as_array(), "snippet", max)
}

pub fn format_brave(body: &serde_json::Value, max: usize) -> String {
    format_lines(body["web"]["results"].as_array(), "description", max)
}
