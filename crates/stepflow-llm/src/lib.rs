//! Generation collaborator for Stepflow.
//!
//! [`ProviderRouter`] picks an OpenAI, Gemini or Cohere client by the name a
//! workflow node carries, optionally enriches the context with web search
//! results, and returns the provider's answer. [`RetryingGenerator`] wraps
//! any generator with exponential backoff on transient failures.

pub mod prompt;
pub mod providers;
pub mod retry;
pub mod router;
pub mod web_search;

use std::sync::Arc;

use stepflow_core::config::AppConfig;
use stepflow_core::traits::Generator;

pub use providers::{CompletionInput, ProviderClient};
pub use retry::RetryingGenerator;
pub use router::ProviderRouter;
pub use web_search::{WebSearch, WebSearcher};

/// Build the generator described by `config`, wrapped in retries when a
/// `[retry]` section is present.
pub fn build_generator(config: &AppConfig) -> Arc<dyn Generator> {
    let router: Arc<dyn Generator> = Arc::new(ProviderRouter::from_config(config));
    match &config.retry {
        Some(retry) => Arc::new(RetryingGenerator::new(router, retry.clone())),
        None => router,
    }
}
