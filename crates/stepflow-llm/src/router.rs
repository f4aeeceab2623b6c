use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info};

use stepflow_core::config::AppConfig;
use stepflow_core::error::{Result, StepflowError};
use stepflow_core::traits::Generator;
use stepflow_core::types::{Generation, GenerationRequest};

use crate::providers::{CohereClient, CompletionInput, GeminiClient, OpenAiClient, ProviderClient};
use crate::web_search::{WebSearch, WebSearcher};

/// Dispatches generation requests to the provider a node names.
pub struct ProviderRouter {
    clients: Vec<Arc<dyn ProviderClient>>,
    searcher: Option<Arc<dyn WebSearch>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            clients: Vec::new(),
            searcher: None,
        }
    }

    /// OpenAI, Gemini and Cohere clients plus web search, from config.
    /// Providers without a key are still registered so a request for them
    /// reports the missing credential rather than an unknown name.
    pub fn from_config(config: &AppConfig) -> Self {
        let providers = &config.providers;
        Self::new()
            .with_client(Arc::new(OpenAiClient::new(
                &providers.openai.clone().unwrap_or_default(),
            )))
            .with_client(Arc::new(GeminiClient::new(
                &providers.gemini.clone().unwrap_or_default(),
            )))
            .with_client(Arc::new(CohereClient::new(
                &providers.cohere.clone().unwrap_or_default(),
            )))
            .with_web_search(WebSearcher::new(&config.web_search))
    }

    /// Register a client, replacing any existing one with the same name.
    pub fn with_client(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.retain(|c| c.name() != client.name());
        self.clients.push(client);
        self
    }

    pub fn with_web_search(mut self, searcher: impl WebSearch + 'static) -> Self {
        self.searcher = Some(Arc::new(searcher));
        self
    }

    /// Exact, case-sensitive lookup.
    pub fn client(&self, name: &str) -> Option<&Arc<dyn ProviderClient>> {
        self.clients.iter().find(|c| c.name() == name)
    }

    /// Names of providers with credentials, in registration order.
    pub fn available_providers(&self) -> Vec<&'static str> {
        self.clients
            .iter()
            .filter(|c| c.is_configured())
            .map(|c| c.name())
            .collect()
    }

    pub fn web_search(&self) -> Option<&dyn WebSearch> {
        self.searcher.as_deref()
    }

    async fn search_context(&self, provider: &str, query: &str) -> String {
        match &self.searcher {
            Some(searcher) => searcher.search(provider, query).await,
            None => String::new(),
        }
    }
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Append web results under their own heading.
pub fn with_web_results(context: Option<String>, results: &str) -> Option<String> {
    if results.is_empty() {
        return context;
    }
    Some(match context.filter(|c| !c.is_empty()) {
        Some(context) => format!("{}\n\nWeb Search Results:\n{}", context, results),
        None => format!("Web Search Results:\n{}", results),
    })
}

impl Generator for ProviderRouter {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<Generation>> {
        Box::pin(async move {
            let client = self
                .client(&request.provider)
                .ok_or_else(|| StepflowError::UnsupportedProvider(request.provider.clone()))?;

            // Web results do not count as caller context.
            let used_context = request.context.as_deref().is_some_and(|c| !c.is_empty());
            let mut context = request.context;
            let mut used_web_search = false;
            if let Some(search_provider) = request.web_search_provider.as_deref() {
                let results = self.search_context(search_provider, &request.query).await;
                used_web_search = !results.is_empty();
                context = with_web_results(context, &results);
            }

            let model = request
                .model
                .unwrap_or_else(|| client.default_model().to_string());

            info!(
                provider = client.name(),
                model = %model,
                used_context,
                used_web_search,
                "Generating"
            );

            let input = CompletionInput {
                query: request.query,
                context,
                custom_prompt: request.custom_prompt,
            };
            let text = client.complete(&input, &model).await?;
            debug!(provider = client.name(), chars = text.len(), "Generation complete");

            Ok(Generation {
                text,
                used_web_search,
                used_context,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubClient {
        name: &'static str,
        configured: bool,
        seen: Mutex<Vec<(CompletionInput, String)>>,
    }

    impl StubClient {
        fn new(name: &'static str, configured: bool) -> Self {
            Self {
                name,
                configured,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ProviderClient for StubClient {
        fn name(&self) -> &'static str {
            self.name
        }

        fn default_model(&self) -> &str {
            "stub-model"
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        fn complete<'a>(
            &'a self,
            input: &'a CompletionInput,
            model: &'a str,
        ) -> BoxFuture<'a, Result<String>> {
            Box::pin(async move {
                self.seen
                    .lock()
                    .unwrap()
                    .push((input.clone(), model.to_string()));
                Ok(format!("{} says hi", self.name))
            })
        }
    }

    fn request(provider: &str) -> GenerationRequest {
        GenerationRequest {
            query: "hello".into(),
            provider: provider.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_routes_by_exact_name() {
        let openai = Arc::new(StubClient::new("openai", true));
        let cohere = Arc::new(StubClient::new("cohere", true));
        let router = ProviderRouter::new()
            .with_client(openai.clone())
            .with_client(cohere.clone());

        let generation = router.generate(request("cohere")).await.unwrap();

        assert_eq!(generation.text, "cohere says hi");
        assert!(!generation.used_context);
        assert!(openai.seen.lock().unwrap().is_empty());
        let seen = cohere.seen.lock().unwrap();
        assert_eq!(seen[0].1, "stub-model");
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let router = ProviderRouter::new().with_client(Arc::new(StubClient::new("openai", true)));
        let err = router.generate(request("llama")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported LLM provider: llama. Supported providers: openai, gemini, cohere"
        );
    }

    #[tokio::test]
    async fn test_provider_names_are_case_sensitive() {
        let router = ProviderRouter::new().with_client(Arc::new(StubClient::new("cohere", true)));
        assert!(router.client("Cohere").is_none());
        let err = router.generate(request("Cohere")).await.unwrap_err();
        assert!(matches!(err, StepflowError::UnsupportedProvider(name) if name == "Cohere"));
    }

    #[tokio::test]
    async fn test_forwards_context_and_model() {
        let stub = Arc::new(StubClient::new("gemini", true));
        let router = ProviderRouter::new().with_client(stub.clone());
        let mut req = request("gemini");
        req.context = Some("docs".into());
        req.model = Some("gemini-1.5-flash".into());

        let generation = router.generate(req).await.unwrap();

        assert!(generation.used_context);
        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen[0].0.context.as_deref(), Some("docs"));
        assert_eq!(seen[0].1, "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn test_web_search_without_results_is_not_used() {
        let stub = Arc::new(StubClient::new("openai", true));
        let router = ProviderRouter::new()
            .with_client(stub.clone())
            .with_web_search(WebSearcher::new(&Default::default()));
        let mut req = request("openai");
        req.web_search_provider = Some("brave".into());

        let generation = router.generate(req).await.unwrap();

        assert!(!generation.used_web_search);
        assert!(stub.seen.lock().unwrap()[0].0.context.is_none());
    }

    struct StubSearch;

    impl WebSearch for StubSearch {
        fn available(&self) -> Vec<&'static str> {
            vec!["brave"]
        }

        fn search<'a>(&'a self, _provider: &'a str, _query: &'a str) -> BoxFuture<'a, String> {
            Box::pin(async { "T: s".to_string() })
        }
    }

    #[tokio::test]
    async fn test_web_results_alone_are_not_caller_context() {
        let stub = Arc::new(StubClient::new("openai", true));
        let router = ProviderRouter::new()
            .with_client(stub.clone())
            .with_web_search(StubSearch);
        let mut req = request("openai");
        req.web_search_provider = Some("brave".into());

        let generation = router.generate(req).await.unwrap();

        assert!(generation.used_web_search);
        assert!(!generation.used_context);
        assert_eq!(
            stub.seen.lock().unwrap()[0].0.context.as_deref(),
            Some("Web Search Results:\nT: s")
        );
        assert_eq!(router.web_search().unwrap().available(), vec!["brave"]);
    }

    #[tokio::test]
    async fn test_web_results_appended_to_caller_context() {
        let stub = Arc::new(StubClient::new("openai", true));
        let router = ProviderRouter::new()
            .with_client(stub.clone())
            .with_web_search(StubSearch);
        let mut req = request("openai");
        req.context = Some("docs".into());
        req.web_search_provider = Some("serpapi".into());

        let generation = router.generate(req).await.unwrap();

        assert!(generation.used_web_search);
        assert!(generation.used_context);
        assert_eq!(
            stub.seen.lock().unwrap()[0].0.context.as_deref(),
            Some("docs\n\nWeb Search Results:\nT: s")
        );
    }

    #[test]
    fn test_with_web_results() {
        assert_eq!(with_web_results(None, ""), None);
        assert_eq!(
            with_web_results(None, "A: b").as_deref(),
            Some("Web Search Results:\nA: b")
        );
        assert_eq!(
            with_web_results(Some("docs".into()), "A: b").as_deref(),
            Some("docs\n\nWeb Search Results:\nA: b")
        );
    }

    #[test]
    fn test_available_providers() {
        let router = ProviderRouter::new()
            .with_client(Arc::new(StubClient::new("openai", false)))
            .with_client(Arc::new(StubClient::new("gemini", true)))
            .with_client(Arc::new(StubClient::new("cohere", true)));
        assert_eq!(router.available_providers(), vec!["gemini", "cohere"]);
    }

    #[test]
    fn test_from_config_registers_all_three() {
        let router = ProviderRouter::from_config(&AppConfig::default());
        assert!(router.client("openai").is_some());
        assert!(router.client("gemini").is_some());
        assert!(router.client("cohere").is_some());
        assert!(router.available_providers().is_empty());
    }
}
