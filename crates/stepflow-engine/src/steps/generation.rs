use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use stepflow_core::error::Result;
use stepflow_core::types::{ChatTurn, GenerationRequest};

use super::{parse_config, Collaborators, StepHandler, StepOutcome};
use crate::context::ExecutionContext;
use crate::graph::{Node, NodeKind};
use crate::log::LogEntry;

/// Configuration recognized on LLM engine nodes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default = "default_provider", alias = "llmProvider")]
    pub provider: String,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub use_web_search: bool,
    #[serde(default)]
    pub web_search_provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

impl GenerationConfig {
    /// Web search provider to forward, only when web search is switched on.
    pub fn effective_web_search(&self) -> Option<String> {
        if self.use_web_search {
            self.web_search_provider.clone().filter(|p| !p.is_empty())
        } else {
            None
        }
    }
}

/// Calls the generation collaborator with the query and any accumulated
/// context, and records the answer as the running result.
pub struct GenerationHandler;

impl StepHandler for GenerationHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::Generation
    }

    fn apply<'a>(
        &'a self,
        node: &'a Node,
        ctx: &'a mut ExecutionContext,
        services: &'a Collaborators,
    ) -> BoxFuture<'a, Result<StepOutcome>> {
        Box::pin(async move {
            let config: GenerationConfig = parse_config(node)?;
            let web_search_provider = config.effective_web_search();
            let context = augmented_context(ctx.retrieved(), ctx.history());

            debug!(
                node_id = %node.id,
                provider = %config.provider,
                has_context = context.is_some(),
                "Generating response"
            );

            let generation = services
                .generator
                .generate(GenerationRequest {
                    query: ctx.query.clone(),
                    context,
                    custom_prompt: config.custom_prompt.filter(|p| !p.is_empty()),
                    provider: config.provider.clone(),
                    model: config.model.filter(|m| !m.is_empty()),
                    web_search_provider,
                })
                .await?;

            ctx.response = Some(generation.text.clone());
            ctx.result = Some(generation.text);

            let entry = LogEntry::new(self.kind().step_tag(), &node.id)
                .with("provider", config.provider)
                .with("web_search_used", generation.used_web_search)
                .with("context_used", generation.used_context);
            Ok(StepOutcome::logged(entry))
        })
    }
}

/// Retrieved context followed by a chat history block, if either exists.
pub fn augmented_context(retrieved: Option<&str>, history: &[ChatTurn]) -> Option<String> {
    if history.is_empty() {
        return retrieved.map(str::to_string);
    }

    let lines = history
        .iter()
        .map(ChatTurn::line)
        .collect::<Vec<_>>()
        .join("\n");

    Some(match retrieved {
        Some(context) => format!("{}\n\nChat History:\n{}", context, lines),
        None => format!("Chat History:\n{}", lines),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stepflow_core::error::StepflowError;
    use stepflow_test_utils::{EchoGenerator, FailingGenerator, StubRetriever};

    #[test]
    fn test_config_defaults_and_alias() {
        let config: GenerationConfig = parse_config(&Node::generation("3")).unwrap();
        assert_eq!(config.provider, "openai");
        assert!(!config.use_web_search);
        assert!(config.model.is_none());

        let node = Node::generation("3").with("llmProvider", "gemini");
        let config: GenerationConfig = parse_config(&node).unwrap();
        assert_eq!(config.provider, "gemini");
    }

    #[test]
    fn test_web_search_requires_flag() {
        let node = Node::generation("3").with("webSearchProvider", "brave");
        let config: GenerationConfig = parse_config(&node).unwrap();
        assert_eq!(config.effective_web_search(), None);

        let node = node.with("useWebSearch", true);
        let config: GenerationConfig = parse_config(&node).unwrap();
        assert_eq!(config.effective_web_search().as_deref(), Some("brave"));
    }

    #[test]
    fn test_augmented_context_variants() {
        assert_eq!(augmented_context(None, &[]), None);
        assert_eq!(augmented_context(Some("docs"), &[]).as_deref(), Some("docs"));

        let history = vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")];
        assert_eq!(
            augmented_context(None, &history).as_deref(),
            Some("Chat History:\nuser: hi\nassistant: hello")
        );
        assert_eq!(
            augmented_context(Some("docs"), &history).as_deref(),
            Some("docs\n\nChat History:\nuser: hi\nassistant: hello")
        );
    }

    #[tokio::test]
    async fn test_sets_response_and_result() {
        let generator = Arc::new(EchoGenerator::with_prefix("ANSWER:"));
        let services = Collaborators::new(Arc::new(StubRetriever::empty()), generator.clone());
        let node = Node::generation("3")
            .with("provider", "stub")
            .with("customPrompt", "Be brief.")
            .with("model", "tiny");
        let mut ctx = ExecutionContext::new("hello");
        ctx.retrieved_context = Some("some docs".into());

        let outcome = GenerationHandler
            .apply(&node, &mut ctx, &services)
            .await
            .unwrap();

        assert_eq!(ctx.response.as_deref(), Some("ANSWER:hello"));
        assert_eq!(ctx.result.as_deref(), Some("ANSWER:hello"));

        let entry = outcome.entry.unwrap();
        assert_eq!(entry.step, "llm_engine");
        assert_eq!(entry.detail("provider"), Some(&serde_json::json!("stub")));
        assert_eq!(entry.detail("context_used"), Some(&serde_json::json!(true)));
        assert_eq!(
            entry.detail("web_search_used"),
            Some(&serde_json::json!(false))
        );

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].context.as_deref(), Some("some docs"));
        assert_eq!(calls[0].custom_prompt.as_deref(), Some("Be brief."));
        assert_eq!(calls[0].model.as_deref(), Some("tiny"));
        assert_eq!(calls[0].web_search_provider, None);
    }

    #[tokio::test]
    async fn test_forwards_windowed_history() {
        let generator = Arc::new(EchoGenerator::new());
        let services = Collaborators::new(Arc::new(StubRetriever::empty()), generator.clone());
        let history: Vec<_> = (0..7).map(|i| ChatTurn::user(format!("m{}", i))).collect();
        let mut ctx = ExecutionContext::new("q").with_history(&history, 5);

        GenerationHandler
            .apply(&Node::generation("3"), &mut ctx, &services)
            .await
            .unwrap();

        let context = generator.calls()[0].context.clone().unwrap();
        assert!(context.starts_with("Chat History:\n"));
        assert!(!context.contains("m1"));
        assert!(context.contains("user: m2"));
        assert!(context.ends_with("user: m6"));
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let services = Collaborators::new(
            Arc::new(StubRetriever::empty()),
            Arc::new(FailingGenerator::new("quota exceeded")),
        );
        let node = Node::generation("3").with("provider", "stub");
        let mut ctx = ExecutionContext::new("q");

        let err = GenerationHandler
            .apply(&node, &mut ctx, &services)
            .await
            .unwrap_err();

        assert!(matches!(err, StepflowError::Generation { ref provider, .. } if provider == "stub"));
        assert!(ctx.response.is_none());
    }
}
