use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use stepflow_core::error::Result;
use stepflow_core::types::SearchRequest;

use super::{parse_config, Collaborators, StepHandler, StepOutcome};
use crate::context::ExecutionContext;
use crate::graph::{Node, NodeKind};
use crate::log::LogEntry;

/// Configuration recognized on knowledge-base nodes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    #[serde(default)]
    pub knowledge_base_id: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_embedding_model() -> String {
    "openai".to_string()
}

fn default_top_k() -> usize {
    5
}

/// Pulls matching chunks from a knowledge base into `retrieved_context`.
///
/// Without a knowledge base id or a query there is nothing to retrieve: the
/// step is skipped silently and the walk moves on.
pub struct RetrievalHandler;

impl StepHandler for RetrievalHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::Retrieval
    }

    fn apply<'a>(
        &'a self,
        node: &'a Node,
        ctx: &'a mut ExecutionContext,
        services: &'a Collaborators,
    ) -> BoxFuture<'a, Result<StepOutcome>> {
        Box::pin(async move {
            let config: RetrievalConfig = parse_config(node)?;

            let kb_id = match config.knowledge_base_id.filter(|id| !id.is_empty()) {
                Some(id) if !ctx.query.is_empty() => id,
                _ => {
                    debug!(node_id = %node.id, "Retrieval not configured, skipping");
                    return Ok(StepOutcome::skip());
                }
            };

            let chunks = services
                .retriever
                .search_similar(SearchRequest {
                    query: ctx.query.clone(),
                    knowledge_base_id: kb_id.clone(),
                    top_k: config.top_k,
                    embedding_model: config.embedding_model,
                })
                .await?;

            let joined = chunks
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            let context_length = joined.chars().count();

            debug!(
                node_id = %node.id,
                knowledge_base = %kb_id,
                chunks = chunks.len(),
                context_length,
                "Retrieved context"
            );

            ctx.retrieved_context = Some(joined);

            let entry = LogEntry::new(self.kind().step_tag(), &node.id)
                .with("chunks_found", chunks.len())
                .with("context_length", context_length);
            Ok(StepOutcome::logged(entry))
        })
    }
}
