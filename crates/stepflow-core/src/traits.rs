use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// Retrieval collaborator: similarity search over a knowledge base.
pub trait Retriever: Send + Sync + 'static {
    /// Return the best-matching chunks, best first. An empty knowledge base
    /// yields an empty vec, not an error.
    fn search_similar(&self, request: SearchRequest) -> BoxFuture<'_, Result<Vec<RetrievedChunk>>>;
}

/// Generation collaborator: produces an answer for a query and context.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<Generation>>;
}
