//! Retrieval collaborator for Stepflow: text chunking, embedding providers
//! and a SQLite knowledge store searched by cosine similarity.

pub mod chunking;
pub mod embeddings;
pub mod store;

pub use chunking::{chunk_text, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP};
pub use embeddings::{
    cosine_similarity, CohereEmbeddingProvider, EmbeddingProvider, EmbeddingRegistry,
    GeminiEmbeddingProvider, HttpEmbeddingProvider, InputType,
};
pub use store::{KnowledgeStore, StoredChunk};
