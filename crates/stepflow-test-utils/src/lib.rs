//! Deterministic stub collaborators and small fixtures for tests.

use std::io::Write;
use std::sync::Mutex;

use futures::future::BoxFuture;

use stepflow_core::error::{Result, StepflowError};
use stepflow_core::traits::{Generator, Retriever};
use stepflow_core::types::{Generation, GenerationRequest, RetrievedChunk, SearchRequest};

/// Retriever returning a fixed list of chunks and recording every request.
pub struct StubRetriever {
    chunks: Vec<RetrievedChunk>,
    calls: Mutex<Vec<SearchRequest>>,
}

impl StubRetriever {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            chunks,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A knowledge base with no matching entries.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> Vec<SearchRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl Retriever for StubRetriever {
    fn search_similar(&self, request: SearchRequest) -> BoxFuture<'_, Result<Vec<RetrievedChunk>>> {
        Box::pin(async move {
            let top_k = request.top_k;
            self.calls.lock().unwrap().push(request);
            Ok(self.chunks.iter().take(top_k).cloned().collect())
        })
    }
}

/// Retriever that always fails, naming the requested knowledge base.
pub struct FailingRetriever {
    message: String,
}

impl FailingRetriever {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Retriever for FailingRetriever {
    fn search_similar(&self, request: SearchRequest) -> BoxFuture<'_, Result<Vec<RetrievedChunk>>> {
        Box::pin(async move {
            Err(StepflowError::Retrieval {
                knowledge_base: request.knowledge_base_id,
                message: self.message.clone(),
            })
        })
    }
}

/// Generator answering `prefix + query` and recording every request.
pub struct EchoGenerator {
    prefix: String,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl EchoGenerator {
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for EchoGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for EchoGenerator {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<Generation>> {
        Box::pin(async move {
            let generation = Generation {
                text: format!("{}{}", self.prefix, request.query),
                used_web_search: request.web_search_provider.is_some(),
                used_context: request.context.is_some(),
            };
            self.calls.lock().unwrap().push(request);
            Ok(generation)
        })
    }
}

/// Generator that always fails, naming the requested provider.
pub struct FailingGenerator {
    message: String,
}

impl FailingGenerator {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Generator for FailingGenerator {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<Generation>> {
        Box::pin(async move {
            Err(StepflowError::Generation {
                provider: request.provider,
                message: self.message.clone(),
            })
        })
    }
}

/// Write `content` to a temp file with the given suffix (e.g. ".json").
pub fn temp_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    tmp.write_all(content.as_bytes()).expect("write temp file");
    tmp
}

/// The four-step retrieval pipeline in the editor's JSON format.
pub fn rag_workflow_json(knowledge_base: &str, provider: &str) -> String {
    serde_json::json!({
        "nodes": [
            {"id": "1", "type": "userQuery", "data": {}},
            {"id": "2", "type": "knowledgeBase", "data": {"knowledgeBaseId": knowledge_base, "topK": 3}},
            {"id": "3", "type": "llmEngine", "data": {"llmProvider": provider}},
            {"id": "4", "type": "output", "data": {}}
        ],
        "edges": [
            {"id": "e1", "source": "1", "target": "2"},
            {"id": "e2", "source": "2", "target": "3"},
            {"id": "e3", "source": "3", "target": "4"}
        ]
    })
    .to_string()
}
