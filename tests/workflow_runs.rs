use std::sync::Arc;

use futures::future::BoxFuture;

use stepflow_core::config::EngineConfig;
use stepflow_core::error::{Result, StepflowError};
use stepflow_core::types::ChatTurn;
use stepflow_engine::{Collaborators, GraphExecutor, StopReason, Workflow, NO_OUTPUT_MESSAGE};
use stepflow_memory::{chunk_text, EmbeddingProvider, EmbeddingRegistry, InputType, KnowledgeStore};
use stepflow_test_utils::{rag_workflow_json, temp_file, EchoGenerator, StubRetriever};

/// Deterministic letter-count embedder so knowledge-base search runs offline.
struct LetterEmbedder;

impl EmbeddingProvider for LetterEmbedder {
    fn embed(&self, texts: &[String], _input: InputType) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        let vectors = texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 26];
                for b in t.to_ascii_lowercase().bytes() {
                    if b.is_ascii_lowercase() {
                        v[(b - b'a') as usize] += 1.0;
                    }
                }
                v
            })
            .collect();
        Box::pin(async move { Ok(vectors) })
    }

    fn model(&self) -> &str {
        "letters"
    }

    fn dimensions(&self) -> usize {
        26
    }
}

fn local_store() -> Arc<KnowledgeStore> {
    let mut registry = EmbeddingRegistry::new();
    registry.register("openai", Arc::new(LetterEmbedder));
    Arc::new(KnowledgeStore::in_memory(registry).unwrap())
}

#[tokio::test]
async fn test_editor_workflow_file_round_trip() {
    let file = temp_file(&rag_workflow_json("kb1", "stub"), ".json");
    let workflow = Workflow::load(file.path()).unwrap();

    assert_eq!(workflow.nodes.len(), 4);
    assert!(workflow.validate().valid);

    let generator = Arc::new(EchoGenerator::with_prefix("A: "));
    let executor = GraphExecutor::with_builtins(
        Collaborators::new(Arc::new(StubRetriever::empty()), generator.clone()),
        EngineConfig::default(),
    );

    let run = executor.execute(&workflow, "hello", &[]).await.unwrap();

    assert!(run.success);
    assert_eq!(run.result, "A: hello");
    assert_eq!(run.stop_reason, StopReason::Output);
    let steps: Vec<_> = run.execution_log.iter().map(|e| e.step.as_str()).collect();
    assert_eq!(steps, vec!["user_query", "knowledge_base", "llm_engine", "output"]);
    assert_eq!(generator.calls()[0].provider, "stub");
}

#[tokio::test]
async fn test_toml_workflow_file() {
    let toml = r#"
[[nodes]]
id = "q"
kind = "user_query"

[[nodes]]
id = "llm"
kind = "llm_engine"
[nodes.config]
provider = "stub"

[[nodes]]
id = "out"
kind = "output"

[[edges]]
source = "q"
target = "llm"

[[edges]]
source = "llm"
target = "out"
"#;
    let file = temp_file(toml, ".toml");
    let workflow = Workflow::load(file.path()).unwrap();
    assert!(workflow.validate().valid);

    let executor = GraphExecutor::with_builtins(
        Collaborators::new(Arc::new(StubRetriever::empty()), Arc::new(EchoGenerator::new())),
        EngineConfig::default(),
    );
    let run = executor.execute(&workflow, "ping", &[]).await.unwrap();
    assert_eq!(run.result, "ping");
}

#[tokio::test]
async fn test_knowledge_store_feeds_generation() {
    let store = local_store();
    let document = "Rust guarantees memory safety without a garbage collector. \
                    Bananas are yellow fruit grown in tropical climates.";
    let chunks = chunk_text(document, 8, 0);
    assert_eq!(chunks.len(), 2);
    store
        .add_texts("docs", "openai", &chunks, serde_json::Map::new())
        .await
        .unwrap();

    let mut workflow: Workflow =
        serde_json::from_str(&rag_workflow_json("docs", "stub")).unwrap();
    // Only the best chunk
    workflow.nodes[1].config.insert("topK".into(), 1.into());

    let generator = Arc::new(EchoGenerator::new());
    let executor = GraphExecutor::with_builtins(
        Collaborators::new(store.clone(), generator.clone()),
        EngineConfig::default(),
    );

    let run = executor
        .execute(&workflow, "banana fruit", &[ChatTurn::user("hi")])
        .await
        .unwrap();

    assert!(run.success);
    let retrieval = &run.execution_log[1];
    assert_eq!(retrieval.details["chunks_found"], 1);

    let context = generator.calls()[0].context.clone().unwrap();
    assert!(context.starts_with("Bananas are yellow"));
    assert!(context.ends_with("Chat History:\nuser: hi"));
}

#[tokio::test]
async fn test_missing_knowledge_base_yields_empty_context() {
    let generator = Arc::new(EchoGenerator::new());
    let executor = GraphExecutor::with_builtins(
        Collaborators::new(local_store(), generator.clone()),
        EngineConfig::default(),
    );
    let workflow: Workflow = serde_json::from_str(&rag_workflow_json("empty", "stub")).unwrap();

    let run = executor.execute(&workflow, "anything", &[]).await.unwrap();

    assert!(run.success);
    assert_eq!(run.execution_log[1].details["chunks_found"], 0);
    assert!(generator.calls()[0].context.is_none());
}

#[tokio::test]
async fn test_unknown_embedding_model_aborts_run() {
    let executor = GraphExecutor::with_builtins(
        Collaborators::new(local_store(), Arc::new(EchoGenerator::new())),
        EngineConfig::default(),
    );
    let mut workflow: Workflow = serde_json::from_str(&rag_workflow_json("docs", "stub")).unwrap();
    workflow.nodes[1]
        .config
        .insert("embeddingModel".into(), "cohere".into());

    let err = executor.execute(&workflow, "q", &[]).await.unwrap_err();

    match err {
        StepflowError::Step { node_id, step, source } => {
            assert_eq!(node_id, "2");
            assert_eq!(step, "knowledge_base");
            assert!(source.to_string().contains("cohere"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_validation_failure_is_reported_not_run() {
    let file = temp_file(
        r#"{"nodes": [{"id": "1", "type": "userQuery"}], "edges": []}"#,
        ".json",
    );
    let workflow = Workflow::load(file.path()).unwrap();
    let result = workflow.validate();

    assert!(!result.valid);
    assert_eq!(
        result.error.as_deref(),
        Some("Workflow must contain an LLM Engine component")
    );
    assert!(matches!(
        result.into_result(),
        Err(StepflowError::Validation(_))
    ));

    // Execution does not require validity: the lone entry node completes.
    let executor = GraphExecutor::with_builtins(
        Collaborators::new(Arc::new(StubRetriever::empty()), Arc::new(EchoGenerator::new())),
        EngineConfig::default(),
    );
    let run = executor.execute(&workflow, "q", &[]).await.unwrap();
    assert_eq!(run.result, NO_OUTPUT_MESSAGE);
    assert_eq!(run.stop_reason, StopReason::NoOutgoingEdge);
}
