use serde::{Deserialize, Serialize};

/// The kind of a step. Known kinds have built-in handlers; anything else is
/// carried as `Custom` and dispatched to whatever handler registers that tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    QueryIntake,
    Retrieval,
    Generation,
    Output,
    Custom(String),
}

impl NodeKind {
    /// Parse a wire tag. Both the editor spelling (`userQuery`) and the
    /// snake_case log spelling (`user_query`) are accepted.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "userQuery" | "user_query" => NodeKind::QueryIntake,
            "knowledgeBase" | "knowledge_base" => NodeKind::Retrieval,
            "llmEngine" | "llm_engine" => NodeKind::Generation,
            "output" => NodeKind::Output,
            other => NodeKind::Custom(other.to_string()),
        }
    }

    /// Tag used in saved workflows.
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::QueryIntake => "userQuery",
            NodeKind::Retrieval => "knowledgeBase",
            NodeKind::Generation => "llmEngine",
            NodeKind::Output => "output",
            NodeKind::Custom(tag) => tag,
        }
    }

    /// Tag recorded in execution log entries.
    pub fn step_tag(&self) -> &str {
        match self {
            NodeKind::QueryIntake => "user_query",
            NodeKind::Retrieval => "knowledge_base",
            NodeKind::Generation => "llm_engine",
            NodeKind::Output => "output",
            NodeKind::Custom(tag) => tag,
        }
    }

    /// Human-readable component name, used in validation messages.
    pub fn label(&self) -> &str {
        match self {
            NodeKind::QueryIntake => "User Query",
            NodeKind::Retrieval => "Knowledge Base",
            NodeKind::Generation => "LLM Engine",
            NodeKind::Output => "Output",
            NodeKind::Custom(tag) => tag,
        }
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        NodeKind::parse(&tag)
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the workflow graph.
///
/// `config` is opaque to the walker; each handler parses the keys it
/// recognizes into its own typed configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the graph.
    pub id: String,
    #[serde(alias = "type")]
    pub kind: NodeKind,
    #[serde(default, alias = "data")]
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            config: serde_json::Map::new(),
        }
    }

    pub fn query_intake(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::QueryIntake)
    }

    pub fn retrieval(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Retrieval)
    }

    pub fn generation(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Generation)
    }

    pub fn output(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Output)
    }

    /// Set a config key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}
