use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepflowError {
    // Structural errors (caller-side validation)
    #[error("Invalid workflow: {0}")]
    Validation(String),

    // Precondition errors
    #[error("Workflow must contain a User Query component")]
    MissingEntryNode,

    #[error("Invalid node config: {0}")]
    InvalidNodeConfig(String),

    // Collaborator errors
    #[error("Retrieval failed for knowledge base '{knowledge_base}': {message}")]
    Retrieval {
        knowledge_base: String,
        message: String,
    },

    #[error("Generation failed (provider {provider}): {message}")]
    Generation { provider: String, message: String },

    #[error("Unsupported LLM provider: {0}. Supported providers: openai, gemini, cohere")]
    UnsupportedProvider(String),

    #[error("Embedding error ({model}): {message}")]
    Embedding { model: String, message: String },

    #[error("Web search error ({provider}): {message}")]
    WebSearch { provider: String, message: String },

    /// A step handler failed; wraps the underlying error with the failing node.
    #[error("Step '{step}' failed at node '{node_id}': {source}")]
    Step {
        node_id: String,
        step: String,
        source: Box<StepflowError>,
    },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StepflowError {
    /// Attach the failing node and step tag to an error raised inside a handler.
    pub fn at_step(self, node_id: impl Into<String>, step: impl Into<String>) -> Self {
        StepflowError::Step {
            node_id: node_id.into(),
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// Whether the error originated in a retrieval or generation collaborator.
    pub fn is_collaborator(&self) -> bool {
        match self {
            StepflowError::Retrieval { .. }
            | StepflowError::Generation { .. }
            | StepflowError::UnsupportedProvider(_)
            | StepflowError::Embedding { .. }
            | StepflowError::WebSearch { .. } => true,
            StepflowError::Step { source, .. } => source.is_collaborator(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StepflowError>;
