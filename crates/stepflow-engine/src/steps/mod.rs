//! Step handlers and the registry that maps node kinds to them.

pub mod generation;
pub mod output;
pub mod query;
pub mod registry;
pub mod retrieval;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use stepflow_core::error::{Result, StepflowError};
use stepflow_core::traits::{Generator, Retriever};

use crate::context::ExecutionContext;
use crate::graph::{Node, NodeKind};
use crate::log::LogEntry;

pub use generation::{GenerationConfig, GenerationHandler};
pub use output::OutputHandler;
pub use query::QueryIntakeHandler;
pub use registry::StepRegistry;
pub use retrieval::{RetrievalConfig, RetrievalHandler};

/// External capabilities a run may call, injected by the caller.
#[derive(Clone)]
pub struct Collaborators {
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn Generator>,
}

impl Collaborators {
    pub fn new(retriever: Arc<dyn Retriever>, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }
}

/// What a handler reports back to the walker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// Log entry for this node, if the step did anything worth recording.
    pub entry: Option<LogEntry>,
    /// Stop the walk after this node.
    pub halt: bool,
}

impl StepOutcome {
    /// Nothing logged, walk continues.
    pub fn skip() -> Self {
        Self::default()
    }

    /// Logged, walk continues.
    pub fn logged(entry: LogEntry) -> Self {
        Self {
            entry: Some(entry),
            halt: false,
        }
    }

    /// Logged, walk stops here.
    pub fn terminal(entry: LogEntry) -> Self {
        Self {
            entry: Some(entry),
            halt: true,
        }
    }
}

/// Handler for one node kind.
///
/// A handler transforms the running context for a node and returns at most
/// one log entry. Errors propagate to the walker, which aborts the run.
pub trait StepHandler: Send + Sync + 'static {
    /// The node kind this handler serves.
    fn kind(&self) -> NodeKind;

    fn apply<'a>(
        &'a self,
        node: &'a Node,
        ctx: &'a mut ExecutionContext,
        services: &'a Collaborators,
    ) -> BoxFuture<'a, Result<StepOutcome>>;
}

/// Parse a node's opaque config into a handler's typed configuration.
pub fn parse_config<T: DeserializeOwned>(node: &Node) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(node.config.clone()))
        .map_err(|e| StepflowError::InvalidNodeConfig(e.to_string()))
}
