use std::collections::HashMap;
use std::sync::Arc;

use stepflow_core::config::EngineConfig;

use super::{GenerationHandler, OutputHandler, QueryIntakeHandler, RetrievalHandler, StepHandler};
use crate::graph::NodeKind;

/// Registry of step handlers, keyed by node kind.
pub struct StepRegistry {
    handlers: HashMap<NodeKind, Arc<dyn StepHandler>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler. Replaces any handler already serving its kind.
    pub fn register(&mut self, handler: impl StepHandler) {
        self.handlers.insert(handler.kind(), Arc::new(handler));
    }

    /// Unregister the handler for a kind.
    pub fn unregister(&mut self, kind: &NodeKind) -> bool {
        self.handlers.remove(kind).is_some()
    }

    /// Get the handler for a kind.
    pub fn get(&self, kind: &NodeKind) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(kind).cloned()
    }

    /// List registered kinds.
    pub fn kinds(&self) -> Vec<&NodeKind> {
        self.handlers.keys().collect()
    }

    /// Create a registry with the four built-in handlers.
    pub fn with_builtins(config: &EngineConfig) -> Self {
        let mut registry = Self::new();
        registry.register(QueryIntakeHandler);
        registry.register(RetrievalHandler);
        registry.register(GenerationHandler);
        registry.register(OutputHandler::new(config.log_preview_chars));
        registry
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}
