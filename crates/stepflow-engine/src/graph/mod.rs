//! Graph model: nodes, edges, the workflow document and its validation.

pub mod edge;
pub mod node;
pub mod validate;

use std::path::Path;

use serde::{Deserialize, Serialize};

use stepflow_core::error::{Result, StepflowError};

pub use edge::Edge;
pub use node::{Node, NodeKind};
pub use validate::{validate, ValidationResult};

/// An ordered set of nodes and edges describing one workflow.
///
/// The engine only ever borrows a workflow; it is never mutated by a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Load a workflow from a JSON or TOML file (chosen by extension).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| StepflowError::Config(e.to_string()))
            }
            _ => Ok(serde_json::from_str(&content)?),
        }
    }

    pub fn validate(&self) -> ValidationResult {
        validate(&self.nodes, &self.edges)
    }

    /// First query-intake node in declaration order.
    pub fn entry_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == NodeKind::QueryIntake)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Targets of the edges leaving `id`, in declaration order.
    pub fn successors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.source == id)
            .map(|e| e.target.as_str())
    }

    /// The successor the walker takes: the first declared outgoing edge.
    pub fn first_successor(&self, id: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|e| e.source == id)
            .map(|e| e.target.as_str())
    }
}
