use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use stepflow_core::error::{Result, StepflowError};

use super::edge::Edge;
use super::node::{Node, NodeKind};

/// Outcome of structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }

    /// Convert into a `Result`, mapping failure to `StepflowError::Validation`.
    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(msg) if !self.valid => Err(StepflowError::Validation(msg)),
            _ => Ok(()),
        }
    }
}

/// Required kinds, checked in this order.
const REQUIRED_KINDS: [(NodeKind, &str); 3] = [
    (NodeKind::QueryIntake, "a"),
    (NodeKind::Generation, "an"),
    (NodeKind::Output, "an"),
];

/// Validate workflow structure, stopping at the first failure.
///
/// Cycles are allowed here; the walker guards against them at run time.
pub fn validate(nodes: &[Node], edges: &[Edge]) -> ValidationResult {
    if nodes.is_empty() {
        return ValidationResult::invalid("Workflow must contain at least one node");
    }

    for (kind, article) in &REQUIRED_KINDS {
        if !nodes.iter().any(|n| &n.kind == kind) {
            return ValidationResult::invalid(format!(
                "Workflow must contain {} {} component",
                article,
                kind.label()
            ));
        }
    }

    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let dangling = edges
        .iter()
        .any(|e| !ids.contains(e.source.as_str()) || !ids.contains(e.target.as_str()));
    if dangling {
        return ValidationResult::invalid("All edges must connect valid nodes");
    }

    ValidationResult::ok()
}
