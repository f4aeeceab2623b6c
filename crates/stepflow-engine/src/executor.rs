use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use stepflow_core::config::EngineConfig;
use stepflow_core::error::{Result, StepflowError};
use stepflow_core::types::ChatTurn;

use crate::context::ExecutionContext;
use crate::graph::{Node, Workflow};
use crate::log::{ExecutionLog, LogEntry};
use crate::steps::{Collaborators, StepOutcome, StepRegistry};

/// Result surfaced when the walk finishes without any step producing one.
pub const NO_OUTPUT_MESSAGE: &str = "Workflow execution completed but no output was generated.";

/// Why a completed walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A terminal (output) step ran.
    Output,
    /// The current node has no outgoing edge.
    NoOutgoingEdge,
    /// The next node was already visited.
    Revisit,
    /// The iteration ceiling was reached.
    IterationLimit,
    /// The first outgoing edge points at an undeclared node.
    DanglingEdge,
}

/// Result of executing a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Final answer, or [`NO_OUTPUT_MESSAGE`].
    pub result: String,
    /// One entry per logged step, in execution order.
    pub execution_log: Vec<LogEntry>,
    /// True whenever the walk completed, whatever path it took.
    pub success: bool,
    pub stop_reason: StopReason,
    pub total_elapsed_ms: u64,
}

/// Walks a workflow graph.
///
/// Starting from the query-intake node, each node is dispatched to the
/// handler registered for its kind, then the walk follows the node's first
/// declared outgoing edge. It stops at a terminal step, a node without
/// outgoing edges, a revisit, or the iteration ceiling.
///
/// The executor holds no per-run state; concurrent calls to
/// [`GraphExecutor::execute`] are independent.
pub struct GraphExecutor {
    registry: StepRegistry,
    collaborators: Collaborators,
    config: EngineConfig,
}

impl GraphExecutor {
    pub fn new(registry: StepRegistry, collaborators: Collaborators, config: EngineConfig) -> Self {
        Self {
            registry,
            collaborators,
            config,
        }
    }

    /// Executor with the built-in handlers registered.
    pub fn with_builtins(collaborators: Collaborators, config: EngineConfig) -> Self {
        let registry = StepRegistry::with_builtins(&config);
        Self::new(registry, collaborators, config)
    }

    pub fn registry_mut(&mut self) -> &mut StepRegistry {
        &mut self.registry
    }

    /// Execute the workflow for `query`.
    ///
    /// The workflow is expected to have been validated by the caller. A
    /// missing query-intake node fails fast; any handler error aborts the
    /// run and is returned tagged with the failing node.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        query: &str,
        history: &[ChatTurn],
    ) -> Result<RunResult> {
        let start = Instant::now();
        let entry = workflow
            .entry_node()
            .ok_or(StepflowError::MissingEntryNode)?;

        let mut ctx =
            ExecutionContext::new(query).with_history(history, self.config.history_window);
        let mut log = ExecutionLog::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current: &Node = entry;
        let mut iterations = 0usize;

        let stop_reason = loop {
            if iterations >= self.config.max_iterations {
                warn!(
                    node_id = %current.id,
                    max_iterations = self.config.max_iterations,
                    "Iteration ceiling reached, terminating graph"
                );
                break StopReason::IterationLimit;
            }
            iterations += 1;

            if !visited.insert(current.id.as_str()) {
                debug!(node_id = %current.id, "Node already visited, graph complete");
                break StopReason::Revisit;
            }

            info!(node_id = %current.id, kind = %current.kind, "Executing graph node");

            let outcome = self.dispatch(current, &mut ctx).await?;
            if let Some(entry) = outcome.entry {
                log.push(entry);
            }

            if outcome.halt {
                debug!(node_id = %current.id, "Terminal step reached, graph complete");
                break StopReason::Output;
            }

            let Some(next_id) = workflow.first_successor(&current.id) else {
                debug!(node_id = %current.id, "No outgoing edges, graph complete");
                break StopReason::NoOutgoingEdge;
            };

            match workflow.node(next_id) {
                Some(next) => current = next,
                None => {
                    warn!(
                        node_id = %current.id,
                        target = %next_id,
                        "Edge points at an unknown node, graph complete"
                    );
                    break StopReason::DanglingEdge;
                }
            }
        };

        let result = ctx
            .result
            .take()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| NO_OUTPUT_MESSAGE.to_string());
        let total_elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            steps = log.len(),
            ?stop_reason,
            total_elapsed_ms,
            "Graph execution complete"
        );

        Ok(RunResult {
            result,
            execution_log: log.into_entries(),
            success: true,
            stop_reason,
            total_elapsed_ms,
        })
    }

    /// Run the handler for one node. Kinds without a handler pass through.
    async fn dispatch(&self, node: &Node, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        let Some(handler) = self.registry.get(&node.kind) else {
            warn!(node_id = %node.id, kind = %node.kind, "No handler for node kind, passing through");
            return Ok(StepOutcome::skip());
        };

        handler
            .apply(node, ctx, &self.collaborators)
            .await
            .map_err(|e| {
                error!(node_id = %node.id, kind = %node.kind, error = %e, "Graph node failed");
                e.at_step(&node.id, node.kind.step_tag())
            })
    }
}
