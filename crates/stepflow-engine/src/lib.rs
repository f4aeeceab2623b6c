//! Graph execution engine.
//!
//! A workflow is a small directed graph of typed steps (query intake,
//! knowledge-base retrieval, generation, output). The [`GraphExecutor`] walks
//! it from the query-intake node, dispatching each node to the
//! [`StepHandler`] registered for its kind, and returns the final answer with
//! an ordered execution log.

pub mod context;
pub mod executor;
pub mod graph;
pub mod log;
pub mod steps;

pub use context::ExecutionContext;
pub use executor::{GraphExecutor, RunResult, StopReason, NO_OUTPUT_MESSAGE};
pub use graph::{validate, Edge, Node, NodeKind, ValidationResult, Workflow};
pub use log::{ExecutionLog, LogEntry};
pub use steps::{Collaborators, StepHandler, StepOutcome, StepRegistry};
