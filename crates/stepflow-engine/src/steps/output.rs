use futures::future::BoxFuture;

use stepflow_core::error::Result;

use super::{Collaborators, StepHandler, StepOutcome};
use crate::context::ExecutionContext;
use crate::graph::{Node, NodeKind};
use crate::log::{preview, LogEntry};

/// Terminal step: surfaces the response (or the query when nothing was
/// generated) and stops the walk.
///
/// Only the log entry is truncated; the result handed back is complete.
pub struct OutputHandler {
    preview_chars: usize,
}

impl OutputHandler {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new(100)
    }
}

impl StepHandler for OutputHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::Output
    }

    fn apply<'a>(
        &'a self,
        node: &'a Node,
        ctx: &'a mut ExecutionContext,
        _services: &'a Collaborators,
    ) -> BoxFuture<'a, Result<StepOutcome>> {
        Box::pin(async move {
            let result = ctx.response.clone().unwrap_or_else(|| ctx.query.clone());
            let entry = LogEntry::new(self.kind().step_tag(), &node.id)
                .with("result", preview(&result, self.preview_chars));
            ctx.result = Some(result);
            Ok(StepOutcome::terminal(entry))
        })
    }
}
