use futures::future::BoxFuture;

use stepflow_core::error::Result;

use super::{Collaborators, StepHandler, StepOutcome};
use crate::context::ExecutionContext;
use crate::graph::{Node, NodeKind};
use crate::log::LogEntry;

/// Entry step. The query is already on the context; this records it.
pub struct QueryIntakeHandler;

impl StepHandler for QueryIntakeHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::QueryIntake
    }

    fn apply<'a>(
        &'a self,
        node: &'a Node,
        ctx: &'a mut ExecutionContext,
        _services: &'a Collaborators,
    ) -> BoxFuture<'a, Result<StepOutcome>> {
        Box::pin(async move {
            let entry = LogEntry::new(self.kind().step_tag(), &node.id)
                .with("query", ctx.query.clone());
            Ok(StepOutcome::logged(entry))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stepflow_test_utils::{EchoGenerator, StubRetriever};

    #[tokio::test]
    async fn test_records_query_verbatim() {
        let services = Collaborators::new(
            Arc::new(StubRetriever::empty()),
            Arc::new(EchoGenerator::new()),
        );
        let node = Node::query_intake("1");
        let mut ctx = ExecutionContext::new("  what is Rust?  ");

        let outcome = QueryIntakeHandler
            .apply(&node, &mut ctx, &services)
            .await
            .unwrap();

        assert!(!outcome.halt);
        let entry = outcome.entry.unwrap();
        assert_eq!(entry.step, "user_query");
        assert_eq!(entry.node_id, "1");
        assert_eq!(
            entry.detail("query"),
            Some(&serde_json::json!("  what is Rust?  "))
        );
        assert_eq!(ctx.query, "  what is Rust?  ");
    }
}
