//! The blocking scheduler mode: root fields execute one at a time, on the
//! calling task, yielding cooperatively at `.await` points rather than
//! running on separate worker threads. Nested selections underneath each
//! root field still execute concurrently among themselves via
//! [`crate::task::execute_selection_set`].

use std::sync::Arc;

use async_trait::async_trait;

use super::{allocate_root_children, collect_root_fields, Scheduler};
use crate::{ast::Selection, context::ExecutionContext, resolver::Source, result_tree::ResultTree, schema::ObjectType};

/// Runs every root field to completion in document order, on the calling
/// task.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockingScheduler;

#[async_trait]
impl Scheduler for BlockingScheduler {
    #[tracing::instrument(level = "debug", name = "blocking_scheduler_run", skip_all)]
    async fn run(
        &self,
        ctx: Arc<ExecutionContext>,
        tree: Arc<ResultTree>,
        root_type: Arc<dyn ObjectType>,
        root_source: Arc<Source>,
        selection_set: Vec<Selection>,
    ) {
        let collected = collect_root_fields(&ctx, root_type.as_ref(), &selection_set);
        let children = allocate_root_children(&ctx, &tree, root_type.as_ref(), collected);

        for (node, exec_node) in children {
            crate::task::execute_field(Arc::clone(&ctx), node, Arc::clone(&root_source), exec_node).await;
        }
    }
}
