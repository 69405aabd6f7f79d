//! The mutation-serial scheduler mode: identical execution strategy to
//! [`super::BlockingScheduler`] — root fields run one at a time, in document
//! order — but a distinct type so callers (and [`crate::context::required_scheduler_mode`])
//! can require it specifically for mutations, where GraphQL forbids
//! reordering or overlapping root field side effects.

use std::sync::Arc;

use async_trait::async_trait;

use super::{allocate_root_children, collect_root_fields, Scheduler};
use crate::{ast::Selection, context::ExecutionContext, resolver::Source, result_tree::ResultTree, schema::ObjectType};

/// Runs every root field to completion in document order, on the calling
/// task, guaranteeing one field's side effects complete before the next
/// begins.
#[derive(Clone, Copy, Debug, Default)]
pub struct MutationSerialScheduler;

#[async_trait]
impl Scheduler for MutationSerialScheduler {
    #[tracing::instrument(level = "debug", name = "mutation_serial_scheduler_run", skip_all)]
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
