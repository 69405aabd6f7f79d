//! The query-parallel scheduler mode: each root field is handed to a
//! [`WorkerPool`] and runs independently of its siblings, rejoining only
//! once every root field has completed. This is the mode queries use by
//! default, since sibling root fields in a query carry no ordering
//! requirement and benefit from running on separate tasks.

use std::sync::Arc;

use async_trait::async_trait;

use super::{allocate_root_children, collect_root_fields, Scheduler};
use crate::{
    ast::Selection,
    context::ExecutionContext,
    resolver::Source,
    result_tree::ResultTree,
    schema::ObjectType,
    worker_pool::WorkerPool,
};

/// Fans every root field out across a [`WorkerPool`], awaiting all of them
/// before returning.
pub struct QueryParallelScheduler<P> {
    pool: P,
}

impl<P: WorkerPool> QueryParallelScheduler<P> {
    pub fn new(pool: P) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "tokio-runtime")]
impl Default for QueryParallelScheduler<crate::worker_pool::TokioWorkerPool> {
    fn default() -> Self {
        Self::new(crate::worker_pool::TokioWorkerPool)
    }
}

#[async_trait]
impl<P: WorkerPool> Scheduler for QueryParallelScheduler<P> {
    #[tracing::instrument(level = "debug", name = "query_parallel_scheduler_run", skip_all)]
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

        let mut completions = Vec::with_capacity(children.len());
        for (node, exec_node) in children {
            let ctx = Arc::clone(&ctx);
            let root_source = Arc::clone(&root_source);

            let (tx, rx) = tokio::sync::oneshot::channel();
            self.pool.spawn(Box::pin(async move {
                crate::task::execute_field(ctx, node, root_source, exec_node).await;
                let _ = tx.send(());
            }));
            completions.push(rx);
        }

        for rx in completions {
            // A dropped sender only happens if the pool discarded the task
            // outright; the result slot is left `Pending` (serializes as
            // `null`) rather than hanging the whole operation on it.
            let _ = rx.await;
        }
    }
}
