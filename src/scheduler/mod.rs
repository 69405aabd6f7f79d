//! Three interchangeable ways to drive one operation's root selection set.
//!
//! Nested selections under any root field always execute through
//! [`crate::task::execute_selection_set`], which runs a node's fields
//! concurrently regardless of scheduler mode — modes only differ in how the
//! *root* fields are ordered and where they run: sequentially on the
//! calling task (blocking, mutation-serial) or fanned out across a
//! [`crate::worker_pool::WorkerPool`] (query-parallel).

mod blocking;
mod mutation_serial;
#[cfg(feature = "tokio-runtime")]
mod query_parallel;

pub use blocking::BlockingScheduler;
pub use mutation_serial::MutationSerialScheduler;
#[cfg(feature = "tokio-runtime")]
pub use query_parallel::QueryParallelScheduler;

use std::sync::Arc;

use arcstr::ArcStr;
use async_trait::async_trait;
use fnv::FnvHashMap;
use indexmap::IndexMap;

use crate::{
    ast::{FieldNode, FragmentDefinition, Selection},
    context::ExecutionContext,
    execution_node::ExecutionNode,
    path::ResponsePath,
    resolver::Source,
    result_tree::{NodeRef, ResultTree},
    schema::ObjectType,
};

/// Drives one operation's root selection set against `root_source` to
/// completion, writing results into `tree`.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Runs the root selection set to completion.
    async fn run(
        &self,
        ctx: Arc<ExecutionContext>,
        tree: Arc<ResultTree>,
        root_type: Arc<dyn ObjectType>,
        root_source: Arc<Source>,
        selection_set: Vec<Selection>,
    );
}

/// Collects the root selection set's fields against the root object type,
/// shared by every scheduler mode.
pub(crate) fn collect_root_fields(
    ctx: &ExecutionContext,
    root_type: &dyn ObjectType,
    selection_set: &[Selection],
) -> IndexMap<ArcStr, Vec<Arc<FieldNode>>> {
    let fragment_refs: FnvHashMap<ArcStr, &FragmentDefinition> =
        ctx.fragments().iter().map(|(name, def)| (name.clone(), def)).collect();
    crate::collector::collect_fields(ctx.schema().as_ref(), root_type.name(), selection_set, &fragment_refs, ctx.variables())
}

/// Reserves one child slot per collected root field on the tree's root node,
/// links each to the root as parent, and builds its [`ExecutionNode`],
/// skipping any response key the root object type declares no field for
/// (its slot stays `Pending`, the same as a nested selection's).
pub(crate) fn allocate_root_children(
    ctx: &ExecutionContext,
    tree: &ResultTree,
    root_type: &dyn ObjectType,
    collected: IndexMap<ArcStr, Vec<Arc<FieldNode>>>,
) -> Vec<(NodeRef, ExecutionNode)> {
    let root_ptr = tree.root();
    let children = unsafe { &*root_ptr }.resolve_object(
        collected
            .keys()
            .enumerate()
            .map(|(index, key)| (compact_str::CompactString::from(key.as_str()), index))
            .collect(),
        ctx.config().default_chunk_size,
    );

    collected
        .into_iter()
        .filter_map(|(response_key, asts)| {
            let index = children.push();
            let ptr = children.get(index);
            unsafe { (*ptr).set_parent(root_ptr) };
            let path = Arc::new(ResponsePath::Root).field(response_key.as_str());
            let exec_node = ExecutionNode::collect(root_type, response_key, asts, path, ctx.variables())?;
            Some((NodeRef(ptr), exec_node))
        })
        .collect()
}
