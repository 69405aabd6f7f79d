//! Field execution tasks: resolving one field (or one list element that
//! needs a full object/abstract completion) and writing its value into the
//! result tree.
//!
//! [`execute_field`] and [`crate::value_completion::complete_wrapping_value`]
//! are mutually recursive: a field that resolves to an object spawns one
//! [`execute_field`] per collected sub-field, each of which completes its
//! own value, which may itself be an object needing the same treatment.
//! Scheduler modes (`crate::scheduler`) decide *how* the per-field futures
//! this module produces get driven (one at a time, cooperatively
//! interleaved, or fully parallel); this module only decides *what* each
//! one does.

use std::sync::Arc;

use arcstr::ArcStr;
use compact_str::CompactString;
use fnv::FnvHashMap;

use crate::{
    context::ExecutionContext,
    execution_node::{ExecutionNode, SelectionCache},
    resolver::{ResolveInfo, Source},
    result_tree::NodeRef,
    schema::ObjectType,
    value_completion,
};

/// Resolves and completes one field, writing its result into `node`.
#[tracing::instrument(level = "debug", skip_all, fields(path = %exec_node.path, field = %exec_node.primary_field_ast().name))]
pub async fn execute_field(
    ctx: Arc<ExecutionContext>,
    node: NodeRef,
    source: Arc<Source>,
    exec_node: ExecutionNode,
) {
    let resolved = {
        let info = ResolveInfo {
            schema: ctx.schema().as_ref(),
            arguments: &exec_node.arguments,
            path: Arc::clone(&exec_node.path),
            field_asts: &exec_node.field_asts,
            parent_type_name: exec_node.parent_type_name.clone(),
        };
        let resolver =
            exec_node.field_definition.resolver().unwrap_or_else(|| Arc::clone(ctx.default_resolver()));
        resolver.resolve(ctx.as_ref(), source.as_ref(), &info).await
    };

    let cache = SelectionCache::default();
    value_completion::complete_wrapping_value(
        &ctx,
        node,
        exec_node.field_definition.return_type(),
        exec_node.path,
        resolved,
        exec_node.field_asts,
        &cache,
    )
    .await;
}

/// Completes an object-typed value: collects fields against the runtime
/// object type and spawns one [`execute_field`] per collected field whose
/// name the runtime type actually declares.
///
/// Shared by root query/mutation execution and by value completion's
/// `Object` case, since both boil down to "collect fields against this
/// runtime type, execute each one into its own child slot."
pub async fn execute_selection_set(
    ctx: Arc<ExecutionContext>,
    node: NodeRef,
    object_type: Arc<dyn ObjectType>,
    source: Arc<Source>,
    field_asts: Vec<Arc<crate::ast::FieldNode>>,
    path: Arc<crate::path::ResponsePath>,
    cache: &SelectionCache,
) {
    let selections: Vec<&crate::ast::Selection> =
        field_asts.iter().flat_map(|f| f.selection_set.iter()).collect();
    let merged_selection_set: Vec<crate::ast::Selection> = selections.into_iter().cloned().collect();

    let fragment_refs: FnvHashMap<ArcStr, &crate::ast::FragmentDefinition> =
        ctx.fragments().iter().map(|(name, def)| (name.clone(), def)).collect();
    let collected = cache.get_or_collect(
        ctx.schema().as_ref(),
        object_type.name(),
        &merged_selection_set,
        &fragment_refs,
        ctx.variables(),
    );

    let children = unsafe { node.get() }.resolve_object(
        collected
            .keys()
            .enumerate()
            .map(|(index, key)| (CompactString::from(key.as_str()), index))
            .collect(),
        ctx.config().default_chunk_size,
    );

    let mut pending = Vec::with_capacity(collected.len());
    for (response_key, asts) in collected.iter() {
        let child_index = children.push();
        let child_ptr = children.get(child_index);
        unsafe { (*child_ptr).set_parent(node.0) };
        let child_ref = NodeRef(child_ptr);
        let child_path = path.field(response_key.as_str());

        let Some(exec_node) = ExecutionNode::collect(
            object_type.as_ref(),
            response_key.clone(),
            asts.clone(),
            child_path,
            ctx.variables(),
        ) else {
            continue;
        };
        pending.push(execute_field(Arc::clone(&ctx), child_ref, Arc::clone(&source), exec_node));
    }
    futures::future::join_all(pending).await;
}
