//! Value completion: turns a resolver's [`Resolved`] output into the result
//! tree, applying GraphQL's non-null/list/leaf/object/abstract-type
//! completion algorithm.
//!
//! [`complete_wrapping_value`] and [`crate::task::execute_selection_set`]
//! are mutually recursive — an object-typed value spawns a field task per
//! collected field, each of which completes its own value, which may itself
//! be an object. [`complete_wrapping_value`] returns a boxed future rather
//! than being a plain `async fn` specifically to break that cycle: Rust
//! can't compute the size of an `async fn`'s anonymous future type when it
//! recursively contains itself, so the indirection has to live at one
//! point in the cycle.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{
    ast::{FieldNode, TypeRef},
    context::ExecutionContext,
    error::{Error, ErrorKind},
    execution_node::SelectionCache,
    path::ResponsePath,
    resolver::Resolved,
    result_tree::{NodeRef, ResultNode},
};

/// Completes a (possibly non-null-wrapped) value into `node`.
///
/// `cache` is shared across every element a list-typed value completes
/// (one per originating field, created by [`crate::task::execute_field`]),
/// so that repeated visits to the same runtime object type skip field
/// collection on a cache hit.
pub fn complete_wrapping_value<'a>(
    ctx: &'a Arc<ExecutionContext>,
    node: NodeRef,
    return_type: &'a TypeRef,
    path: Arc<ResponsePath>,
    resolved: Resolved,
    field_asts: Vec<Arc<FieldNode>>,
    cache: &'a SelectionCache,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        unsafe { node.get() }.set_reject_null(return_type.is_non_null());

        let resolved = match resolve_fully(ctx, resolved).await {
            Ok(resolved) => resolved,
            Err(error) => return fail(ctx, node, path, error),
        };

        match resolved {
            Resolved::Error(error) => fail(ctx, node, path, error),
            Resolved::Async(_) => unreachable!("resolve_fully drains every Async layer"),
            Resolved::Null => {
                if return_type.is_non_null() {
                    fail(
                        ctx,
                        node,
                        path,
                        Error::new("Cannot return null for non-nullable field")
                            .with_kind(ErrorKind::Execution),
                    );
                } else {
                    ResultNode::propagate_null(node.0);
                }
            }
            other => {
                let inner_type = match return_type {
                    TypeRef::NonNull(inner) => inner.as_ref(),
                    other_type => other_type,
                };
                complete_non_wrapping_value(ctx, node, inner_type, path, other, field_asts, cache).await;
            }
        }
    })
}

/// Repeatedly drives [`Resolved::Async`] layers to completion, returning the
/// first non-async outcome.
async fn resolve_fully(ctx: &ExecutionContext, mut resolved: Resolved) -> Result<Resolved, Error> {
    loop {
        match resolved {
            Resolved::Async(value) => {
                #[cfg(feature = "tokio-runtime")]
                {
                    resolved = crate::async_value::drive(ctx, value).await;
                }
                #[cfg(not(feature = "tokio-runtime"))]
                {
                    let _ = (ctx, value);
                    return Err(Error::new(
                        "resolver returned an async value but the `tokio-runtime` feature is disabled",
                    )
                    .with_kind(ErrorKind::Internal));
                }
            }
            other => return Ok(other),
        }
    }
}

fn fail(ctx: &Arc<ExecutionContext>, node: NodeRef, path: Arc<ResponsePath>, error: Error) {
    ctx.report_error(error.with_path(path.to_vec()));
    ResultNode::propagate_null(node.0);
}

async fn complete_non_wrapping_value(
    ctx: &Arc<ExecutionContext>,
    node: NodeRef,
    inner_type: &TypeRef,
    path: Arc<ResponsePath>,
    resolved: Resolved,
    field_asts: Vec<Arc<FieldNode>>,
    cache: &SelectionCache,
) {
    match inner_type {
        TypeRef::List(element_type) => {
            complete_list_value(ctx, node, element_type, path, resolved, field_asts, cache).await;
        }
        TypeRef::Named(name) => {
            complete_named_value(ctx, node, name, path, resolved, field_asts, cache).await;
        }
        TypeRef::NonNull(_) => {
            unreachable!("complete_wrapping_value already stripped the outer NonNull wrapper")
        }
    }
}

async fn complete_list_value(
    ctx: &Arc<ExecutionContext>,
    node: NodeRef,
    element_type: &TypeRef,
    path: Arc<ResponsePath>,
    resolved: Resolved,
    field_asts: Vec<Arc<FieldNode>>,
    cache: &SelectionCache,
) {
    let Resolved::List(mut list) = resolved else {
        return fail(
            ctx,
            node,
            path,
            Error::new("resolver did not return a list for a list-typed field").with_kind(ErrorKind::Execution),
        );
    };

    let size_hint = list.size_hint();
    // A hint of exactly 0 would make `ChunkedList::new` panic (chunk size
    // must be positive), and buys nothing over the configured default.
    let chunk_size = size_hint.filter(|&n| n > 0).unwrap_or(ctx.config().default_chunk_size);
    let children = unsafe { node.get() }.resolve_list(chunk_size);
    let mut pending = Vec::with_capacity(size_hint.unwrap_or(0));
    let mut index = 0usize;
    while let Some(item) = list.next() {
        let child_index = children.push();
        let child_ptr = children.get(child_index);
        unsafe { (*child_ptr).set_parent(node.0) };
        let child_node = NodeRef(child_ptr);
        let child_path = path.index(index);
        index += 1;

        match item {
            Ok(item_resolved) => pending.push(complete_wrapping_value(
                ctx,
                child_node,
                element_type,
                child_path,
                item_resolved,
                field_asts.clone(),
                cache,
            )),
            Err(error) => {
                unsafe { child_node.get() }.set_reject_null(element_type.is_non_null());
                fail(ctx, child_node, child_path, error);
            }
        }
    }
    futures::future::join_all(pending).await;
}

async fn complete_named_value(
    ctx: &Arc<ExecutionContext>,
    node: NodeRef,
    type_name: &str,
    path: Arc<ResponsePath>,
    resolved: Resolved,
    field_asts: Vec<Arc<FieldNode>>,
    cache: &SelectionCache,
) {
    use crate::schema::NamedType;

    let Some(named_type) = ctx.schema().named_type(type_name) else {
        return fail(
            ctx,
            node,
            path,
            Error::new(format!("unknown type `{type_name}` in schema")).with_kind(ErrorKind::Internal),
        );
    };

    match named_type {
        NamedType::Leaf(leaf_type) => {
            let Resolved::Leaf(value) = resolved else {
                return fail(
                    ctx,
                    node,
                    path,
                    Error::new(format!("resolver did not return a leaf value for `{type_name}`"))
                        .with_kind(ErrorKind::Execution),
                );
            };
            match leaf_type.coerce_result_value(value.as_ref()) {
                Ok(value) => unsafe { node.get() }.resolve_leaf(value),
                Err(error) => fail(ctx, node, path, error),
            }
        }
        NamedType::Object(object_type) => {
            let Resolved::Object(source) = resolved else {
                return fail(
                    ctx,
                    node,
                    path,
                    Error::new(format!("resolver did not return an object value for `{type_name}`"))
                        .with_kind(ErrorKind::Execution),
                );
            };
            let source = Arc::<crate::resolver::Source>::from(source);
            crate::task::execute_selection_set(Arc::clone(ctx), node, object_type, source, field_asts, path, cache)
                .await;
        }
        NamedType::Abstract(abstract_type) => {
            let Resolved::Object(source) = resolved else {
                return fail(
                    ctx,
                    node,
                    path,
                    Error::new(format!("resolver did not return an object value for abstract type `{type_name}`"))
                        .with_kind(ErrorKind::Execution),
                );
            };
            let runtime_type_name = match abstract_type.resolve_type(source.as_ref()) {
                crate::schema::ResolvedType::Resolved(name) => name,
                crate::schema::ResolvedType::NoResolver => {
                    return fail(
                        ctx,
                        node,
                        path,
                        Error::new(format!("Abstract type \"{type_name}\" must provide resolver."))
                            .with_kind(ErrorKind::Execution),
                    );
                }
                crate::schema::ResolvedType::Unresolvable => {
                    return fail(
                        ctx,
                        node,
                        path,
                        Error::new(format!("Abstract type \"{type_name}\" must resolve to an Object type at runtime."))
                            .with_kind(ErrorKind::Execution),
                    );
                }
            };
            if !ctx.schema().is_possible_type(type_name, &runtime_type_name) {
                return fail(
                    ctx,
                    node,
                    path,
                    Error::new(format!(
                        "Runtime Object type \"{runtime_type_name}\" is not a possible type for \"{type_name}\"."
                    ))
                    .with_kind(ErrorKind::Execution),
                );
            }
            let Some(NamedType::Object(object_type)) = ctx.schema().named_type(&runtime_type_name) else {
                return fail(
                    ctx,
                    node,
                    path,
                    Error::new(format!(
                        "abstract type `{type_name}` resolved to unknown object type `{runtime_type_name}`"
                    ))
                    .with_kind(ErrorKind::Internal),
                );
            };
            let source = Arc::<crate::resolver::Source>::from(source);
            crate::task::execute_selection_set(Arc::clone(ctx), node, object_type, source, field_asts, path, cache)
                .await;
        }
    }
}
