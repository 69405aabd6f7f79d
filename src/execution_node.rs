//! Execution nodes: per-field intermediate records produced by field
//! collection, plus [`SelectionCache`], which memoizes collection itself per
//! runtime object type so that repeated visits to the same concrete type
//! (typically: many elements of the same list sharing one element type)
//! don't redo the fragment/directive walk.

use std::sync::{Arc, Mutex};

use arcstr::ArcStr;
use fnv::FnvHashMap;
use indexmap::IndexMap;

use crate::{
    ast::{FieldNode, FragmentDefinition, Selection},
    input_value::{InputValue, Variables},
    path::ResponsePath,
    schema::{FieldDefinition, ObjectType, Schema},
};

/// One field position in the execution graph: the merged AST nodes for this
/// response key, the resolved field definition, and the coerced arguments
/// to invoke it with.
pub struct ExecutionNode {
    /// The runtime object type this field was collected against.
    pub parent_type_name: ArcStr,
    /// The response key (alias or field name) this node occupies.
    pub response_key: ArcStr,
    /// Every AST field node that coalesced into this response key (more
    /// than one when the same alias/name was selected through multiple
    /// fragments).
    pub field_asts: Vec<Arc<FieldNode>>,
    /// The schema's field definition for this field, resolved once.
    pub field_definition: Arc<dyn FieldDefinition>,
    /// The field's arguments, coerced (variables resolved, defaults
    /// applied by the caller-supplied coercion) ahead of resolver
    /// invocation.
    pub arguments: IndexMap<ArcStr, InputValue>,
    /// The response path leading to this field.
    pub path: Arc<ResponsePath>,
}

impl ExecutionNode {
    /// Builds the execution node for one collected response key against
    /// `object_type`, coercing arguments against `variables`.
    ///
    /// Returns `None` when the runtime type declares no field by this name —
    /// the collector only filters by type condition, not by field
    /// existence, so this is the point where a field absent from the
    /// runtime type (a schema/collector mismatch) is finally dropped,
    /// leaving its result-tree slot `Pending` rather than executing it.
    #[must_use]
    pub fn collect(
        object_type: &dyn ObjectType,
        response_key: ArcStr,
        field_asts: Vec<Arc<FieldNode>>,
        path: Arc<ResponsePath>,
        variables: &Variables,
    ) -> Option<Self> {
        let primary = &field_asts[0];
        let field_definition = object_type.field(&primary.name)?;
        let arguments = primary
            .arguments
            .iter()
            .map(|(name, value)| (name.clone(), value.resolve_variables(variables)))
            .collect();
        Some(Self {
            parent_type_name: object_type.name().into(),
            response_key,
            field_asts,
            field_definition,
            arguments,
            path,
        })
    }

    /// The representative AST field node for this position (the first of
    /// the coalesced set), used where only one location/selection-set is
    /// needed, e.g. directive evaluation already applied during collection.
    #[must_use]
    pub fn primary_field_ast(&self) -> &Arc<FieldNode> {
        &self.field_asts[0]
    }

    /// The merged selection set across every coalesced AST field node —
    /// GraphQL field merging requires that same-key selections combine
    /// their sub-selections rather than one shadowing another.
    pub fn merged_selection_set(&self) -> impl Iterator<Item = &crate::ast::Selection> {
        self.field_asts.iter().flat_map(|field| field.selection_set.iter())
    }
}

/// Caches one selection set's collected-fields result per runtime object
/// type, for the duration of a single field's value completion.
///
/// A field that resolves to a list of objects/abstract values shares one
/// [`SelectionCache`] across every element it completes: elements of the
/// same concrete type hit the cache and skip [`crate::collector::collect_fields`]
/// entirely, instead of redoing the directive/fragment walk once per
/// element. A field that resolves to a single object still goes through the
/// same cache, just with exactly one insert and no reuse.
#[derive(Default)]
pub struct SelectionCache {
    by_runtime_type: Mutex<FnvHashMap<ArcStr, Arc<IndexMap<ArcStr, Vec<Arc<FieldNode>>>>>>,
}

impl SelectionCache {
    /// Returns the collected fields for `runtime_type_name` against
    /// `selection_set`, from cache on a repeat visit or by collecting fresh
    /// and caching the result otherwise.
    pub fn get_or_collect(
        &self,
        schema: &dyn Schema,
        runtime_type_name: &str,
        selection_set: &[Selection],
        fragments: &FnvHashMap<ArcStr, &FragmentDefinition>,
        variables: &Variables,
    ) -> Arc<IndexMap<ArcStr, Vec<Arc<FieldNode>>>> {
        let mut cache = self.by_runtime_type.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(cached) = cache.get(runtime_type_name) {
            return Arc::clone(cached);
        }
        let collected =
            Arc::new(crate::collector::collect_fields(schema, runtime_type_name, selection_set, fragments, variables));
        cache.insert(runtime_type_name.into(), Arc::clone(&collected));
        collected
    }
}
