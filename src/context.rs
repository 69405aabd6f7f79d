//! Per-operation execution context: the schema, coerced variables, the
//! error list, data-loader registry, and configuration shared by every field
//! task for one request.

use std::sync::Arc;

use arcstr::ArcStr;
use fnv::FnvHashMap;

use crate::{
    ast::{Document, FragmentDefinition, OperationDefinition, OperationType},
    data_loader::DataLoaderRegistry,
    error::{Error, ErrorList},
    input_value::Variables,
    resolver::{DefaultFieldResolver, Resolver},
    schema::Schema,
};

/// Builds a name-indexed lookup table of a document's fragment definitions,
/// resolved once per execution rather than scanned per fragment spread.
/// Keyed by trusted, short fragment names, so `fnv` is a better fit than the
/// default hasher.
#[must_use]
pub fn build_fragment_map(document: &Document) -> FnvHashMap<ArcStr, FragmentDefinition> {
    document.fragments().map(|fragment| (fragment.name.clone(), fragment.clone())).collect()
}

/// Tunables for one execution: a plain struct callers construct and pass
/// in, not a global.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// The chunk size new [`crate::result_tree::ResultNodeList`]s are
    /// allocated with.
    pub default_chunk_size: usize,
    /// An upper bound on concurrently in-flight field tasks for the
    /// query-parallel scheduler mode. `None` means unbounded.
    pub max_concurrent_tasks: Option<usize>,
    /// Whether execution emits `tracing` spans/events. Disabling this
    /// avoids span overhead for callers that don't collect traces.
    pub enable_tracing: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_chunk_size: crate::result_tree::DEFAULT_CHUNK_SIZE,
            max_concurrent_tasks: None,
            enable_tracing: false,
        }
    }
}

/// Everything field resolution needs that isn't specific to one field: the
/// schema, the request's coerced variables, the shared error list, and the
/// data-loader registry.
///
/// Held behind an `Arc` by every spawned field task: the one piece of
/// shared state every resolver call receives a reference to.
pub struct ExecutionContext {
    schema: Arc<dyn Schema>,
    variables: Variables,
    fragments: FnvHashMap<ArcStr, FragmentDefinition>,
    errors: ErrorList,
    data_loaders: DataLoaderRegistry,
    config: ExecutorConfig,
    default_resolver: Arc<dyn Resolver>,
}

impl ExecutionContext {
    /// Creates a fresh execution context for one operation, resolving
    /// fields with no field-specific resolver through [`DefaultFieldResolver`].
    #[must_use]
    pub fn new(
        schema: Arc<dyn Schema>,
        variables: Variables,
        fragments: FnvHashMap<ArcStr, FragmentDefinition>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            schema,
            variables,
            fragments,
            errors: ErrorList::new(),
            data_loaders: DataLoaderRegistry::new(),
            config,
            default_resolver: Arc::new(DefaultFieldResolver),
        }
    }

    /// Overrides the resolver used for fields with no field-specific
    /// resolver of their own.
    #[must_use]
    pub fn with_default_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.default_resolver = resolver;
        self
    }

    /// The resolver used for fields with no field-specific resolver.
    #[must_use]
    pub fn default_resolver(&self) -> &Arc<dyn Resolver> {
        &self.default_resolver
    }

    /// The document's fragment definitions, by name.
    #[must_use]
    pub fn fragments(&self) -> &FnvHashMap<ArcStr, FragmentDefinition> {
        &self.fragments
    }

    /// The schema being executed against.
    #[must_use]
    pub fn schema(&self) -> &Arc<dyn Schema> {
        &self.schema
    }

    /// The request's coerced variable bindings.
    #[must_use]
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// The shared, concurrency-safe error list for this execution.
    #[must_use]
    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    /// Records a field error against the shared error list.
    pub fn report_error(&self, error: Error) {
        self.errors.push(error);
    }

    /// The data-loader registry for this execution.
    #[must_use]
    pub fn data_loaders(&self) -> &DataLoaderRegistry {
        &self.data_loaders
    }

    /// This execution's tunables.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }
}

/// Selects the operation (by name, or the document's sole operation if
/// unnamed) and determines which scheduler mode it must run under.
///
/// # Errors
/// Returns an [`Error`] if no matching operation is found, or if the
/// document contains more than one operation and no `operation_name` was
/// given.
pub fn select_operation<'doc>(
    document: &'doc Document,
    operation_name: Option<&str>,
) -> Result<&'doc OperationDefinition, Error> {
    let mut operations = document.operations();
    match operation_name {
        Some(name) => operations
            .find(|op| op.name.as_deref() == Some(name))
            .ok_or_else(|| Error::new(format!("Unknown operation named \"{name}\"."))),
        None => {
            let first = operations.next().ok_or_else(|| Error::new("Must provide an operation."))?;
            if operations.next().is_some() {
                return Err(Error::new("Must provide operation name if query contains multiple operations."));
            }
            Ok(first)
        }
    }
}

/// Which scheduler mode an operation must execute under: queries may run
/// any of the three modes, but mutations must run
/// their top-level fields one at a time, in document order.
#[must_use]
pub fn required_scheduler_mode(operation: &OperationDefinition) -> RequiredMode {
    match operation.operation_type {
        OperationType::Mutation => RequiredMode::MutationSerial,
        OperationType::Query | OperationType::Subscription => RequiredMode::Any,
    }
}

/// The scheduler-mode constraint implied by an operation's type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequiredMode {
    /// Any of the three scheduler modes may run this operation.
    Any,
    /// Only the mutation-serial scheduler mode may run this operation.
    MutationSerial,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Definition;

    fn op(name: Option<&str>, operation_type: OperationType) -> Definition {
        Definition::Operation(OperationDefinition {
            operation_type,
            name: name.map(Into::into),
            selection_set: Vec::new(),
        })
    }

    #[test]
    fn selects_the_sole_operation_when_unnamed() {
        let doc = Document { definitions: vec![op(None, OperationType::Query)] };
        let selected = select_operation(&doc, None).unwrap();
        assert_eq!(selected.operation_type, OperationType::Query);
    }

    #[test]
    fn requires_a_name_when_multiple_operations_are_present() {
        let doc = Document {
            definitions: vec![op(Some("A"), OperationType::Query), op(Some("B"), OperationType::Query)],
        };
        let error = select_operation(&doc, None).unwrap_err();
        assert_eq!(error.message(), "Must provide operation name if query contains multiple operations.");
        assert!(select_operation(&doc, Some("B")).is_ok());
    }

    #[test]
    fn an_empty_document_requires_an_operation() {
        let doc = Document { definitions: Vec::new() };
        let error = select_operation(&doc, None).unwrap_err();
        assert_eq!(error.message(), "Must provide an operation.");
    }

    #[test]
    fn an_unknown_operation_name_is_reported_by_name() {
        let doc = Document { definitions: vec![op(Some("A"), OperationType::Query)] };
        let error = select_operation(&doc, Some("B")).unwrap_err();
        assert_eq!(error.message(), "Unknown operation named \"B\".");
    }

    #[test]
    fn mutations_require_serial_scheduling() {
        let op = OperationDefinition {
            operation_type: OperationType::Mutation,
            name: None,
            selection_set: Vec::new(),
        };
        assert_eq!(required_scheduler_mode(&op), RequiredMode::MutationSerial);
    }
}
