#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(any(doc, test), doc = include_str!("../README.md"))]
#![cfg_attr(not(any(doc, test)), doc = env!("CARGO_PKG_NAME"))]

pub mod ast;
pub mod async_value;
pub mod collector;
pub mod context;
pub mod data_loader;
pub mod error;
pub mod execution_node;
pub mod input_value;
pub mod path;
pub mod resolver;
pub mod response;
pub mod result_tree;
pub mod schema;
pub mod scheduler;
pub mod task;
pub mod value;
pub mod value_completion;
pub mod worker_pool;

use std::sync::Arc;

use arcstr::ArcStr;
use fnv::FnvHashMap;

pub use crate::{
    ast::{Document, OperationDefinition, OperationType},
    context::{ExecutionContext, ExecutorConfig, RequiredMode},
    error::{Error, ErrorKind},
    input_value::Variables,
    resolver::{Resolver, Source},
    response::Response,
    schema::{ObjectType, Schema},
};

/// A selected operation, ready to run against a root value: the result of
/// `prepare()`'s document/operation selection, before any field has been
/// touched.
///
/// Preparation is intentionally cheap and synchronous — it only resolves
/// which operation to run and which scheduler mode it must use. Argument
/// and variable coercion, field collection, and resolution all happen once
/// [`PreparedOperation::execute`] actually runs.
pub struct PreparedOperation {
    schema: Arc<dyn Schema>,
    operation: OperationDefinition,
    fragments: FnvHashMap<ArcStr, crate::ast::FragmentDefinition>,
    required_mode: RequiredMode,
    default_resolver: Option<Arc<dyn Resolver>>,
}

/// Prepares one operation from `document` for execution against `schema`.
///
/// # Errors
/// Returns an [`Error`] if `operation_name` doesn't match any operation in
/// the document, or if the document contains multiple operations and no
/// name was given to disambiguate — a preparation error is returned
/// out-of-band, with no result tree produced.
pub fn prepare(
    schema: Arc<dyn Schema>,
    document: &Document,
    operation_name: Option<&str>,
) -> Result<PreparedOperation, Error> {
    let operation = context::select_operation(document, operation_name)?.clone();
    match operation.operation_type {
        OperationType::Query => {}
        OperationType::Mutation if schema.mutation_type().is_some() => {}
        OperationType::Subscription if schema.subscription_type().is_some() => {}
        OperationType::Mutation => return Err(Error::new("Schema is not configured for mutations.")),
        OperationType::Subscription => return Err(Error::new("Schema is not configured for subscriptions.")),
    }
    let required_mode = context::required_scheduler_mode(&operation);
    let fragments = context::build_fragment_map(document);
    Ok(PreparedOperation { schema, operation, fragments, required_mode, default_resolver: None })
}

impl PreparedOperation {
    /// Overrides the resolver used for fields with no field-specific
    /// resolver of their own.
    #[must_use]
    pub fn with_default_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.default_resolver = Some(resolver);
        self
    }

    /// The scheduler-mode constraint this operation's type implies.
    #[must_use]
    pub fn required_mode(&self) -> RequiredMode {
        self.required_mode
    }

    /// Runs this operation to completion against `root_value`, returning a
    /// channel that yields exactly one response.
    ///
    /// A query or subscription runs under `options.scheduler`, or the
    /// blocking scheduler if none is given; a mutation always runs under
    /// the mutation-serial scheduler regardless of `options.scheduler`,
    /// since GraphQL forbids reordering or overlapping mutation root
    /// fields.
    #[cfg(feature = "tokio-runtime")]
    pub fn execute(
        &self,
        root_value: Arc<Source>,
        options: ExecuteOptions,
    ) -> tokio::sync::oneshot::Receiver<Response> {
        let (tx, rx) = tokio::sync::oneshot::channel();

        // `prepare()` already rejected a mutation/subscription operation against a
        // schema with no matching root type, so the `expect`s below are unreachable.
        let root_type = match self.operation.operation_type {
            OperationType::Query => self.schema.query_type(),
            OperationType::Mutation => {
                self.schema.mutation_type().expect("prepare() validates the mutation root type exists")
            }
            OperationType::Subscription => {
                self.schema.subscription_type().expect("prepare() validates the subscription root type exists")
            }
        };

        let mut ctx = ExecutionContext::new(
            Arc::clone(&self.schema),
            options.variables,
            self.fragments.clone(),
            options.config,
        );
        if let Some(resolver) = self.default_resolver.clone() {
            ctx = ctx.with_default_resolver(resolver);
        }
        let ctx = Arc::new(ctx);
        for (name, loader) in options.data_loaders {
            ctx.data_loaders().register(name, loader);
        }

        let scheduler: Box<dyn scheduler::Scheduler> = match self.required_mode {
            RequiredMode::MutationSerial => Box::new(scheduler::MutationSerialScheduler),
            RequiredMode::Any => match options.worker_pool {
                Some(pool) => Box::new(scheduler::QueryParallelScheduler::new(pool)),
                None => Box::new(scheduler::BlockingScheduler),
            },
        };

        let tree = Arc::new(result_tree::ResultTree::new());
        let selection_set = self.operation.selection_set.clone();

        tokio::spawn(async move {
            scheduler.run(Arc::clone(&ctx), Arc::clone(&tree), root_type, root_value, selection_set).await;
            let response = response::build_response(unsafe { &*tree.root() }, ctx.errors().snapshot());
            let _ = tx.send(response);
        });

        rx
    }
}

/// Tunables for one [`PreparedOperation::execute`] call.
#[cfg(feature = "tokio-runtime")]
#[derive(Default)]
pub struct ExecuteOptions {
    /// The request's coerced `$variables` bindings.
    pub variables: Variables,
    /// Execution tunables (chunk size, concurrency bound, tracing).
    pub config: ExecutorConfig,
    /// The worker pool query-parallel scheduling fans root fields out onto.
    /// Ignored for mutations, which always run serially.
    pub worker_pool: Option<Arc<dyn worker_pool::WorkerPool>>,
    /// Data loaders to register for cycle dispatch during this execution,
    /// by name.
    pub data_loaders: Vec<(&'static str, Arc<dyn data_loader::DispatchableLoader>)>,
}
