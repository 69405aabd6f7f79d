//! End-to-end scenarios driving `prepare`/`execute` against small in-memory
//! schemas, covering the testable properties around directive filtering,
//! non-null propagation, abstract-type resolution, data-loader coalescing,
//! mutation ordering, and out-of-order async completion.

use std::{
    any::Any,
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use arcstr::ArcStr;
use async_trait::async_trait;
use indexmap::IndexMap;

use gql_exec_core::{
    ast::{
        Definition, Directive, Document, FieldNode, InlineFragmentNode, OperationDefinition,
        OperationType, Selection, TypeRef,
    },
    async_value::TokioAsyncValue,
    context::ExecutionContext,
    data_loader::{DataLoader, DispatchableLoader, Loader},
    error::{Error, SourceLocation},
    input_value::InputValue,
    prepare,
    resolver::{AsyncFnResolver, FnResolver, ResolveInfo, Resolved, Resolver, Source},
    schema::{AbstractType, FieldDefinition, LeafType, NamedType, ObjectType, ResolvedType, Schema},
    value::Value,
    worker_pool::{TokioWorkerPool, WorkerPool},
    ExecuteOptions,
};
use pretty_assertions::assert_eq;

// --- small, reusable schema-building helpers -------------------------------

struct StringType;
impl LeafType for StringType {
    fn name(&self) -> &str {
        "String"
    }
    fn coerce_result_value(&self, value: &dyn Any) -> Result<Value, Error> {
        value
            .downcast_ref::<String>()
            .cloned()
            .map(Value::String)
            .ok_or_else(|| Error::new("expected a String"))
    }
}

struct IntType;
impl LeafType for IntType {
    fn name(&self) -> &str {
        "Int"
    }
    fn coerce_result_value(&self, value: &dyn Any) -> Result<Value, Error> {
        value
            .downcast_ref::<i64>()
            .copied()
            .map(Value::Int)
            .ok_or_else(|| Error::new("expected an Int"))
    }
}

struct BooleanType;
impl LeafType for BooleanType {
    fn name(&self) -> &str {
        "Boolean"
    }
    fn coerce_result_value(&self, value: &dyn Any) -> Result<Value, Error> {
        value
            .downcast_ref::<bool>()
            .copied()
            .map(Value::Boolean)
            .ok_or_else(|| Error::new("expected a Boolean"))
    }
}

struct Field {
    name: &'static str,
    return_type: TypeRef,
    resolver: Arc<dyn Resolver>,
}

impl FieldDefinition for Field {
    fn name(&self) -> &str {
        self.name
    }
    fn return_type(&self) -> &TypeRef {
        &self.return_type
    }
    fn argument_type(&self, _name: &str) -> Option<&TypeRef> {
        None
    }
    fn resolver(&self) -> Option<Arc<dyn Resolver>> {
        Some(Arc::clone(&self.resolver))
    }
}

struct Object {
    name: &'static str,
    fields: HashMap<&'static str, Arc<dyn FieldDefinition>>,
}

impl ObjectType for Object {
    fn name(&self) -> &str {
        self.name
    }
    fn field(&self, name: &str) -> Option<Arc<dyn FieldDefinition>> {
        self.fields.get(name).cloned()
    }
}

fn object(name: &'static str, fields: Vec<(&'static str, TypeRef, Arc<dyn Resolver>)>) -> Arc<Object> {
    Arc::new(Object {
        name,
        fields: fields
            .into_iter()
            .map(|(field_name, return_type, resolver)| {
                (field_name, Arc::new(Field { name: field_name, return_type, resolver }) as Arc<dyn FieldDefinition>)
            })
            .collect(),
    })
}

struct TestSchema {
    query: Arc<Object>,
    mutation: Option<Arc<Object>>,
    objects: HashMap<&'static str, Arc<Object>>,
    abstracts: HashMap<&'static str, Arc<dyn AbstractType>>,
    possible: HashMap<&'static str, Vec<ArcStr>>,
}

impl Schema for TestSchema {
    fn query_type(&self) -> Arc<dyn ObjectType> {
        Arc::clone(&self.query) as Arc<dyn ObjectType>
    }
    fn mutation_type(&self) -> Option<Arc<dyn ObjectType>> {
        self.mutation.clone().map(|m| m as Arc<dyn ObjectType>)
    }
    fn subscription_type(&self) -> Option<Arc<dyn ObjectType>> {
        None
    }
    fn named_type(&self, name: &str) -> Option<NamedType> {
        match name {
            "String" => Some(NamedType::Leaf(Arc::new(StringType))),
            "Int" => Some(NamedType::Leaf(Arc::new(IntType))),
            "Boolean" => Some(NamedType::Leaf(Arc::new(BooleanType))),
            _ => self
                .objects
                .get(name)
                .map(|o| NamedType::Object(Arc::clone(o) as Arc<dyn ObjectType>))
                .or_else(|| self.abstracts.get(name).map(|a| NamedType::Abstract(Arc::clone(a)))),
        }
    }
    fn possible_types(&self, abstract_type_name: &str) -> &[ArcStr] {
        self.possible.get(abstract_type_name).map_or(&[], |types| types.as_slice())
    }
}

fn named(name: &str) -> TypeRef {
    TypeRef::Named(name.into())
}

fn non_null(inner: TypeRef) -> TypeRef {
    TypeRef::NonNull(Box::new(inner))
}

fn field_node(alias: Option<&str>, name: &str, directives: Vec<Directive>, selection_set: Vec<Selection>) -> Arc<FieldNode> {
    Arc::new(FieldNode {
        alias: alias.map(Into::into),
        name: name.into(),
        arguments: IndexMap::new(),
        directives,
        selection_set,
        location: SourceLocation { line: 1, column: 1 },
    })
}

fn skip_if(condition: bool) -> Directive {
    let mut arguments = IndexMap::new();
    arguments.insert("if".into(), InputValue::Boolean(condition));
    Directive { name: "skip".into(), arguments }
}

fn document(operation_type: OperationType, selection_set: Vec<Selection>) -> Document {
    Document {
        definitions: vec![Definition::Operation(OperationDefinition { operation_type, name: None, selection_set })],
    }
}

fn unit_source() -> Arc<Source> {
    Arc::new(()) as Arc<Source>
}

fn leaf_resolver<T: Any + Send + Sync + Clone>(value: T) -> Arc<dyn Resolver> {
    Arc::new(FnResolver(move |_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| Resolved::leaf(value.clone())))
}

// --- 1. directive filtering -------------------------------------------------

#[tokio::test]
async fn skip_and_include_directives_filter_fields() {
    let schema = Arc::new(TestSchema {
        query: object("Query", vec![("greeting", named("String"), leaf_resolver("hi".to_string()))]),
        mutation: None,
        objects: HashMap::new(),
        abstracts: HashMap::new(),
        possible: HashMap::new(),
    }) as Arc<dyn Schema>;

    let doc = document(
        OperationType::Query,
        vec![
            Selection::Field(field_node(Some("kept"), "greeting", vec![], vec![])),
            Selection::Field(field_node(Some("skipped"), "greeting", vec![skip_if(true)], vec![])),
        ],
    );

    let prepared = prepare(schema, &doc, None).unwrap();
    let response = prepared.execute(unit_source(), ExecuteOptions::default()).await.unwrap();

    assert!(!response.has_errors());
    assert_eq!(response.data(), &serde_json::json!({"kept": "hi"}));
}

// --- 2. non-null propagation all the way to the response root --------------

#[tokio::test]
async fn non_null_field_failure_nulls_the_whole_response() {
    let null_resolver: Arc<dyn Resolver> =
        Arc::new(FnResolver(|_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| Resolved::Null));
    let schema = Arc::new(TestSchema {
        query: object("Query", vec![("mustWork", non_null(named("String")), null_resolver)]),
        mutation: None,
        objects: HashMap::new(),
        abstracts: HashMap::new(),
        possible: HashMap::new(),
    }) as Arc<dyn Schema>;

    let doc = document(OperationType::Query, vec![Selection::Field(field_node(None, "mustWork", vec![], vec![]))]);

    let prepared = prepare(schema, &doc, None).unwrap();
    let response = prepared.execute(unit_source(), ExecuteOptions::default()).await.unwrap();

    assert!(response.has_errors());
    assert_eq!(response.data(), &serde_json::Value::Null, "non-null failure with no nullable ancestor nulls the root");
}

// --- 3. a nullable ancestor absorbs a non-null child's failure --------------

#[tokio::test]
async fn nullable_object_field_absorbs_non_null_child_failure() {
    let null_resolver: Arc<dyn Resolver> =
        Arc::new(FnResolver(|_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| Resolved::Null));
    let widget = object("Widget", vec![("mustWork", non_null(named("String")), null_resolver)]);
    let widget_resolver: Arc<dyn Resolver> =
        Arc::new(FnResolver(|_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| Resolved::object(())));

    let schema = Arc::new(TestSchema {
        query: object(
            "Query",
            vec![
                ("wrapper", named("Widget"), widget_resolver),
                ("sibling", named("String"), leaf_resolver("still here".to_string())),
            ],
        ),
        mutation: None,
        objects: HashMap::from([("Widget", widget)]),
        abstracts: HashMap::new(),
        possible: HashMap::new(),
    }) as Arc<dyn Schema>;

    let doc = document(
        OperationType::Query,
        vec![
            Selection::Field(field_node(
                None,
                "wrapper",
                vec![],
                vec![Selection::Field(field_node(None, "mustWork", vec![], vec![]))],
            )),
            Selection::Field(field_node(None, "sibling", vec![], vec![])),
        ],
    );

    let prepared = prepare(schema, &doc, None).unwrap();
    let response = prepared.execute(unit_source(), ExecuteOptions::default()).await.unwrap();

    assert!(response.has_errors());
    assert_eq!(response.data(), &serde_json::json!({"wrapper": null, "sibling": "still here"}));
}

// --- 4. abstract type resolution picks the matching inline fragment --------

struct CatSource {
    name: String,
}
struct DogSource;

struct AnimalAbstract;
impl AbstractType for AnimalAbstract {
    fn name(&self) -> &str {
        "Animal"
    }
    fn resolve_type(&self, source: &dyn Any) -> ResolvedType {
        if source.is::<CatSource>() {
            ResolvedType::Resolved("Cat".into())
        } else if source.is::<DogSource>() {
            ResolvedType::Resolved("Dog".into())
        } else if source.is::<HumanSource>() {
            ResolvedType::Resolved("Human".into())
        } else {
            ResolvedType::Unresolvable
        }
    }
}
struct HumanSource;

#[tokio::test]
async fn abstract_type_resolves_to_the_matching_concrete_object() {
    let animal_resolver: Arc<dyn Resolver> = Arc::new(FnResolver(|_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| {
        Resolved::object(CatSource { name: "Felix".to_string() })
    }));
    let cat_name_resolver: Arc<dyn Resolver> = Arc::new(FnResolver(|_: &ExecutionContext, source: &Source, _: &ResolveInfo<'_>| {
        let cat = source.downcast_ref::<CatSource>().expect("source is a CatSource");
        Resolved::leaf(cat.name.clone())
    }));
    let dog_bark_resolver: Arc<dyn Resolver> =
        Arc::new(FnResolver(|_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| Resolved::leaf("woof".to_string())));

    let cat = object("Cat", vec![("name", named("String"), cat_name_resolver)]);
    let dog = object("Dog", vec![("bark", named("String"), dog_bark_resolver)]);

    let schema = Arc::new(TestSchema {
        query: object("Query", vec![("animal", named("Animal"), animal_resolver)]),
        mutation: None,
        objects: HashMap::from([("Cat", cat), ("Dog", dog)]),
        abstracts: HashMap::from([("Animal", Arc::new(AnimalAbstract) as Arc<dyn AbstractType>)]),
        possible: HashMap::from([("Animal", vec![ArcStr::from("Cat"), ArcStr::from("Dog")])]),
    }) as Arc<dyn Schema>;

    let doc = document(
        OperationType::Query,
        vec![Selection::Field(field_node(
            None,
            "animal",
            vec![],
            vec![
                Selection::InlineFragment(Arc::new(InlineFragmentNode {
                    type_condition: Some("Cat".into()),
                    directives: vec![],
                    selection_set: vec![Selection::Field(field_node(None, "name", vec![], vec![]))],
                })),
                Selection::InlineFragment(Arc::new(InlineFragmentNode {
                    type_condition: Some("Dog".into()),
                    directives: vec![],
                    selection_set: vec![Selection::Field(field_node(None, "bark", vec![], vec![]))],
                })),
            ],
        ))],
    );

    let prepared = prepare(schema, &doc, None).unwrap();
    let response = prepared.execute(unit_source(), ExecuteOptions::default()).await.unwrap();

    assert!(!response.has_errors());
    assert_eq!(response.data(), &serde_json::json!({"animal": {"name": "Felix"}}), "only the Cat fragment should have run");
}

#[tokio::test]
async fn abstract_type_resolving_outside_possible_types_fails() {
    let animal_resolver: Arc<dyn Resolver> =
        Arc::new(FnResolver(|_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| Resolved::object(HumanSource)));

    let schema = Arc::new(TestSchema {
        query: object("Query", vec![("animal", named("Animal"), animal_resolver)]),
        mutation: None,
        objects: HashMap::new(),
        abstracts: HashMap::from([("Animal", Arc::new(AnimalAbstract) as Arc<dyn AbstractType>)]),
        possible: HashMap::from([("Animal", vec![ArcStr::from("Cat"), ArcStr::from("Dog")])]),
    }) as Arc<dyn Schema>;

    let doc = document(
        OperationType::Query,
        vec![Selection::Field(field_node(
            None,
            "animal",
            vec![],
            vec![Selection::InlineFragment(Arc::new(InlineFragmentNode {
                type_condition: Some("Cat".into()),
                directives: vec![],
                selection_set: vec![Selection::Field(field_node(None, "name", vec![], vec![]))],
            }))],
        ))],
    );

    let prepared = prepare(schema, &doc, None).unwrap();
    let response = prepared.execute(unit_source(), ExecuteOptions::default()).await.unwrap();

    assert!(response.has_errors());
    assert_eq!(response.data(), &serde_json::json!({"animal": null}));
    let messages: Vec<&str> = response.errors().iter().map(Error::message).collect();
    assert_eq!(messages, vec!["Runtime Object type \"Human\" is not a possible type for \"Animal\"."]);
}

// --- 5. data-loader coalescing across concurrently suspended siblings ------

struct CountingLoader {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Loader for CountingLoader {
    type Key = i64;
    type Value = i64;

    async fn load(&self, keys: &[i64]) -> Vec<Result<i64, Error>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        keys.iter().map(|k| Ok(k * 10)).collect()
    }
}

#[tokio::test]
async fn data_loader_coalesces_concurrent_sibling_loads_into_one_batch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = Arc::new(DataLoader::new(CountingLoader { calls: Arc::clone(&calls) }));

    let loader_a = Arc::clone(&loader);
    let a_resolver: Arc<dyn Resolver> =
        Arc::new(FnResolver(move |_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| Resolved::Async(Box::new(loader_a.load(1)))));
    let loader_b = Arc::clone(&loader);
    let b_resolver: Arc<dyn Resolver> =
        Arc::new(FnResolver(move |_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| Resolved::Async(Box::new(loader_b.load(2)))));

    let schema = Arc::new(TestSchema {
        query: object("Query", vec![("a", named("Int"), a_resolver), ("b", named("Int"), b_resolver)]),
        mutation: None,
        objects: HashMap::new(),
        abstracts: HashMap::new(),
        possible: HashMap::new(),
    }) as Arc<dyn Schema>;

    let doc = document(
        OperationType::Query,
        vec![Selection::Field(field_node(None, "a", vec![], vec![])), Selection::Field(field_node(None, "b", vec![], vec![]))],
    );

    let prepared = prepare(schema, &doc, None).unwrap();
    let options = ExecuteOptions {
        worker_pool: Some(Arc::new(TokioWorkerPool) as Arc<dyn WorkerPool>),
        data_loaders: vec![("widgets", loader as Arc<dyn DispatchableLoader>)],
        ..Default::default()
    };
    let response = prepared.execute(unit_source(), options).await.unwrap();

    assert!(!response.has_errors());
    assert_eq!(response.data(), &serde_json::json!({"a": 10, "b": 20}));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "both sibling loads must coalesce into a single batch call");
}

// --- 6. mutation root fields never overlap ----------------------------------

#[tokio::test]
async fn mutation_root_fields_run_serially_in_document_order() {
    let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    let log_first = Arc::clone(&log);
    let first_resolver: Arc<dyn Resolver> = Arc::new(AsyncFnResolver(move |_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| {
        let log = Arc::clone(&log_first);
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            log.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push("first");
            Resolved::leaf(true)
        }
    }));
    let log_second = Arc::clone(&log);
    let second_resolver: Arc<dyn Resolver> = Arc::new(AsyncFnResolver(move |_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| {
        let log = Arc::clone(&log_second);
        async move {
            log.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push("second");
            Resolved::leaf(true)
        }
    }));

    let schema = Arc::new(TestSchema {
        query: object("Query", vec![]),
        mutation: Some(object("Mutation", vec![("first", named("Boolean"), first_resolver), ("second", named("Boolean"), second_resolver)])),
        objects: HashMap::new(),
        abstracts: HashMap::new(),
        possible: HashMap::new(),
    }) as Arc<dyn Schema>;

    let doc = document(
        OperationType::Mutation,
        vec![Selection::Field(field_node(None, "first", vec![], vec![])), Selection::Field(field_node(None, "second", vec![], vec![]))],
    );

    let prepared = prepare(schema, &doc, None).unwrap();
    let response = prepared.execute(unit_source(), ExecuteOptions::default()).await.unwrap();

    assert!(!response.has_errors());
    assert_eq!(*log.lock().unwrap_or_else(std::sync::PoisonError::into_inner), vec!["first", "second"]);
}

// --- 7. out-of-order async completion still assembles the correct tree -----

#[tokio::test]
async fn concurrent_async_fields_assemble_correctly_regardless_of_completion_order() {
    let slow_resolver: Arc<dyn Resolver> = Arc::new(FnResolver(|_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| {
        Resolved::Async(Box::new(TokioAsyncValue::spawn(async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Resolved::leaf(1_i64)
        })))
    }));
    let fast_resolver: Arc<dyn Resolver> = Arc::new(FnResolver(|_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| {
        Resolved::Async(Box::new(TokioAsyncValue::spawn(async { Resolved::leaf(2_i64) })))
    }));
    let container_resolver: Arc<dyn Resolver> =
        Arc::new(FnResolver(|_: &ExecutionContext, _: &Source, _: &ResolveInfo<'_>| Resolved::object(())));

    let container = object("Container", vec![("slow", named("Int"), slow_resolver), ("fast", named("Int"), fast_resolver)]);
    let schema = Arc::new(TestSchema {
        query: object("Query", vec![("container", named("Container"), container_resolver)]),
        mutation: None,
        objects: HashMap::from([("Container", container)]),
        abstracts: HashMap::new(),
        possible: HashMap::new(),
    }) as Arc<dyn Schema>;

    let doc = document(
        OperationType::Query,
        vec![Selection::Field(field_node(
            None,
            "container",
            vec![],
            vec![
                Selection::Field(field_node(None, "slow", vec![], vec![])),
                Selection::Field(field_node(None, "fast", vec![], vec![])),
            ],
        ))],
    );

    let prepared = prepare(schema, &doc, None).unwrap();
    let started = std::time::Instant::now();
    let response = prepared.execute(unit_source(), ExecuteOptions::default()).await.unwrap();

    assert!(!response.has_errors());
    assert_eq!(response.data(), &serde_json::json!({"container": {"slow": 1, "fast": 2}}));
    assert!(started.elapsed() < Duration::from_millis(60), "fast's completion must not be blocked behind slow's");
}
