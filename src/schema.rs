//! The external schema interfaces the execution core is generic over.
//!
//! Schema construction, the type registry, and introspection type
//! definitions are out of scope — these traits spell out exactly the
//! surface the core reads from a caller-supplied schema, the same boundary
//! a macro-driven schema builder would sit behind for its own executor.
//!
//! Every type record is handed out as an `Arc`, not a borrow: the schema
//! forms cycles (fields on interfaces reference objects which reference
//! interfaces) and individual field-execution tasks, dispatched onto a
//! worker pool, need `'static` handles to the type records they close over.
//! Possible-types relations live on the schema itself rather than on each
//! abstract type record, keeping type construction acyclic.

use std::{fmt, sync::Arc};

use arcstr::ArcStr;

use crate::{ast::TypeRef, error::Error, resolver::Resolver, value::Value};

/// A validated schema: root types, named-type lookup, and possible-types
/// enumeration for abstract types.
pub trait Schema: Send + Sync {
    /// The query root object type.
    fn query_type(&self) -> Arc<dyn ObjectType>;

    /// The mutation root object type, if the schema defines one.
    fn mutation_type(&self) -> Option<Arc<dyn ObjectType>>;

    /// The subscription root object type, if the schema defines one.
    fn subscription_type(&self) -> Option<Arc<dyn ObjectType>>;

    /// Looks up any named type (object, interface, union, scalar, enum, or
    /// input object) by name.
    fn named_type(&self, name: &str) -> Option<NamedType>;

    /// The possible concrete object types for an abstract (interface or
    /// union) type, by name.
    fn possible_types(&self, abstract_type_name: &str) -> &[ArcStr];

    /// Whether `object_type_name` is a possible type of the named abstract
    /// type (or is the abstract type's own name, for object-on-object
    /// fragment matching).
    fn is_possible_type(&self, abstract_type_name: &str, object_type_name: &str) -> bool {
        abstract_type_name == object_type_name
            || self.possible_types(abstract_type_name).iter().any(|t| t == object_type_name)
    }
}

/// A named schema type, downcast to whichever shape matters to the
/// execution core for type-condition matching and value completion.
#[derive(Clone)]
pub enum NamedType {
    /// A concrete object type.
    Object(Arc<dyn ObjectType>),
    /// An interface or union type.
    Abstract(Arc<dyn AbstractType>),
    /// A scalar or enum (leaf) type.
    Leaf(Arc<dyn LeafType>),
}

impl NamedType {
    /// This type's name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Object(o) => o.name(),
            Self::Abstract(a) => a.name(),
            Self::Leaf(l) => l.name(),
        }
    }
}

impl fmt::Debug for NamedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamedType({})", self.name())
    }
}

/// A concrete GraphQL object type: a name and a field map.
pub trait ObjectType: Send + Sync {
    /// The object type's name.
    fn name(&self) -> &str;

    /// Looks up a field definition by name. Returns `None` for fields not
    /// declared on this type — the collector silently drops those selections.
    fn field(&self, name: &str) -> Option<Arc<dyn FieldDefinition>>;
}

/// A field definition: return type, declared arguments, and an optional
/// field-specific resolver.
pub trait FieldDefinition: Send + Sync {
    /// The field's name.
    fn name(&self) -> &str;

    /// The field's declared return type.
    fn return_type(&self) -> &TypeRef;

    /// The field's declared argument types, by name.
    fn argument_type(&self, name: &str) -> Option<&TypeRef>;

    /// The field's own resolver, if it has one distinct from the operation's
    /// default field resolver.
    fn resolver(&self) -> Option<Arc<dyn Resolver>>;
}

/// An interface or union type: a name and an optional runtime-type resolver.
pub trait AbstractType: Send + Sync {
    /// The abstract type's name.
    fn name(&self) -> &str;

    /// Resolves the concrete object type name for a given source value.
    ///
    /// Distinguishes "no resolver configured at all" from "the configured
    /// resolver ran and returned no match", since those are two different
    /// spec-mandated error messages.
    fn resolve_type(&self, source: &dyn std::any::Any) -> ResolvedType;
}

/// The outcome of [`AbstractType::resolve_type`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedType {
    /// The resolver matched `source` to this concrete object type name.
    Resolved(ArcStr),
    /// A resolver is configured, but it returned no match for `source`.
    Unresolvable,
    /// This abstract type has no runtime-type resolver configured.
    NoResolver,
}

/// A scalar or enum (leaf) type: only result-value coercion matters to
/// execution.
pub trait LeafType: Send + Sync {
    /// The leaf type's name, for error messages.
    fn name(&self) -> &str;

    /// Coerces a resolver-produced value into a serialization-ready
    /// [`Value`].
    fn coerce_result_value(&self, value: &dyn std::any::Any) -> Result<Value, Error>;
}
