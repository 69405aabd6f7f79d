//! Minimal read-only AST the execution core consumes.
//!
//! Document parsing and static validation are out of scope: callers hand
//! the core an already-validated [`Document`]. These types exist only so
//! the core has something concrete to traverse; they carry no parsing or
//! validation logic of their own — just the shapes an already parsed and
//! validated document takes.

use std::sync::Arc;

use arcstr::ArcStr;
use indexmap::IndexMap;

use crate::{error::SourceLocation, input_value::InputValue};

/// A parsed, statically-validated GraphQL document: a flat list of
/// operation and fragment definitions in source order.
#[derive(Clone, Debug, Default)]
pub struct Document {
    /// Definitions in source order.
    pub definitions: Vec<Definition>,
}

impl Document {
    /// Iterates over the operation definitions in source order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.definitions.iter().filter_map(|d| match d {
            Definition::Operation(op) => Some(op),
            Definition::Fragment(_) => None,
        })
    }

    /// Iterates over the fragment definitions in source order.
    pub fn fragments(&self) -> impl Iterator<Item = &FragmentDefinition> {
        self.definitions.iter().filter_map(|d| match d {
            Definition::Fragment(f) => Some(f),
            Definition::Operation(_) => None,
        })
    }
}

/// A top-level definition: either an operation or a named fragment.
#[derive(Clone, Debug)]
pub enum Definition {
    /// An operation (`query`/`mutation`/`subscription`) definition.
    Operation(OperationDefinition),
    /// A named (`fragment Name on Type { ... }`) fragment definition.
    Fragment(FragmentDefinition),
}

/// The three operation kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationType {
    /// `query`.
    Query,
    /// `mutation`.
    Mutation,
    /// `subscription`.
    Subscription,
}

/// A single `query`/`mutation`/`subscription` definition.
#[derive(Clone, Debug)]
pub struct OperationDefinition {
    /// The operation's kind.
    pub operation_type: OperationType,
    /// The operation's name, if it has one.
    pub name: Option<ArcStr>,
    /// Top-level selection set.
    pub selection_set: Vec<Selection>,
}

/// A named fragment definition.
#[derive(Clone, Debug)]
pub struct FragmentDefinition {
    /// The fragment's name.
    pub name: ArcStr,
    /// The type condition (`on Type`).
    pub type_condition: ArcStr,
    /// The fragment's selection set.
    pub selection_set: Vec<Selection>,
}

/// One entry of a selection set.
#[derive(Clone, Debug)]
pub enum Selection {
    /// A field selection, e.g. `alias: name(arg: 1) @skip(if: $x) { ... }`.
    Field(Arc<FieldNode>),
    /// An inline fragment, e.g. `... on Type { ... }`.
    InlineFragment(Arc<InlineFragmentNode>),
    /// A named fragment spread, e.g. `...FragmentName`.
    FragmentSpread(Arc<FragmentSpreadNode>),
}

/// A single field selection in the AST.
#[derive(Clone, Debug)]
pub struct FieldNode {
    /// Response key alias, if any.
    pub alias: Option<ArcStr>,
    /// The field's name.
    pub name: ArcStr,
    /// Literal/variable-referencing argument values, in source order.
    pub arguments: IndexMap<ArcStr, InputValue>,
    /// Directives applied to this field.
    pub directives: Vec<Directive>,
    /// The field's own selection set, if it has one (non-leaf fields).
    pub selection_set: Vec<Selection>,
    /// Source location, for error reporting.
    pub location: SourceLocation,
}

impl FieldNode {
    /// The response key: the alias if present, otherwise the field name.
    #[must_use]
    pub fn response_key(&self) -> &ArcStr {
        self.alias.as_ref().unwrap_or(&self.name)
    }
}

/// An inline fragment (`... [on Type] { ... }`).
#[derive(Clone, Debug)]
pub struct InlineFragmentNode {
    /// The type condition, if any (an untyped inline fragment always matches).
    pub type_condition: Option<ArcStr>,
    /// Directives applied to this fragment.
    pub directives: Vec<Directive>,
    /// The fragment's selection set.
    pub selection_set: Vec<Selection>,
}

/// A named fragment spread (`...Name`).
#[derive(Clone, Debug)]
pub struct FragmentSpreadNode {
    /// The referenced fragment's name.
    pub name: ArcStr,
    /// Directives applied to this spread.
    pub directives: Vec<Directive>,
}

/// A directive application, e.g. `@skip(if: $x)`.
#[derive(Clone, Debug)]
pub struct Directive {
    /// The directive's name (without the leading `@`).
    pub name: ArcStr,
    /// Argument values.
    pub arguments: IndexMap<ArcStr, InputValue>,
}

impl Directive {
    /// Looks up an argument's literal/variable-referencing value by name.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&InputValue> {
        self.arguments.get(name)
    }
}

/// A type reference as it appears in a schema or argument declaration:
/// `Name`, `[Name]`, `Name!`, `[Name!]!`, etc.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeRef {
    /// A named type (object, interface, union, scalar, enum, or input object).
    Named(ArcStr),
    /// A non-null wrapper around an inner type.
    NonNull(Box<TypeRef>),
    /// A list wrapper around an inner type.
    List(Box<TypeRef>),
}

impl TypeRef {
    /// The innermost named type, unwrapping any `List`/`NonNull` wrappers.
    #[must_use]
    pub fn innermost_name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::NonNull(inner) | Self::List(inner) => inner.innermost_name(),
        }
    }

    /// Whether this type reference is non-null at the top level.
    #[must_use]
    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Whether this type reference is a list at the top level (after
    /// stripping a leading non-null wrapper).
    #[must_use]
    pub fn is_list(&self) -> bool {
        match self {
            Self::List(_) => true,
            Self::NonNull(inner) => inner.is_list(),
            Self::Named(_) => false,
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
            Self::List(inner) => write!(f, "[{inner}]"),
        }
    }
}
