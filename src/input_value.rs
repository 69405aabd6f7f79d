//! Literal/variable-referencing input values and runtime variable bindings.

use indexmap::IndexMap;

use crate::value::Value;

/// A literal value as written in the document, or a reference to a runtime
/// variable, with no location tracking (parsing owns that; this crate only
/// reads the already-parsed tree).
#[derive(Clone, Debug, PartialEq)]
pub enum InputValue {
    /// `null`.
    Null,
    /// A boolean literal.
    Boolean(bool),
    /// An integer literal.
    Int(i64),
    /// A float literal.
    Float(f64),
    /// A string literal.
    String(String),
    /// An enum value literal (a bare name).
    Enum(String),
    /// A list literal.
    List(Vec<InputValue>),
    /// An input object literal.
    Object(IndexMap<String, InputValue>),
    /// A reference to a variable, resolved against [`Variables`] at
    /// argument-coercion time.
    Variable(String),
}

/// The runtime bindings for a request's `$variables`.
pub type Variables = IndexMap<String, InputValue>;

impl InputValue {
    /// Resolves variable references against `variables`, producing a value
    /// with no remaining [`InputValue::Variable`] nodes.
    ///
    /// Missing variables resolve to `null` — GraphQL request execution
    /// treats an unset, non-required variable as absent rather than an
    /// error; argument coercion is responsible for rejecting a `null` where
    /// a non-null argument type demands a value.
    #[must_use]
    pub fn resolve_variables(&self, variables: &Variables) -> InputValue {
        match self {
            Self::Variable(name) => variables.get(name).cloned().unwrap_or(Self::Null),
            Self::List(items) => {
                Self::List(items.iter().map(|v| v.resolve_variables(variables)).collect())
            }
            Self::Object(fields) => Self::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.resolve_variables(variables)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Converts a resolved (variable-free) input value into a leaf
    /// [`Value`], if it's scalar-shaped.
    #[must_use]
    pub fn as_leaf_value(&self) -> Option<Value> {
        match self {
            Self::Null => Some(Value::Null),
            Self::Boolean(b) => Some(Value::Boolean(*b)),
            Self::Int(i) => Some(Value::Int(*i)),
            Self::Float(f) => Some(Value::Float(*f)),
            Self::String(s) => Some(Value::String(s.clone())),
            Self::Enum(s) => Some(Value::Enum(s.clone())),
            Self::List(_) | Self::Object(_) | Self::Variable(_) => None,
        }
    }

    /// Whether this value is `null` (after variable resolution it would be,
    /// at least; unresolved variables are not considered null here).
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}
