//! Serialization-ready scalar and enum values produced by leaf-type coercion.

use std::fmt;

use serde::Serialize;

/// A resolved, serialization-ready leaf value.
///
/// Used only for the `Leaf` variant of a result node — lists and objects in
/// the response are represented directly by the result tree's own `List`
/// and `Object` node variants, not nested inside this type. Deliberately
/// flat: this crate's leaf types coerce into one of these variants and
/// nothing else, with no custom-scalar extension point.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// `null`.
    Null,
    /// A GraphQL `Boolean`.
    Boolean(bool),
    /// A GraphQL `Int`.
    Int(i64),
    /// A GraphQL `Float`.
    Float(f64),
    /// A GraphQL `String`.
    String(String),
    /// A GraphQL enum value, serialized the same as a string.
    Enum(String),
}

impl Value {
    /// Whether this value represents `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) | Self::Enum(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
