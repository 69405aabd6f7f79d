//! Execution errors and the per-request error accumulator.

use std::sync::Mutex;

use serde::Serialize;

use crate::path::PathSegment;

/// A source location `(line, column)`, both 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

/// Classifies the origin of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ErrorKind {
    /// Unclassified.
    #[default]
    Other,
    /// Leaf-type result coercion, or variable/argument coercion.
    Coercion,
    /// Document parse failure (surfaced by the external parser, carried through).
    Syntax,
    /// Static validation failure (surfaced by the external validator, carried through).
    Validation,
    /// Resolver failure, nullability violation, or abstract-type runtime error.
    Execution,
    /// An engine bug.
    Internal,
}

/// A rich execution error: message, source locations, response path,
/// extensions, a [`ErrorKind`], and an optional cause.
///
/// Construction-time enrichment: wrapping a cause inherits its
/// locations/path/extensions/kind wherever this error's own are empty, so
/// repeatedly wrapping the same error with no new data is idempotent after
/// the first wrap.
#[derive(Clone, Debug, Default, derive_more::Display)]
#[display("{message}")]
pub struct Error {
    message: String,
    locations: Vec<SourceLocation>,
    path: Vec<PathSegment>,
    extensions: indexmap::IndexMap<String, serde_json::Value>,
    kind: ErrorKind,
    cause: Option<Box<Error>>,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl Error {
    /// Constructs a new error with just a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Sets the [`ErrorKind`].
    #[must_use]
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the response path.
    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    /// Appends a source location.
    #[must_use]
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.locations.push(location);
        self
    }

    /// Sets an extension entry.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Wraps `cause`, inheriting whichever of locations/path/extensions/kind
    /// this error doesn't already carry.
    ///
    /// Repeated wrapping with empty options stabilizes after one call: once
    /// inherited, the fields are no longer empty, so a second wrap changes
    /// nothing.
    #[must_use]
    pub fn wrapping(mut self, cause: Error) -> Self {
        if self.locations.is_empty() {
            self.locations = cause.locations.clone();
        }
        if self.path.is_empty() {
            self.path = cause.path.clone();
        }
        if self.extensions.is_empty() {
            self.extensions = cause.extensions.clone();
        }
        if matches!(self.kind, ErrorKind::Other) {
            self.kind = cause.kind;
        }
        self.cause = Some(Box::new(cause));
        self
    }

    /// The human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The [`ErrorKind`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The response path, if any was attached.
    #[must_use]
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// Whether this error is already a coercion error (used to avoid
    /// double-wrapping a coercion failure as another coercion error).
    #[must_use]
    pub fn is_coercion(&self) -> bool {
        matches!(self.kind, ErrorKind::Coercion)
    }
}

/// Serializes fields in the GraphQL response's fixed order: `message`,
/// `locations` (omitted if empty), `path` (omitted if empty), `extensions`
/// (omitted if empty).
impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut fields = 1;
        if !self.locations.is_empty() {
            fields += 1;
        }
        if !self.path.is_empty() {
            fields += 1;
        }
        if !self.extensions.is_empty() {
            fields += 1;
        }

        let mut map = serializer.serialize_map(Some(fields))?;
        map.serialize_entry("message", &self.message)?;
        if !self.locations.is_empty() {
            map.serialize_entry("locations", &self.locations)?;
        }
        if !self.path.is_empty() {
            map.serialize_entry("path", &self.path)?;
        }
        if !self.extensions.is_empty() {
            map.serialize_entry("extensions", &self.extensions)?;
        }
        map.end()
    }
}

impl Serialize for PathSegment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Field(name) => serializer.serialize_str(name),
            Self::Index(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

/// An append-and-query error accumulator.
///
/// Guarded by a mutex unconditionally: in blocking mode the lock is
/// uncontended and costs nothing observable, while parallel modes need the
/// same accumulator to be safely shared across worker-pool threads. A plain
/// field would work for blocking mode alone; unifying on the mutex avoids
/// threading a mode-specific type through every call site.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Mutex<Vec<Error>>,
}

impl ErrorList {
    /// Creates an empty error list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error.
    pub fn push(&self, error: Error) {
        self.errors.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(error);
    }

    /// Whether any error has been recorded. Distinct from "is non-null": a
    /// nullable field that resolved to `null` without error leaves this
    /// `false`.
    #[must_use]
    pub fn has_occurred(&self) -> bool {
        !self.errors.lock().unwrap_or_else(std::sync::PoisonError::into_inner).is_empty()
    }

    /// Drains the accumulated errors, sorted by path for deterministic
    /// output across repeated executions.
    #[must_use]
    pub fn into_sorted_vec(self) -> Vec<Error> {
        let mut errors = self.errors.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner);
        errors.sort_by(|a, b| a.path.iter().map(ToString::to_string).collect::<Vec<_>>().cmp(
            &b.path.iter().map(ToString::to_string).collect::<Vec<_>>(),
        ));
        errors
    }

    /// Snapshots the accumulated errors without consuming the list.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Error> {
        self.errors.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}
