//! Response paths identifying a position in the result tree.

use std::{fmt, sync::Arc};

/// A single step in a [`ResponsePath`]: either a field response key or a list index.
#[derive(Clone, Debug, PartialEq, Eq, derive_more::From)]
pub enum PathSegment {
    /// A field's response key (its alias, or its name if unaliased).
    Field(compact_str::CompactString),
    /// A zero-based index into a list.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{name}"),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        Self::Field(s.into())
    }
}

/// An append-only, cheaply-cloned response path.
///
/// Internally a reverse-linked cons-list, so derived sub-executors and
/// tasks can share a path prefix without copying it. Paths are only ever
/// materialized into a `Vec` when they need to cross a boundary (an error,
/// a serialized response).
#[derive(Clone, Debug)]
pub enum ResponsePath {
    /// The root of the operation, with no keys appended yet.
    Root,
    /// One more segment appended onto a parent path.
    Segment(Arc<ResponsePath>, PathSegment),
}

impl Default for ResponsePath {
    fn default() -> Self {
        Self::Root
    }
}

impl ResponsePath {
    /// Appends a field response key, returning the extended path.
    #[must_use]
    pub fn field(self: &Arc<Self>, key: impl Into<compact_str::CompactString>) -> Arc<Self> {
        Arc::new(Self::Segment(Arc::clone(self), PathSegment::Field(key.into())))
    }

    /// Appends a list index, returning the extended path.
    #[must_use]
    pub fn index(self: &Arc<Self>, index: usize) -> Arc<Self> {
        Arc::new(Self::Segment(Arc::clone(self), PathSegment::Index(index)))
    }

    /// Materializes this path into an owned, root-to-leaf ordered vector.
    ///
    /// Clone before surfacing: every error and serialized path value must
    /// use a snapshot, not a live reference, since the path may keep
    /// growing on other branches of the tree.
    #[must_use]
    pub fn to_vec(&self) -> Vec<PathSegment> {
        let mut acc = Vec::new();
        self.build(&mut acc);
        acc
    }

    fn build(&self, acc: &mut Vec<PathSegment>) {
        if let Self::Segment(parent, segment) = self {
            parent.build(acc);
            acc.push(segment.clone());
        }
    }

    /// Returns whether this path is the operation root (empty).
    #[must_use]
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }
}

impl fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segments = self.to_vec();
        for (i, s) in segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{s}")?;
        }
        Ok(())
    }
}
