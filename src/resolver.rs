//! The resolver interface and the dynamically-dispatched shapes a resolver
//! may return.

use std::{any::Any, sync::Arc};

use async_trait::async_trait;

use crate::{
    ast::FieldNode,
    context::ExecutionContext,
    error::Error,
    input_value::InputValue,
    path::ResponsePath,
};

/// The dynamic type resolvers produce values from and abstract/leaf types
/// inspect: an opaque, downcastable source object.
pub type Source = dyn Any + Send + Sync;

/// What a resolver call produced, tagged so value completion can dispatch
/// without reflection: a tagged interface beats introspecting the
/// returned value's shape.
pub enum Resolved {
    /// The resolver itself failed; carries the field error directly.
    Error(Error),
    /// The value isn't ready yet; poll it through the async-value protocol.
    Async(Box<dyn crate::async_value::AsyncValue>),
    /// An explicit `null`.
    Null,
    /// A leaf-typed (scalar/enum) value, to be handed to the declared
    /// return type's [`LeafType::coerce_result_value`](crate::schema::LeafType::coerce_result_value).
    Leaf(Box<Source>),
    /// A list-typed value.
    List(Box<dyn ResolvedList>),
    /// An object- or abstract-typed value: the source for the next level of
    /// field collection and resolution.
    Object(Box<Source>),
}

impl Resolved {
    /// Wraps a plain source value as [`Resolved::Leaf`].
    pub fn leaf<T: Any + Send + Sync>(value: T) -> Self {
        Self::Leaf(Box::new(value))
    }

    /// Wraps a plain source value as [`Resolved::Object`].
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Box::new(value))
    }
}

/// Either of value completion's two supported list shapes: a custom
/// iterable (with an optional size hint) or reflective indexed access over
/// an array-like value. Implement this trait directly for a streaming
/// producer, or use [`VecResolvedList`] to wrap an already-materialized
/// `Vec`.
pub trait ResolvedList: Send {
    /// A hint at the number of elements remaining, if cheaply knowable.
    fn size_hint(&self) -> Option<usize> {
        None
    }

    /// Produces the next element, or `None` once exhausted.
    fn next(&mut self) -> Option<Result<Resolved, Error>>;
}

/// A [`ResolvedList`] over an already-collected `Vec`, covering the
/// "reflective index access over an array/slice-like value" path.
pub struct VecResolvedList {
    items: std::vec::IntoIter<Resolved>,
    len: usize,
}

impl VecResolvedList {
    /// Wraps a materialized list of already-resolved elements.
    #[must_use]
    pub fn new(items: Vec<Resolved>) -> Self {
        Self { len: items.len(), items: items.into_iter() }
    }
}

impl ResolvedList for VecResolvedList {
    fn size_hint(&self) -> Option<usize> {
        Some(self.len)
    }

    fn next(&mut self) -> Option<Result<Resolved, Error>> {
        self.items.next().map(Ok)
    }
}

/// Everything a resolver needs to know about the field it's resolving,
/// beyond the source value and application context.
pub struct ResolveInfo<'a> {
    /// The schema being executed against.
    pub schema: &'a dyn crate::schema::Schema,
    /// The coerced argument values for this field invocation.
    pub arguments: &'a indexmap::IndexMap<arcstr::ArcStr, InputValue>,
    /// The response path to this field.
    pub path: Arc<ResponsePath>,
    /// The merged AST field node(s) for this selection (more than one when
    /// the same response key was selected multiple times and coalesced).
    pub field_asts: &'a [Arc<FieldNode>],
    /// The runtime object type name this field was collected against.
    pub parent_type_name: arcstr::ArcStr,
}

/// A field resolver: `(context, source, info) -> value`.
///
/// Resolvers accept one of several calling conventions in spirit; this
/// crate exposes them behind a single virtual call and provides
/// [`FnResolver`] as the common-case convenience constructor, keeping
/// runtime dispatch behind one trait object while offering ergonomic entry
/// points.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves this field's value.
    async fn resolve(
        &self,
        ctx: &ExecutionContext,
        source: &Source,
        info: &ResolveInfo<'_>,
    ) -> Resolved;
}

/// Wraps a synchronous resolver closure.
pub struct FnResolver<F>(pub F);

#[async_trait]
impl<F> Resolver for FnResolver<F>
where
    F: Fn(&ExecutionContext, &Source, &ResolveInfo<'_>) -> Resolved + Send + Sync,
{
    async fn resolve(
        &self,
        ctx: &ExecutionContext,
        source: &Source,
        info: &ResolveInfo<'_>,
    ) -> Resolved {
        (self.0)(ctx, source, info)
    }
}

/// Lets a bare synchronous closure stand in for a [`Resolver`] directly, with
/// no [`FnResolver`] wrapper at the call site.
#[async_trait]
impl<F> Resolver for F
where
    F: Fn(&ExecutionContext, &Source, &ResolveInfo<'_>) -> Resolved + Send + Sync,
{
    async fn resolve(
        &self,
        ctx: &ExecutionContext,
        source: &Source,
        info: &ResolveInfo<'_>,
    ) -> Resolved {
        self(ctx, source, info)
    }
}

/// Wraps an asynchronous resolver closure returning a boxed future.
pub struct AsyncFnResolver<F>(pub F);

#[async_trait]
impl<F, Fut> Resolver for AsyncFnResolver<F>
where
    F: Fn(&ExecutionContext, &Source, &ResolveInfo<'_>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Resolved> + Send,
{
    async fn resolve(
        &self,
        ctx: &ExecutionContext,
        source: &Source,
        info: &ResolveInfo<'_>,
    ) -> Resolved {
        (self.0)(ctx, source, info).await
    }
}

/// Implemented by host-language structures that want the reflective
/// default field resolver to map a field name onto one of their members.
///
/// Building the "reflective" mapping itself is a convenience, not the hard
/// part — this trait is the narrow interface the default resolver depends
/// on; how a type implements it is up to the caller.
/// [`Source`] is `dyn Any`, which cannot be downcast to a second trait
/// object directly, so a reflective source must also answer
/// [`AsReflectSource::as_reflect_source`] to hand back that view of itself —
/// the same two-step downcast `std::error::Error::downcast_ref` relies on
/// internally for `source()` chains.
pub trait ReflectSource: Send + Sync {
    /// Returns the named child value, if this source exposes a field by
    /// that name.
    fn field(&self, name: &str) -> Option<Resolved>;
}

/// Lets a resolved source object expose itself as a [`ReflectSource`]
/// without requiring every [`Source`] to implement the trait.
pub trait AsReflectSource: Any + Send + Sync {
    /// Returns `self` as a [`ReflectSource`], if it implements one.
    fn as_reflect_source(&self) -> Option<&dyn ReflectSource> {
        None
    }
}

/// The built-in default field resolver: looks up `source.field(name)` via
/// [`ReflectSource`], falling back to `null` with no error when the source
/// doesn't implement it at all.
pub struct DefaultFieldResolver;

#[async_trait]
impl Resolver for DefaultFieldResolver {
    async fn resolve(
        &self,
        _ctx: &ExecutionContext,
        source: &Source,
        info: &ResolveInfo<'_>,
    ) -> Resolved {
        source
            .downcast_ref::<Box<dyn AsReflectSource>>()
            .and_then(|s| s.as_reflect_source())
            .and_then(|s| s.field(&info.field_asts[0].name))
            .unwrap_or(Resolved::Null)
    }
}
