//! Data-loader batching: coalesces per-field loads issued across
//! concurrently suspended tasks into one batch call per "cycle"
//! — the N+1 elimination mechanism.
//!
//! A cycle is a monotonically increasing counter. Any number of tasks may
//! enqueue a key against the loader's current cycle; exactly one of them —
//! whichever wins a compare-and-swap against the dispatch counter — becomes
//! responsible for draining the queue and calling the batch function. Every
//! other task that enqueued against that cycle gets its result from the same
//! batch call, asynchronously, through a [`DeferredAsyncValue`].
//!
//! Callers typically keep their own `Arc<DataLoader<L>>` handles (e.g. as
//! named fields on an application-specific context) and register each one
//! with a [`DataLoaderRegistry`] purely so the scheduler can drive cycle
//! dispatch across all of them uniformly.

use std::{
    any::Any,
    collections::HashMap,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    async_value::{DeferredAsyncValue, DeferredCompleter},
    error::Error,
    resolver::Resolved,
};

/// A batch loading function: given a set of keys, produces one result per
/// key, in the same order.
#[async_trait]
pub trait Loader: Send + Sync {
    /// The load key type.
    type Key: Eq + Hash + Clone + Send + Sync + 'static;
    /// The per-key loaded value type.
    type Value: Any + Send + Sync + Clone + 'static;

    /// Loads values for a batch of keys, one result per key in `keys` order.
    async fn load(&self, keys: &[Self::Key]) -> Vec<Result<Self::Value, Error>>;
}

struct PendingEntry<K> {
    key: K,
    completer: DeferredCompleter,
}

/// A coalescing front-end for a [`Loader`]: enqueues requested keys and
/// dispatches exactly one batch call per cycle.
pub struct DataLoader<L: Loader> {
    loader: L,
    cycle: AtomicU64,
    dispatched_through: AtomicU64,
    pending: Mutex<Vec<PendingEntry<L::Key>>>,
}

impl<L: Loader> DataLoader<L> {
    /// Wraps a loader in a new, empty coalescing front-end.
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cycle: AtomicU64::new(0),
            dispatched_through: AtomicU64::new(0),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Enqueues a key for loading in the current cycle, returning an
    /// [`AsyncValue`](crate::async_value::AsyncValue) that resolves once the
    /// batch serving this key's cycle completes.
    pub fn load(&self, key: L::Key) -> DeferredAsyncValue {
        let (value, completer) = DeferredAsyncValue::new();
        self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(PendingEntry { key, completer });
        value
    }

    /// The data-loader cycle number currently accepting enqueued keys.
    #[must_use]
    pub fn current_cycle(&self) -> u64 {
        self.cycle.load(Ordering::SeqCst)
    }

    /// Attempts to dispatch the current cycle's batch.
    ///
    /// Exactly one caller across any number of concurrently-calling tasks
    /// actually runs the loader and drains the pending queue; every other
    /// caller observes the cycle already claimed and returns immediately.
    /// Safe to call speculatively whenever a task is about to suspend.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn try_dispatch(&self) {
        let cycle = self.cycle.load(Ordering::SeqCst);
        let dispatched_through = self.dispatched_through.load(Ordering::SeqCst);
        if dispatched_through > cycle {
            return;
        }
        if self
            .dispatched_through
            .compare_exchange(dispatched_through, cycle + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let batch = {
            let mut pending = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            std::mem::take(&mut *pending)
        };
        self.cycle.fetch_add(1, Ordering::SeqCst);
        if batch.is_empty() {
            return;
        }

        let keys: Vec<L::Key> = batch.iter().map(|entry| entry.key.clone()).collect();
        tracing::debug!(cycle, batch_size = keys.len(), "dispatching data-loader batch");
        let results = self.loader.load(&keys).await;
        for (entry, result) in batch.into_iter().zip(results) {
            let resolved = match result {
                Ok(value) => Resolved::leaf(value),
                Err(error) => Resolved::Error(error),
            };
            entry.completer.complete(resolved);
        }
    }
}

/// Object-safe view of a [`DataLoader`], letting the registry drive cycle
/// dispatch without knowing its key/value types.
#[async_trait]
pub trait DispatchableLoader: Send + Sync {
    /// Attempts to dispatch this loader's current cycle's batch.
    async fn dispatch_cycle(&self);
}

#[async_trait]
impl<L: Loader + 'static> DispatchableLoader for DataLoader<L> {
    async fn dispatch_cycle(&self) {
        self.try_dispatch().await;
    }
}

/// The registry of active data loaders for one execution.
///
/// Holding loaders here rather than directly on
/// [`crate::context::ExecutionContext`] keeps the context generic over
/// loader types: callers register whichever loaders an operation needs, and
/// the scheduler drives cycle dispatch uniformly across all of them without
/// knowing their concrete key/value types.
#[derive(Default)]
pub struct DataLoaderRegistry {
    loaders: Mutex<HashMap<&'static str, std::sync::Arc<dyn DispatchableLoader>>>,
}

impl DataLoaderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a loader under `name` for cycle dispatch, replacing any
    /// loader already registered under that name.
    pub fn register(&self, name: &'static str, loader: std::sync::Arc<dyn DispatchableLoader>) {
        self.loaders.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(name, loader);
    }

    /// Attempts to dispatch every registered loader's current cycle. Called
    /// by the scheduler whenever every currently-runnable task has
    /// suspended, so that suspended tasks' coalesced loads actually fire.
    pub async fn dispatch_all(&self) {
        let loaders: Vec<std::sync::Arc<dyn DispatchableLoader>> = {
            let guard = self.loaders.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.values().cloned().collect()
        };
        for loader in loaders {
            loader.dispatch_cycle().await;
        }
    }
}
