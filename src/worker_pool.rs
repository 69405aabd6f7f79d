//! The thread pool the query-parallel scheduler mode spawns root-field
//! work onto.
//!
//! Kept as a narrow trait rather than calling `tokio::spawn` directly from
//! the scheduler, so an embedder can supply its own pool (a bounded one, an
//! instrumented one, or a single-threaded one for tests) without the
//! scheduler itself being tied to one async runtime.

use std::{future::Future, pin::Pin, sync::Arc};

/// Runs a unit of field-execution work to completion, detached from the
/// caller.
pub trait WorkerPool: Send + Sync {
    /// Spawns `future`, running it to completion independently of the
    /// caller's own task.
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>);
}

impl WorkerPool for Arc<dyn WorkerPool> {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>) {
        (**self).spawn(future);
    }
}

/// A [`WorkerPool`] backed by `tokio::spawn`.
#[cfg(feature = "tokio-runtime")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioWorkerPool;

#[cfg(feature = "tokio-runtime")]
impl WorkerPool for TokioWorkerPool {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>) {
        tokio::spawn(future);
    }
}

/// A [`WorkerPool`] bounded by [`crate::context::ExecutorConfig::max_concurrent_tasks`].
///
/// Built from `tokio::spawn` plus a `Semaphore`, rather than a fixed-size
/// thread pool of its own: the bound is on how many field tasks may be
/// *running* at once, not on how many OS threads exist, so a semaphore
/// permit held across the task's body is enough. `None` behaves exactly
/// like [`TokioWorkerPool`].
#[cfg(feature = "tokio-runtime")]
#[derive(Clone)]
pub struct LocalWorkerPool {
    semaphore: Option<Arc<tokio::sync::Semaphore>>,
}

#[cfg(feature = "tokio-runtime")]
impl LocalWorkerPool {
    /// `max_concurrent_tasks` of `None` means unbounded.
    #[must_use]
    pub fn new(max_concurrent_tasks: Option<usize>) -> Self {
        Self { semaphore: max_concurrent_tasks.map(|n| Arc::new(tokio::sync::Semaphore::new(n))) }
    }

    /// Builds a pool from an [`crate::context::ExecutorConfig`]'s
    /// `max_concurrent_tasks` field.
    #[must_use]
    pub fn from_config(config: &crate::context::ExecutorConfig) -> Self {
        Self::new(config.max_concurrent_tasks)
    }
}

#[cfg(feature = "tokio-runtime")]
impl WorkerPool for LocalWorkerPool {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>) {
        let Some(semaphore) = self.semaphore.clone() else {
            tokio::spawn(future);
            return;
        };
        tokio::spawn(async move {
            let permit = semaphore
                .acquire_owned()
                .await
                .unwrap_or_else(|_| unreachable!("pool semaphore is never closed"));
            future.await;
            drop(permit);
        });
    }
}
