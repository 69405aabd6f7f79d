//! The poll/waker protocol a resolver uses to suspend field work without
//! blocking a worker-pool thread.
//!
//! A resolver that can't produce a value synchronously (a pending network
//! call, a data-loader batch not yet dispatched) returns
//! [`crate::resolver::Resolved::Async`] instead of resolving immediately.
//! The scheduler polls it; when it's not ready, the scheduler registers a
//! waker and moves on to other work rather than parking the thread.

use std::sync::{Arc, Mutex};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{error::Error, resolver::Resolved};

/// The outcome of one [`AsyncValue::poll`] call.
pub enum AsyncPoll {
    /// The value isn't ready; the given waker will be invoked when it might
    /// be worth polling again.
    Pending,
    /// The value resolved.
    Ready(Resolved),
}

/// A suspended resolver result, polled to completion by the scheduler.
///
/// Mirrors a hand-rolled `Future`, but scoped narrowly to what field
/// execution needs: a single poll call taking an explicit waker, rather
/// than pinning and the full `std::future::Future` contract, so scheduler
/// modes that never touch an async runtime (e.g. a pure blocking executor
/// embedding this crate without `tokio-runtime`) can still drive it.
pub trait AsyncValue: Send {
    /// Polls for readiness, registering `waker` to be invoked on progress if
    /// not yet ready.
    fn poll(&mut self, waker: Waker) -> AsyncPoll;
}

/// Drives an [`AsyncValue`] to completion as a real `.await`, bridging its
/// poll/waker protocol onto a [`tokio::sync::Notify`] instead of busy-polling.
///
/// This is how value completion consumes a suspended resolver result: the
/// calling task yields back to the `tokio` runtime on [`AsyncPoll::Pending`]
/// and resumes only once the value's own waker fires, so a stalled data
/// loader or upstream call never occupies a worker-pool thread while it
/// waits.
///
/// Every time this task is about to suspend, it first gives `ctx`'s
/// data loaders a chance to dispatch their current cycle: whichever task
/// suspends last before a batch would otherwise sit unserved wins the
/// compare-and-swap race in [`crate::data_loader::DataLoader::try_dispatch`]
/// and actually calls the batch function, satisfying the "exactly one
/// dispatch per cycle, even under parallelism" property.
///
/// That race only has a chance to produce the coalesced batch the whole
/// mechanism exists for if every sibling gets a real turn to enqueue its key
/// first. A loader whose batch function never actually suspends (no internal
/// `.await` worth yielding on) would otherwise let the very first task to go
/// `Pending` dispatch immediately and drain a queue holding only its own
/// key. [`tokio::task::yield_now`] forces one real hand-back to the runtime
/// before the dispatch attempt, so concurrently-suspending siblings — joined
/// via `join_all` in the same task, or spawned onto separate worker-pool
/// tasks — get polled and enqueue their own keys first.
#[cfg(feature = "tokio-runtime")]
#[tracing::instrument(level = "debug", skip_all)]
pub async fn drive(ctx: &crate::context::ExecutionContext, mut value: Box<dyn AsyncValue>) -> Resolved {
    loop {
        let notify = Arc::new(tokio::sync::Notify::new());
        let notify_for_wake = Arc::clone(&notify);
        let waker = Waker::new(move || notify_for_wake.notify_one());
        match value.poll(waker) {
            AsyncPoll::Ready(resolved) => return resolved,
            AsyncPoll::Pending => {
                tokio::task::yield_now().await;
                ctx.data_loaders().dispatch_all().await;
                notify.notified().await;
            }
        }
    }
}

/// A callback invoked when a previously-pending [`AsyncValue`] might be
/// ready to poll again.
#[derive(Clone)]
pub struct Waker {
    wake: Arc<dyn Fn() + Send + Sync>,
}

impl Waker {
    /// Wraps a callback as a [`Waker`].
    #[must_use]
    pub fn new(wake: impl Fn() + Send + Sync + 'static) -> Self {
        Self { wake: Arc::new(wake) }
    }

    /// Invokes the wake callback.
    pub fn wake(&self) {
        (self.wake)();
    }
}

#[cfg(feature = "tokio-runtime")]
enum TokioValueState {
    Pending(Option<Waker>),
    Ready(Resolved),
    Taken,
}

/// An [`AsyncValue`] backed by a `tokio` future, for the common case of a
/// resolver returning an async block directly.
///
/// Spawns the future immediately; the spawned task stores its result and
/// wakes whichever [`Waker`] the most recent [`poll`](AsyncValue::poll) call
/// registered, so the caller's worker thread is never blocked waiting on the
/// resolver future.
#[cfg(feature = "tokio-runtime")]
pub struct TokioAsyncValue {
    state: Arc<Mutex<TokioValueState>>,
}

#[cfg(feature = "tokio-runtime")]
impl TokioAsyncValue {
    /// Spawns `future` onto the current `tokio` runtime, wrapping its
    /// completion as an [`AsyncValue`].
    pub fn spawn<F>(future: F) -> Self
    where
        F: std::future::Future<Output = Resolved> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(TokioValueState::Pending(None)));
        let state_in_task = Arc::clone(&state);
        tokio::spawn(async move {
            let resolved = future.await;
            let waker = {
                let mut guard = state_in_task.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                match std::mem::replace(&mut *guard, TokioValueState::Ready(resolved)) {
                    TokioValueState::Pending(waker) => waker,
                    _ => None,
                }
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        });
        Self { state }
    }
}

#[cfg(feature = "tokio-runtime")]
impl AsyncValue for TokioAsyncValue {
    fn poll(&mut self, waker: Waker) -> AsyncPoll {
        let mut guard = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match &mut *guard {
            TokioValueState::Ready(_) => {
                match std::mem::replace(&mut *guard, TokioValueState::Taken) {
                    TokioValueState::Ready(resolved) => AsyncPoll::Ready(resolved),
                    _ => unreachable!(),
                }
            }
            TokioValueState::Pending(registered) => {
                *registered = Some(waker);
                AsyncPoll::Pending
            }
            TokioValueState::Taken => {
                AsyncPoll::Ready(Resolved::Error(Error::new("polled a completed TokioAsyncValue twice")))
            }
        }
    }
}

/// A ready-made [`AsyncValue`] for tests and synchronous resolvers that need
/// to hand back an already-known result through the async path (e.g. a data
/// loader reporting the outcome of a completed batch).
pub struct ReadyAsyncValue(Option<Resolved>);

impl ReadyAsyncValue {
    /// Wraps an already-resolved value.
    #[must_use]
    pub fn new(resolved: Resolved) -> Self {
        Self(Some(resolved))
    }
}

impl AsyncValue for ReadyAsyncValue {
    fn poll(&mut self, _waker: Waker) -> AsyncPoll {
        match self.0.take() {
            Some(resolved) => AsyncPoll::Ready(resolved),
            None => AsyncPoll::Ready(Resolved::Error(Error::new("polled a ReadyAsyncValue twice"))),
        }
    }
}

/// An [`AsyncValue`] that stays pending until explicitly completed from
/// elsewhere — the shape a data loader's in-flight batch entry takes
/// between dispatch and the batch callback returning.
pub struct DeferredAsyncValue {
    slot: Arc<Mutex<Option<Resolved>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

impl DeferredAsyncValue {
    /// Creates a deferred value and a [`DeferredCompleter`] to resolve it
    /// from another task.
    #[must_use]
    pub fn new() -> (Self, DeferredCompleter) {
        let slot = Arc::new(Mutex::new(None));
        let waker = Arc::new(Mutex::new(None));
        (
            Self { slot: Arc::clone(&slot), waker: Arc::clone(&waker) },
            DeferredCompleter { slot, waker },
        )
    }
}

impl AsyncValue for DeferredAsyncValue {
    fn poll(&mut self, waker: Waker) -> AsyncPoll {
        let mut slot = self.slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match slot.take() {
            Some(resolved) => AsyncPoll::Ready(resolved),
            None => {
                *self.waker.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(waker);
                AsyncPoll::Pending
            }
        }
    }
}

/// The completion handle for a [`DeferredAsyncValue`], typically held by a
/// data loader's batch dispatch closure.
pub struct DeferredCompleter {
    slot: Arc<Mutex<Option<Resolved>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

impl DeferredCompleter {
    /// Completes the paired [`DeferredAsyncValue`] and wakes its poller, if
    /// one has registered.
    pub fn complete(self, resolved: Resolved) {
        *self.slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(resolved);
        if let Some(waker) = self.waker.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take() {
            waker.wake();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_value_resolves_immediately() {
        let mut value = ReadyAsyncValue::new(Resolved::Null);
        let waker = Waker::new(|| {});
        match value.poll(waker) {
            AsyncPoll::Ready(Resolved::Null) => {}
            _ => panic!("expected immediate Null"),
        }
    }

    #[test]
    fn deferred_value_wakes_on_completion() {
        let (mut value, completer) = DeferredAsyncValue::new();
        let woken = Arc::new(AtomicBool::new(false));
        let woken_clone = Arc::clone(&woken);
        let waker = Waker::new(move || woken_clone.store(true, Ordering::SeqCst));

        assert!(matches!(value.poll(waker), AsyncPoll::Pending));
        assert!(!woken.load(Ordering::SeqCst));

        completer.complete(Resolved::Null);
        assert!(woken.load(Ordering::SeqCst));
        assert!(matches!(value.poll(Waker::new(|| {})), AsyncPoll::Ready(Resolved::Null)));
    }
}
