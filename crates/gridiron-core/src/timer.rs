//! Cancellable timer set used by every time-driven source.
//!
//! [`Timers`] exposes the two primitives the sources are built from:
//! "run this after a relative delay" and "run this timed loop", plus
//! [`Timers::cancel_all`]. All timing goes through `tokio::time`, so tests
//! drive it with the paused virtual clock instead of real wall time.
//!
//! Cancellation aborts the underlying tasks and advances an epoch counter.
//! Every callback checks the epoch it was scheduled under before firing,
//! which means nothing scheduled before a `cancel_all` can fire after it,
//! even if its task was already woken.
//!
//! The epoch check and the callback run under one gate that `cancel_all`
//! also takes, so on a multi-thread runtime `cancel_all` waits for a
//! callback already in flight and returns only once nothing else can fire.
//! The gate is reentrant: a callback may cancel its own timer set.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use parking_lot::ReentrantMutex;
use tokio::task::AbortHandle;

#[derive(Debug, Default)]
struct TimersInner {
    epoch: AtomicU64,
    gate: ReentrantMutex<()>,
    handles: Mutex<Vec<AbortHandle>>,
}

/// Liveness check handed to timed loops spawned with [`Timers::spawn`].
#[derive(Debug, Clone)]
pub struct TimerGuard {
    inner: Arc<TimersInner>,
    epoch: u64,
}

impl TimerGuard {
    /// Whether the owning [`Timers`] has not been cancelled since this
    /// guard was issued. Loops must check this before every emission.
    pub fn is_active(&self) -> bool {
        self.inner.epoch.load(Ordering::Acquire) == self.epoch
    }

    /// Run `emit` if the guard is still active, holding off any concurrent
    /// [`Timers::cancel_all`] until it returns. Returns `None` once cancelled.
    pub fn run<R>(&self, emit: impl FnOnce() -> R) -> Option<R> {
        let _gate = self.inner.gate.lock();
        self.is_active().then(emit)
    }
}

/// A set of pending timers that can be cancelled together.
///
/// Dropping the set cancels everything it still owns. Must be used from
/// within a Tokio runtime.
#[derive(Debug, Default)]
pub struct Timers {
    inner: Arc<TimersInner>,
}

impl Timers {
    /// Create an empty timer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` once after `delay`, unless cancelled first.
    pub fn schedule_after<F>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.guard();
        self.spawn_tracked(async move {
            tokio::time::sleep(delay).await;
            guard.run(callback);
        });
    }

    /// Spawn a timed loop. The loop receives a [`TimerGuard`], emits through
    /// [`TimerGuard::run`], and stops once that returns `None`.
    pub fn spawn<F, Fut>(&self, make_loop: F)
    where
        F: FnOnce(TimerGuard) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let fut = make_loop(self.guard());
        self.spawn_tracked(fut);
    }

    /// Cancel every pending timer and loop.
    pub fn cancel_all(&self) {
        {
            let _gate = self.inner.gate.lock();
            self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        }
        let handles = std::mem::take(
            &mut *self
                .inner
                .handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            handle.abort();
        }
    }

    /// Number of timers or loops that have not yet finished.
    pub fn pending(&self) -> usize {
        self.inner
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    fn guard(&self) -> TimerGuard {
        TimerGuard {
            inner: Arc::clone(&self.inner),
            epoch: self.inner.epoch.load(Ordering::Acquire),
        }
    }

    fn spawn_tracked<Fut>(&self, fut: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut).abort_handle();
        let mut handles = self
            .inner
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
