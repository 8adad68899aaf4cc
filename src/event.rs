//! One-shot readiness flag
//!
//! The simplest readiness source: something (another task, another thread,
//! an I/O callback) calls `set()`, and every task waiting on it is woken
//! exactly once. Waiters are kept in a slab so a `Wait` can update or drop
//! its own registration.

use slab::Slab;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

#[derive(Debug, Default)]
struct Inner {
    set: AtomicBool,
    waiters: Mutex<Slab<Waker>>,
}

impl Inner {
    fn waiters(&self) -> MutexGuard<'_, Slab<Waker>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }
}

/// Cloneable, thread-safe one-shot event
#[derive(Debug, Clone, Default)]
pub struct Event {
    inner: Arc<Inner>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the event ready and wake every waiter. Later calls do nothing.
    pub fn set(&self) {
        if self.inner.set.swap(true, Ordering::AcqRel) {
            return;
        }
        let waiters = std::mem::take(&mut *self.inner.waiters());
        for (_, waker) in waiters {
            waker.wake();
        }
    }

    pub fn is_set(&self) -> bool {
        self.inner.is_set()
    }

    /// Number of tasks currently registered as waiting
    pub fn waiters(&self) -> usize {
        self.inner.waiters().len()
    }

    /// A future that resolves once the event is set
    pub fn wait(&self) -> Wait {
        Wait {
            inner: self.inner.clone(),
            key: None,
        }
    }
}

/// Future for [`Event::wait`]
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Wait {
    inner: Arc<Inner>,
    key: Option<usize>,
}

impl Future for Wait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.inner.is_set() {
            return Poll::Ready(());
        }

        let mut waiters = this.inner.waiters();
        // Re-check under the lock: set() drains only after storing the flag
        if this.inner.is_set() {
            return Poll::Ready(());
        }
        if let Some(waker) = this.key.and_then(|key| waiters.get_mut(key)) {
            if !waker.will_wake(cx.waker()) {
                *waker = cx.waker().clone();
            }
            return Poll::Pending;
        }
        this.key = Some(waiters.insert(cx.waker().clone()));
        Poll::Pending
    }
}

impl Drop for Wait {
    fn drop(&mut self) {
        let Some(key) = self.key else { return };
        if self.inner.is_set() {
            return;
        }
        let mut waiters = self.inner.waiters();
        if waiters.contains(key) {
            waiters.remove(key);
        }
    }
}
