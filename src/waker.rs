//! Wakers and the ready-queue they feed
//!
//! Polling is single-threaded, but `wake()` may be called from any thread
//! (an I/O callback, a timer thread). The queue is therefore a mutex-guarded
//! `VecDeque` with a condvar for parking, and each task carries an atomic
//! `queued` flag so repeated wakes collapse into one queue entry.

use crate::task::TaskId;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::task::{RawWaker, RawWakerVTable, Waker};

/// What a ready-queue slot points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Entry {
    /// The future passed to `block_on`, tagged with the call it belongs to
    Root { call: u64 },
    /// A spawned task, addressed by slab key and checked against its id
    Task { key: usize, id: TaskId },
}

/// FIFO of runnable tasks, shared with every waker
#[derive(Debug)]
pub(crate) struct ReadyQueue {
    queue: Mutex<VecDeque<Entry>>,
    condvar: Condvar,
    wakes: AtomicU64,
    coalesced: AtomicU64,
    parks: AtomicU64,
}

impl ReadyQueue {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            condvar: Condvar::new(),
            wakes: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            parks: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Entry>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, entry: Entry) {
        self.lock().push_back(entry);
        self.condvar.notify_one();
    }

    /// Pop the front entry, parking the thread while the queue is empty
    ///
    /// The emptiness check and the wait happen under the same lock that
    /// `push` takes, so a wake racing with the decision to park is never lost.
    pub(crate) fn pop_blocking(&self) -> Entry {
        let mut queue = self.lock();
        loop {
            if let Some(entry) = queue.pop_front() {
                return entry;
            }
            self.parks.fetch_add(1, Ordering::Relaxed);
            log::trace!("ready-queue empty, parking");
            queue = self
                .condvar
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    pub(crate) fn wakes(&self) -> u64 {
        self.wakes.load(Ordering::Relaxed)
    }

    pub(crate) fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    pub(crate) fn parks(&self) -> u64 {
        self.parks.load(Ordering::Relaxed)
    }
}

/// Per-task scheduling state shared between the executor and wakers
#[derive(Debug)]
pub(crate) struct TaskHeader {
    entry: Entry,
    /// Set while the task sits in the ready-queue
    queued: AtomicBool,
    /// Set once the task completed or was abandoned; wakes become no-ops
    closed: AtomicBool,
    queue: Arc<ReadyQueue>,
}

impl TaskHeader {
    pub(crate) fn new(entry: Entry, queue: Arc<ReadyQueue>) -> Arc<Self> {
        Arc::new(Self {
            entry,
            queued: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            queue,
        })
    }

    /// Put the task in the ready-queue unless it is already there.
    /// Returns true if an entry was pushed.
    pub(crate) fn schedule(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.queued.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.queue.push(self.entry);
        true
    }

    fn wake(&self) {
        if self.is_closed() {
            return;
        }
        self.queue.wakes.fetch_add(1, Ordering::Relaxed);
        if !self.schedule() {
            self.queue.coalesced.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Called right before polling: wakes from here on enqueue again
    pub(crate) fn begin_poll(&self) {
        self.queued.store(false, Ordering::Release);
    }

    pub(crate) fn is_queued(&self) -> bool {
        self.queued.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Build a `Waker` whose `wake()` re-enqueues the task behind `header`
pub(crate) fn make_waker(header: Arc<TaskHeader>) -> Waker {
    let ptr = Arc::into_raw(header) as *const ();
    // Safety: the vtable below treats ptr as an Arc<TaskHeader> and keeps
    // the strong count balanced.
    unsafe { Waker::from_raw(RawWaker::new(ptr, &WAKER_VTABLE)) }
}

const WAKER_VTABLE: RawWakerVTable =
    RawWakerVTable::new(waker_clone, waker_wake, waker_wake_by_ref, waker_drop);

unsafe fn waker_clone(ptr: *const ()) -> RawWaker {
    // Safety: ptr came from Arc::into_raw in make_waker
    unsafe { Arc::increment_strong_count(ptr as *const TaskHeader) };
    RawWaker::new(ptr, &WAKER_VTABLE)
}

unsafe fn waker_wake(ptr: *const ()) {
    // Safety: ptr came from Arc::into_raw, and this consumes that reference
    let header = unsafe { Arc::from_raw(ptr as *const TaskHeader) };
    header.wake();
}

unsafe fn waker_wake_by_ref(ptr: *const ()) {
    // Safety: ptr came from Arc::into_raw in make_waker
    let header = unsafe { &*(ptr as *const TaskHeader) };
    header.wake();
}

unsafe fn waker_drop(ptr: *const ()) {
    // Safety: ptr came from Arc::into_raw in make_waker
    drop(unsafe { Arc::from_raw(ptr as *const TaskHeader) });
}
