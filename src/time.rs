//! Timer System
//!
//! Provides `sleep` as a readiness source for the executor.
//!
//! Design:
//! - One background thread, started on first use, owns a min-heap of deadlines
//! - A `Sleep` registers with the heap on its first pending poll
//! - The thread fires each entry exactly once: sets its flag, wakes its waker
//! - Between deadlines the thread waits on a condvar, so registering an
//!   earlier deadline cuts the wait short

use futures::task::AtomicWaker;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{self, AtomicBool};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::task::{Context, Poll};
use std::thread;
use std::time::{Duration, Instant};

/// Shared between a `Sleep` and its heap entry
#[derive(Debug, Default)]
struct SleepState {
    fired: AtomicBool,
    waker: AtomicWaker,
}

impl SleepState {
    fn fire(&self) {
        self.fired.store(true, atomic::Ordering::Release);
        self.waker.wake();
    }

    fn has_fired(&self) -> bool {
        self.fired.load(atomic::Ordering::Acquire)
    }
}

/// Entry in the timer heap (for ordering)
#[derive(Debug)]
struct TimerEntry {
    deadline: Instant,
    seq: u64,
    state: Arc<SleepState>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first, then FIFO)
        (other.deadline, other.seq).cmp(&(self.deadline, self.seq))
    }
}

#[derive(Debug, Default)]
struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    next_seq: u64,
}

impl TimerQueue {
    fn schedule(&mut self, deadline: Instant, state: Arc<SleepState>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(TimerEntry {
            deadline,
            seq,
            state,
        });
    }

    /// Pop every entry due at `now`, earliest first
    fn expired(&mut self, now: Instant) -> Vec<TimerEntry> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|e| e.deadline <= now) {
            if let Some(entry) = self.heap.pop() {
                due.push(entry);
            }
        }
        due
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.deadline)
    }
}

#[derive(Debug, Default)]
struct Timer {
    queue: Mutex<TimerQueue>,
    condvar: Condvar,
}

static TIMER: OnceLock<Arc<Timer>> = OnceLock::new();

fn timer() -> &'static Timer {
    TIMER.get_or_init(|| {
        let timer = Arc::new(Timer::default());
        let worker = timer.clone();
        thread::Builder::new()
            .name("cooprt-timer".to_string())
            .spawn(move || worker.run())
            .expect("Failed to spawn timer thread");
        timer
    })
}

impl Timer {
    fn register(&self, deadline: Instant, state: Arc<SleepState>) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .schedule(deadline, state);
        self.condvar.notify_one();
    }

    fn run(&self) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let now = Instant::now();
            let due = queue.expired(now);
            if !due.is_empty() {
                // Wake outside the lock; wakers may take other locks
                drop(queue);
                log::trace!("timer firing {} entries", due.len());
                for entry in due {
                    entry.state.fire();
                }
                queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
                continue;
            }

            queue = match queue.next_deadline() {
                Some(deadline) => {
                    self.condvar
                        .wait_timeout(queue, deadline.saturating_duration_since(now))
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .condvar
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }
}

/// Future for [`sleep`] and [`sleep_until`]
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Sleep {
    deadline: Instant,
    state: Option<Arc<SleepState>>,
}

/// Resolve once `duration` has elapsed
pub fn sleep(duration: Duration) -> Sleep {
    sleep_until(Instant::now() + duration)
}

/// Resolve once `deadline` has passed
pub fn sleep_until(deadline: Instant) -> Sleep {
    Sleep {
        deadline,
        state: None,
    }
}

impl Sleep {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_elapsed(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.has_fired()) || Instant::now() >= self.deadline
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.is_elapsed() {
            return Poll::Ready(());
        }

        match &this.state {
            Some(state) => {
                state.waker.register(cx.waker());
                if state.has_fired() {
                    return Poll::Ready(());
                }
            }
            None => {
                let state = Arc::new(SleepState::default());
                state.waker.register(cx.waker());
                timer().register(this.deadline, state.clone());
                this.state = Some(state);
            }
        }
        Poll::Pending
    }
}
