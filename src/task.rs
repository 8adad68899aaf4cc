//! Task abstraction
//!
//! A Task is one spawned future of output `()` plus the bookkeeping the
//! executor needs to schedule it. Tasks are owned by the executor's task
//! table; only the executor thread ever polls them.

use crate::waker::{TaskHeader, make_waker};
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Unique identifier for a task. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Task execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// In the ready-queue, waiting to be polled
    Enqueued,
    /// Currently being polled
    Running,
    /// Returned Pending; waiting for its waker to fire
    Suspended,
    /// Returned Ready
    Completed,
    /// Panicked while being polled
    Panicked,
}

/// Handle returned when spawning a task
///
/// Spawning is fire-and-forget; the handle only identifies the task.
/// It also remembers the task's slot so state lookups need no scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    id: TaskId,
    key: usize,
}

impl TaskHandle {
    pub(crate) fn new(id: TaskId, key: usize) -> Self {
        Self { id, key }
    }

    pub(crate) fn key(&self) -> usize {
        self.key
    }

    pub fn id(&self) -> TaskId {
        self.id
    }
}

/// A boxed future representing a spawned task
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + 'static>>;

/// Result of polling a task once
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    Pending,
    Completed,
    Panicked(String),
}

pub(crate) struct Task {
    id: TaskId,
    header: Arc<TaskHeader>,
    future: BoxFuture,
    state: TaskState,
}

impl Task {
    /// A fresh task starts out `Enqueued`; the caller schedules its header.
    pub(crate) fn new(id: TaskId, header: Arc<TaskHeader>, future: BoxFuture) -> Self {
        Self {
            id,
            header,
            future,
            state: TaskState::Enqueued,
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    #[cfg(test)]
    pub(crate) fn header(&self) -> &Arc<TaskHeader> {
        &self.header
    }

    pub(crate) fn state(&self) -> TaskState {
        match self.state {
            TaskState::Suspended if self.header.is_queued() => TaskState::Enqueued,
            state => state,
        }
    }

    /// Poll the inner future exactly once with a waker addressing this task
    pub(crate) fn poll_once(&mut self, isolate_panics: bool) -> PollOutcome {
        self.state = TaskState::Running;
        self.header.begin_poll();

        let waker = make_waker(self.header.clone());
        let mut cx = Context::from_waker(&waker);
        let future = &mut self.future;

        let result = if isolate_panics {
            panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx)))
        } else {
            Ok(future.as_mut().poll(&mut cx))
        };

        match result {
            Ok(Poll::Pending) => {
                self.state = TaskState::Suspended;
                PollOutcome::Pending
            }
            Ok(Poll::Ready(())) => {
                self.state = TaskState::Completed;
                self.header.close();
                PollOutcome::Completed
            }
            Err(payload) => {
                self.state = TaskState::Panicked;
                self.header.close();
                PollOutcome::Panicked(panic_message(payload.as_ref()))
            }
        }
    }

    /// Detach from the scheduler; later wakes are ignored
    pub(crate) fn abandon(&self) {
        self.header.close();
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waker::{Entry, ReadyQueue};

    fn task(future: BoxFuture) -> (Task, Arc<ReadyQueue>) {
        let queue = Arc::new(ReadyQueue::with_capacity(4));
        let id = TaskId(1);
        let header = TaskHeader::new(Entry::Task { key: 0, id }, queue.clone());
        (Task::new(id, header, future), queue)
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(42).to_string(), "Task(42)");
    }

    #[test]
    fn test_ready_future_completes() {
        let (mut task, _queue) = task(Box::pin(async {}));
        assert_eq!(task.state(), TaskState::Enqueued);

        assert_eq!(task.poll_once(true), PollOutcome::Completed);
        assert_eq!(task.state(), TaskState::Completed);
        assert!(task.header().is_closed());
    }

    #[test]
    fn test_pending_without_wake_is_suspended() {
        let (mut task, queue) = task(Box::pin(async {
            futures::pending!();
        }));

        assert_eq!(task.poll_once(true), PollOutcome::Pending);
        assert_eq!(task.state(), TaskState::Suspended);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_self_wake_during_poll_is_enqueued() {
        let (mut task, queue) = task(Box::pin(crate::future::yield_now()));

        assert_eq!(task.poll_once(true), PollOutcome::Pending);
        assert_eq!(task.state(), TaskState::Enqueued);
        assert_eq!(queue.len(), 1);

        assert_eq!(task.poll_once(true), PollOutcome::Completed);
    }

    #[test]
    fn test_panic_is_caught() {
        let (mut task, _queue) = task(Box::pin(async {
            panic!("task exploded");
        }));

        assert_eq!(
            task.poll_once(true),
            PollOutcome::Panicked("task exploded".to_string())
        );
        assert_eq!(task.state(), TaskState::Panicked);
        assert!(task.header().is_closed());
    }

    #[test]
    fn test_panic_message_formats() {
        let owned: Box<dyn Any + Send> = Box::new(format!("code {}", 3));
        assert_eq!(panic_message(owned.as_ref()), "code 3");

        let other: Box<dyn Any + Send> = Box::new(17u32);
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_abandon_closes_header() {
        let (task, queue) = task(Box::pin(async {}));
        task.abandon();
        assert!(!task.header().schedule());
        assert_eq!(queue.len(), 0);
    }
}
