//! Single-threaded executor for cooperative multitasking
//!
//! Design:
//! - One root future per `block_on` call; its completion ends the loop
//! - Spawned tasks live in a slab; the ready-queue holds (key, id) pairs
//! - FIFO scheduling, no priorities
//! - Proper wake semantics: parks on a condvar, never busy-waits
//! - Tasks still pending when the root completes are dropped, not drained
//!
//! Polling never happens inline with `spawn`. Only the loop in `block_on`
//! polls, and only one task at a time.

use crate::config::Config;
use crate::error::{Result, RuntimeError};
use crate::task::{BoxFuture, PollOutcome, Task, TaskHandle, TaskId, TaskState};
use crate::waker::{Entry, ReadyQueue, TaskHeader, make_waker};
use serde::Serialize;
use slab::Slab;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::pin;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_ROOT_CALL: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// The scheduler of the innermost `block_on` running on this thread
    static CURRENT: RefCell<Option<Rc<Scheduler>>> = const { RefCell::new(None) };
}

fn next_task_id() -> TaskId {
    TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}

/// Counters describing what an executor has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub spawned: u64,
    pub polls: u64,
    pub completed: u64,
    pub panicked: u64,
    /// Waker invocations on live tasks
    pub wakes: u64,
    /// Wakes that found the task already enqueued
    pub coalesced_wakes: u64,
    pub parks: u64,
    /// Tasks dropped unfinished when a root completed
    pub abandoned: u64,
}

/// A task-table slot
enum Slot {
    /// Parked in the table between polls
    Idle(Task),
    /// Taken out while `block_on` polls it
    Running(TaskId),
}

impl Slot {
    /// Take the task out if this slot holds `id`, leaving the running marker
    fn start(&mut self, id: TaskId) -> Option<Task> {
        match self {
            Slot::Idle(task) if task.id() == id => {}
            _ => return None,
        }
        match std::mem::replace(self, Slot::Running(id)) {
            Slot::Idle(task) => Some(task),
            Slot::Running(_) => None,
        }
    }
}

/// State shared between an `Executor` and the thread-local spawn handle
struct Scheduler {
    config: Config,
    tasks: RefCell<Slab<Slot>>,
    queue: Arc<ReadyQueue>,
    spawned: Cell<u64>,
    polls: Cell<u64>,
    completed: Cell<u64>,
    panicked: Cell<u64>,
    abandoned: Cell<u64>,
    last_failure: RefCell<Option<RuntimeError>>,
}

impl Scheduler {
    fn new(config: Config) -> Self {
        Self {
            tasks: RefCell::new(Slab::with_capacity(config.task_capacity)),
            queue: Arc::new(ReadyQueue::with_capacity(config.queue_capacity)),
            config,
            spawned: Cell::new(0),
            polls: Cell::new(0),
            completed: Cell::new(0),
            panicked: Cell::new(0),
            abandoned: Cell::new(0),
            last_failure: RefCell::new(None),
        }
    }

    fn spawn(&self, future: BoxFuture) -> TaskHandle {
        let id = next_task_id();

        let (header, key) = {
            let mut tasks = self.tasks.borrow_mut();
            let slot = tasks.vacant_entry();
            let key = slot.key();
            let header = TaskHeader::new(Entry::Task { key, id }, self.queue.clone());
            slot.insert(Slot::Idle(Task::new(id, header.clone(), future)));
            (header, key)
        };

        header.schedule();
        bump(&self.spawned);
        log::trace!("[{}] spawned {}", self.config.name, id);

        TaskHandle::new(id, key)
    }

    /// Poll the task behind a ready-queue entry once
    fn poll_task(&self, key: usize, id: TaskId) {
        let taken = self
            .tasks
            .borrow_mut()
            .get_mut(key)
            .and_then(|slot| slot.start(id));
        let Some(mut task) = taken else {
            log::trace!("[{}] skipping stale entry for {}", self.config.name, id);
            return;
        };

        bump(&self.polls);
        log::trace!("[{}] polling {}", self.config.name, id);

        match task.poll_once(self.config.isolate_panics) {
            PollOutcome::Pending => {
                if let Some(slot) = self.tasks.borrow_mut().get_mut(key) {
                    *slot = Slot::Idle(task);
                }
            }
            PollOutcome::Completed => {
                self.remove(key);
                bump(&self.completed);
                log::trace!("[{}] {} completed", self.config.name, id);
            }
            PollOutcome::Panicked(message) => {
                self.remove(key);
                bump(&self.panicked);
                log::error!("[{}] {} panicked: {}", self.config.name, id, message);
                *self.last_failure.borrow_mut() = Some(RuntimeError::TaskPanicked { task: id, message });
            }
        }
    }

    fn remove(&self, key: usize) {
        let mut tasks = self.tasks.borrow_mut();
        if tasks.contains(key) {
            tasks.remove(key);
        }
    }

    /// Drop every task left in the table and forget queued entries
    fn abandon_all(&self) {
        let abandoned = std::mem::replace(
            &mut *self.tasks.borrow_mut(),
            Slab::with_capacity(self.config.task_capacity),
        );
        let queued = self.queue.len();
        self.queue.clear();

        let mut count = 0;
        for (_, slot) in abandoned.iter() {
            if let Slot::Idle(task) = slot {
                task.abandon();
                count += 1;
            }
        }
        if count > 0 {
            log::debug!(
                "[{}] abandoning {} unfinished tasks ({} queued)",
                self.config.name,
                count,
                queued
            );
            self.abandoned.set(self.abandoned.get() + count);
        }

        // Futures are dropped here, after the borrow on the task table ended
        drop(abandoned);
    }

    fn task_state(&self, handle: TaskHandle) -> Option<TaskState> {
        let tasks = self.tasks.borrow();
        match tasks.get(handle.key())? {
            Slot::Idle(task) if task.id() == handle.id() => Some(task.state()),
            Slot::Running(id) if *id == handle.id() => Some(TaskState::Running),
            _ => None,
        }
    }

    fn outstanding(&self) -> usize {
        self.tasks.borrow().len()
    }

    fn stats(&self) -> Stats {
        Stats {
            spawned: self.spawned.get(),
            polls: self.polls.get(),
            completed: self.completed.get(),
            panicked: self.panicked.get(),
            wakes: self.queue.wakes(),
            coalesced_wakes: self.queue.coalesced(),
            parks: self.queue.parks(),
            abandoned: self.abandoned.get(),
        }
    }
}

fn bump(counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
}

/// Installs a scheduler as this thread's current one for the duration of a
/// `block_on` call, and tears the call's state down on exit (including
/// when the root future panics).
struct EnterGuard {
    scheduler: Rc<Scheduler>,
    root: Arc<TaskHeader>,
    previous: Option<Rc<Scheduler>>,
}

impl EnterGuard {
    fn enter(scheduler: Rc<Scheduler>, root: Arc<TaskHeader>) -> Self {
        let previous = CURRENT.with(|current| current.borrow_mut().replace(scheduler.clone()));
        Self {
            scheduler,
            root,
            previous,
        }
    }
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        // Uninstall first: a future dropped below that spawns from its
        // destructor must not land in the table being torn down
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
        self.root.close();
        self.scheduler.abandon_all();
    }
}

/// The executor - runs one root future plus any tasks it spawns
///
/// State only matters for the duration of one `block_on` call: tasks left
/// over when the root completes are dropped. Counters in [`Stats`] persist
/// across calls on the same value.
pub struct Executor {
    scheduler: Rc<Scheduler>,
}

impl Executor {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            scheduler: Rc::new(Scheduler::new(config)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.scheduler.config
    }

    /// Spawn a future, returns its handle
    ///
    /// The future is only enqueued here; it first runs inside `block_on`.
    pub fn spawn<F>(&self, future: F) -> TaskHandle
    where
        F: Future<Output = ()> + 'static,
    {
        self.scheduler.spawn(Box::pin(future))
    }

    /// Run `future` to completion on the calling thread
    ///
    /// Polls the root and every spawned task in FIFO order, parking the
    /// thread whenever the ready-queue is empty. Returns as soon as the root
    /// is ready; tasks still pending at that point are dropped.
    ///
    /// A panic in the root future propagates to the caller. A panic in a
    /// spawned task is contained to that task unless the config turns
    /// `isolate_panics` off.
    pub fn block_on<F: Future>(&mut self, future: F) -> F::Output {
        let scheduler = self.scheduler.clone();
        let call = NEXT_ROOT_CALL.fetch_add(1, Ordering::Relaxed);
        let root = TaskHeader::new(Entry::Root { call }, scheduler.queue.clone());
        let _guard = EnterGuard::enter(scheduler.clone(), root.clone());

        let waker = make_waker(root.clone());
        let mut cx = Context::from_waker(&waker);
        let mut future = pin!(future);

        root.schedule();
        loop {
            match scheduler.queue.pop_blocking() {
                Entry::Root { call: woken } if woken == call => {
                    root.begin_poll();
                    bump(&scheduler.polls);
                    if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                        log::debug!(
                            "[{}] root completed with {} tasks outstanding",
                            scheduler.config.name,
                            scheduler.outstanding()
                        );
                        return output;
                    }
                }
                Entry::Root { call: stale } => {
                    log::trace!(
                        "[{}] skipping root entry of finished call {}",
                        scheduler.config.name,
                        stale
                    );
                }
                Entry::Task { key, id } => scheduler.poll_task(key, id),
            }
        }
    }

    pub fn stats(&self) -> Stats {
        self.scheduler.stats()
    }

    /// Number of spawned tasks not yet completed
    pub fn outstanding(&self) -> usize {
        self.scheduler.outstanding()
    }

    /// State of a live task; `None` once it finished or was abandoned
    pub fn task_state(&self, handle: TaskHandle) -> Option<TaskState> {
        self.scheduler.task_state(handle)
    }

    /// The most recent spawned-task panic, if any
    pub fn last_failure(&self) -> Option<RuntimeError> {
        self.scheduler.last_failure.borrow().clone()
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a future to completion on a fresh executor
pub fn block_on<F: Future>(future: F) -> F::Output {
    Executor::new().block_on(future)
}

/// Spawn onto the executor currently running on this thread
///
/// # Panics
///
/// Panics when called outside of `block_on`. See [`try_spawn`].
pub fn spawn<F>(future: F) -> TaskHandle
where
    F: Future<Output = ()> + 'static,
{
    match try_spawn(future) {
        Ok(handle) => handle,
        Err(err) => panic!("spawn called outside of block_on: {err}"),
    }
}

/// Spawn onto the current executor, or `Err(NoRuntime)` if there is none
pub fn try_spawn<F>(future: F) -> Result<TaskHandle>
where
    F: Future<Output = ()> + 'static,
{
    let scheduler = CURRENT
        .with(|current| current.borrow().clone())
        .ok_or(RuntimeError::NoRuntime)?;
    Ok(scheduler.spawn(Box::pin(future)))
}
