//! Integration tests for cooprt
//!
//! End-to-end scenarios across the executor, combinators and readiness
//! sources, using only the public API.

use cooprt::future::{checked, join, join_all, ready_after, seq, try_join_all, yield_now};
use cooprt::time::sleep;
use cooprt::{Config, Event, Executor, RuntimeError, TaskState, block_on, spawn};
use pretty_assertions::assert_eq;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::Duration;

/// Pending until woken from outside; counts its polls
struct External {
    polls: Rc<Cell<u32>>,
    waker: Rc<RefCell<Option<Waker>>>,
    ready: Rc<Cell<bool>>,
}

impl Future for External {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.polls.set(self.polls.get() + 1);
        if self.ready.get() {
            return Poll::Ready(());
        }
        *self.waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}

// ============================================================================
// Composition
// ============================================================================

#[test]
fn test_seq_scenario() {
    let first_done = Rc::new(Cell::new(false));
    let observed = Rc::new(Cell::new(false));

    let output = block_on(seq(
        {
            let first_done = first_done.clone();
            async move {
                first_done.set(true);
                1
            }
        },
        {
            let first_done = first_done.clone();
            let observed = observed.clone();
            move |v| {
                observed.set(first_done.get());
                async move { v + 1 }
            }
        },
    ));

    assert_eq!(output, 2);
    assert!(observed.get(), "second future built before first resolved");
}

#[test]
fn test_join_scenario() {
    let output = block_on(join(ready_after(3, "x"), ready_after(1, "y")));
    assert_eq!(output, ("x", "y"));
}

#[test]
fn test_async_await_over_combinators() {
    let output = block_on(async {
        let a = seq(async { 2 }, |v| async move { v * 3 }).await;
        let (b, c) = join(ready_after(2, a + 1), async { a - 1 }).await;
        b + c
    });
    assert_eq!(output, 12);
}

#[test]
fn test_try_join_all_reports_first_failure() {
    let futures = vec![
        ready_after(1, Ok(1)),
        ready_after(4, Err("slow failure")),
        ready_after(2, Err("fast failure")),
    ];
    assert_eq!(block_on(try_join_all(futures)), Err("slow failure"));
}

#[test]
fn test_checked_reports_poll_after_completion() {
    let mut exec = Executor::new();
    let results = exec.block_on(async {
        let mut fut = Box::pin(checked(ready_after(2, 'z')));
        let first = (&mut fut).await;
        let second = fut.await;
        (first, second)
    });
    assert_eq!(results, (Ok('z'), Err(RuntimeError::PolledAfterCompletion)));
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn test_fifo_between_spawned_tasks() {
    let order = Rc::new(RefCell::new(Vec::new()));

    block_on({
        let order = order.clone();
        async move {
            for name in ["T1", "T2"] {
                let order = order.clone();
                spawn(async move {
                    order.borrow_mut().push(name);
                    yield_now().await;
                    order.borrow_mut().push(name);
                });
            }
            for _ in 0..3 {
                yield_now().await;
            }
        }
    });

    assert_eq!(order.borrow().as_slice(), &["T1", "T2", "T1", "T2"]);
}

#[test]
fn test_k_wakes_cause_one_poll() {
    let mut exec = Executor::new();
    let polls = Rc::new(Cell::new(0));
    let waker = Rc::new(RefCell::new(None::<Waker>));
    let ready = Rc::new(Cell::new(false));

    let handle = exec.spawn(External {
        polls: polls.clone(),
        waker: waker.clone(),
        ready: ready.clone(),
    });

    let polls_after = exec.block_on({
        let polls = polls.clone();
        async move {
            yield_now().await;
            let stored = waker.borrow().clone();
            if let Some(waker) = stored {
                for _ in 0..10 {
                    waker.wake_by_ref();
                }
            }
            ready.set(true);
            yield_now().await;
            polls.get()
        }
    });

    assert_eq!(polls_after, 2);
    assert_eq!(exec.task_state(handle), None);
    assert_eq!(exec.stats().completed, 1);
    assert_eq!(exec.stats().coalesced_wakes, 9);
}

#[test]
fn test_root_terminates_without_draining_thousand_tasks() {
    const TASKS: usize = 1000;
    let mut exec = Executor::with_config(Config::default().task_capacity(TASKS));
    let finished = Rc::new(Cell::new(0));
    let signal = Event::new();
    let never = Event::new();

    exec.block_on({
        let finished = finished.clone();
        let signal = signal.clone();
        async move {
            for i in 0..TASKS {
                let finished = finished.clone();
                let signal = signal.clone();
                let never = never.clone();
                spawn(async move {
                    sleep(Duration::from_millis(1)).await;
                    if i == TASKS - 1 {
                        signal.set();
                    } else {
                        never.wait().await;
                    }
                    finished.set(finished.get() + 1);
                });
            }
            signal.wait().await;
        }
    });

    assert!(finished.get() < TASKS);
    let stats = exec.stats();
    assert_eq!(stats.spawned, TASKS as u64);
    assert_eq!(stats.abandoned + stats.completed, TASKS as u64);
    assert!(stats.abandoned >= 1);
    assert_eq!(exec.outstanding(), 0);
}

#[test]
fn test_wakes_from_io_threads() {
    let mut exec = Executor::with_config(Config::default().name("io"));
    let completed = Rc::new(Cell::new(0));

    let events: Vec<Event> = (0..4).map(|_| Event::new()).collect();
    for event in &events {
        let completed = completed.clone();
        let wait = event.wait();
        exec.spawn(async move {
            wait.await;
            completed.set(completed.get() + 1);
        });
    }

    let threads: Vec<_> = events
        .iter()
        .enumerate()
        .map(|(i, event)| {
            let event = event.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(5 * (i as u64 + 1)));
                event.set();
            })
        })
        .collect();

    let all_set = events.clone();
    exec.block_on(async move {
        join_all(all_set.iter().map(|e| e.wait())).await;
        // Let the spawned waiters observe the last event
        yield_now().await;
    });
    for handle in threads {
        handle.join().unwrap();
    }

    assert_eq!(completed.get(), 4);
}

#[test]
fn test_spawned_panic_does_not_affect_siblings() {
    let mut exec = Executor::new();
    let sibling_ran = Rc::new(Cell::new(false));

    let bad = exec.spawn(async {
        yield_now().await;
        panic!("bad task");
    });
    exec.spawn({
        let sibling_ran = sibling_ran.clone();
        async move {
            yield_now().await;
            yield_now().await;
            sibling_ran.set(true);
        }
    });

    let state_during = exec.task_state(bad);
    exec.block_on(async {
        for _ in 0..4 {
            yield_now().await;
        }
    });

    assert_eq!(state_during, Some(TaskState::Enqueued));
    assert!(sibling_ran.get());
    assert_eq!(exec.stats().panicked, 1);
    assert!(matches!(
        exec.last_failure(),
        Some(RuntimeError::TaskPanicked { task, .. }) if task == bad.id()
    ));
}

#[test]
fn test_poll_after_completion_terminates_only_that_task() {
    let mut exec = Executor::new();
    let sibling_ran = Rc::new(Cell::new(false));

    let bad = exec.spawn(async {
        let mut joined = Box::pin(join(async { 1 }, async { 2 }));
        let _ = (&mut joined).await;
        let _ = joined.await;
    });
    exec.spawn({
        let sibling_ran = sibling_ran.clone();
        async move {
            yield_now().await;
            sibling_ran.set(true);
        }
    });

    let value = exec.block_on(async {
        for _ in 0..3 {
            yield_now().await;
        }
        "root finished"
    });

    assert_eq!(value, "root finished");
    assert!(sibling_ran.get());
    assert_eq!(exec.stats().panicked, 1);
    assert_eq!(
        exec.last_failure(),
        Some(RuntimeError::TaskPanicked {
            task: bad.id(),
            message: RuntimeError::PolledAfterCompletion.to_string(),
        })
    );
}

#[test]
fn test_executor_from_json_config() {
    let config = Config::from_json(r#"{ "name": "json-exec", "task_capacity": 4 }"#).unwrap();
    let mut exec = Executor::with_config(config);
    assert_eq!(exec.config().name, "json-exec");
    assert_eq!(exec.block_on(async { "ok" }), "ok");
}

#[test]
fn test_stats_serialize_to_json() {
    let mut exec = Executor::new();
    exec.spawn(async {});
    exec.block_on(yield_now());

    let json = serde_json::to_value(exec.stats()).unwrap();
    assert_eq!(json["spawned"], 1);
    assert_eq!(json["completed"], 1);
    assert_eq!(json["abandoned"], 0);
}
