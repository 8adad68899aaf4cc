use super::polled_after_completion;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future for [`yield_now`]
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct YieldNow {
    yielded: bool,
}

/// Give other ready tasks a turn
///
/// The first poll wakes the current task and returns `Pending`; the second
/// returns `Ready`. The task goes to the back of the ready-queue in between.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Future for [`ready_after`]
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct ReadyAfter<T> {
    remaining: usize,
    value: Option<T>,
}

// The value is never pinned
impl<T> Unpin for ReadyAfter<T> {}

/// Resolve to `value` on the `polls`-th poll
///
/// Every earlier poll wakes the task and returns `Pending`, so the future
/// makes progress under any executor without an outside readiness source.
/// `polls` of 0 or 1 both resolve on the first poll.
pub fn ready_after<T>(polls: usize, value: T) -> ReadyAfter<T> {
    ReadyAfter {
        remaining: polls.max(1),
        value: Some(value),
    }
}

impl<T> Future for ReadyAfter<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        if this.remaining > 1 {
            this.remaining -= 1;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        match this.value.take() {
            Some(value) => Poll::Ready(value),
            None => polled_after_completion(),
        }
    }
}
