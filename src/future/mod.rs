//! Poll-based combinators
//!
//! Explicit versions of what `async`/`.await` and `join!` do: each
//! combinator threads the poll boundary by hand, so every suspension point is
//! visible. They compose with `async` blocks in both directions.
//!
//! Polling any of these again after it returned `Ready` panics with
//! [`RuntimeError::PolledAfterCompletion`](crate::RuntimeError); wrap a
//! future in [`checked`] to get that as a value instead.

mod checked;
mod join;
mod seq;
mod try_join;
mod yield_now;

pub use checked::{Checked, checked};
pub use join::{Join, Join3, JoinAll, MaybeDone, join, join_all, join3};
pub use seq::{Seq, seq};
pub use try_join::{TryJoin, TryJoinAll, try_join, try_join_all};
pub use yield_now::{ReadyAfter, YieldNow, ready_after, yield_now};

use crate::error::RuntimeError;

/// Abort the current poll on a contract violation
#[track_caller]
pub(crate) fn polled_after_completion() -> ! {
    panic!("{}", RuntimeError::PolledAfterCompletion)
}

#[cfg(test)]
pub(crate) mod test_util {
    use futures::task::ArcWake;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll, Waker};

    /// Waker that counts how often it was woken
    #[derive(Default)]
    pub(crate) struct WakeCounter(AtomicUsize);

    impl WakeCounter {
        pub(crate) fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl ArcWake for WakeCounter {
        fn wake_by_ref(arc_self: &Arc<Self>) {
            arc_self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn counting_waker() -> (Arc<WakeCounter>, Waker) {
        let counter = Arc::new(WakeCounter::default());
        let waker = futures::task::waker(counter.clone());
        (counter, waker)
    }

    /// Poll once with a no-op waker
    pub(crate) fn poll_once<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        Pin::new(future).poll(&mut cx)
    }
}
